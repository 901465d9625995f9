use crate::engine::Size;
use crate::error::{AdventureError, Result};
use crate::stage::NodeId;
use crate::units::CanvasSize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Session wide state handed to every component that needs the stage size,
/// fresh node ids or the save record. One per running game.
#[derive(Debug)]
pub struct GameContext {
    canvas: Option<CanvasSize>,
    next_node: u32,
    /// Natural size of every loaded image, by source path
    image_sizes: HashMap<String, Size>,
    pub save: SaveGame,
    /// Keep animating but ignore clicks (e.g. while a dialog is open)
    pub input_disabled: bool,
}

impl GameContext {
    pub fn new(canvas: Option<CanvasSize>) -> Self {
        GameContext {
            canvas,
            next_node: 0,
            image_sizes: HashMap::new(),
            save: SaveGame::default(),
            input_disabled: false,
        }
    }

    pub fn with_save(mut self, save: SaveGame) -> Self {
        self.save = save;
        self
    }

    pub fn canvas(&self) -> Option<CanvasSize> {
        self.canvas
    }

    pub fn set_canvas(&mut self, canvas: CanvasSize) {
        self.canvas = Some(canvas);
    }

    pub fn register_image(&mut self, source: impl Into<String>, size: Size) {
        self.image_sizes.insert(source.into(), size);
    }

    pub fn image_size(&self, source: &str) -> Result<Size> {
        self.image_sizes
            .get(source)
            .copied()
            .ok_or_else(|| AdventureError::configuration(format!("image '{source}' is not loaded")))
    }

    pub fn allocate_node(&mut self) -> NodeId {
        let id = NodeId::new(self.next_node);
        self.next_node += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Progress record. Serializable so a document store can keep it; storing
/// it is up to the embedding page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveGame {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub points: i64,
    pub inventory: Vec<String>,
    pub containers: BTreeMap<String, Vec<String>>,
    pub flags: BTreeMap<String, FlagValue>,
}

impl Default for SaveGame {
    fn default() -> Self {
        SaveGame {
            id: "game_unknown".to_string(),
            name: "undefined".to_string(),
            points: 0,
            inventory: Vec::new(),
            containers: BTreeMap::new(),
            flags: BTreeMap::new(),
        }
    }
}

impl SaveGame {
    pub fn set_flag(&mut self, key: impl Into<String>, value: FlagValue) {
        self.flags.insert(key.into(), value);
    }

    pub fn flag(&self, key: &str) -> Option<&FlagValue> {
        self.flags.get(key)
    }

    pub fn add_points(&mut self, points: i64) -> i64 {
        self.points += points;
        self.points
    }

    pub fn has_in_inventory(&self, item_id: &str) -> bool {
        self.inventory.iter().any(|id| id == item_id)
    }

    /// Record an inventory item once; returns false when already recorded
    pub fn add_to_inventory(&mut self, item_id: &str) -> bool {
        if self.has_in_inventory(item_id) {
            return false;
        }
        self.inventory.push(item_id.to_string());
        true
    }

    pub fn remove_from_inventory(&mut self, item_id: &str) {
        self.inventory.retain(|id| id != item_id);
    }

    /// Saved container holding `item_id`
    pub fn container_of(&self, item_id: &str) -> Option<&str> {
        self.containers
            .iter()
            .find(|(_, items)| items.iter().any(|id| id == item_id))
            .map(|(container, _)| container.as_str())
    }

    /// Replace what `container_id` holds. An empty list is kept so an
    /// emptied container stays empty.
    pub fn store_container(&mut self, container_id: impl Into<String>, items: Vec<String>) {
        self.containers.insert(container_id.into(), items);
    }

    pub fn has_entered(&self, room_id: &str) -> bool {
        matches!(self.flag(&entered_flag(room_id)), Some(FlagValue::Bool(true)))
    }

    pub fn mark_entered(&mut self, room_id: &str) {
        self.set_flag(entered_flag(room_id), FlagValue::Bool(true));
    }
}

fn entered_flag(room_id: &str) -> String {
    format!("entered:{room_id}")
}
