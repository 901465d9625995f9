use crate::item::Item;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SLOTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "ContainerConfig::default_slots")]
    pub slots: usize,
    /// Ids from the game's item catalogue
    #[serde(default)]
    pub items: Vec<String>,
}

impl ContainerConfig {
    fn default_slots() -> usize {
        DEFAULT_SLOTS
    }
}

/// Fixed number of slots, each empty or holding one item.
///
/// ```text
///  slot   0      1      2      3      4
///       [key]  [    ] [map ] [    ] [    ]
///               ▲
///               └── add_item fills the first empty slot
/// ```
#[derive(Debug)]
pub struct Container {
    name: String,
    slots: Vec<Option<Item>>,
}

impl Container {
    /// Grows past `slots` when there are more initial items than slots
    pub fn new(name: impl Into<String>, slots: usize, items: Vec<Item>) -> Self {
        let name = name.into();
        let count = slots.max(items.len());
        let mut slots: Vec<Option<Item>> = items
            .into_iter()
            .map(|mut item| {
                item.parent = Some(name.clone());
                Some(item)
            })
            .collect();
        slots.resize_with(count, || None);
        Container { name, slots }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Put `item` in the first empty slot and return the slot index. A full
    /// container hands the item back.
    pub fn add_item(&mut self, mut item: Item) -> Result<usize, Item> {
        let Some(slot) = self.slots.iter().position(Option::is_none) else {
            log::warn!("Container {} is full, cannot add {}", self.name, item.id());
            return Err(item);
        };
        item.parent = Some(self.name.clone());
        self.slots[slot] = Some(item);
        Ok(slot)
    }

    pub fn remove_item(&mut self, id: &str) -> Option<Item> {
        let slot = self
            .slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|item| item.id() == id))?;
        let mut item = self.slots[slot].take()?;
        item.parent = None;
        Some(item)
    }

    pub fn has_item_with_id(&self, id: &str) -> bool {
        self.find_item_with_id(id).is_some()
    }

    pub fn find_item_with_id(&self, id: &str) -> Option<&Item> {
        self.items().find(|item| item.id() == id)
    }

    pub fn find_item_with_id_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.slots.iter_mut().flatten().find(|item| item.id() == id)
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|item| item.id() == id))
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.slots.iter().flatten()
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.slots.iter_mut().flatten()
    }

    /// `(slot, item)` for every occupied slot
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &Item)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| item.as_ref().map(|item| (slot, item)))
    }

    pub fn occupied_mut(&mut self) -> impl Iterator<Item = (usize, &mut Item)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, item)| item.as_mut().map(|item| (slot, item)))
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.items().map(|item| item.id().to_string()).collect()
    }
}
