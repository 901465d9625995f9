use crate::container::{Container, ContainerConfig};
use crate::context::GameContext;
use crate::engine::{Point, Size};
use crate::error::{AdventureError, Result};
use crate::stage::{NodeId, RenderNode};
use crate::units::{self, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every item the game knows about, by id. Used to fill containers and to
/// restore a saved inventory.
pub type ItemCatalogue = BTreeMap<String, ItemConfig>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub src: String,
    #[serde(default)]
    pub collectable: bool,
    /// Box the image is scaled to fit, e.g. `"10%"` or `"64px"`
    #[serde(default)]
    pub scale: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub draggable: bool,
    /// Set for boxes, chests and anything else the player can put things in
    #[serde(default)]
    pub container: Option<ContainerConfig>,
}

/// A clickable thing in a room or a container slot
#[derive(Debug)]
pub struct Item {
    id: String,
    name: String,
    description: String,
    image: String,
    collectable: bool,
    draggable: bool,
    initial_scale: Option<String>,
    node: RenderNode,
    container: Option<Container>,
    /// Container holding this item, `None` while it lies in a room
    pub parent: Option<String>,
    last_location: Point,
}

impl Item {
    /// `container` is the item's own container, already filled by the caller
    /// from the item catalogue.
    pub fn new(config: &ItemConfig, container: Option<Container>, ctx: &mut GameContext) -> Result<Self> {
        if config.id.is_empty() {
            return Err(AdventureError::configuration("No ID set for item"));
        } else if config.name.is_empty() {
            return Err(AdventureError::configuration(format!(
                "No name set for item '{}'",
                config.id
            )));
        } else if config.src.is_empty() {
            return Err(AdventureError::configuration(format!(
                "Image source is not set for item '{}'",
                config.id
            )));
        }

        let size = ctx.image_size(&config.src)?;
        let mut item = Item {
            id: config.id.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            image: config.src.clone(),
            collectable: config.collectable,
            draggable: config.draggable,
            initial_scale: config.scale.clone(),
            node: RenderNode::bitmap(ctx.allocate_node(), config.src.clone(), size),
            container,
            parent: None,
            last_location: Point::default(),
        };
        if let Some(scale) = &config.scale {
            item.scale_to_fit(scale, ctx)?;
        }
        let canvas = ctx.canvas();
        if let Some(x) = &config.x {
            item.node.position.x = units::resolve_length(x, Axis::X, canvas)?;
        }
        if let Some(y) = &config.y {
            item.node.position.y = units::resolve_length(y, Axis::Y, canvas)?;
        }
        item.last_location = item.node.position;
        Ok(item)
    }

    /// Build an item and its container contents. A container the save
    /// record knows about is filled from the save instead of the config.
    /// Items inside a container are built without a container of their own.
    pub fn from_catalogue(
        config: &ItemConfig,
        catalogue: &ItemCatalogue,
        ctx: &mut GameContext,
    ) -> Result<Self> {
        let container = match &config.container {
            Some(container) => {
                let contents = ctx
                    .save
                    .containers
                    .get(&config.id)
                    .cloned()
                    .unwrap_or_else(|| container.items.clone());
                let items = contents
                    .iter()
                    .map(|id| {
                        let content = catalogue.get(id).ok_or_else(|| {
                            AdventureError::configuration(format!(
                                "'{}' holds unknown item '{}'",
                                config.id, id
                            ))
                        })?;
                        Item::new(content, None, ctx)
                    })
                    .collect::<Result<Vec<_>>>()?;
                let name = container.name.clone().unwrap_or_else(|| config.name.clone());
                Some(Container::new(name, container.slots, items))
            }
            None => None,
        };
        Item::new(config, container, ctx)
    }

    /// Uniformly scale the image to fit inside a `spec` sized box
    pub fn scale_to_fit(&mut self, spec: &str, ctx: &GameContext) -> Result<()> {
        let scale = units::resolve_scale_to_fit(spec, self.node.size, ctx.canvas())?;
        self.set_scale(scale);
        Ok(())
    }

    /// Back to the room scale after being shown in an inventory slot
    pub fn reset_scale(&mut self, ctx: &GameContext) -> Result<()> {
        match self.initial_scale.clone() {
            Some(spec) => self.scale_to_fit(&spec, ctx),
            None => {
                self.set_scale(1.0);
                Ok(())
            }
        }
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.node.scale_x = scale;
        self.node.scale_y = scale;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn is_collectable(&self) -> bool {
        self.collectable
    }

    pub fn is_draggable(&self) -> bool {
        self.draggable
    }

    pub fn node(&self) -> &RenderNode {
        &self.node
    }

    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    pub fn image_size(&self) -> Size {
        self.node.size
    }

    pub fn width(&self) -> f64 {
        self.node.size.width * self.node.scale_x
    }

    pub fn height(&self) -> f64 {
        self.node.size.height * self.node.scale_y
    }

    pub fn position(&self) -> Point {
        self.node.position
    }

    pub fn set_position(&mut self, position: Point) {
        self.node.position = position;
    }

    /// Where the player stands to use the item: below its left edge
    pub fn walk_target(&self) -> Point {
        Point::new(self.node.position.x, self.node.position.y + self.height())
    }

    /// Called when a drag starts
    pub fn remember_location(&mut self) {
        self.last_location = self.node.position;
    }

    /// Snap back after a drop nothing accepted
    pub fn goto_last_location(&mut self) {
        self.node.position = self.last_location;
    }

    /// Follow the pointer while dragged, centred on it
    pub fn drag_to(&mut self, pointer: Point) {
        self.node.position = Point::new(
            pointer.x - self.width() / 2.0,
            pointer.y - self.height() / 2.0,
        );
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    pub fn container_mut(&mut self) -> Option<&mut Container> {
        self.container.as_mut()
    }

    pub fn is_container(&self) -> bool {
        self.container.is_some()
    }
}
