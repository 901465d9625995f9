use crate::browser;
use crate::context::{GameContext, SaveGame};
use crate::engine::{self, input::PointerState, Game, Point, Rect, Renderer, Size};
use crate::error::{AdventureError, Result as CoreResult};
use crate::item::{Item, ItemCatalogue, ItemConfig};
use crate::room::{ClickTarget, Door, Room, RoomConfig, FLOOR_FILL};
use crate::sprite::character::{ArrivalCallback, Character, CharacterConfig};
use crate::stage::{ImageStore, NodeId, RenderNode, RenderSurface, Stage};
use crate::units::CanvasSize;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use web_sys::HtmlImageElement;

/// TABLE
/// ┌───────────────────── Game Architecture Overview ────────────────────────┐
/// │                                                                         │
/// │                              Update Flow                                │
/// │                                                                         │
/// │    ┌─────────────┐          ┌─────────────┐          ┌──────────────┐   │
/// │    │  engine.rs  │  clicks  │   game.rs   │  click   │   room.rs    │   │
/// │    │  GameLoop   ├─────────►│  Adventure  ├─────────►│ click_target │   │
/// │    │  update()   │          │  update()   │          │ walk_player  │   │
/// │    └─────────────┘          └──────┬──────┘          └──────┬───────┘   │
/// │                                    │ step                   │ path      │
/// │                              ┌─────┴──────┐          ┌──────┴───────┐   │
/// │                              │ Character  │          │ pathfinding  │   │
/// │                              │ (player)   │          │ find_path    │   │
/// │                              └─────┬──────┘          └──────────────┘   │
/// │                                    │ arrival callback                   │
/// │                              ┌─────┴──────┐                             │
/// │                              │ GameEvent  │ ◄── mpsc channel, drained   │
/// │                              │ queue      │     after every update      │
/// │                              └────────────┘                             │
/// └─────────────────────────────────────────────────────────────────────────┘
pub enum AdventureGame {
    /// Fetching `game.json` and the images it names
    Loading,

    /// Everything loaded, the start room is on the stage
    Loaded(Box<Loaded>),
}

pub struct Loaded {
    adventure: Adventure,
    images: ImageStore,
}

impl AdventureGame {
    const CONFIG_PATH: &'static str = "game.json";
    /// Large sprite sheets take a while to report their dimensions
    const SPRITE_SHEET_TIMEOUT_MS: u32 = 2000;

    pub fn new() -> Self {
        AdventureGame::Loading
    }

    async fn load_config() -> Result<GameConfig> {
        browser::fetch_json::<GameConfig>(Self::CONFIG_PATH)
            .await
            .with_context(|| format!("Failed to load game config from : {}", Self::CONFIG_PATH))
    }

    async fn load_ready_image(source: String, timeout_ms: u32) -> Result<(String, HtmlImageElement)> {
        let image = engine::load_image(&source)
            .await
            .with_context(|| format!("Failed to load image resource from : {}", source))?;
        engine::wait_until_loaded(&image, timeout_ms).await?;
        Ok((source, image))
    }
}

impl Default for AdventureGame {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Game for AdventureGame {
    async fn initialize(&self) -> Result<Box<dyn Game>> {
        match self {
            AdventureGame::Loading => {
                let config = Self::load_config().await?;
                let canvas = browser::canvas()?;
                let canvas = CanvasSize::new(canvas.width().into(), canvas.height().into());

                // every image loads at the same time, total time is the slowest one
                let sprite_sheets = config.sprite_sheet_sources();
                let loads = config.image_sources().into_iter().map(|source| {
                    let timeout = if sprite_sheets.contains(&source) {
                        Self::SPRITE_SHEET_TIMEOUT_MS
                    } else {
                        engine::DEFAULT_LOAD_TIMEOUT_MS
                    };
                    Self::load_ready_image(source, timeout)
                });
                let images: ImageStore = join_all(loads)
                    .await
                    .into_iter()
                    .collect::<Result<_>>()?;

                let mut ctx = GameContext::new(Some(canvas)).with_save(config.save.clone());
                for (source, image) in &images {
                    ctx.register_image(source.clone(), engine::image_size(image));
                }
                let adventure = Adventure::new(config, ctx)?;
                log::info!("Game loaded");
                Ok(Box::new(AdventureGame::Loaded(Box::new(Loaded {
                    adventure,
                    images,
                }))))
            }
            AdventureGame::Loaded(_) => Err(anyhow!("Game is already initialized")),
        }
    }

    fn update(&mut self, pointer: &PointerState) {
        if let AdventureGame::Loaded(loaded) = self {
            loaded.adventure.update(pointer.clicks());
        }
    }

    fn draw(&mut self, renderer: &Renderer) {
        if let AdventureGame::Loaded(loaded) = self {
            if let Some(canvas) = loaded.adventure.ctx.canvas() {
                renderer.clear(&Rect::new(
                    Point::default(),
                    Size::new(canvas.width, canvas.height),
                ));
            }
            loaded.adventure.stage.draw(renderer, &loaded.images);
        }
    }
}

// ==================== Configuration ====================
/// Shape of `game.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub player: CharacterConfig,
    pub start_room: String,
    pub rooms: Vec<RoomConfig>,
    /// Items that can show up outside a room: container contents and the
    /// saved inventory
    #[serde(default)]
    pub items: Vec<ItemConfig>,
    /// Progress to resume from
    #[serde(default)]
    pub save: SaveGame,
}

impl GameConfig {
    /// Catalogue items plus every item placed in a room
    pub fn catalogue(&self) -> ItemCatalogue {
        self.items
            .iter()
            .chain(self.rooms.iter().flat_map(|room| room.items.iter()))
            .map(|item| (item.id.clone(), item.clone()))
            .collect()
    }

    pub fn room(&self, id: &str) -> Option<&RoomConfig> {
        self.rooms.iter().find(|room| room.id == id)
    }

    fn characters(&self) -> impl Iterator<Item = &CharacterConfig> {
        std::iter::once(&self.player).chain(self.rooms.iter().flat_map(|room| room.characters.iter()))
    }

    /// Every image the game can show, each once
    pub fn image_sources(&self) -> BTreeSet<String> {
        let mut sources = BTreeSet::new();
        for character in self.characters() {
            sources.insert(character.src.clone());
            sources.extend(character.marker.iter().cloned());
            sources.extend(character.profile.iter().cloned());
        }
        for room in &self.rooms {
            sources.insert(room.background.clone());
        }
        sources.extend(self.catalogue().into_values().map(|item| item.src));
        sources
    }

    pub fn sprite_sheet_sources(&self) -> BTreeSet<String> {
        self.characters()
            .filter(|character| character.spritesheet.is_some())
            .map(|character| character.src.clone())
            .collect()
    }
}

// ==================== Inventory bar ====================
pub const INVENTORY_BOX_PERCENT: f64 = 8.0;
pub const INVENTORY_MARGIN_PERCENT: f64 = 2.0;
pub const INVENTORY_TOP: f64 = 10.0;
/// Share of a slot box an item image may fill
pub const INVENTORY_IMAGE_SHARE: f64 = 0.8;

/// Square slot boxes centred along the top of the canvas, sized in percent
/// of the canvas width.
///
/// ```text
///  ┌──────────────────────── canvas ────────────────────────┐
///  │        margin_lr  [box] gap [box] gap [box]  margin_lr │
///  │                     y = 10                             │
/// ```
pub fn inventory_slots(
    count: usize,
    canvas: CanvasSize,
    box_percent: f64,
    margin_percent: f64,
) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let box_size = canvas.width * box_percent / 100.0;
    let margin = canvas.width * margin_percent / 100.0;
    let total = box_size * count as f64 + margin * (count - 1) as f64;
    let left = (canvas.width - total) / 2.0;
    (0..count)
        .map(|index| {
            Rect::new(
                Point::new(left + index as f64 * (box_size + margin), INVENTORY_TOP),
                Size::new(box_size, box_size),
            )
        })
        .collect()
}

// ==================== Adventure ====================
/// Raised by arrival callbacks, handled after the tick that fired them
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ActivateItem(String),
    ActivateCharacter(String),
    Room(RoomEvent),
}

/// Room lifecycle, in the order `enter_room` raises them: the room left
/// behind, then the new room loaded and entered
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Loaded(String),
    Entered { room: String, first_visit: bool },
    Exited(String),
}

pub type RoomHook = Box<dyn FnMut(&RoomEvent)>;

/// Result of the last activation. Showing it in a dialog is up to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    Described { name: String, description: String },
    Collected { item: String },
    OpenedContainer { name: String, items: Vec<String> },
    StoredIn { item: String, container: String },
    TalkedTo { character: String },
}

pub struct Adventure {
    ctx: GameContext,
    config: GameConfig,
    catalogue: ItemCatalogue,
    stage: Stage,
    player: Character,
    room: Option<Room>,
    inventory_boxes: Vec<RenderNode>,
    /// Inventory item picked up by the last click
    held: Option<String>,
    events: UnboundedReceiver<GameEvent>,
    event_sender: UnboundedSender<GameEvent>,
    last_activation: Option<Activation>,
    room_hook: Option<RoomHook>,
}

impl Adventure {
    /// Build the player, restore the saved inventory and enter the start room
    pub fn new(config: GameConfig, mut ctx: GameContext) -> CoreResult<Self> {
        let catalogue = config.catalogue();
        let mut player = Character::new(&config.player, &mut ctx)?;

        for id in ctx.save.inventory.clone() {
            let Some(item_config) = catalogue.get(&id) else {
                log::error!("{} does not exist in the item list", id);
                continue;
            };
            let item = Item::from_catalogue(item_config, &catalogue, &mut ctx)?;
            if let Err(item) = player.inventory_mut().add_item(item) {
                log::warn!("No room in the inventory for {}", item.id());
            }
        }

        let (event_sender, events) = unbounded();
        let start_room = config.start_room.clone();
        let mut adventure = Adventure {
            ctx,
            config,
            catalogue,
            stage: Stage::new(),
            player,
            room: None,
            inventory_boxes: Vec::new(),
            held: None,
            events,
            event_sender,
            last_activation: None,
            room_hook: None,
        };
        adventure.enter_room(&start_room, None)?;
        Ok(adventure)
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GameContext {
        &mut self.ctx
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn player(&self) -> &Character {
        &self.player
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn held(&self) -> Option<&str> {
        self.held.as_deref()
    }

    pub fn last_activation(&self) -> Option<&Activation> {
        self.last_activation.as_ref()
    }

    /// Called with every room event once it is drained, including the ones
    /// the start room queued before the hook was set
    pub fn set_room_hook(&mut self, hook: impl FnMut(&RoomEvent) + 'static) {
        self.room_hook = Some(Box::new(hook));
    }

    /// Leave the current room and load `id`, through `door` or the room's own
    /// entrance.
    pub fn enter_room(&mut self, id: &str, door: Option<Door>) -> CoreResult<()> {
        let config = self
            .config
            .room(id)
            .ok_or_else(|| AdventureError::configuration(format!("Room '{id}' does not exist")))?;
        let mut room = Room::new(config, &self.catalogue, &mut self.ctx)?;

        if let Some(previous) = self.room.take() {
            let left = previous.id().to_string();
            previous.unload(&self.player, &mut self.stage);
            self.send(GameEvent::Room(RoomEvent::Exited(left)));
        }
        self.player.halt();
        let door = door.or_else(|| room.entrance().cloned());
        let first_visit = !room.has_been_entered();
        room.load(&mut self.player, door.as_ref(), &self.ctx, &mut self.stage)?;
        self.ctx.save.mark_entered(id);
        self.send(GameEvent::Room(RoomEvent::Loaded(id.to_string())));
        self.send(GameEvent::Room(RoomEvent::Entered {
            room: id.to_string(),
            first_visit,
        }));
        self.room = Some(room);
        self.layout_inventory();
        Ok(())
    }

    /// One fixed step: clicks, walking, then the events walking produced
    pub fn update(&mut self, clicks: &[Point]) {
        for click in clicks {
            self.handle_click(*click);
        }

        if let Err(err) = self.player.step() {
            log::error!("Halting {} : {}", self.player.name(), err);
            self.player.halt();
        }
        self.player.sync(&mut self.stage);
        if let Some(room) = self.room.as_mut() {
            room.tick(&mut self.stage);
        }

        while let Ok(Some(event)) = self.events.try_next() {
            self.handle_event(event);
        }
    }

    pub fn handle_click(&mut self, point: Point) {
        if self.ctx.input_disabled {
            return;
        }
        if self.held.is_some() {
            self.drop_held(point);
            return;
        }
        if let Some(id) = self.inventory_item_at(point) {
            self.pick_up(&id, point);
            return;
        }
        let Some(room) = self.room.as_ref() else {
            return;
        };

        let (target, excluded, on_arrive) = match room.click_target(&self.stage, point, &self.player) {
            ClickTarget::Item(id) => {
                let Some(item) = room.item(&id) else {
                    return;
                };
                (
                    item.walk_target(),
                    vec![item.node_id()],
                    Some(self.notify(GameEvent::ActivateItem(id))),
                )
            }
            ClickTarget::Character(id) => {
                let Some(character) = room.character(&id) else {
                    return;
                };
                (
                    character.location(),
                    vec![character.node().id],
                    Some(self.notify(GameEvent::ActivateCharacter(id))),
                )
            }
            ClickTarget::Floor(point) => (point, Vec::new(), None),
            ClickTarget::Nothing => return,
        };

        if let Err(err) = room.walk_player_to(&mut self.player, &self.stage, target, &excluded, on_arrive) {
            log::warn!("Not walking to {:?} : {}", target, err);
        }
    }

    fn send(&self, event: GameEvent) {
        if let Err(err) = self.event_sender.unbounded_send(event) {
            log::error!("Dropping game event : {}", err);
        }
    }

    /// Callback that queues `event` for the end of the tick
    fn notify(&self, event: GameEvent) -> ArrivalCallback {
        let sender = self.event_sender.clone();
        Box::new(move || {
            if let Err(err) = sender.unbounded_send(event) {
                log::error!("Dropping game event : {}", err);
            }
        })
    }

    fn handle_event(&mut self, event: GameEvent) {
        log::debug!("Handling {:?}", event);
        match event {
            GameEvent::ActivateItem(id) => self.activate_item(&id),
            GameEvent::ActivateCharacter(id) => {
                if let Some(character) = self.room.as_ref().and_then(|room| room.character(&id)) {
                    log::info!("Talking to {}", character.name());
                    self.last_activation = Some(Activation::TalkedTo {
                        character: character.name().to_string(),
                    });
                }
            }
            GameEvent::Room(event) => {
                log::info!("Room event {:?}", event);
                if let Some(hook) = self.room_hook.as_mut() {
                    hook(&event);
                }
            }
        }
    }

    /// Open it when it is a container, otherwise describe it and collect it
    /// when it can be collected
    pub fn activate_item(&mut self, id: &str) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let Some(item) = room.item(id) else {
            return;
        };

        if let Some(container) = item.container() {
            log::info!("Opening container {}", container.name());
            self.last_activation = Some(Activation::OpenedContainer {
                name: container.name().to_string(),
                items: container.item_ids(),
            });
            return;
        }

        log::info!("{} : {}", item.name(), item.description());
        self.last_activation = Some(Activation::Described {
            name: item.name().to_string(),
            description: item.description().to_string(),
        });
        if !item.is_collectable() || self.player.inventory().has_item_with_id(id) {
            return;
        }

        let Some(item) = room.take_item(id, &mut self.stage) else {
            return;
        };
        match self.player.inventory_mut().add_item(item) {
            Ok(slot) => {
                log::info!("Added {} to inventory slot {}", id, slot);
                self.ctx.save.add_to_inventory(id);
                self.last_activation = Some(Activation::Collected {
                    item: id.to_string(),
                });
                self.layout_inventory();
            }
            Err(item) => room.place_item(item, &mut self.stage),
        }
    }

    /// Move `item_id` out of the container `container_id` of the current
    /// room and into the inventory. Items that cannot be collected are only
    /// described.
    pub fn take_from_container(&mut self, container_id: &str, item_id: &str) -> CoreResult<()> {
        let room = self
            .room
            .as_mut()
            .ok_or_else(|| AdventureError::configuration("No room is loaded"))?;
        let container = room
            .item_mut(container_id)
            .and_then(Item::container_mut)
            .ok_or_else(|| {
                AdventureError::configuration(format!("'{container_id}' is not a container in this room"))
            })?;
        let item = container.find_item_with_id(item_id).ok_or_else(|| {
            AdventureError::configuration(format!("'{item_id}' is not in '{container_id}'"))
        })?;

        self.last_activation = Some(Activation::Described {
            name: item.name().to_string(),
            description: item.description().to_string(),
        });
        if !item.is_collectable() {
            return Ok(());
        }

        let Some(item) = container.remove_item(item_id) else {
            return Ok(());
        };
        if let Err(item) = self.player.inventory_mut().add_item(item) {
            log::warn!("No room in the inventory for {}", item_id);
            if let Err(item) = container.add_item(item) {
                log::error!("Lost {} while putting it back", item.id());
            }
            return Ok(());
        }

        log::info!("Took {} out of {}", item_id, container_id);
        self.ctx.save.store_container(container_id, container.item_ids());
        self.ctx.save.add_to_inventory(item_id);
        self.last_activation = Some(Activation::Collected {
            item: item_id.to_string(),
        });
        self.layout_inventory();
        Ok(())
    }

    fn inventory_item_at(&self, point: Point) -> Option<String> {
        let hits = self.stage.objects_at_point(point);
        self.player
            .inventory()
            .items()
            .find(|item| hits.contains(&item.node_id()))
            .map(|item| item.id().to_string())
    }

    fn pick_up(&mut self, id: &str, point: Point) {
        let Some(item) = self.player.inventory_mut().find_item_with_id_mut(id) else {
            return;
        };
        log::info!("{} : {}", item.name(), item.description());
        self.last_activation = Some(Activation::Described {
            name: item.name().to_string(),
            description: item.description().to_string(),
        });
        item.remember_location();
        item.drag_to(point);
        self.stage.add_node(item.node());
        self.held = Some(id.to_string());
    }

    /// Put the held item into whatever container is under `point`, or back
    /// into its inventory slot
    fn drop_held(&mut self, point: Point) {
        let Some(id) = self.held.take() else {
            return;
        };
        let Some(dragged) = self
            .player
            .inventory()
            .find_item_with_id(&id)
            .map(Item::node_id)
        else {
            return;
        };

        let target = self
            .room
            .as_ref()
            .and_then(|room| room.drop_target(&self.stage, point, dragged))
            .map(str::to_string);
        if let (Some(container_id), Some(room)) = (target, self.room.as_mut()) {
            if let Some(mut item) = self.player.inventory_mut().remove_item(&id) {
                self.stage.remove_node(dragged);
                if let Err(err) = item.reset_scale(&self.ctx) {
                    log::warn!("Could not rescale {} : {}", id, err);
                }
                let stored = match room.item_mut(&container_id).and_then(Item::container_mut) {
                    Some(container) => container.add_item(item).map(|_| container.item_ids()),
                    None => Err(item),
                };
                match stored {
                    Ok(contents) => {
                        log::info!("Put {} into {}", id, container_id);
                        self.ctx.save.remove_from_inventory(&id);
                        self.ctx.save.store_container(container_id.clone(), contents);
                        self.last_activation = Some(Activation::StoredIn {
                            item: id,
                            container: container_id,
                        });
                    }
                    Err(item) => {
                        log::warn!("{} is full", container_id);
                        if let Err(item) = self.player.inventory_mut().add_item(item) {
                            log::error!("Lost {} while putting it back", item.id());
                        }
                    }
                }
                self.layout_inventory();
                return;
            }
        }

        if let Some(item) = self.player.inventory_mut().find_item_with_id_mut(&id) {
            item.goto_last_location();
            self.stage.update_node(item.node());
        }
    }

    /// Rebuild the slot boxes and fit every inventory item into its box
    pub fn layout_inventory(&mut self) {
        for slot in self.inventory_boxes.drain(..) {
            self.stage.remove_node(slot.id);
        }
        let Some(canvas) = self.ctx.canvas() else {
            return;
        };
        let slots = inventory_slots(
            self.player.inventory().slot_count(),
            canvas,
            INVENTORY_BOX_PERCENT,
            INVENTORY_MARGIN_PERCENT,
        );

        for slot in &slots {
            let mut slot_box = RenderNode::shape(
                self.ctx.allocate_node(),
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(slot.size.width, 0.0),
                    Point::new(slot.size.width, slot.size.height),
                    Point::new(0.0, slot.size.height),
                ],
                FLOOR_FILL,
            );
            slot_box.position = slot.position;
            self.stage.add_node(&slot_box);
            self.inventory_boxes.push(slot_box);
        }

        let ctx = &self.ctx;
        let stage = &mut self.stage;
        for (index, item) in self.player.inventory_mut().occupied_mut() {
            let Some(slot) = slots.get(index) else {
                continue;
            };
            let image_box = slot.size.width * INVENTORY_IMAGE_SHARE;
            if let Err(err) = item.scale_to_fit(&format!("{image_box}px"), ctx) {
                log::warn!("Could not fit {} into its slot : {}", item.id(), err);
            }
            item.set_position(Point::new(
                slot.position.x + (slot.size.width - item.width()) / 2.0,
                slot.position.y + (slot.size.height - item.height()) / 2.0,
            ));
            stage.add_node(item.node());
        }
    }

    /// Nodes of the inventory bar, for tests and debugging overlays
    pub fn inventory_nodes(&self) -> Vec<NodeId> {
        self.inventory_boxes
            .iter()
            .map(|slot| slot.id)
            .chain(self.player.inventory().items().map(Item::node_id))
            .collect()
    }
}
