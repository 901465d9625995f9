//! A room: background, walkable floor, items and NPCs, plus how the player
//! gets in and moves around.
//!
//! ┌──────────────────── Room lifecycle ─────────────────────┐
//! │ Room::new    build items + NPCs from config (no stage)  │
//! │ Room::load   scale to canvas, attach nodes, enter door  │
//! │ Room::tick   step NPCs, one failing NPC never stops it  │
//! │ Room::unload detach everything, NPCs dropped with room  │
//! └─────────────────────────────────────────────────────────┘
use crate::context::GameContext;
use crate::engine::Point;
use crate::error::{AdventureError, Result};
use crate::item::{Item, ItemCatalogue, ItemConfig};
use crate::pathfinding::{self, PathConfig};
use crate::sprite::character::{ArrivalCallback, Character, CharacterConfig};
use crate::stage::{NodeId, RenderNode, RenderSurface};
use crate::units::{self, CanvasSize};
use serde::{Deserialize, Serialize};

/// Gap in pixels between the player and the door edge when entering
pub const DOOR_OFFSET: f64 = 5.0;

pub const FLOOR_FILL: &str = "rgba(255, 255, 255, 0.21)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorLocation {
    N,
    S,
    E,
    W,
}

/// Where the player appears when entering a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Door {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub location: Option<DoorLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub background: String,
    /// Walkable polygon in background image pixels
    #[serde(default)]
    pub floor: Vec<Point>,
    #[serde(default)]
    pub items: Vec<ItemConfig>,
    #[serde(default)]
    pub characters: Vec<CharacterConfig>,
    #[serde(default)]
    pub entrance: Option<Door>,
    /// Route clicks around obstacles instead of walking straight
    #[serde(default)]
    pub pathfinding: bool,
    #[serde(default)]
    pub path: PathConfig,
}

/// What a click landed on, topmost first
#[derive(Debug, Clone, PartialEq)]
pub enum ClickTarget {
    Item(String),
    Character(String),
    Floor(Point),
    Nothing,
}

#[derive(Debug)]
pub struct Room {
    id: String,
    name: String,
    background: RenderNode,
    floor: RenderNode,
    items: Vec<Item>,
    characters: Vec<Character>,
    entrance: Option<Door>,
    pathfinding: bool,
    path: PathConfig,
    entered: bool,
}

impl Room {
    /// Items the save record has in the inventory or in a container are
    /// left out
    pub fn new(config: &RoomConfig, catalogue: &ItemCatalogue, ctx: &mut GameContext) -> Result<Self> {
        if config.background.is_empty() {
            return Err(AdventureError::configuration(format!(
                "Background is not set for room '{}'",
                config.id
            )));
        }
        if config.floor.len() < 3 {
            return Err(AdventureError::configuration(format!(
                "Floor is not set for room '{}'",
                config.id
            )));
        }

        let background_size = ctx.image_size(&config.background)?;
        let background =
            RenderNode::bitmap(ctx.allocate_node(), config.background.clone(), background_size);
        let floor = RenderNode::shape(ctx.allocate_node(), config.floor.clone(), FLOOR_FILL);

        let mut items = Vec::with_capacity(config.items.len());
        for item in &config.items {
            if ctx.save.has_in_inventory(&item.id) {
                log::debug!("{} is in the inventory, not placing it in {}", item.id, config.id);
                continue;
            }
            if let Some(container) = ctx.save.container_of(&item.id) {
                log::debug!("{} is stored in {}, not placing it in {}", item.id, container, config.id);
                continue;
            }
            items.push(Item::from_catalogue(item, catalogue, ctx)?);
        }
        let characters = config
            .characters
            .iter()
            .map(|character| Character::new(character, ctx))
            .collect::<Result<Vec<_>>>()?;

        Ok(Room {
            id: config.id.clone(),
            name: config.name.clone(),
            background,
            floor,
            items,
            characters,
            entrance: config.entrance.clone(),
            pathfinding: config.pathfinding,
            path: config.path,
            entered: ctx.save.has_entered(&config.id),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entrance(&self) -> Option<&Door> {
        self.entrance.as_ref()
    }

    pub fn has_been_entered(&self) -> bool {
        self.entered
    }

    pub fn floor(&self) -> &RenderNode {
        &self.floor
    }

    pub fn background(&self) -> &RenderNode {
        &self.background
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|character| character.id() == id)
    }

    /// Scale to the canvas, attach everything and bring the player in through
    /// `door`.
    pub fn load(
        &mut self,
        player: &mut Character,
        door: Option<&Door>,
        ctx: &GameContext,
        surface: &mut dyn RenderSurface,
    ) -> Result<()> {
        let canvas = ctx
            .canvas()
            .ok_or_else(|| AdventureError::StageUnavailable(format!("room {}", self.id)))?;
        let size = self.background.size;
        if size.width <= 0.0 || size.height <= 0.0 {
            return Err(AdventureError::configuration(format!(
                "Background of room '{}' has no size",
                self.id
            )));
        }
        let (scale_x, scale_y) = (canvas.width / size.width, canvas.height / size.height);
        for node in [&mut self.background, &mut self.floor] {
            node.scale_x = scale_x;
            node.scale_y = scale_y;
        }

        surface.add_node(&self.background);
        surface.add_node(&self.floor);
        for item in &self.items {
            surface.add_node(item.node());
        }
        for character in &self.characters {
            character.attach(surface);
        }

        if let Some(door) = door {
            enter_through(player, door, canvas)?;
        }
        player.attach(surface);
        player.sync(surface);
        self.entered = true;
        log::info!("Loaded room {}", self.id);
        Ok(())
    }

    /// Take every node of the room and the player off the surface
    pub fn unload(self, player: &Character, surface: &mut dyn RenderSurface) {
        surface.remove_node(self.background.id);
        surface.remove_node(self.floor.id);
        for item in &self.items {
            surface.remove_node(item.node_id());
        }
        for character in &self.characters {
            character.detach(surface);
        }
        player.detach(surface);
        log::info!("Unloaded room {}", self.id);
    }

    /// Resolve the topmost node under `point`. The player and the background
    /// are looked through.
    pub fn click_target(
        &self,
        surface: &dyn RenderSurface,
        point: Point,
        player: &Character,
    ) -> ClickTarget {
        let skipped: Vec<NodeId> = std::iter::once(player.node().id)
            .chain(player.marker().map(|marker| marker.id))
            .collect();
        for id in surface.objects_at_point(point) {
            if skipped.contains(&id) {
                continue;
            }
            if let Some(item) = self.items.iter().find(|item| item.node_id() == id) {
                return ClickTarget::Item(item.id().to_string());
            }
            if let Some(character) = self.characters.iter().find(|c| c.node().id == id) {
                return ClickTarget::Character(character.id().to_string());
            }
            if id == self.floor.id {
                return ClickTarget::Floor(point);
            }
            if id == self.background.id {
                return ClickTarget::Nothing;
            }
        }
        ClickTarget::Nothing
    }

    /// Waypoints across this room's floor. The background never blocks.
    pub fn get_path(
        &self,
        surface: &dyn RenderSurface,
        start: Point,
        end: Point,
        excluded: &[NodeId],
    ) -> Result<Vec<Point>> {
        let mut excluded = excluded.to_vec();
        excluded.push(self.background.id);
        pathfinding::find_path(surface, self.floor.id, start, end, &excluded, &self.path)
    }

    /// Send the player to `target`, around obstacles when the room asks for
    /// it. `excluded` nodes don't count as obstacles. On `NoPathFound` the
    /// player stays where it is.
    pub fn walk_player_to(
        &self,
        player: &mut Character,
        surface: &dyn RenderSurface,
        target: Point,
        excluded: &[NodeId],
        on_arrive: Option<ArrivalCallback>,
    ) -> Result<()> {
        if !self.pathfinding {
            player.walk_to_position(target, on_arrive);
            return Ok(());
        }
        let mut excluded = excluded.to_vec();
        excluded.push(player.node().id);
        if let Some(marker) = player.marker() {
            excluded.push(marker.id);
        }
        let path = self.get_path(surface, player.location(), target, &excluded)?;
        log::debug!("Walking {} waypoints to {:?}", path.len(), target);
        player.walk_along(path, target, on_arrive);
        Ok(())
    }

    /// Step every NPC. A failing NPC is halted and logged.
    pub fn tick(&mut self, surface: &mut dyn RenderSurface) {
        for character in &mut self.characters {
            if let Err(err) = character.step() {
                log::error!("Halting {} : {}", character.id(), err);
                character.halt();
            }
            character.sync(surface);
        }
    }

    /// Item that can take `dragged` when dropped at `point`
    pub fn drop_target(
        &self,
        surface: &dyn RenderSurface,
        point: Point,
        dragged: NodeId,
    ) -> Option<&str> {
        surface
            .objects_at_point(point)
            .into_iter()
            .filter(|id| *id != dragged)
            .find_map(|id| {
                self.items
                    .iter()
                    .find(|item| item.node_id() == id && item.is_container())
            })
            .map(|item| item.id())
    }

    /// Remove an item from the room, e.g. when it is collected
    pub fn take_item(&mut self, id: &str, surface: &mut dyn RenderSurface) -> Option<Item> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        let item = self.items.remove(index);
        surface.remove_node(item.node_id());
        Some(item)
    }

    /// Put an item back into the room at its current position
    pub fn place_item(&mut self, item: Item, surface: &mut dyn RenderSurface) {
        surface.add_node(item.node());
        self.items.push(item);
    }
}

/// Place the player just outside `door` and walk it in. Without a location
/// the player is put down on the door point.
///
/// ```text
///        N: appear above, walk down          ┌──────────┐
///   W ─► appear left, walk right             │   room   │ ◄─ E
///        S: appear below, walk up            └──────────┘
/// ```
pub fn enter_through(player: &mut Character, door: &Door, canvas: CanvasSize) -> Result<()> {
    let door_point = units::resolve_point(&door.x, &door.y, Some(canvas))?;
    let Point { x, y } = door_point;
    let (w, h) = (player.width(), player.height());

    let (place, walk_to) = match door.location {
        Some(DoorLocation::N) => (
            Point::new(x, y - DOOR_OFFSET),
            Some(Point::new(x, y + h + DOOR_OFFSET)),
        ),
        Some(DoorLocation::S) => (
            Point::new(x, y + h + DOOR_OFFSET),
            Some(Point::new(x, y - DOOR_OFFSET)),
        ),
        Some(DoorLocation::E) => (
            Point::new(x + w + DOOR_OFFSET, y),
            Some(Point::new(x - w - DOOR_OFFSET, y)),
        ),
        Some(DoorLocation::W) => (
            Point::new(x - w - DOOR_OFFSET, y),
            Some(Point::new(x + w + DOOR_OFFSET, y)),
        ),
        None => (door_point, None),
    };

    player.set_character_position(place);
    if let Some(target) = walk_to {
        player.walk_to_position(target, None);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Size;
    use crate::stage::Stage;

    fn context() -> GameContext {
        let mut ctx = GameContext::new(Some(CanvasSize::new(800.0, 600.0)));
        ctx.register_image("hall.png", Size::new(400.0, 300.0));
        ctx.register_image("vase.png", Size::new(50.0, 100.0));
        ctx.register_image("chest.png", Size::new(100.0, 100.0));
        ctx.register_image("hero.png", Size::new(40.0, 100.0));
        ctx.register_image("butler.png", Size::new(40.0, 100.0));
        ctx
    }

    fn hall() -> RoomConfig {
        serde_json::from_str(
            r#"{
                "id": "hall",
                "background": "hall.png",
                "floor": [{"x": 0, "y": 150}, {"x": 400, "y": 150},
                          {"x": 400, "y": 300}, {"x": 0, "y": 300}],
                "items": [
                    {"id": "vase", "name": "Vase", "src": "vase.png", "x": "400px", "y": "350px"},
                    {"id": "chest", "name": "Chest", "src": "chest.png", "x": "100px", "y": "400px",
                     "container": {"slots": 3}}
                ],
                "characters": [{"id": "butler", "name": "Butler", "src": "butler.png",
                                "x": "600px", "y": "300px"}],
                "entrance": {"x": "50%", "y": "80%", "location": "W"}
            }"#,
        )
        .unwrap()
    }

    fn player(ctx: &mut GameContext) -> Character {
        let config: CharacterConfig =
            serde_json::from_str(r#"{"id": "player", "name": "Hero", "src": "hero.png"}"#)
                .unwrap();
        Character::new(&config, ctx).unwrap()
    }

    #[test]
    fn rooms_need_a_background_and_floor() {
        let mut ctx = context();
        let mut config = hall();
        config.floor.truncate(2);
        assert!(matches!(
            Room::new(&config, &ItemCatalogue::new(), &mut ctx),
            Err(AdventureError::Configuration(_))
        ));

        let mut config = hall();
        config.background.clear();
        assert!(Room::new(&config, &ItemCatalogue::new(), &mut ctx).is_err());
    }

    #[test]
    fn saved_inventory_items_stay_out_of_the_room() {
        let mut ctx = context();
        ctx.save.add_to_inventory("vase");
        let room = Room::new(&hall(), &ItemCatalogue::new(), &mut ctx).unwrap();
        assert!(room.item("vase").is_none());
        assert!(room.item("chest").is_some());
    }

    #[test]
    fn load_scales_to_the_canvas_and_enters_through_the_door() {
        let mut ctx = context();
        let mut stage = Stage::new();
        let mut player = player(&mut ctx);
        let mut room = Room::new(&hall(), &ItemCatalogue::new(), &mut ctx).unwrap();
        let door = room.entrance().cloned();

        room.load(&mut player, door.as_ref(), &ctx, &mut stage).unwrap();

        assert!(room.has_been_entered());
        assert_eq!(room.background().scale_x, 2.0);
        assert_eq!(room.floor().scale_y, 2.0);
        // background, floor, 2 items, butler, player
        assert_eq!(stage.len(), 6);
        assert_eq!(stage.nodes().last().map(|node| node.id), Some(player.node().id));

        // door at (400, 480), player 40 wide
        assert_eq!(player.location(), Point::new(355.0, 480.0));
        assert_eq!(player.target(), Some(Point::new(445.0, 480.0)));
    }

    #[test]
    fn click_targets_resolve_topmost_first() {
        let mut ctx = context();
        let mut stage = Stage::new();
        let mut player = player(&mut ctx);
        let mut room = Room::new(&hall(), &ItemCatalogue::new(), &mut ctx).unwrap();
        room.load(&mut player, None, &ctx, &mut stage).unwrap();

        assert_eq!(
            room.click_target(&stage, Point::new(410.0, 360.0), &player),
            ClickTarget::Item("vase".into())
        );
        assert_eq!(
            room.click_target(&stage, Point::new(610.0, 350.0), &player),
            ClickTarget::Character("butler".into())
        );
        assert_eq!(
            room.click_target(&stage, Point::new(700.0, 550.0), &player),
            ClickTarget::Floor(Point::new(700.0, 550.0))
        );
        assert_eq!(
            room.click_target(&stage, Point::new(700.0, 50.0), &player),
            ClickTarget::Nothing
        );
        // the player is looked through
        assert_eq!(
            room.click_target(&stage, Point::new(20.0, 50.0), &player),
            ClickTarget::Nothing
        );
    }

    #[test]
    fn containers_are_drop_targets() {
        let mut ctx = context();
        let mut stage = Stage::new();
        let mut player = player(&mut ctx);
        let mut room = Room::new(&hall(), &ItemCatalogue::new(), &mut ctx).unwrap();
        room.load(&mut player, None, &ctx, &mut stage).unwrap();
        let vase = room.item("vase").map(|item| item.node_id()).unwrap();
        let chest = room.item("chest").map(|item| item.node_id()).unwrap();

        assert_eq!(
            room.drop_target(&stage, Point::new(150.0, 450.0), vase),
            Some("chest")
        );
        assert_eq!(room.drop_target(&stage, Point::new(150.0, 450.0), chest), None);
        assert_eq!(room.drop_target(&stage, Point::new(410.0, 360.0), chest), None);
    }

    #[test]
    fn walks_are_direct_unless_the_room_paths() {
        let mut ctx = context();
        let mut stage = Stage::new();
        let mut player = player(&mut ctx);
        let mut config = hall();
        config.pathfinding = true;
        let mut room = Room::new(&config, &ItemCatalogue::new(), &mut ctx).unwrap();
        room.load(&mut player, None, &ctx, &mut stage).unwrap();
        player.set_character_position(Point::new(150.0, 350.0));
        player.sync(&mut stage);

        room.walk_player_to(&mut player, &stage, Point::new(750.0, 550.0), &[], None)
            .unwrap();
        assert!(player.is_walking());
        assert!(player.pending_waypoints() > 0);

        player.halt();
        let result = room.walk_player_to(&mut player, &stage, Point::new(750.0, 50.0), &[], None);
        assert!(matches!(result, Err(AdventureError::NoPathFound { .. })));
        assert!(!player.is_walking());
    }

    #[test]
    fn failing_npcs_are_halted_alone() {
        let mut ctx = context();
        let mut stage = Stage::new();
        let mut player = player(&mut ctx);
        let mut room = Room::new(&hall(), &ItemCatalogue::new(), &mut ctx).unwrap();
        room.load(&mut player, None, &ctx, &mut stage).unwrap();

        // single frame characters only know `idle`
        room.characters[0].walk_to_position(Point::new(100.0, 400.0), None);
        room.tick(&mut stage);
        assert!(!room.characters()[0].is_walking());
        assert_eq!(room.characters()[0].location(), Point::new(620.0, 400.0));
    }

    #[test]
    fn collected_items_leave_the_stage() {
        let mut ctx = context();
        let mut stage = Stage::new();
        let mut player = player(&mut ctx);
        let mut room = Room::new(&hall(), &ItemCatalogue::new(), &mut ctx).unwrap();
        room.load(&mut player, None, &ctx, &mut stage).unwrap();

        let vase = room.take_item("vase", &mut stage).unwrap();
        assert!(!stage.has_node(vase.node_id()));
        assert!(room.item("vase").is_none());
        room.place_item(vase, &mut stage);
        assert!(room.item("vase").is_some());

        room.unload(&player, &mut stage);
        assert!(stage.is_empty());
    }

    #[test]
    fn doors_without_location_place_the_player() {
        let mut ctx = context();
        let mut player = player(&mut ctx);
        let door = Door {
            x: "100px".into(),
            y: "50%".into(),
            location: None,
        };
        enter_through(&mut player, &door, CanvasSize::new(800.0, 600.0)).unwrap();
        assert_eq!(player.location(), Point::new(100.0, 300.0));
        assert!(!player.is_walking());

        let north = Door {
            location: Some(DoorLocation::N),
            ..door
        };
        enter_through(&mut player, &north, CanvasSize::new(800.0, 600.0)).unwrap();
        assert_eq!(player.location(), Point::new(100.0, 295.0));
        assert_eq!(player.target(), Some(Point::new(100.0, 405.0)));
    }

    #[test]
    fn east_doors_walk_the_player_in_from_the_right() {
        let mut ctx = context();
        let mut player = player(&mut ctx);
        let east = Door {
            x: "100px".into(),
            y: "50%".into(),
            location: Some(DoorLocation::E),
        };
        enter_through(&mut player, &east, CanvasSize::new(800.0, 600.0)).unwrap();
        // player 40 wide
        assert_eq!(player.location(), Point::new(145.0, 300.0));
        assert_eq!(player.target(), Some(Point::new(55.0, 300.0)));
    }

    #[test]
    fn stored_items_stay_out_and_entered_rooms_are_remembered() {
        let mut ctx = context();
        let catalogue = ItemCatalogue::from_iter(
            hall().items.into_iter().map(|item| (item.id.clone(), item)),
        );
        ctx.save.store_container("chest", vec!["vase".into()]);
        ctx.save.mark_entered("hall");

        let room = Room::new(&hall(), &catalogue, &mut ctx).unwrap();
        assert!(room.item("vase").is_none());
        let chest = room.item("chest").and_then(Item::container).unwrap();
        assert!(chest.has_item_with_id("vase"));
        assert!(room.has_been_entered());
    }
}
