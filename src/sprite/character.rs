use super::state::{Event, MoverContext, MoverStateMachine, DEFAULT_MOVE_DISTANCE};
use super::{AnimationSet, Direction, SpriteSheet};
use crate::container::Container;
use crate::context::GameContext;
use crate::engine::{Point, Rect, Size};
use crate::error::{AdventureError, Result};
use crate::stage::{RenderNode, RenderSurface};
use crate::units::{self, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

pub const DEFAULT_INVENTORY_SLOTS: usize = 5;

/// Runs once, when the character reaches its final walk target
pub type ArrivalCallback = Box<dyn FnOnce()>;

/// Percentages of the scaled character size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterConfig {
    pub id: String,
    pub name: String,
    pub src: String,
    /// Without one the whole image is a single `idle` frame
    #[serde(default)]
    pub spritesheet: Option<SpriteSheet>,
    /// direction key -> clip that is played mirrored, e.g. `"left": "right"`
    #[serde(default)]
    pub flipped_animations: BTreeMap<String, String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub scale: Option<String>,
    /// Standing point, bottom middle when absent
    #[serde(default)]
    pub base_point: Option<PercentPoint>,
    /// Footprint around the standing point, a single point when absent
    #[serde(default)]
    pub base_dimensions: Option<PercentSize>,
    #[serde(default = "CharacterConfig::default_move_distance")]
    pub move_distance: f64,
    #[serde(default)]
    pub profile: Option<String>,
    /// Image shown where the character is walking to
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default = "CharacterConfig::default_inventory_slots")]
    pub inventory_slots: usize,
}

impl CharacterConfig {
    fn default_move_distance() -> f64 {
        DEFAULT_MOVE_DISTANCE
    }

    fn default_inventory_slots() -> usize {
        DEFAULT_INVENTORY_SLOTS
    }
}

/// The player or an NPC.
///
/// ┌─────────────── Character ───────────────┐
/// │ state      MoverStateMachine (Copy)     │ ◄── position, flip, target
/// │ waypoints  VecDeque<Point>              │ ◄── path still to walk
/// │ on_arrive  Option<ArrivalCallback>      │ ◄── fired on final arrival
/// │ node       RenderNode                   │ ◄── pushed to the surface
/// │ marker     Option<RenderNode>           │
/// │ inventory  Container                    │
/// └─────────────────────────────────────────┘
pub struct Character {
    id: String,
    name: String,
    image: String,
    profile: Option<String>,
    sheet: SpriteSheet,
    animations: AnimationSet,
    state: MoverStateMachine,
    waypoints: VecDeque<Point>,
    on_arrive: Option<ArrivalCallback>,
    footprint: Size,
    node: RenderNode,
    marker: Option<RenderNode>,
    inventory: Container,
}

impl std::fmt::Debug for Character {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Character")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("waypoints", &self.waypoints)
            .field("has_callback", &self.on_arrive.is_some())
            .finish()
    }
}

impl Character {
    pub fn new(config: &CharacterConfig, ctx: &mut GameContext) -> Result<Self> {
        if config.id.is_empty() {
            return Err(AdventureError::configuration("No ID set for character"));
        } else if config.name.is_empty() {
            return Err(AdventureError::configuration(format!(
                "No name set for character '{}'",
                config.id
            )));
        } else if config.src.is_empty() {
            return Err(AdventureError::configuration(format!(
                "No image source set for character '{}'",
                config.id
            )));
        }

        let sheet = match &config.spritesheet {
            Some(sheet) => sheet.clone(),
            None => SpriteSheet::single_frame(ctx.image_size(&config.src)?),
        };
        let animations = AnimationSet::from_sheet(&sheet, &config.flipped_animations);
        let canvas = ctx.canvas();

        let mut context =
            MoverContext::new(sheet.frame_size()).with_move_distance(config.move_distance);
        if let Some(scale) = &config.scale {
            let scale = units::resolve_scale_to_fit(scale, sheet.frame_size(), canvas)?;
            context = context.with_scale(scale);
        }
        if let Some(x) = &config.x {
            context.position.x = units::resolve_length(x, Axis::X, canvas)?;
        }
        if let Some(y) = &config.y {
            context.position.y = units::resolve_length(y, Axis::Y, canvas)?;
        }
        context.base_location = match config.base_point {
            Some(base) => Point::new(
                context.width() * base.x / 100.0,
                context.height() * base.y / 100.0,
            ),
            None => Point::new(context.width() / 2.0, context.height()),
        };
        let footprint = config
            .base_dimensions
            .map(|base| {
                Size::new(
                    context.width() * base.width / 100.0,
                    context.height() * base.height / 100.0,
                )
            })
            .unwrap_or_default();

        let marker = match &config.marker {
            Some(src) => Some(RenderNode::bitmap(
                ctx.allocate_node(),
                src.clone(),
                ctx.image_size(src)?,
            )),
            None => None,
        };

        let state =
            MoverStateMachine::new(context).set_animation(Direction::Idle, &animations, &config.name)?;
        let node = RenderNode::sprite(ctx.allocate_node(), config.src.clone(), sheet.frame_rect(0));

        let mut character = Character {
            id: config.id.clone(),
            name: config.name.clone(),
            image: config.src.clone(),
            profile: config.profile.clone(),
            sheet,
            animations,
            state,
            waypoints: VecDeque::new(),
            on_arrive: None,
            footprint,
            node,
            marker,
            inventory: Container::new(
                format!("{}'s Inventory", config.name),
                config.inventory_slots,
                Vec::new(),
            ),
        };
        character.refresh_node();
        Ok(character)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn inventory(&self) -> &Container {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Container {
        &mut self.inventory
    }

    pub fn node(&self) -> &RenderNode {
        &self.node
    }

    pub fn marker(&self) -> Option<&RenderNode> {
        self.marker.as_ref()
    }

    pub fn context(&self) -> &MoverContext {
        self.state.context()
    }

    pub fn width(&self) -> f64 {
        self.context().width()
    }

    pub fn height(&self) -> f64 {
        self.context().height()
    }

    pub fn x_location(&self) -> f64 {
        self.context().x_location()
    }

    pub fn y_location(&self) -> f64 {
        self.context().y_location()
    }

    /// Standing location
    pub fn location(&self) -> Point {
        self.context().location()
    }

    pub fn target(&self) -> Option<Point> {
        self.context().target
    }

    pub fn facing(&self) -> Direction {
        self.context().facing
    }

    pub fn is_walking(&self) -> bool {
        self.state.is_walking()
    }

    pub fn pending_waypoints(&self) -> usize {
        self.waypoints.len()
    }

    /// Area around the standing location the character occupies on the floor
    pub fn footprint(&self) -> Rect {
        let location = self.location();
        Rect::new(
            Point::new(
                location.x - self.footprint.width / 2.0,
                location.y - self.footprint.height / 2.0,
            ),
            self.footprint,
        )
    }

    /// Place the standing location at `location`
    pub fn set_character_position(&mut self, location: Point) {
        self.state = self.state.transition(Event::Place(location));
        self.refresh_node();
    }

    pub fn set_animation(&mut self, direction: Direction) -> Result<()> {
        self.state = self.state.set_animation(direction, &self.animations, &self.name)?;
        self.refresh_node();
        Ok(())
    }

    /// Walk straight to `target`. Replaces any walk in progress along with its
    /// callback.
    pub fn walk_to_position(&mut self, target: Point, on_arrive: Option<ArrivalCallback>) {
        self.waypoints.clear();
        self.on_arrive = on_arrive;
        self.state = self.state.transition(Event::WalkTo(target));
    }

    /// Walk through every waypoint of `path` and then to `target`. The
    /// callback only runs at `target`.
    pub fn walk_along(&mut self, path: Vec<Point>, target: Point, on_arrive: Option<ArrivalCallback>) {
        let mut waypoints: VecDeque<Point> = path.into();
        if waypoints.back() != Some(&target) {
            waypoints.push_back(target);
        }
        let first = waypoints.pop_front().unwrap_or(target);
        self.walk_to_position(first, on_arrive);
        self.waypoints = waypoints;
    }

    /// Stop where we are and forget the walk
    pub fn halt(&mut self) {
        self.waypoints.clear();
        self.on_arrive = None;
        self.state = self.state.transition(Event::Halt);
        if let Ok(state) = self.state.set_animation(Direction::Idle, &self.animations, &self.name) {
            self.state = state;
        }
        self.refresh_node();
    }

    /// One tick of walking. Returns true on the tick the final target is
    /// reached, after the arrival callback ran. A failed tick leaves the
    /// character where it was.
    pub fn step(&mut self) -> Result<bool> {
        if !self.state.is_walking() {
            return Ok(false);
        }
        let (state, arrived) = self.state.step(&self.animations, &self.name)?;
        if !arrived {
            self.state = state;
            self.refresh_node();
            return Ok(false);
        }

        if let Some(next) = self.waypoints.front().copied() {
            let location = state.context().location();
            let direction = Direction::from_delta(location.x - next.x, location.y - next.y);
            self.state = state
                .transition(Event::WalkTo(next))
                .set_animation(direction, &self.animations, &self.name)?;
            self.waypoints.pop_front();
            self.refresh_node();
            return Ok(false);
        }

        self.state = state;
        self.refresh_node();
        log::debug!("{} arrived at {:?}", self.name, self.location());
        if let Some(on_arrive) = self.on_arrive.take() {
            on_arrive();
        }
        Ok(true)
    }

    fn refresh_node(&mut self) {
        let context = *self.state.context();
        let frame = self
            .animations
            .get(context.facing.key())
            .map(|clip| self.sheet.frame_for(&clip.clip, context.frame))
            .unwrap_or(0);
        self.node.kind = crate::stage::NodeKind::Sprite {
            image: self.image.clone(),
            frame: self.sheet.frame_rect(frame),
        };
        self.node.position = context.position;
        self.node.scale_x = context.scale_x;
        self.node.scale_y = context.scale_y;

        if let (Some(marker), Some(target)) = (self.marker.as_mut(), context.target) {
            let final_target = self.waypoints.back().copied().unwrap_or(target);
            marker.position = Point::new(
                final_target.x - marker.size.width / 2.0,
                final_target.y - marker.size.height,
            );
        }
    }

    /// Put the character (on top) onto `surface`
    pub fn attach(&self, surface: &mut dyn RenderSurface) {
        surface.add_node(&self.node);
    }

    pub fn detach(&self, surface: &mut dyn RenderSurface) {
        surface.remove_node(self.node.id);
        if let Some(marker) = &self.marker {
            surface.remove_node(marker.id);
        }
    }

    /// Push the current node to `surface`. The walk marker is shown while
    /// walking and taken down afterwards.
    pub fn sync(&self, surface: &mut dyn RenderSurface) {
        surface.update_node(&self.node);
        let Some(marker) = &self.marker else {
            return;
        };
        match (self.is_walking(), surface.has_node(marker.id)) {
            (true, true) => surface.update_node(marker),
            (true, false) => surface.add_node(marker),
            (false, true) => surface.remove_node(marker.id),
            (false, false) => {}
        }
    }
}
