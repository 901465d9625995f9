/// Walking state machine for anything that moves around a room.
///
/// ┌──────────────── State Transition Flow ──────────────────┐
/// │  From State  →  Event        →  To State                │
/// ├─────────────────────────────────────────────────────────┤
/// │  Idle        →  WalkTo       →  Walking                 │
/// │  Walking     →  WalkTo       →  Walking (new target)    │
/// │  Walking     →  Halt         →  Idle                    │
/// │  -------        ------                                  │
/// │  Walking     →  step()       →  Idle (when arrived)     │
/// │  Idle        →  step()       →  Idle (no-op)            │
/// └─────────────────────────────────────────────────────────┘
///
/// States only change through the methods below, a `MoverState<Idle>`
/// cannot be stepped and a `MoverState<Walking>` always has a target.
use super::{AnimationSet, Direction};
use crate::engine::{Point, Size};
use crate::error::Result;

/// Pixels per tick when the character config doesn't say
pub const DEFAULT_MOVE_DISTANCE: f64 = 5.0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Idle;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Walking;

pub enum IsWalking {
    Arrived(MoverState<Idle>),
    InProgress(MoverState<Walking>),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MoverState<S> {
    context: MoverContext,
    _state: S,
}

/// generic methods shared between all states
impl<S> MoverState<S> {
    pub fn context(&self) -> &MoverContext {
        &self.context
    }
}

impl MoverState<Idle> {
    pub fn new(context: MoverContext) -> Self {
        MoverState {
            context: context.with_target(None),
            _state: Idle,
        }
    }

    pub fn walk_to(self, target: Point) -> MoverState<Walking> {
        MoverState {
            context: self.context.with_target(Some(target)),
            _state: Walking,
        }
    }

    pub fn place(self, location: Point) -> Self {
        MoverState {
            context: self.context.set_character_position(location),
            _state: Idle,
        }
    }

    pub fn set_animation(
        self,
        direction: Direction,
        animations: &AnimationSet,
        mover: &str,
    ) -> Result<Self> {
        Ok(MoverState {
            context: self.context.set_animation(direction, animations, mover)?,
            _state: Idle,
        })
    }
}

impl MoverState<Walking> {
    /// Retarget without stopping
    pub fn walk_to(self, target: Point) -> Self {
        MoverState {
            context: self.context.with_target(Some(target)),
            _state: Walking,
        }
    }

    pub fn place(self, location: Point) -> Self {
        MoverState {
            context: self.context.set_character_position(location),
            _state: Walking,
        }
    }

    pub fn halt(self) -> MoverState<Idle> {
        MoverState::new(self.context)
    }

    pub fn set_animation(
        self,
        direction: Direction,
        animations: &AnimationSet,
        mover: &str,
    ) -> Result<Self> {
        Ok(MoverState {
            context: self.context.set_animation(direction, animations, mover)?,
            _state: Walking,
        })
    }

    /// One tick of walking. Each axis closes in by at most `move_distance`
    /// on its own, so diagonal moves are faster than straight ones.
    pub fn step(self, animations: &AnimationSet, mover: &str) -> Result<IsWalking> {
        let Some(target) = self.context.target else {
            return Ok(IsWalking::Arrived(self.halt()));
        };
        let current = self.context.location();
        let move_distance = self.context.move_distance;
        let delta_x = current.x - target.x;
        let delta_y = current.y - target.y;
        let next = Point::new(
            approach(current.x, target.x, move_distance),
            approach(current.y, target.y, move_distance),
        );

        let context = self
            .context
            .set_animation(Direction::from_delta(delta_x, delta_y), animations, mover)?
            .advance_frame()
            .set_character_position(next);

        if next.x == target.x && next.y == target.y {
            let context = context.set_animation(Direction::Idle, animations, mover)?;
            Ok(IsWalking::Arrived(MoverState::new(context)))
        } else {
            Ok(IsWalking::InProgress(MoverState {
                context,
                _state: Walking,
            }))
        }
    }
}

/// Move `current` towards `target` by at most `distance`, landing exactly on
/// the target once it is within reach.
fn approach(current: f64, target: f64, distance: f64) -> f64 {
    let delta = current - target;
    if delta > 0.0 {
        if delta > distance {
            current - distance
        } else {
            target
        }
    } else if delta < 0.0 {
        if -delta > distance {
            current + distance
        } else {
            target
        }
    } else {
        current
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
/// Shared data for :
/// - transform : render origin + scale (negative scale_x = mirrored)
/// - anchor    : base_location, the feet, measured from the unmirrored top-left
/// - walking   : target + move_distance
/// - display   : facing + frame ticks
pub struct MoverContext {
    pub position: Point,
    pub scale_x: f64,
    pub scale_y: f64,
    pub base_size: Size,
    pub base_location: Point,
    pub move_distance: f64,
    pub target: Option<Point>,
    pub facing: Direction,
    pub frame: u16,
}

impl MoverContext {
    pub fn new(base_size: Size) -> Self {
        MoverContext {
            position: Point::default(),
            scale_x: 1.0,
            scale_y: 1.0,
            base_size,
            base_location: Point::new(base_size.width / 2.0, base_size.height),
            move_distance: DEFAULT_MOVE_DISTANCE,
            target: None,
            facing: Direction::Idle,
            frame: 0,
        }
    }

    pub fn width(&self) -> f64 {
        self.base_size.width * self.scale_x.abs()
    }

    pub fn height(&self) -> f64 {
        self.base_size.height * self.scale_y
    }

    pub fn is_mirrored(&self) -> bool {
        self.scale_x < 0.0
    }

    pub fn x_location(&self) -> f64 {
        if self.is_mirrored() {
            self.position.x - self.base_location.x
        } else {
            self.position.x + self.base_location.x
        }
    }

    pub fn y_location(&self) -> f64 {
        self.position.y + self.base_location.y
    }

    /// Where the character is standing
    pub fn location(&self) -> Point {
        Point::new(self.x_location(), self.y_location())
    }

    /// Move so that the standing location lands on `location`
    pub fn set_character_position(mut self, location: Point) -> Self {
        self.position.x = if self.is_mirrored() {
            location.x + self.base_location.x
        } else {
            location.x - self.base_location.x
        };
        self.position.y = location.y - self.base_location.y;
        self
    }

    /// Switch to the clip for `direction`, mirroring the sprite when the clip
    /// is a flipped one. Mirroring shifts the origin by one body width so the
    /// image stays where it was on screen.
    pub fn set_animation(
        mut self,
        direction: Direction,
        animations: &AnimationSet,
        mover: &str,
    ) -> Result<Self> {
        let clip = animations.clip_for(mover, direction)?;
        let previous = animations.get(self.facing.key()).map(|c| c.clip.as_str());
        if previous != Some(clip.clip.as_str()) {
            self.frame = 0;
        }
        self.facing = direction;

        if clip.flipped != self.is_mirrored() {
            if self.is_mirrored() {
                self.position.x -= self.width();
            } else {
                self.position.x += self.width();
            }
            self.scale_x = -self.scale_x;
        }
        Ok(self)
    }

    fn advance_frame(mut self) -> Self {
        self.frame = self.frame.wrapping_add(1);
        self
    }

    pub fn with_target(mut self, target: Option<Point>) -> Self {
        self.target = target;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale_x = scale;
        self.scale_y = scale;
        self
    }

    pub fn with_move_distance(mut self, move_distance: f64) -> Self {
        self.move_distance = move_distance;
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MoverStateMachine {
    Idle(MoverState<Idle>),
    Walking(MoverState<Walking>),
}

pub enum Event {
    WalkTo(Point),
    Place(Point),
    Halt,
}

impl From<MoverState<Idle>> for MoverStateMachine {
    fn from(state: MoverState<Idle>) -> Self {
        MoverStateMachine::Idle(state)
    }
}

impl From<MoverState<Walking>> for MoverStateMachine {
    fn from(state: MoverState<Walking>) -> Self {
        MoverStateMachine::Walking(state)
    }
}

impl From<IsWalking> for MoverStateMachine {
    fn from(is_walking: IsWalking) -> Self {
        match is_walking {
            IsWalking::Arrived(idle_state) => idle_state.into(),
            IsWalking::InProgress(walking_state) => walking_state.into(),
        }
    }
}

impl MoverStateMachine {
    pub fn new(context: MoverContext) -> Self {
        MoverStateMachine::Idle(MoverState::new(context))
    }

    pub fn transition(self, event: Event) -> Self {
        use MoverStateMachine::*;
        match (self, event) {
            (Idle(state), Event::WalkTo(target)) => state.walk_to(target).into(),
            (Walking(state), Event::WalkTo(target)) => state.walk_to(target).into(),
            (Idle(state), Event::Place(location)) => state.place(location).into(),
            (Walking(state), Event::Place(location)) => state.place(location).into(),
            (Walking(state), Event::Halt) => state.halt().into(),
            (Idle(state), Event::Halt) => state.into(),
        }
    }

    /// Returns the next state and whether the target was reached this tick
    pub fn step(self, animations: &AnimationSet, mover: &str) -> Result<(Self, bool)> {
        match self {
            MoverStateMachine::Idle(_) => Ok((self, false)),
            MoverStateMachine::Walking(state) => {
                let is_walking = state.step(animations, mover)?;
                let arrived = matches!(is_walking, IsWalking::Arrived(_));
                Ok((is_walking.into(), arrived))
            }
        }
    }

    pub fn set_animation(
        self,
        direction: Direction,
        animations: &AnimationSet,
        mover: &str,
    ) -> Result<Self> {
        Ok(match self {
            MoverStateMachine::Idle(state) => state.set_animation(direction, animations, mover)?.into(),
            MoverStateMachine::Walking(state) => {
                state.set_animation(direction, animations, mover)?.into()
            }
        })
    }

    pub fn context(&self) -> &MoverContext {
        match self {
            MoverStateMachine::Idle(state) => state.context(),
            MoverStateMachine::Walking(state) => state.context(),
        }
    }

    pub fn is_walking(&self) -> bool {
        matches!(self, MoverStateMachine::Walking(_))
    }
}
