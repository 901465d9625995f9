use thiserror::Error;

/// Everything the adventure core can fail with.
///
/// ┌──────────────────────┬──────────────────────────────┬────────────────────┐
/// │ Variant              │ Raised by                    │ Caller reaction    │
/// ├──────────────────────┼──────────────────────────────┼────────────────────┤
/// │ InvalidUnitSpec      │ units::resolve_*             │ content bug        │
/// │ StageUnavailable     │ units::resolve_* (percent)   │ content bug        │
/// │ NoPathFound          │ pathfinding / Room::get_path │ ignore the click   │
/// │ MissingAnimationClip │ Character::step              │ halt that mover    │
/// │ Configuration        │ constructors                 │ room doesn't load  │
/// └──────────────────────┴──────────────────────────────┴────────────────────┘
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdventureError {
    #[error("invalid unit '{0}', expected '<number>%' or '<number>px'")]
    InvalidUnitSpec(String),

    #[error("unable to resolve '{0}' by percent as the stage size is not available")]
    StageUnavailable(String),

    #[error("no walkable path from {from:?} to {to:?}")]
    NoPathFound { from: (f64, f64), to: (f64, f64) },

    #[error("'{mover}' has no animation clip for '{key}'")]
    MissingAnimationClip { mover: String, key: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AdventureError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AdventureError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, AdventureError>;
