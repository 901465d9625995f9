// ┌──────────────────────────────────────────────────────────────────────────┐
// │                          sprite/ layout                                  │
// ├────────────────┬─────────────────────────────────────────────────────────┤
// │ mod.rs         │ sprite sheets, facing directions, animation sets        │
// │ state.rs       │ walking state machine (Idle <-> Walking)                │
// │ character.rs   │ Character: config, anchor, flip, waypoints, callbacks   │
// └────────────────┴─────────────────────────────────────────────────────────┘
pub mod character;
pub mod state;

use crate::engine::{Point, Rect, Size};
use crate::error::{AdventureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of game ticks each sprite frame stays on screen
pub const FRAME_TICK_RATE: u16 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameGrid {
    pub width: f64,
    pub height: f64,
    #[serde(default = "FrameGrid::default_count")]
    pub count: u32,
    /// Frames per row. A single row when absent.
    #[serde(default)]
    pub columns: Option<u32>,
}

impl FrameGrid {
    fn default_count() -> u32 {
        1
    }
}

/// Sprite sheet description, same shape as the game data:
///
/// ```json
/// { "frames": {"width": 64, "height": 128, "count": 16, "columns": 8},
///   "animations": {"idle": [0], "right": [1, 7], "up": [8, 15]} }
/// ```
/// Each animation is `[frame]` or `[first, last]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSheet {
    pub frames: FrameGrid,
    #[serde(default)]
    pub animations: BTreeMap<String, Vec<u32>>,
}

impl SpriteSheet {
    /// Whole image as one frame with only an `idle` animation
    pub fn single_frame(size: Size) -> Self {
        SpriteSheet {
            frames: FrameGrid {
                width: size.width,
                height: size.height,
                count: 1,
                columns: None,
            },
            animations: BTreeMap::from([("idle".to_string(), vec![0])]),
        }
    }

    pub fn frame_size(&self) -> Size {
        Size::new(self.frames.width, self.frames.height)
    }

    pub fn frame_rect(&self, index: u32) -> Rect {
        let columns = self.frames.columns.unwrap_or(self.frames.count).max(1);
        Rect::new(
            Point::new(
                f64::from(index % columns) * self.frames.width,
                f64::from(index / columns) * self.frames.height,
            ),
            self.frame_size(),
        )
    }

    /// First and last frame of a clip
    pub fn clip_range(&self, clip: &str) -> Option<(u32, u32)> {
        let frames = self.animations.get(clip)?;
        let first = *frames.first()?;
        let last = frames.get(1).copied().unwrap_or(first).max(first);
        Some((first, last))
    }

    /// Frame to show `ticks` ticks into `clip`, looping
    pub fn frame_for(&self, clip: &str, ticks: u16) -> u32 {
        match self.clip_range(clip) {
            Some((first, last)) => {
                let length = last - first + 1;
                first + u32::from(ticks / FRAME_TICK_RATE) % length
            }
            None => 0,
        }
    }
}

/// Facing picked from the direction of travel
///
/// ```text
///   upleft     up     upright
///   left      idle    right
///   downleft  down    downright
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Idle,
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Direction {
    /// `delta_*` is current position minus target, so a positive X delta
    /// means walking left and a positive Y delta walking up.
    pub fn from_delta(delta_x: f64, delta_y: f64) -> Self {
        let up = delta_y > 0.0;
        let down = delta_y < 0.0;
        if delta_x > 0.0 {
            if up {
                Direction::UpLeft
            } else if down {
                Direction::DownLeft
            } else {
                Direction::Left
            }
        } else if delta_x < 0.0 {
            if up {
                Direction::UpRight
            } else if down {
                Direction::DownRight
            } else {
                Direction::Right
            }
        } else if up {
            Direction::Up
        } else if down {
            Direction::Down
        } else {
            Direction::Idle
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Direction::Idle => "idle",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::UpLeft => "upleft",
            Direction::UpRight => "upright",
            Direction::DownLeft => "downleft",
            Direction::DownRight => "downright",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationClip {
    pub clip: String,
    pub flipped: bool,
}

/// Direction key -> clip to play, flipped clips mirror another animation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationSet {
    clips: BTreeMap<String, AnimationClip>,
}

impl AnimationSet {
    pub fn from_sheet(sheet: &SpriteSheet, flipped: &BTreeMap<String, String>) -> Self {
        let mut clips: BTreeMap<String, AnimationClip> = sheet
            .animations
            .keys()
            .map(|key| {
                (
                    key.clone(),
                    AnimationClip {
                        clip: key.clone(),
                        flipped: false,
                    },
                )
            })
            .collect();
        for (key, clip) in flipped {
            clips.insert(
                key.clone(),
                AnimationClip {
                    clip: clip.clone(),
                    flipped: true,
                },
            );
        }
        AnimationSet { clips }
    }

    pub fn insert(&mut self, key: impl Into<String>, clip: impl Into<String>, flipped: bool) {
        self.clips.insert(
            key.into(),
            AnimationClip {
                clip: clip.into(),
                flipped,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&AnimationClip> {
        self.clips.get(key)
    }

    pub fn clip_for(&self, mover: &str, direction: Direction) -> Result<&AnimationClip> {
        self.get(direction.key())
            .ok_or_else(|| AdventureError::MissingAnimationClip {
                mover: mover.to_string(),
                key: direction.key().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walking_sheet() -> SpriteSheet {
        serde_json::from_str(
            r#"{
                "frames": {"width": 64, "height": 128, "count": 16, "columns": 8},
                "animations": {"idle": [0], "right": [1, 7], "up": [8, 15]}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn directions_follow_the_delta_signs() {
        assert_eq!(Direction::from_delta(5.0, 5.0), Direction::UpLeft);
        assert_eq!(Direction::from_delta(5.0, -5.0), Direction::DownLeft);
        assert_eq!(Direction::from_delta(5.0, 0.0), Direction::Left);
        assert_eq!(Direction::from_delta(-5.0, 5.0), Direction::UpRight);
        assert_eq!(Direction::from_delta(-5.0, -5.0), Direction::DownRight);
        assert_eq!(Direction::from_delta(-5.0, 0.0), Direction::Right);
        assert_eq!(Direction::from_delta(0.0, 5.0), Direction::Up);
        assert_eq!(Direction::from_delta(0.0, -5.0), Direction::Down);
        assert_eq!(Direction::from_delta(0.0, 0.0), Direction::Idle);
        assert_eq!(Direction::DownRight.key(), "downright");
    }

    #[test]
    fn frames_are_laid_out_in_rows() {
        let sheet = walking_sheet();
        assert_eq!(
            sheet.frame_rect(9),
            Rect::new(Point::new(64.0, 128.0), Size::new(64.0, 128.0))
        );
        assert_eq!(sheet.clip_range("right"), Some((1, 7)));
        assert_eq!(sheet.clip_range("idle"), Some((0, 0)));
        assert_eq!(sheet.clip_range("left"), None);
    }

    #[test]
    fn clips_loop_at_the_tick_rate() {
        let sheet = walking_sheet();
        assert_eq!(sheet.frame_for("right", 0), 1);
        assert_eq!(sheet.frame_for("right", FRAME_TICK_RATE), 2);
        assert_eq!(sheet.frame_for("right", FRAME_TICK_RATE * 7), 1);
        assert_eq!(sheet.frame_for("idle", 100), 0);
    }

    #[test]
    fn flipped_animations_mirror_existing_clips() {
        let sheet = walking_sheet();
        let flipped = BTreeMap::from([("left".to_string(), "right".to_string())]);
        let set = AnimationSet::from_sheet(&sheet, &flipped);

        assert_eq!(
            set.clip_for("player", Direction::Left).unwrap(),
            &AnimationClip {
                clip: "right".into(),
                flipped: true
            }
        );
        assert!(!set.clip_for("player", Direction::Right).unwrap().flipped);
        assert_eq!(
            set.clip_for("player", Direction::DownLeft),
            Err(AdventureError::MissingAnimationClip {
                mover: "player".into(),
                key: "downleft".into()
            })
        );
    }

    #[test]
    fn single_frame_sheets_only_idle() {
        let sheet = SpriteSheet::single_frame(Size::new(30.0, 60.0));
        assert_eq!(sheet.frame_size(), Size::new(30.0, 60.0));
        assert_eq!(sheet.frame_rect(0).position, Point::new(0.0, 0.0));
        assert_eq!(sheet.clip_range("idle"), Some((0, 0)));
    }
}
