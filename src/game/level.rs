//! Heist Levels
//!
//! The level catalog, course generation and the course feed format.
//!
//! A course is an ordered list of obstacle kinds. It either comes from the
//! catalog (generated from the level's obstacle set with the run RNG) or from
//! an external feed as a level descriptor plus a list of tokens.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::warn;

use crate::core::rng::DeterministicRng;
use crate::game::world::ObstacleKind;

/// Longest course accepted from a feed.
pub const MAX_COURSE_LENGTH: usize = 10_000;

/// Course errors.
#[derive(Debug, Error)]
pub enum LevelError {
    /// Feed payload is not valid JSON for a course.
    #[error("malformed course feed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Course exceeds [`MAX_COURSE_LENGTH`].
    #[error("course has {len} obstacles, at most {max} allowed")]
    TooLong { len: usize, max: usize },

    /// Level descriptor has no name.
    #[error("level descriptor has an empty name")]
    Unnamed,
}

// =============================================================================
// CATALOG
// =============================================================================

/// A catalog level: which obstacles may appear and how many.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelTemplate {
    pub name: &'static str,
    pub obstacle_set: &'static [ObstacleKind],
    pub length: u32,
}

/// Built-in levels, easiest first.
pub const LEVELS: [LevelTemplate; 3] = [
    LevelTemplate {
        name: "Gallery 1",
        obstacle_set: &[ObstacleKind::Laser, ObstacleKind::Camera],
        length: 10,
    },
    LevelTemplate {
        name: "Gallery 2",
        obstacle_set: &[ObstacleKind::Laser, ObstacleKind::Camera, ObstacleKind::Guard],
        length: 15,
    },
    LevelTemplate {
        name: "Vault",
        obstacle_set: &[
            ObstacleKind::Laser,
            ObstacleKind::Camera,
            ObstacleKind::Guard,
            ObstacleKind::Trapdoor,
        ],
        length: 20,
    },
];

/// Catalog level `index`. Indices past the end get the last level.
pub fn template(index: u32) -> &'static LevelTemplate {
    let last = LEVELS.len() - 1;
    &LEVELS[(index as usize).min(last)]
}

/// Index of the level after `index`, clamped to the last level.
pub fn next_index(index: u32) -> u32 {
    (index + 1).min(LEVELS.len() as u32 - 1)
}

// =============================================================================
// COURSE
// =============================================================================

/// Level name plus free-form metadata for display.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelDescriptor {
    pub name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// An ordered obstacle course.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub level: LevelDescriptor,
    /// Catalog index, when the course came from the catalog.
    pub catalog_index: Option<u32>,
    pub obstacles: Vec<ObstacleKind>,
}

/// Wire shape of a course feed: `{"level": {...}, "obstacles": ["laser", ...]}`.
#[derive(Debug, Deserialize)]
struct CourseFeed {
    level: FeedLevel,
    obstacles: Vec<String>,
}

/// Level object in a feed. Everything but the name becomes metadata.
#[derive(Debug, Deserialize)]
struct FeedLevel {
    name: String,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl Course {
    /// Generate a course for catalog level `index`.
    ///
    /// Each slot is drawn uniformly from the level's obstacle set.
    pub fn generate(index: u32, rng: &mut DeterministicRng) -> Self {
        let template = template(index);

        let obstacles = (0..template.length)
            .filter_map(|_| rng.choose(template.obstacle_set).copied())
            .collect();

        let mut metadata = BTreeMap::new();
        metadata.insert("length".to_string(), template.length.to_string());
        metadata.insert(
            "obstacle_set".to_string(),
            template
                .obstacle_set
                .iter()
                .map(|k| k.token())
                .collect::<Vec<_>>()
                .join(","),
        );

        Self {
            level: LevelDescriptor {
                name: template.name.to_string(),
                metadata,
            },
            catalog_index: Some((index as usize).min(LEVELS.len() - 1) as u32),
            obstacles,
        }
    }

    /// Build from a descriptor and course tokens.
    ///
    /// Unrecognised tokens become [`ObstacleKind::Clear`].
    pub fn from_tokens<S: AsRef<str>>(level: LevelDescriptor, tokens: &[S]) -> Result<Self, LevelError> {
        if level.name.trim().is_empty() {
            return Err(LevelError::Unnamed);
        }
        if tokens.len() > MAX_COURSE_LENGTH {
            return Err(LevelError::TooLong {
                len: tokens.len(),
                max: MAX_COURSE_LENGTH,
            });
        }

        let obstacles = tokens.iter().map(|t| parse_token(t.as_ref())).collect();

        Ok(Self {
            level,
            catalog_index: None,
            obstacles,
        })
    }

    /// Parse a JSON course feed.
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let feed: CourseFeed = serde_json::from_str(json)?;

        let metadata = feed
            .level
            .rest
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect();

        Self::from_tokens(
            LevelDescriptor {
                name: feed.level.name,
                metadata,
            },
            &feed.obstacles,
        )
    }

    /// Number of obstacles.
    pub fn len(&self) -> u32 {
        self.obstacles.len() as u32
    }

    /// No obstacles; the run completes on its first tick.
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

/// Course token to obstacle kind. Unknown tokens are logged and become clear.
pub fn parse_token(token: &str) -> ObstacleKind {
    ObstacleKind::from_token(token).unwrap_or_else(|| {
        warn!("Unknown course token {:?}, treating as clear", token);
        ObstacleKind::Clear
    })
}

// =============================================================================
// TUTORIAL
// =============================================================================

/// One gesture-to-action mapping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlHint {
    pub gesture: String,
    pub action: String,
}

/// Controls and tips shown before the first run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tutorial {
    pub controls: Vec<ControlHint>,
    pub tips: Vec<String>,
}

impl Tutorial {
    /// Standard tutorial content.
    pub fn standard(gadget_cooldown_secs: f32) -> Self {
        let hint = |gesture: &str, action: &str| ControlHint {
            gesture: gesture.to_string(),
            action: action.to_string(),
        };

        Self {
            controls: vec![
                hint("Head Left/Right", "Move left/right, dodge trapdoors"),
                hint("Mouth Open", "Jump over lasers"),
                hint("Eyebrow Raise", "Freeze to avoid cameras"),
                hint("Blink", "Use gadget (EMP) on guards"),
            ],
            tips: vec![
                "Each level has unique obstacles.".to_string(),
                "React quickly to avoid detection!".to_string(),
                format!("The gadget recharges for {} seconds after use.", gadget_cooldown_secs),
            ],
        }
    }
}
