//! Game Configuration
//!
//! Tuning constants for the corridor, the gesture smoother, the collision
//! thresholds and the speed ramp. Defaults reproduce the museum heist
//! corridor; a JSON file can override any subset of fields.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::vec3::Vec3;
use crate::game::world::ObstacleKind;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for `GameConfig`.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value that must be positive is not.
    #[error("{0} must be positive")]
    NonPositive(&'static str),

    /// Damping factor outside (0, 1].
    #[error("damping factor {0} must be in (0, 1]")]
    Damping(f32),

    /// Some placement would leave the walkable corridor.
    #[error("{what} ({extent}) exceeds walkable half width ({half_width})")]
    OutsideCorridor {
        what: &'static str,
        extent: f32,
        half_width: f32,
    },

    /// Obstacle weights are empty or all zero.
    #[error("obstacle weights must contain at least one non-zero entry")]
    NoObstacleWeights,
}

// =============================================================================
// WORLD
// =============================================================================

/// Corridor streaming configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Length of one track segment (L).
    pub segment_length: f32,
    /// Travel distance between two obstacles.
    pub obstacle_interval: f32,
    /// Distance ahead of the player that must always be generated.
    pub lead_margin: f32,
    /// Distance behind the player after which entities are retired.
    pub trailing_margin: f32,
    /// Half of the walkable corridor width. Hard placement limit.
    pub walkable_half_width: f32,
    /// Number of obstacle lanes, centred on the corridor axis.
    pub lane_count: u32,
    /// Lateral distance between adjacent lanes.
    pub lane_spacing: f32,
    /// Travel distance between an obstacle and its collectible.
    pub collectible_offset: f32,
    /// Collectibles are placed uniformly in [-spread, spread].
    pub collectible_spread: f32,
    /// Height of collectibles above the floor.
    pub collectible_height: f32,
    /// Weighted obstacle table for endless runs.
    pub obstacle_weights: Vec<(ObstacleKind, u32)>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            segment_length: 40.0,
            obstacle_interval: 18.0,
            lead_margin: 160.0, // 4 segments ahead
            trailing_margin: 30.0,
            walkable_half_width: 6.0,
            lane_count: 3,
            lane_spacing: 4.0,
            collectible_offset: 4.0,
            collectible_spread: 3.0,
            collectible_height: 1.0,
            obstacle_weights: vec![(ObstacleKind::Laser, 50), (ObstacleKind::Guard, 50)],
        }
    }
}

impl WorldConfig {
    /// Lateral offset of the outermost lane.
    pub fn outer_lane_offset(&self) -> f32 {
        self.lane_count.saturating_sub(1) as f32 * self.lane_spacing / 2.0
    }

    /// Lateral offset of lane `index` (0 = leftmost).
    pub fn lane_offset(&self, index: u32) -> f32 {
        index as f32 * self.lane_spacing - self.outer_lane_offset()
    }
}

// =============================================================================
// INPUT SMOOTHING
// =============================================================================

/// Gesture smoothing and intent configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Fraction of the remaining distance covered per reference frame.
    pub damping: f32,
    /// Reference frame interval in seconds that `damping` is expressed in.
    pub reference_dt: f32,
    /// |head_x| at or above this resolves to a move intent.
    pub move_threshold: f32,
    /// Cooldown started when a gadget is spent on a guard.
    pub gadget_cooldown_secs: f32,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            damping: 0.28,
            reference_dt: 1.0 / 60.0,
            move_threshold: 0.5,
            gadget_cooldown_secs: 0.5,
        }
    }
}

// =============================================================================
// COLLISION
// =============================================================================

/// Axis-aligned proximity thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Obstacle hit when every axis distance is below these.
    pub obstacle_threshold: Vec3,
    /// Collectible picked up when every axis distance is below these.
    pub collect_threshold: Vec3,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            obstacle_threshold: Vec3::new(1.2, 1.2, 1.5),
            collect_threshold: Vec3::new(1.2, 1.2, 1.2),
        }
    }
}

// =============================================================================
// SPEED / POSE / SCORING
// =============================================================================

/// Forward speed ramp, in corridor units per second.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Speed at distance 0.
    pub base_speed: f32,
    /// Extra speed gained per unit of distance travelled.
    pub ramp_per_unit: f32,
    /// Cap on the extra speed.
    pub max_bonus: f32,
    /// Fraction of the gap to the target speed closed per reference frame.
    pub ramp_damping: f32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            base_speed: 12.0,
            ramp_per_unit: 0.15,
            max_bonus: 72.0,
            ramp_damping: 0.01,
        }
    }
}

/// Maps the smoothed controls to a player pose.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Player reference (eye) height.
    pub eye_height: f32,
    /// Lateral offset at full head deflection.
    pub lateral_range: f32,
    /// Height change at full head deflection.
    pub vertical_range: f32,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            eye_height: 2.0,
            lateral_range: 6.0,
            vertical_range: 2.0,
        }
    }
}

/// Score awarded per event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points per collected collectible.
    pub collectible_points: u32,
    /// Points per passed obstacle (heist runs).
    pub obstacle_points: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            collectible_points: 10,
            obstacle_points: 10,
        }
    }
}

// =============================================================================
// GAME CONFIG
// =============================================================================

/// Complete game configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub world: WorldConfig,
    pub smoother: SmootherConfig,
    pub proximity: ProximityConfig,
    pub speed: SpeedConfig,
    pub pose: PoseConfig,
    pub scoring: ScoringConfig,
}

impl GameConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check that the configuration can uphold the window invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.world;

        positive("world.segment_length", w.segment_length)?;
        positive("world.obstacle_interval", w.obstacle_interval)?;
        positive("world.lead_margin", w.lead_margin)?;
        positive("world.walkable_half_width", w.walkable_half_width)?;
        if !w.trailing_margin.is_finite() || w.trailing_margin < 0.0 {
            return Err(ConfigError::NonPositive("world.trailing_margin"));
        }
        if w.lane_count == 0 {
            return Err(ConfigError::NonPositive("world.lane_count"));
        }

        within_corridor("outer lane", w.outer_lane_offset(), w.walkable_half_width)?;
        within_corridor("collectible spread", w.collectible_spread, w.walkable_half_width)?;
        within_corridor("lateral range", self.pose.lateral_range, w.walkable_half_width)?;

        if w.obstacle_weights.iter().all(|(_, weight)| *weight == 0) {
            return Err(ConfigError::NoObstacleWeights);
        }

        let s = &self.smoother;
        if !(s.damping > 0.0 && s.damping <= 1.0) {
            return Err(ConfigError::Damping(s.damping));
        }
        positive("smoother.reference_dt", s.reference_dt)?;

        let ramp = self.speed.ramp_damping;
        if !(ramp > 0.0 && ramp <= 1.0) {
            return Err(ConfigError::Damping(ramp));
        }
        positive("speed.base_speed", self.speed.base_speed)?;

        Ok(())
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive(name))
    }
}

fn within_corridor(what: &'static str, extent: f32, half_width: f32) -> Result<(), ConfigError> {
    if extent.abs() <= half_width {
        Ok(())
    } else {
        Err(ConfigError::OutsideCorridor { what, extent, half_width })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn test_lane_offsets_are_centred() {
        let world = WorldConfig::default();
        assert_eq!(world.lane_offset(0), -4.0);
        assert_eq!(world.lane_offset(1), 0.0);
        assert_eq!(world.lane_offset(2), 4.0);
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let config = GameConfig::from_json_str(
            r#"{ "world": { "trailing_margin": 12.0 }, "smoother": { "damping": 0.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.world.trailing_margin, 12.0);
        assert_eq!(config.world.segment_length, 40.0);
        assert_eq!(config.smoother.damping, 0.5);
    }

    #[test]
    fn test_lanes_outside_corridor_rejected() {
        let mut config = GameConfig::default();
        config.world.lane_count = 5;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutsideCorridor { what: "outer lane", .. })
        ));
    }

    #[test]
    fn test_bad_damping_rejected() {
        let mut config = GameConfig::default();
        config.smoother.damping = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Damping(_))));
    }

    #[test]
    fn test_zero_weights_rejected() {
        let mut config = GameConfig::default();
        config.world.obstacle_weights = vec![(ObstacleKind::Laser, 0)];
        assert!(matches!(config.validate(), Err(ConfigError::NoObstacleWeights)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            GameConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
