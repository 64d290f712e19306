//! Invariant violations.
//!
//! These are programming errors, not gameplay outcomes. The session reports
//! them loudly and resets the run; they never turn into a game-over.

use thiserror::Error;

use crate::game::world::EntityId;

/// A broken world or scoring invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    /// Player position was NaN or infinite.
    #[error("player position {0} is not finite")]
    NonFinitePosition(f32),

    /// Window holds no track segments.
    #[error("window has no track segments")]
    EmptyWindow,

    /// Two consecutive segments do not abut exactly.
    #[error("segments {previous} and {next} are not contiguous")]
    SegmentGap { previous: i64, next: i64 },

    /// Track does not cover the required window around the player.
    #[error("track covers [{covered_from}, {covered_to}] but [{required_from}, {required_to}] is required")]
    WindowNotCovered {
        covered_from: f32,
        covered_to: f32,
        required_from: f32,
        required_to: f32,
    },

    /// Two obstacles or two collectibles share a travel position.
    #[error("entity {id} at {position} is not strictly ahead of its predecessor")]
    Overlap { id: EntityId, position: f32 },

    /// An entity was placed outside the walkable corridor.
    #[error("entity {id} at lateral {lateral} is outside the corridor (±{half_width})")]
    OutsideCorridor {
        id: EntityId,
        lateral: f32,
        half_width: f32,
    },

    /// A collectible was credited a second time.
    #[error("collectible {0} credited twice")]
    DoubleCollect(EntityId),

    /// Configuration cannot uphold the window invariants.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Course cursor did not advance by exactly one.
    #[error("obstacle {got} passed while cursor was at {expected}")]
    CursorSkip { expected: u32, got: u32 },
}
