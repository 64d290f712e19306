//! Game Events
//!
//! Events produced by collision resolution and phase transitions, consumed by
//! the state machine, the session and replay verification.

use serde::{Serialize, Deserialize};

use crate::game::input::Intent;
use crate::game::state::GamePhase;
use crate::game::world::{EntityId, ObstacleKind};

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Collisions end the run, processed first
    Collision = 0,
    /// Then course progress
    ObstaclePassed = 1,
    /// Then pickups
    Collected = 2,
    /// Then level completion
    LevelComplete = 3,
    /// Lowest priority
    Other = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEventData {
    /// Player hit an obstacle (or failed its rule)
    Collision {
        obstacle_id: EntityId,
        kind: ObstacleKind,
        intent: Intent,
    },

    /// Player picked up a collectible
    Collected {
        collectible_id: EntityId,
        points: u32,
    },

    /// Player resolved the course obstacle at `cursor`
    ObstaclePassed {
        obstacle_id: EntityId,
        kind: ObstacleKind,
        cursor: u32,
        points: u32,
    },

    /// Every course obstacle has been passed
    LevelComplete {
        obstacles_passed: u32,
    },

    /// Run phase changed
    PhaseChanged {
        old_phase: GamePhase,
        new_phase: GamePhase,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Processing priority
    pub priority: EventPriority,

    /// Entity involved (for tie-breaking)
    pub entity_id: Option<EntityId>,

    /// Event data
    #[serde(flatten)]
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, priority: EventPriority, data: GameEventData) -> Self {
        let entity_id = match &data {
            GameEventData::Collision { obstacle_id, .. } => Some(*obstacle_id),
            GameEventData::ObstaclePassed { obstacle_id, .. } => Some(*obstacle_id),
            GameEventData::Collected { collectible_id, .. } => Some(*collectible_id),
            _ => None,
        };

        Self {
            tick,
            priority,
            entity_id,
            data,
        }
    }

    /// Create collision event.
    pub fn collision(tick: u32, obstacle_id: EntityId, kind: ObstacleKind, intent: Intent) -> Self {
        Self::new(
            tick,
            EventPriority::Collision,
            GameEventData::Collision {
                obstacle_id,
                kind,
                intent,
            },
        )
    }

    /// Create collected event.
    pub fn collected(tick: u32, collectible_id: EntityId, points: u32) -> Self {
        Self::new(
            tick,
            EventPriority::Collected,
            GameEventData::Collected {
                collectible_id,
                points,
            },
        )
    }

    /// Create obstacle passed event.
    pub fn obstacle_passed(
        tick: u32,
        obstacle_id: EntityId,
        kind: ObstacleKind,
        cursor: u32,
        points: u32,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::ObstaclePassed,
            GameEventData::ObstaclePassed {
                obstacle_id,
                kind,
                cursor,
                points,
            },
        )
    }

    /// Create level complete event.
    pub fn level_complete(tick: u32, obstacles_passed: u32) -> Self {
        Self::new(
            tick,
            EventPriority::LevelComplete,
            GameEventData::LevelComplete { obstacles_passed },
        )
    }

    /// Create phase changed event.
    pub fn phase_changed(tick: u32, old_phase: GamePhase, new_phase: GamePhase) -> Self {
        Self::new(
            tick,
            EventPriority::Other,
            GameEventData::PhaseChanged {
                old_phase,
                new_phase,
            },
        )
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.priority == other.priority
            && self.entity_id == other.entity_id
            && self.data == other.data
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: tick, then priority, then entity
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.entity_id.cmp(&other.entity_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ordering() {
        let hit = GameEvent::collision(10, 7, ObstacleKind::Laser, Intent::Idle);
        let pickup = GameEvent::collected(10, 3, 10);
        let earlier_pickup = GameEvent::collected(9, 8, 10);

        // Same tick, collision before pickup regardless of id
        assert!(hit < pickup);

        // Earlier tick first
        assert!(earlier_pickup < hit);
    }

    #[test]
    fn test_event_json_shape() {
        let event = GameEvent::obstacle_passed(5, 11, ObstacleKind::Camera, 2, 10);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "obstacle_passed");
        assert_eq!(json["kind"], "camera");
        assert_eq!(json["cursor"], 2);
        assert_eq!(json["tick"], 5);
    }
}
