//! Collision Resolution
//!
//! Two policies decide what happens when the player meets an obstacle:
//!
//! - **Proximity** (endless runs): any obstacle within the per-axis threshold
//!   of the player is a hit.
//! - **Course** (heist runs): only the obstacle at the course cursor matters.
//!   Once the player reaches it, the current intent must satisfy the rule
//!   table or the run ends.
//!
//! Both share the collectible pass. A collision ends evaluation for the tick,
//! so nothing is collected on the tick the run ends.

use serde::{Serialize, Deserialize};
use tracing::{debug, trace};

use crate::config::GameConfig;
use crate::core::vec3::Vec3;
use crate::game::events::GameEvent;
use crate::game::input::{ControlState, Intent};
use crate::game::world::{Collectible, Obstacle, ObstacleKind};

// =============================================================================
// RULE TABLE
// =============================================================================

/// Does `intent` get the player past an obstacle of `kind`?
pub fn passes(kind: ObstacleKind, intent: Intent) -> bool {
    match kind {
        ObstacleKind::Laser => intent == Intent::Jump,
        ObstacleKind::Camera => intent == Intent::Freeze,
        ObstacleKind::Guard => intent == Intent::Gadget,
        ObstacleKind::Trapdoor => intent.is_move(),
        ObstacleKind::Clear => true,
    }
}

/// Action a player must take for `kind`, in words.
pub fn required_action(kind: ObstacleKind) -> &'static str {
    match kind {
        ObstacleKind::Laser => "jump",
        ObstacleKind::Camera => "freeze",
        ObstacleKind::Guard => "gadget",
        ObstacleKind::Trapdoor => "move",
        ObstacleKind::Clear => "none",
    }
}

/// Strict per-axis proximity test.
#[inline]
pub fn within_threshold(a: Vec3, b: Vec3, threshold: Vec3) -> bool {
    a.abs_diff(b).within(threshold)
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Obstacle policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResolverPolicy {
    /// Hit on proximity.
    Proximity { obstacle_threshold: Vec3 },
    /// Rule table against the obstacle at the cursor.
    Course { length: u32, cursor: u32 },
}

/// Decides collisions, course progress and pickups for one run.
#[derive(Clone, Debug)]
pub struct CollisionResolver {
    policy: ResolverPolicy,
    collect_threshold: Vec3,
    reference_height: f32,
    collectible_points: u32,
    obstacle_points: u32,
}

impl CollisionResolver {
    /// Proximity policy for endless runs.
    pub fn proximity(config: &GameConfig) -> Self {
        Self::with_policy(
            config,
            ResolverPolicy::Proximity {
                obstacle_threshold: config.proximity.obstacle_threshold,
            },
        )
    }

    /// Course policy for a course of `length` obstacles.
    pub fn course(config: &GameConfig, length: u32) -> Self {
        Self::with_policy(config, ResolverPolicy::Course { length, cursor: 0 })
    }

    fn with_policy(config: &GameConfig, policy: ResolverPolicy) -> Self {
        Self {
            policy,
            collect_threshold: config.proximity.collect_threshold,
            reference_height: config.pose.eye_height,
            collectible_points: config.scoring.collectible_points,
            obstacle_points: config.scoring.obstacle_points,
        }
    }

    /// Course cursor, for course-driven runs.
    pub fn cursor(&self) -> Option<u32> {
        match self.policy {
            ResolverPolicy::Course { cursor, .. } => Some(cursor),
            ResolverPolicy::Proximity { .. } => None,
        }
    }

    /// Course length, for course-driven runs.
    pub fn course_length(&self) -> Option<u32> {
        match self.policy {
            ResolverPolicy::Course { length, .. } => Some(length),
            ResolverPolicy::Proximity { .. } => None,
        }
    }

    /// Evaluate one tick.
    ///
    /// Marks collected pickups in place and returns the events in priority
    /// order.
    pub fn evaluate(
        &mut self,
        tick: u32,
        player: Vec3,
        control: &ControlState,
        obstacles: &[Obstacle],
        collectibles: &mut [Collectible],
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();

        let outcome = match &mut self.policy {
            ResolverPolicy::Proximity { obstacle_threshold } => {
                proximity_hit(tick, player, control, obstacles, *obstacle_threshold, self.reference_height)
            }
            ResolverPolicy::Course { length, cursor } => {
                course_step(tick, player, control, obstacles, *length, cursor, self.obstacle_points)
            }
        };

        match outcome {
            Step::Ended(event) => {
                events.push(event);
                return events;
            }
            Step::Continue(event) => events.extend(event),
        }

        self.collect(tick, player, collectibles, &mut events);

        events.sort();
        events
    }

    fn collect(&self, tick: u32, player: Vec3, collectibles: &mut [Collectible], events: &mut Vec<GameEvent>) {
        for collectible in collectibles.iter_mut() {
            if collectible.collected {
                continue;
            }
            if within_threshold(player, collectible.center(), self.collect_threshold)
                && collectible.collect()
            {
                trace!("Collected {} at tick {}", collectible.id, tick);
                events.push(GameEvent::collected(tick, collectible.id, self.collectible_points));
            }
        }
    }
}

enum Step {
    /// Run ends this tick; skip the collectible pass.
    Ended(GameEvent),
    Continue(Option<GameEvent>),
}

fn proximity_hit(
    tick: u32,
    player: Vec3,
    control: &ControlState,
    obstacles: &[Obstacle],
    threshold: Vec3,
    reference_height: f32,
) -> Step {
    for obstacle in obstacles {
        if within_threshold(player, obstacle.center(reference_height), threshold) {
            debug!(
                "Tick {}: hit {:?} {} at {}",
                tick, obstacle.kind, obstacle.id, obstacle.position
            );
            return Step::Ended(GameEvent::collision(tick, obstacle.id, obstacle.kind, control.intent));
        }
    }
    Step::Continue(None)
}

fn course_step(
    tick: u32,
    player: Vec3,
    control: &ControlState,
    obstacles: &[Obstacle],
    length: u32,
    cursor: &mut u32,
    points: u32,
) -> Step {
    if *cursor >= length {
        return Step::Ended(GameEvent::level_complete(tick, *cursor));
    }

    let Some(obstacle) = obstacles.iter().find(|o| o.sequence == Some(*cursor)) else {
        return Step::Continue(None);
    };

    // Not reached yet
    if player.z < obstacle.position {
        return Step::Continue(None);
    }

    if passes(obstacle.kind, control.intent) {
        let passed = *cursor;
        *cursor += 1;
        debug!(
            "Tick {}: passed {:?} ({}/{}) with {:?}",
            tick, obstacle.kind, *cursor, length, control.intent
        );
        Step::Continue(Some(GameEvent::obstacle_passed(
            tick,
            obstacle.id,
            obstacle.kind,
            passed,
            points,
        )))
    } else {
        debug!(
            "Tick {}: failed {:?}, needed {} but got {:?}",
            tick,
            obstacle.kind,
            required_action(obstacle.kind),
            control.intent
        );
        Step::Ended(GameEvent::collision(tick, obstacle.id, obstacle.kind, control.intent))
    }
}

// =============================================================================
// TESTS
// =============================================================================
