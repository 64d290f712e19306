//! World Streaming
//!
//! Keeps a window of corridor around the player: track segments, obstacles
//! and collectibles. Content is generated ahead of the player and retired
//! once it falls behind. Travel runs along +z.
//!
//! After every [`WorldStreamer::ensure_window`] call:
//! - segments tile `[P - trailing_margin, P + lead_margin]` with no gap or overlap
//! - every live entity is strictly ahead of the previous one of its kind
//! - every lateral offset is inside the walkable corridor
//!
//! Entities are kept in `Vec`s ordered by travel position so retirement is a
//! prefix drain and iteration is deterministic.

use serde::{Serialize, Deserialize};
use tracing::{debug, trace, warn};

use crate::config::WorldConfig;
use crate::core::rng::DeterministicRng;
use crate::core::vec3::Vec3;
use crate::game::invariant::InvariantViolation;

/// Identifier for any streamed entity. Unique for the lifetime of a streamer.
pub type EntityId = u32;

/// Slack for float comparisons in window verification.
const COVERAGE_EPSILON: f32 = 1e-3;

// =============================================================================
// OBSTACLES
// =============================================================================

/// Obstacle types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    /// Laser tripwire at knee height. Jump over it.
    Laser,
    /// Patrolling guard. Use the gadget.
    Guard,
    /// Ceiling camera. Freeze until it looks away.
    Camera,
    /// Trapdoor in the floor. Move to a side.
    Trapdoor,
    /// Nothing to do. Also the fallback for unrecognised course tokens.
    Clear,
}

impl ObstacleKind {
    /// All kinds, in table order.
    pub const ALL: [ObstacleKind; 5] = [
        ObstacleKind::Laser,
        ObstacleKind::Guard,
        ObstacleKind::Camera,
        ObstacleKind::Trapdoor,
        ObstacleKind::Clear,
    ];

    /// Fixed mount height, if the obstacle has one.
    ///
    /// `None` means the obstacle is compared at the player's reference height,
    /// so only the lateral and travel axes decide a proximity hit.
    pub fn mount_height(self) -> Option<f32> {
        match self {
            ObstacleKind::Laser => Some(1.0),
            ObstacleKind::Camera => Some(3.0),
            ObstacleKind::Guard | ObstacleKind::Trapdoor | ObstacleKind::Clear => None,
        }
    }

    /// Parse a course token. Case-insensitive.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "laser" => Some(ObstacleKind::Laser),
            "guard" => Some(ObstacleKind::Guard),
            "camera" => Some(ObstacleKind::Camera),
            "trapdoor" => Some(ObstacleKind::Trapdoor),
            "clear" => Some(ObstacleKind::Clear),
            _ => None,
        }
    }

    /// Course token for this kind.
    pub fn token(self) -> &'static str {
        match self {
            ObstacleKind::Laser => "laser",
            ObstacleKind::Guard => "guard",
            ObstacleKind::Camera => "camera",
            ObstacleKind::Trapdoor => "trapdoor",
            ObstacleKind::Clear => "clear",
        }
    }

    /// Stable numeric tag for hashing.
    pub fn tag(self) -> u8 {
        match self {
            ObstacleKind::Laser => 0,
            ObstacleKind::Guard => 1,
            ObstacleKind::Camera => 2,
            ObstacleKind::Trapdoor => 3,
            ObstacleKind::Clear => 4,
        }
    }
}

/// A fixed-length piece of corridor. Segment `index` spans
/// `[index * length, (index + 1) * length)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub id: EntityId,
    pub index: i64,
    pub start: f32,
    pub length: f32,
}

impl TrackSegment {
    /// Far edge along the travel axis.
    #[inline]
    pub fn end(&self) -> f32 {
        self.start + self.length
    }
}

/// An obstacle placed in the corridor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: EntityId,
    pub kind: ObstacleKind,
    /// Travel-axis position.
    pub position: f32,
    /// Lateral offset from the corridor axis.
    pub lateral: f32,
    /// Mount height, see [`ObstacleKind::mount_height`].
    pub height: Option<f32>,
    /// Index in the course, for course-driven runs.
    pub sequence: Option<u32>,
}

impl Obstacle {
    /// Centre for proximity tests against a player at `reference_height`.
    pub fn center(&self, reference_height: f32) -> Vec3 {
        Vec3::new(
            self.lateral,
            self.height.unwrap_or(reference_height),
            self.position,
        )
    }
}

/// A bonus pickup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collectible {
    pub id: EntityId,
    pub position: f32,
    pub lateral: f32,
    pub height: f32,
    /// Flips to true exactly once.
    pub collected: bool,
}

impl Collectible {
    /// World-space centre.
    pub fn center(&self) -> Vec3 {
        Vec3::new(self.lateral, self.height, self.position)
    }

    /// Mark collected. Returns false if it already was.
    pub fn collect(&mut self) -> bool {
        if self.collected {
            false
        } else {
            self.collected = true;
            true
        }
    }
}

// =============================================================================
// WINDOW DELTA
// =============================================================================

/// What kind of entity a notice refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum EntityKind {
    Segment,
    Obstacle { kind: ObstacleKind },
    Collectible,
}

/// Spawn or retire notification, for renderers that attach assets to entities.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityNotice {
    pub id: EntityId,
    #[serde(flatten)]
    pub kind: EntityKind,
    pub position: f32,
}

/// Changes made by one `ensure_window` call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowDelta {
    pub spawned: Vec<EntityNotice>,
    pub retired: Vec<EntityNotice>,
    /// The window was discarded and rebuilt from scratch.
    pub rebuilt: bool,
}

impl WindowDelta {
    /// No changes.
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.retired.is_empty() && !self.rebuilt
    }

    /// Append another delta after this one.
    pub fn extend(&mut self, other: WindowDelta) {
        self.spawned.extend(other.spawned);
        self.retired.extend(other.retired);
        self.rebuilt |= other.rebuilt;
    }
}

// =============================================================================
// OBSTACLE SOURCE
// =============================================================================

/// Where the next obstacle kind comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObstacleSource {
    /// Endless: weighted random choice from the config table.
    Weighted,
    /// Course-driven: kinds in order; nothing once exhausted.
    Course { kinds: Vec<ObstacleKind>, next: usize },
}

impl ObstacleSource {
    /// Course source starting at the first entry.
    pub fn course(kinds: Vec<ObstacleKind>) -> Self {
        ObstacleSource::Course { kinds, next: 0 }
    }

    fn rewind(&mut self) {
        if let ObstacleSource::Course { next, .. } = self {
            *next = 0;
        }
    }
}

// =============================================================================
// STREAMER
// =============================================================================

/// Streams corridor content around a moving travel position.
#[derive(Clone, Debug)]
pub struct WorldStreamer {
    config: WorldConfig,
    source: ObstacleSource,
    rng: DeterministicRng,

    segments: Vec<TrackSegment>,
    obstacles: Vec<Obstacle>,
    collectibles: Vec<Collectible>,

    next_id: EntityId,
    /// Index of the next segment to generate.
    next_segment: i64,
    /// Obstacle slot `k` sits at `k * obstacle_interval`.
    next_obstacle_slot: i64,
    last_position: Option<f32>,
    /// Course obstacles from this sequence on stay live until judged.
    held_from: Option<u32>,
}

impl WorldStreamer {
    /// Create an empty streamer. Nothing is generated until `ensure_window`.
    pub fn new(config: WorldConfig, source: ObstacleSource, seed: u64) -> Self {
        Self {
            config,
            source,
            rng: DeterministicRng::new(seed),
            segments: Vec::new(),
            obstacles: Vec::new(),
            collectibles: Vec::new(),
            next_id: 1,
            next_segment: 0,
            next_obstacle_slot: 0,
            last_position: None,
            held_from: None,
        }
    }

    /// Live track segments, nearest first.
    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    /// Live obstacles, nearest first.
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Live collectibles, nearest first.
    pub fn collectibles(&self) -> &[Collectible] {
        &self.collectibles
    }

    /// Obstacles and collectibles for collision resolution.
    pub fn live_mut(&mut self) -> (&[Obstacle], &mut [Collectible]) {
        (&self.obstacles, &mut self.collectibles)
    }

    /// Far edge of the generated track.
    pub fn generated_to(&self) -> f32 {
        self.segment_start(self.next_segment)
    }

    /// Keep course obstacles with `sequence >= cursor` live, even once they
    /// fall behind the trailing margin. `None` releases them.
    pub fn hold_from(&mut self, cursor: Option<u32>) {
        self.held_from = cursor;
    }

    /// Internal RNG (for state hashing).
    pub fn rng(&self) -> &DeterministicRng {
        &self.rng
    }

    /// Bring the window in line with `position`.
    ///
    /// Generates ahead until the track reaches `position + lead_margin`,
    /// then retires anything more than `trailing_margin` behind. Moving
    /// backwards discards all content (reported as retired), rewinds the
    /// course and rebuilds around `position`. Jumping forward past the whole
    /// generated window rebuilds too, but keeps held course obstacles and
    /// the course progress.
    pub fn ensure_window(&mut self, position: f32) -> Result<WindowDelta, InvariantViolation> {
        if !position.is_finite() {
            return Err(InvariantViolation::NonFinitePosition(position));
        }

        let mut delta = WindowDelta::default();

        let backwards = self.last_position.is_some_and(|last| position < last);
        let stale = !self.segments.is_empty()
            && self.generated_to() < position - self.config.trailing_margin;
        if backwards || stale {
            debug!(
                "Rebuilding window at {} (last {:?}, backwards: {})",
                position, self.last_position, backwards
            );
            if backwards {
                self.clear(&mut delta);
            } else {
                self.skip_ahead(&mut delta);
            }
            delta.rebuilt = true;
        }

        if self.segments.is_empty() {
            self.seed_indices(position);
        }

        self.generate(position + self.config.lead_margin, &mut delta);
        self.retire(position - self.config.trailing_margin, &mut delta);
        self.last_position = Some(position);

        self.verify(position)?;

        if !delta.spawned.is_empty() || !delta.retired.is_empty() {
            trace!(
                "Window at {}: +{} -{}",
                position,
                delta.spawned.len(),
                delta.retired.len()
            );
        }

        Ok(delta)
    }

    /// Discard everything, reporting it as retired.
    pub fn clear(&mut self, delta: &mut WindowDelta) {
        delta.retired.extend(self.segments.drain(..).map(segment_notice));
        delta.retired.extend(self.obstacles.drain(..).map(|o| obstacle_notice(&o)));
        delta.retired.extend(self.collectibles.drain(..).map(|c| collectible_notice(&c)));
        self.source.rewind();
        self.last_position = None;
    }

    /// Drop everything except held course obstacles. Course progress is kept
    /// so sequence numbers are never issued twice.
    fn skip_ahead(&mut self, delta: &mut WindowDelta) {
        let held_from = self.held_from;
        delta.retired.extend(self.segments.drain(..).map(segment_notice));
        delta.retired.extend(self.collectibles.drain(..).map(|c| collectible_notice(&c)));

        let (kept, dropped): (Vec<_>, Vec<_>) = self
            .obstacles
            .drain(..)
            .partition(|o| is_held(held_from, o));
        delta.retired.extend(dropped.iter().map(obstacle_notice));
        self.obstacles = kept;
    }

    fn seed_indices(&mut self, position: f32) {
        let tail = position - self.config.trailing_margin;
        self.next_segment = (tail / self.config.segment_length).floor() as i64;
        // First obstacle slot strictly ahead of the player
        self.next_obstacle_slot = (position / self.config.obstacle_interval).floor() as i64 + 1;
    }

    fn segment_start(&self, index: i64) -> f32 {
        index as f32 * self.config.segment_length
    }

    fn obstacle_slot_position(&self, slot: i64) -> f32 {
        slot as f32 * self.config.obstacle_interval
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn generate(&mut self, horizon: f32, delta: &mut WindowDelta) {
        while self.generated_to() < horizon {
            let segment = TrackSegment {
                id: self.allocate_id(),
                index: self.next_segment,
                start: self.segment_start(self.next_segment),
                length: self.config.segment_length,
            };
            delta.spawned.push(segment_notice(segment.clone()));
            self.segments.push(segment);
            self.next_segment += 1;
        }

        // Obstacles only on generated track
        let track_end = self.generated_to();
        while self.obstacle_slot_position(self.next_obstacle_slot) < track_end {
            let Some((kind, sequence)) = self.next_kind() else {
                break;
            };
            let position = self.obstacle_slot_position(self.next_obstacle_slot);
            self.spawn_obstacle(kind, sequence, position, delta);
            self.next_obstacle_slot += 1;
        }
    }

    fn next_kind(&mut self) -> Option<(ObstacleKind, Option<u32>)> {
        match &mut self.source {
            ObstacleSource::Weighted => {
                let kind = self.rng.choose_weighted(&self.config.obstacle_weights).copied();
                if kind.is_none() {
                    warn!("Obstacle weight table is empty, no obstacle spawned");
                }
                kind.map(|k| (k, None))
            }
            ObstacleSource::Course { kinds, next } => {
                let kind = kinds.get(*next).copied()?;
                let sequence = *next as u32;
                *next += 1;
                Some((kind, Some(sequence)))
            }
        }
    }

    fn spawn_obstacle(
        &mut self,
        kind: ObstacleKind,
        sequence: Option<u32>,
        position: f32,
        delta: &mut WindowDelta,
    ) {
        let half_width = self.config.walkable_half_width;

        let lane = self.rng.next_int(self.config.lane_count);
        let obstacle = Obstacle {
            id: self.allocate_id(),
            kind,
            position,
            lateral: self.config.lane_offset(lane).clamp(-half_width, half_width),
            height: kind.mount_height(),
            sequence,
        };
        delta.spawned.push(obstacle_notice(&obstacle));
        self.obstacles.push(obstacle);

        let spread = self.config.collectible_spread;
        let collectible = Collectible {
            id: self.allocate_id(),
            position: position + self.config.collectible_offset,
            lateral: self.rng.next_range(-spread, spread).clamp(-half_width, half_width),
            height: self.config.collectible_height,
            collected: false,
        };
        delta.spawned.push(collectible_notice(&collectible));
        self.collectibles.push(collectible);
    }

    fn retire(&mut self, tail: f32, delta: &mut WindowDelta) {
        let n = self.segments.iter().take_while(|s| s.end() < tail).count();
        delta.retired.extend(self.segments.drain(..n).map(segment_notice));

        let held_from = self.held_from;
        let n = self
            .obstacles
            .iter()
            .take_while(|o| o.position < tail && !is_held(held_from, o))
            .count();
        delta.retired.extend(self.obstacles.drain(..n).map(|o| obstacle_notice(&o)));

        let n = self.collectibles.iter().take_while(|c| c.position < tail).count();
        delta.retired.extend(self.collectibles.drain(..n).map(|c| collectible_notice(&c)));
    }

    /// Check the window invariants around `position`.
    pub fn verify(&self, position: f32) -> Result<(), InvariantViolation> {
        let (first, last) = match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(InvariantViolation::EmptyWindow),
        };

        for pair in self.segments.windows(2) {
            if pair[1].index != pair[0].index + 1 {
                return Err(InvariantViolation::SegmentGap {
                    previous: pair[0].index,
                    next: pair[1].index,
                });
            }
        }

        let required_from = position - self.config.trailing_margin;
        let required_to = position + self.config.lead_margin;
        if first.start > required_from + COVERAGE_EPSILON
            || last.end() < required_to - COVERAGE_EPSILON
        {
            return Err(InvariantViolation::WindowNotCovered {
                covered_from: first.start,
                covered_to: last.end(),
                required_from,
                required_to,
            });
        }

        let half_width = self.config.walkable_half_width;

        let mut previous = f32::NEG_INFINITY;
        for obstacle in &self.obstacles {
            if obstacle.position <= previous {
                return Err(InvariantViolation::Overlap {
                    id: obstacle.id,
                    position: obstacle.position,
                });
            }
            if obstacle.lateral.abs() > half_width {
                return Err(InvariantViolation::OutsideCorridor {
                    id: obstacle.id,
                    lateral: obstacle.lateral,
                    half_width,
                });
            }
            previous = obstacle.position;
        }

        let mut previous = f32::NEG_INFINITY;
        for collectible in &self.collectibles {
            if collectible.position <= previous {
                return Err(InvariantViolation::Overlap {
                    id: collectible.id,
                    position: collectible.position,
                });
            }
            if collectible.lateral.abs() > half_width {
                return Err(InvariantViolation::OutsideCorridor {
                    id: collectible.id,
                    lateral: collectible.lateral,
                    half_width,
                });
            }
            previous = collectible.position;
        }

        Ok(())
    }
}

fn is_held(held_from: Option<u32>, obstacle: &Obstacle) -> bool {
    matches!((held_from, obstacle.sequence), (Some(from), Some(seq)) if seq >= from)
}

fn segment_notice(segment: TrackSegment) -> EntityNotice {
    EntityNotice {
        id: segment.id,
        kind: EntityKind::Segment,
        position: segment.start,
    }
}

fn obstacle_notice(obstacle: &Obstacle) -> EntityNotice {
    EntityNotice {
        id: obstacle.id,
        kind: EntityKind::Obstacle { kind: obstacle.kind },
        position: obstacle.position,
    }
}

fn collectible_notice(collectible: &Collectible) -> EntityNotice {
    EntityNotice {
        id: collectible.id,
        kind: EntityKind::Collectible,
        position: collectible.position,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn streamer() -> WorldStreamer {
        WorldStreamer::new(WorldConfig::default(), ObstacleSource::Weighted, 42)
    }

    #[test]
    fn test_initial_window() {
        let mut world = streamer();
        let delta = world.ensure_window(0.0).unwrap();

        // [-30, 160] needs segments -1..=3
        let indices: Vec<i64> = world.segments().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![-1, 0, 1, 2, 3]);
        assert!(delta.retired.is_empty());
        assert!(!delta.rebuilt);

        // Obstacles strictly ahead, on interval multiples
        let positions: Vec<f32> = world.obstacles().iter().map(|o| o.position).collect();
        assert_eq!(positions.first(), Some(&18.0));
        for pair in positions.windows(2) {
            assert_eq!(pair[1] - pair[0], 18.0);
        }
        assert!(*positions.last().unwrap() < world.generated_to());

        // One collectible per obstacle, 4 units further on
        assert_eq!(world.collectibles().len(), world.obstacles().len());
        for (o, c) in world.obstacles().iter().zip(world.collectibles()) {
            assert_eq!(c.position, o.position + 4.0);
        }
    }

    #[test]
    fn test_segment_retired_by_far_edge() {
        let mut world = streamer();
        world.ensure_window(0.0).unwrap();

        // Segment 0 spans [0, 40): kept until its far edge is more than
        // 30 behind the player
        world.ensure_window(69.0).unwrap();
        assert!(world.segments().iter().any(|s| s.index == 0));

        let delta = world.ensure_window(70.5).unwrap();
        assert!(!world.segments().iter().any(|s| s.index == 0));
        assert!(delta
            .retired
            .iter()
            .any(|n| n.kind == EntityKind::Segment && n.position == 0.0));
    }

    #[test]
    fn test_obstacle_retired_behind_margin() {
        let mut world = streamer();
        world.ensure_window(0.0).unwrap();
        let first = world.obstacles()[0].clone();

        world.ensure_window(first.position + 30.0).unwrap();
        assert_eq!(world.obstacles()[0].id, first.id);

        let delta = world.ensure_window(first.position + 30.5).unwrap();
        assert_ne!(world.obstacles()[0].id, first.id);
        assert!(delta.retired.iter().any(|n| n.id == first.id));
    }

    #[test]
    fn test_backward_jump_rebuilds() {
        let mut world = streamer();
        world.ensure_window(0.0).unwrap();
        world.ensure_window(500.0).unwrap();
        let live_before = world.segments().len() + world.obstacles().len() + world.collectibles().len();

        let delta = world.ensure_window(100.0).unwrap();

        assert!(delta.rebuilt);
        assert_eq!(delta.retired.len(), live_before);
        assert!(world.segments().first().unwrap().start <= 70.0);
        // Rebuilt obstacles start strictly ahead of the new position
        assert_eq!(world.obstacles()[0].position, 108.0);
    }

    #[test]
    fn test_large_forward_jump_rebuilds() {
        let mut world = streamer();
        world.ensure_window(0.0).unwrap();

        let delta = world.ensure_window(10_000.0).unwrap();

        assert!(delta.rebuilt);
        assert!(world.segments().len() <= 6);
        world.verify(10_000.0).unwrap();
    }

    #[test]
    fn test_non_finite_position() {
        let mut world = streamer();
        assert!(matches!(
            world.ensure_window(f32::NAN),
            Err(InvariantViolation::NonFinitePosition(_))
        ));
        assert!(world.segments().is_empty());
    }

    #[test]
    fn test_course_source_exhausts() {
        let kinds = vec![ObstacleKind::Laser, ObstacleKind::Camera];
        let mut world = WorldStreamer::new(
            WorldConfig::default(),
            ObstacleSource::course(kinds),
            7,
        );
        world.ensure_window(0.0).unwrap();

        let obstacles = world.obstacles();
        assert_eq!(obstacles.len(), 2);
        assert_eq!(obstacles[0].kind, ObstacleKind::Laser);
        assert_eq!(obstacles[0].sequence, Some(0));
        assert_eq!(obstacles[1].kind, ObstacleKind::Camera);
        assert_eq!(obstacles[1].sequence, Some(1));

        // Far ahead: track keeps streaming, no more obstacles
        world.ensure_window(100.0).unwrap();
        assert_eq!(world.obstacles().len(), 2);
    }

    #[test]
    fn test_held_course_obstacle_survives_long_step() {
        let kinds = vec![ObstacleKind::Laser, ObstacleKind::Guard, ObstacleKind::Camera];
        let mut world = WorldStreamer::new(
            WorldConfig::default(),
            ObstacleSource::course(kinds),
            7,
        );
        world.hold_from(Some(0));
        world.ensure_window(0.0).unwrap();

        // Well past every obstacle, but not past the generated track
        world.ensure_window(120.0).unwrap();
        let sequences: Vec<Option<u32>> = world.obstacles().iter().map(|o| o.sequence).collect();
        assert_eq!(sequences, vec![Some(0), Some(1), Some(2)]);

        // Past the whole window: rebuilt, held obstacles kept, no re-issue
        let delta = world.ensure_window(2_000.0).unwrap();
        assert!(delta.rebuilt);
        let sequences: Vec<Option<u32>> = world.obstacles().iter().map(|o| o.sequence).collect();
        assert_eq!(sequences, vec![Some(0), Some(1), Some(2)]);
        world.verify(2_000.0).unwrap();

        // Judged obstacles are released on the next call
        world.hold_from(Some(2));
        let delta = world.ensure_window(2_000.5).unwrap();
        assert_eq!(world.obstacles().len(), 1);
        assert_eq!(world.obstacles()[0].sequence, Some(2));
        assert_eq!(
            delta
                .retired
                .iter()
                .filter(|n| matches!(n.kind, EntityKind::Obstacle { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_backward_jump_rewinds_course() {
        let kinds = vec![ObstacleKind::Laser, ObstacleKind::Camera];
        let mut world = WorldStreamer::new(
            WorldConfig::default(),
            ObstacleSource::course(kinds),
            7,
        );
        world.ensure_window(100.0).unwrap();

        world.ensure_window(0.0).unwrap();

        assert_eq!(world.obstacles()[0].sequence, Some(0));
        assert_eq!(world.obstacles()[0].position, 18.0);
    }

    #[test]
    fn test_mount_heights() {
        assert_eq!(ObstacleKind::Laser.mount_height(), Some(1.0));
        assert_eq!(ObstacleKind::Camera.mount_height(), Some(3.0));
        assert_eq!(ObstacleKind::Guard.mount_height(), None);
    }

    #[test]
    fn test_tokens() {
        for kind in ObstacleKind::ALL {
            assert_eq!(ObstacleKind::from_token(kind.token()), Some(kind));
        }
        assert_eq!(ObstacleKind::from_token(" LASER "), Some(ObstacleKind::Laser));
        assert_eq!(ObstacleKind::from_token("dragon"), None);
    }

    #[test]
    fn test_collect_once() {
        let mut c = Collectible {
            id: 1,
            position: 0.0,
            lateral: 0.0,
            height: 1.0,
            collected: false,
        };
        assert!(c.collect());
        assert!(!c.collect());
        assert!(c.collected);
    }

    #[test]
    fn test_same_seed_same_corridor() {
        let mut a = streamer();
        let mut b = streamer();
        for p in [0.0, 25.0, 90.0, 300.0] {
            assert_eq!(a.ensure_window(p).unwrap(), b.ensure_window(p).unwrap());
        }
        assert_eq!(a.obstacles(), b.obstacles());
        assert_eq!(a.collectibles(), b.collectibles());
    }

    proptest! {
        #[test]
        fn prop_window_invariant_holds(steps in prop::collection::vec(-50.0f32..400.0, 1..60)) {
            let mut world = WorldStreamer::new(WorldConfig::default(), ObstacleSource::Weighted, 99);
            let mut position = 0.0f32;

            for step in steps {
                position = (position + step).max(-500.0);
                world.ensure_window(position).unwrap();

                let tail = position - 30.0;
                for o in world.obstacles() {
                    prop_assert!(o.position >= tail);
                    prop_assert!(o.lateral.abs() <= 6.0);
                }
                for c in world.collectibles() {
                    prop_assert!(c.position >= tail);
                    prop_assert!(c.lateral.abs() <= 6.0);
                }
            }
        }
    }
}
