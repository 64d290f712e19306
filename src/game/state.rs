//! Run State
//!
//! The state machine governing a run, and the per-run context that owns the
//! smoother, the world streamer and the collision resolver.
//!
//! Phases:
//!
//! ```text
//!   Idle ──start──▶ Playing ──Collision──▶ GameOver ──restart──┐
//!                     ▲  │                                     │
//!                     │  └──LevelComplete──▶ LevelComplete ────┤
//!                     │                        │ next_level    │
//!                     └────────────────────────┴───────────────┘
//!   reset: any phase ──▶ Idle
//! ```
//!
//! Commands that are not valid in the current phase are ignored. Every
//! restart, next-level and reset builds a complete replacement context and
//! swaps it in only once the new window has been populated, so a failure
//! leaves the old run untouched.

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::core::hash::{compute_state_hash, StateHash};
use crate::core::rng::{derive_run_seed, DeterministicRng};
use crate::core::vec3::Vec3;
use crate::game::collision::CollisionResolver;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::{ControlState, InputSmoother};
use crate::game::invariant::InvariantViolation;
use crate::game::level::{self, Course};
use crate::game::tick::player_pose;
use crate::game::world::{
    Collectible, EntityId, Obstacle, ObstacleSource, TrackSegment, WindowDelta, WorldStreamer,
};

// =============================================================================
// PHASE / MODE
// =============================================================================

/// Run phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Waiting for start
    #[default]
    Idle,
    /// Simulating
    Playing,
    /// Hit an obstacle
    GameOver,
    /// Passed every course obstacle
    LevelComplete,
}

impl GamePhase {
    /// Stable numeric tag for hashing.
    pub fn tag(self) -> u8 {
        match self {
            GamePhase::Idle => 0,
            GamePhase::Playing => 1,
            GamePhase::GameOver => 2,
            GamePhase::LevelComplete => 3,
        }
    }

    /// Run has ended and can be restarted.
    pub fn is_ended(self) -> bool {
        matches!(self, GamePhase::GameOver | GamePhase::LevelComplete)
    }
}

/// How a run generates obstacles and resolves them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RunMode {
    /// Endless corridor, weighted random obstacles, proximity collisions.
    Endless,
    /// Fixed course, rule-table resolution.
    Heist(Course),
}

impl RunMode {
    /// Short label for logs and snapshots.
    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Endless => "endless",
            RunMode::Heist(_) => "heist",
        }
    }

    /// Course, for heist runs.
    pub fn course(&self) -> Option<&Course> {
        match self {
            RunMode::Endless => None,
            RunMode::Heist(course) => Some(course),
        }
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Phase, score and progress bookkeeping for one run.
#[derive(Clone, Debug)]
pub struct GameStateMachine {
    phase: GamePhase,
    /// Endless runs score travelled distance.
    scores_distance: bool,
    distance: f32,
    bonus: u32,
    score: u32,
    obstacles_passed: u32,
    credited: BTreeSet<EntityId>,
}

impl GameStateMachine {
    /// Fresh machine in `Idle`.
    pub fn new(scores_distance: bool) -> Self {
        Self {
            phase: GamePhase::Idle,
            scores_distance,
            distance: 0.0,
            bonus: 0,
            score: 0,
            obstacles_passed: 0,
            credited: BTreeSet::new(),
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == GamePhase::Playing
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Cumulative travel distance.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn obstacles_passed(&self) -> u32 {
        self.obstacles_passed
    }

    /// Idle → Playing. Returns false (and does nothing) from any other phase.
    pub fn start(&mut self) -> bool {
        if self.phase != GamePhase::Idle {
            debug!("Ignoring start in {:?}", self.phase);
            return false;
        }
        self.phase = GamePhase::Playing;
        true
    }

    /// Add travelled distance. Only while playing; never decreases.
    pub fn advance(&mut self, travelled: f32) {
        if !self.is_playing() || !travelled.is_finite() || travelled <= 0.0 {
            return;
        }
        self.distance += travelled;
        self.refresh_score();
    }

    /// Apply resolver events.
    ///
    /// Returns the phase transitions they caused. Events arriving outside
    /// `Playing` (including those after a terminal event in the same batch)
    /// are ignored.
    pub fn apply(&mut self, events: &[GameEvent]) -> Result<Vec<GameEvent>, InvariantViolation> {
        let mut transitions = Vec::new();

        for event in events {
            if !self.is_playing() {
                debug!("Ignoring {:?} in {:?}", event.data, self.phase);
                continue;
            }

            match &event.data {
                GameEventData::Collision { .. } => {
                    transitions.push(self.transition(event.tick, GamePhase::GameOver));
                }
                GameEventData::Collected { collectible_id, points } => {
                    if !self.credited.insert(*collectible_id) {
                        return Err(InvariantViolation::DoubleCollect(*collectible_id));
                    }
                    self.bonus = self.bonus.saturating_add(*points);
                    self.refresh_score();
                }
                GameEventData::ObstaclePassed { cursor, points, .. } => {
                    if *cursor != self.obstacles_passed {
                        return Err(InvariantViolation::CursorSkip {
                            expected: self.obstacles_passed,
                            got: *cursor,
                        });
                    }
                    self.obstacles_passed += 1;
                    self.bonus = self.bonus.saturating_add(*points);
                    self.refresh_score();
                }
                GameEventData::LevelComplete { .. } => {
                    transitions.push(self.transition(event.tick, GamePhase::LevelComplete));
                }
                GameEventData::PhaseChanged { .. } => {}
            }
        }

        Ok(transitions)
    }

    fn transition(&mut self, tick: u32, to: GamePhase) -> GameEvent {
        let from = self.phase;
        self.phase = to;
        info!("Run {:?} -> {:?} at tick {} (score {})", from, to, tick, self.score);
        GameEvent::phase_changed(tick, from, to)
    }

    fn refresh_score(&mut self) {
        let travelled = if self.scores_distance {
            // Saturating float-to-int cast
            self.distance.floor() as u32
        } else {
            0
        };
        // Monotonic: distance and bonus only grow
        self.score = self.score.max(travelled.saturating_add(self.bonus));
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Read-only view of a run for rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub tick: u32,
    pub phase: GamePhase,
    pub mode: String,
    pub level: Option<String>,
    pub score: u32,
    pub distance: f32,
    pub speed: f32,
    pub player: Vec3,
    pub control: ControlState,
    pub cursor: Option<u32>,
    pub course_length: Option<u32>,
    pub segments: Vec<TrackSegment>,
    pub obstacles: Vec<Obstacle>,
    pub collectibles: Vec<Collectible>,
}

// =============================================================================
// RUN STATE
// =============================================================================

/// Everything owned by one run. Replaced wholesale on restart and reset.
struct RunParts {
    machine: GameStateMachine,
    smoother: InputSmoother,
    world: WorldStreamer,
    resolver: CollisionResolver,
    speed: f32,
    player: Vec3,
    window: WindowDelta,
}

impl RunParts {
    fn build(config: &GameConfig, mode: &RunMode, seed: u64) -> Result<Self, InvariantViolation> {
        let (source, resolver, scores_distance) = match mode {
            RunMode::Endless => (
                ObstacleSource::Weighted,
                CollisionResolver::proximity(config),
                true,
            ),
            RunMode::Heist(course) => (
                ObstacleSource::course(course.obstacles.clone()),
                CollisionResolver::course(config, course.len()),
                false,
            ),
        };

        let mut world = WorldStreamer::new(config.world.clone(), source, seed);
        let window = world.ensure_window(0.0)?;

        Ok(Self {
            machine: GameStateMachine::new(scores_distance),
            smoother: InputSmoother::new(config.smoother.clone()),
            world,
            resolver,
            speed: config.speed.base_speed,
            player: player_pose(&config.pose, &ControlState::default(), 0.0),
            window,
        })
    }
}

/// Per-run context.
#[derive(Clone, Debug)]
pub struct RunState {
    /// Tuning
    pub config: GameConfig,

    /// Endless or heist
    pub mode: RunMode,

    /// Key that attempt seeds are derived from
    pub session_key: [u8; 16],

    /// Attempt counter within the session
    pub attempt: u32,

    /// Seed of the current attempt
    pub seed: u64,

    /// Simulated ticks in the current attempt
    pub tick: u32,

    pub machine: GameStateMachine,
    pub smoother: InputSmoother,
    pub world: WorldStreamer,
    pub resolver: CollisionResolver,

    /// Forward speed in units per second
    pub speed: f32,

    /// Player pose
    pub player: Vec3,

    /// Controls from the latest tick
    pub control: ControlState,

    /// Events not yet collected
    events: Vec<GameEvent>,

    /// Spawn/retire notices from commands, flushed on the next tick
    pending_window: WindowDelta,
}

impl RunState {
    /// New run in `Idle` with the initial window populated.
    ///
    /// Fails with [`InvariantViolation::InvalidConfig`] if `config` does not
    /// validate.
    pub fn new(config: GameConfig, mode: RunMode, session_key: [u8; 16]) -> Result<Self, InvariantViolation> {
        let seed = derive_run_seed(&session_key, 0);
        Self::with_seed(config, mode, session_key, seed)
    }

    /// New run with an explicit seed (replays and tests).
    pub fn from_seed(config: GameConfig, mode: RunMode, seed: u64) -> Result<Self, InvariantViolation> {
        Self::with_seed(config, mode, [0; 16], seed)
    }

    fn with_seed(
        config: GameConfig,
        mode: RunMode,
        session_key: [u8; 16],
        seed: u64,
    ) -> Result<Self, InvariantViolation> {
        config
            .validate()
            .map_err(|e| InvariantViolation::InvalidConfig(e.to_string()))?;
        let parts = RunParts::build(&config, &mode, seed)?;

        Ok(Self {
            config,
            mode,
            session_key,
            attempt: 0,
            seed,
            tick: 0,
            machine: parts.machine,
            smoother: parts.smoother,
            world: parts.world,
            resolver: parts.resolver,
            speed: parts.speed,
            player: parts.player,
            control: ControlState::default(),
            events: Vec::new(),
            pending_window: parts.window,
        })
    }

    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    pub fn score(&self) -> u32 {
        self.machine.score()
    }

    pub fn distance(&self) -> f32 {
        self.machine.distance()
    }

    /// Idle → Playing.
    pub fn start(&mut self) -> bool {
        let from = self.phase();
        if !self.machine.start() {
            return false;
        }
        info!("Starting {} run (seed {:016x})", self.mode.label(), self.seed);
        self.push_event(GameEvent::phase_changed(self.tick, from, GamePhase::Playing));
        true
    }

    /// GameOver / LevelComplete → Playing on a fresh attempt of the same mode.
    pub fn restart(&mut self) -> Result<bool, InvariantViolation> {
        let from = self.phase();
        if !from.is_ended() {
            debug!("Ignoring restart in {:?}", from);
            return Ok(false);
        }

        self.replace(self.mode.clone())?;
        self.play_from(from);
        Ok(true)
    }

    /// LevelComplete → Playing on the next catalog level.
    ///
    /// Only for heist runs on a catalog level; the last level repeats.
    pub fn next_level(&mut self) -> Result<bool, InvariantViolation> {
        let from = self.phase();
        let index = match self.mode.course().and_then(|c| c.catalog_index) {
            Some(index) if from == GamePhase::LevelComplete => index,
            _ => {
                debug!("Ignoring next_level in {:?} ({})", from, self.mode.label());
                return Ok(false);
            }
        };

        let next = level::next_index(index);
        let seed = derive_run_seed(&self.session_key, self.attempt + 1);
        let course = Course::generate(next, &mut DeterministicRng::new(seed));
        info!("Advancing to level {} ({})", next, course.level.name);

        self.replace(RunMode::Heist(course))?;
        self.play_from(from);
        Ok(true)
    }

    /// Any phase → Idle on a fresh attempt.
    pub fn reset(&mut self) -> Result<(), InvariantViolation> {
        let from = self.phase();
        self.replace(self.mode.clone())?;
        if from != GamePhase::Idle {
            self.push_event(GameEvent::phase_changed(self.tick, from, GamePhase::Idle));
        }
        Ok(())
    }

    /// Switch mode. Same as reset, with a different mode.
    pub fn select_mode(&mut self, mode: RunMode) -> Result<(), InvariantViolation> {
        let from = self.phase();
        self.replace(mode)?;
        if from != GamePhase::Idle {
            self.push_event(GameEvent::phase_changed(self.tick, from, GamePhase::Idle));
        }
        Ok(())
    }

    fn play_from(&mut self, from: GamePhase) {
        self.machine.start();
        self.push_event(GameEvent::phase_changed(self.tick, from, GamePhase::Playing));
    }

    /// Build a fresh attempt and swap it in.
    fn replace(&mut self, mode: RunMode) -> Result<(), InvariantViolation> {
        let attempt = self.attempt + 1;
        let seed = derive_run_seed(&self.session_key, attempt);
        let parts = RunParts::build(&self.config, &mode, seed)?;

        // Old entities are gone for any renderer tracking them
        let mut window = WindowDelta {
            rebuilt: true,
            ..WindowDelta::default()
        };
        self.world.clear(&mut window);
        window.extend(parts.window);

        self.mode = mode;
        self.attempt = attempt;
        self.seed = seed;
        self.tick = 0;
        self.machine = parts.machine;
        self.smoother = parts.smoother;
        self.world = parts.world;
        self.resolver = parts.resolver;
        self.speed = parts.speed;
        self.player = parts.player;
        self.control = ControlState::default();
        self.events.clear();
        self.pending_window.extend(window);

        debug!("Attempt {} ready (seed {:016x})", attempt, seed);
        Ok(())
    }

    /// Take spawn/retire notices queued by commands.
    pub fn take_window_delta(&mut self) -> WindowDelta {
        std::mem::take(&mut self.pending_window)
    }

    /// Take all pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Add an event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Snapshot for rendering.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            tick: self.tick,
            phase: self.phase(),
            mode: self.mode.label().to_string(),
            level: self.mode.course().map(|c| c.level.name.clone()),
            score: self.score(),
            distance: self.distance(),
            speed: self.speed,
            player: self.player,
            control: self.control,
            cursor: self.resolver.cursor(),
            course_length: self.resolver.course_length(),
            segments: self.world.segments().to_vec(),
            obstacles: self.world.obstacles().to_vec(),
            collectibles: self.world.collectibles().to_vec(),
        }
    }

    /// Compute deterministic hash of run state.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.seed, |hasher| {
            hasher.update_u8(self.phase().tag());
            hasher.update_u32(self.score());
            hasher.update_f32(self.distance());
            hasher.update_f32(self.speed);
            hasher.update_vec3(self.player);

            hasher.update_f32(self.control.lateral);
            hasher.update_f32(self.control.vertical);
            hasher.update_u8(self.control.intent.tag());
            hasher.update_f32(self.control.gadget_cooldown);

            hasher.update_u32(self.resolver.cursor().unwrap_or(u32::MAX));
            hasher.update_u32(self.machine.obstacles_passed());

            let [s0, s1] = self.world.rng().state();
            hasher.update_u64(s0);
            hasher.update_u64(s1);

            for segment in self.world.segments() {
                hasher.update_u32(segment.id);
                hasher.update_u64(segment.index as u64);
            }

            for obstacle in self.world.obstacles() {
                hasher.update_u32(obstacle.id);
                hasher.update_u8(obstacle.kind.tag());
                hasher.update_f32(obstacle.position);
                hasher.update_f32(obstacle.lateral);
            }

            for collectible in self.world.collectibles() {
                hasher.update_u32(collectible.id);
                hasher.update_vec3(collectible.center());
                hasher.update_bool(collectible.collected);
            }
        })
    }
}
