//! Game Logic Module
//!
//! All run simulation code. Deterministic given a seed and the ticks on
//! which observations arrive.
//!
//! ## Module Structure
//!
//! - `observation`: Gesture observations and the single-slot feed cell
//! - `input`: Smoothing, intent resolution, gesture recordings
//! - `world`: Corridor streaming (segments, obstacles, collectibles)
//! - `collision`: Proximity and course collision policies
//! - `level`: Level catalog, courses and tutorial content
//! - `state`: Phase machine and per-run context
//! - `tick`: Simulation step and replay
//! - `events`: Game events for rendering and verification
//! - `invariant`: Invariant violations

pub mod observation;
pub mod input;
pub mod world;
pub mod collision;
pub mod level;
pub mod state;
pub mod tick;
pub mod events;
pub mod invariant;

// Re-export key types
pub use observation::{GestureObservation, GestureSlot, HeadDirection};
pub use input::{ControlState, GestureRecording, InputSmoother, Intent};
pub use world::{EntityId, ObstacleKind, WindowDelta, WorldStreamer};
pub use collision::CollisionResolver;
pub use level::{Course, LevelDescriptor, Tutorial};
pub use state::{GamePhase, GameStateMachine, RunMode, RunSnapshot, RunState};
pub use tick::{replay_run, tick, TickResult};
pub use events::{GameEvent, GameEventData};
pub use invariant::InvariantViolation;
