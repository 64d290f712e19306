//! # Gesture Heist
//!
//! Core of a gesture-controlled first-person runner: the player travels
//! down a museum corridor and reacts to obstacles with head, mouth, brow
//! and blink gestures instead of keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GESTURE HEIST CORE                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Deterministic primitives                │
//! │  ├── vec3.rs       - 3D vector for poses and thresholds      │
//! │  ├── rng.rs        - Deterministic Xorshift128+ PRNG         │
//! │  └── hash.rs       - State hashing for replay checks         │
//! │                                                              │
//! │  config.rs         - Tuning (corridor, smoothing, speed)     │
//! │                                                              │
//! │  game/             - Run simulation (deterministic)          │
//! │  ├── observation.rs- Gesture samples and the feed slot       │
//! │  ├── input.rs      - Smoothing, intents, recordings          │
//! │  ├── world.rs      - Corridor window streaming               │
//! │  ├── collision.rs  - Proximity and course resolution         │
//! │  ├── level.rs      - Level catalog and course feeds          │
//! │  ├── state.rs      - Phase machine and run context           │
//! │  └── tick.rs       - Simulation step and replay              │
//! │                                                              │
//! │  network/          - Sessions (non-deterministic)            │
//! │  ├── server.rs     - WebSocket server                        │
//! │  ├── session.rs    - Per-connection tick loop                │
//! │  ├── protocol.rs   - Message types                           │
//! │  └── scores.rs     - High score board                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` never read the clock or the environment. Given the
//! same seed, mode, tick interval and gesture observations arriving on the
//! same ticks, a run produces identical events and state hashes. The
//! network layer decides *when* ticks and observations happen; a
//! [`GestureRecording`](game::GestureRecording) captures exactly that.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod config;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec3::Vec3;
pub use core::rng::DeterministicRng;
pub use config::GameConfig;
pub use game::state::{GamePhase, RunMode, RunState};
pub use game::tick::{replay_run, tick, TickResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
