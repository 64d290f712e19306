//! Core deterministic primitives.
//!
//! Everything the game layer needs to reproduce a run bit-for-bit from a
//! seed and a gesture recording.

pub mod vec3;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec3::Vec3;
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash};
