//! Network Layer
//!
//! WebSocket server, one game session per connection.
//! This layer is **non-deterministic**: wall-clock ticks and gesture arrival
//! times vary, but all run logic goes through `game/`.

pub mod protocol;
pub mod scores;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, FrameUpdate, RunSummary, ErrorCode};
pub use scores::{HighScoreBoard, HighScoreEntry};
pub use session::{GameSession, SessionCommand, SessionConfig, SessionError, SessionId};
pub use server::{GameServer, ServerConfig, GameServerError};
