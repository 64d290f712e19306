//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON text frames. Gesture payloads and run snapshots
//! carry internally tagged enums and free-form JSON, which bincode cannot
//! represent, so there is no binary encoding of the envelope.

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHash;
use crate::game::events::GameEvent;
use crate::game::level::{Course, LevelDescriptor, Tutorial};
use crate::game::state::{GamePhase, RunSnapshot};
use crate::game::world::WindowDelta;
use crate::network::scores::HighScoreEntry;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Latest classifier output.
    Gesture(GestureFeed),

    /// Idle → Playing.
    Start,

    /// Replay the current mode after the run ended.
    Restart,

    /// Back to Idle on a fresh attempt.
    Reset,

    /// Advance to the next catalog level after completing one.
    NextLevel,

    /// Switch between endless and a catalog heist level.
    SelectMode {
        mode: ModeSelection,
        /// Catalog level for heist mode (defaults to the first).
        #[serde(default)]
        level: Option<u32>,
    },

    /// Play a custom heist course.
    LoadCourse {
        level: LevelDescriptor,
        obstacles: Vec<String>,
    },

    /// Put the last finished run on the high score board.
    SubmitScore { name: String },

    /// Request the high score board.
    HighScores,

    /// Request the tutorial content.
    Tutorial,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

/// Gesture classifier output.
///
/// `gestures` is kept as raw JSON: missing or malformed signals fall back
/// to neutral rather than rejecting the whole message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureFeed {
    /// Client capture time (milliseconds).
    #[serde(default)]
    pub timestamp: u64,
    /// Signal name → value.
    #[serde(default)]
    pub gestures: serde_json::Value,
}

/// Selectable run modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSelection {
    Endless,
    Heist,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after the connection is accepted.
    Welcome(WelcomeInfo),

    /// Run state for rendering.
    Frame(FrameUpdate),

    /// The run just ended.
    RunEnded(RunSummary),

    /// A heist course was selected or loaded.
    CourseLoaded(CourseInfo),

    /// Score submission result.
    ScoreSubmitted {
        /// 1-based board position, `None` if the score did not place.
        rank: Option<usize>,
    },

    /// High score board, best first.
    HighScores { entries: Vec<HighScoreEntry> },

    /// Tutorial content.
    Tutorial(Tutorial),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Session greeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeInfo {
    /// Session identifier (hex).
    pub session_id: String,
    /// Server version.
    pub server_version: String,
    /// Simulation rate (Hz).
    pub tick_rate: u32,
    /// Frames are sent every this many simulated ticks.
    pub snapshot_every: u32,
}

/// One rendering frame.
///
/// Events and window changes accumulate between frames, so nothing is lost
/// when frames are sent less often than the simulation ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameUpdate {
    pub snapshot: RunSnapshot,
    pub events: Vec<GameEvent>,
    pub window: WindowDelta,
    /// Run state hash (hex).
    pub state_hash: String,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub phase: GamePhase,
    pub mode: String,
    pub level: Option<String>,
    pub score: u32,
    pub distance: f32,
    pub ticks: u32,
    pub obstacles_passed: u32,
    /// Seed the run was generated from.
    pub seed: u64,
    /// Digest of the gesture recording (hex), for replay verification.
    pub recording_hash: Option<String>,
}

/// Heist course header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub level: LevelDescriptor,
    pub catalog_index: Option<u32>,
    pub length: u32,
}

impl CourseInfo {
    pub fn from_course(course: &Course) -> Self {
        Self {
            level: course.level.clone(),
            catalog_index: course.catalog_index,
            length: course.len(),
        }
    }
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be parsed.
    InvalidMessage,
    /// Course upload was rejected.
    InvalidCourse,
    /// No finished run to submit, or already submitted.
    NothingToSubmit,
    /// Server overloaded.
    ServerOverloaded,
    /// The run broke an internal invariant and was reset.
    RunReset,
    /// Internal error.
    InternalError,
}

/// Hex form of a state hash.
pub fn hash_hex(hash: &StateHash) -> String {
    hex::encode(hash)
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::observation::{GestureObservation, HeadDirection};

    #[test]
    fn test_gesture_message_from_classifier_json() {
        let json = r#"{
            "type": "gesture",
            "timestamp": 1234,
            "gestures": { "head_x": -0.4, "mouth_open": true, "head_direction": "left" }
        }"#;

        let parsed = ClientMessage::from_json(json).unwrap();

        if let ClientMessage::Gesture(feed) = parsed {
            assert_eq!(feed.timestamp, 1234);
            let obs = GestureObservation::from_value(&feed.gestures, feed.timestamp);
            assert_eq!(obs.head_x, Some(-0.4));
            assert!(obs.mouth_open);
            assert_eq!(obs.head_direction, HeadDirection::Left);
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_gesture_without_payload_is_accepted() {
        let parsed = ClientMessage::from_json(r#"{"type": "gesture"}"#).unwrap();

        if let ClientMessage::Gesture(feed) = parsed {
            let obs = GestureObservation::from_value(&feed.gestures, feed.timestamp);
            assert_eq!(obs, GestureObservation::neutral(0));
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_command_messages() {
        for (json, expected) in [
            (r#"{"type":"start"}"#, "Start"),
            (r#"{"type":"restart"}"#, "Restart"),
            (r#"{"type":"reset"}"#, "Reset"),
            (r#"{"type":"next_level"}"#, "NextLevel"),
        ] {
            let parsed = ClientMessage::from_json(json).unwrap();
            assert!(format!("{:?}", parsed).starts_with(expected));
        }
    }

    #[test]
    fn test_select_mode_defaults_level() {
        let parsed = ClientMessage::from_json(r#"{"type":"select_mode","mode":"heist"}"#).unwrap();

        if let ClientMessage::SelectMode { mode, level } = parsed {
            assert_eq!(mode, ModeSelection::Heist);
            assert_eq!(level, None);
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_load_course_message() {
        let json = r#"{
            "type": "load_course",
            "level": { "name": "Annex", "metadata": { "floor": "2" } },
            "obstacles": ["laser", "guard", "clear"]
        }"#;

        let parsed = ClientMessage::from_json(json).unwrap();

        if let ClientMessage::LoadCourse { level, obstacles } = parsed {
            assert_eq!(level.name, "Annex");
            assert_eq!(level.metadata.get("floor").map(String::as_str), Some("2"));
            assert_eq!(obstacles.len(), 3);
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_server_message_json_roundtrip() {
        let msg = ServerMessage::Error(ServerError::new(ErrorCode::InvalidCourse, "empty name"));

        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("invalid_course"));

        if let ServerMessage::Error(err) = ServerMessage::from_json(&json).unwrap() {
            assert_eq!(err.code, ErrorCode::InvalidCourse);
            assert_eq!(err.message, "empty name");
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_run_summary_roundtrip() {
        let summary = RunSummary {
            phase: GamePhase::GameOver,
            mode: "endless".to_string(),
            level: None,
            score: 321,
            distance: 300.5,
            ticks: 1200,
            obstacles_passed: 0,
            seed: 42,
            recording_hash: Some(hash_hex(&[0xab; 32])),
        };

        let json = ServerMessage::RunEnded(summary.clone()).to_json().unwrap();
        assert!(json.contains("game_over"));

        if let ServerMessage::RunEnded(parsed) = ServerMessage::from_json(&json).unwrap() {
            assert_eq!(parsed, summary);
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_hash_hex() {
        let hex = hash_hex(&[0x0f; 32]);
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("0f0f"));
    }
}
