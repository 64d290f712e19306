//! Gesture Observations
//!
//! The classifier service reports facial gestures as a loose JSON object of
//! signal name → value, a few times per second. This module turns that into
//! a typed [`GestureObservation`] and provides the single-slot cell the tick
//! loop reads it from.
//!
//! Every signal has a neutral value (0 / false / centre). Absent or malformed
//! signals take it; nothing here can fail.

use std::sync::{Arc, Mutex};
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Signal names understood in a gesture feed.
pub mod signal {
    /// Continuous head yaw, -1 (left) to +1 (right).
    pub const HEAD_X: &str = "head_x";
    /// Continuous head pitch, -1 (down) to +1 (up).
    pub const HEAD_Y: &str = "head_y";
    /// Eye closure.
    pub const BLINK: &str = "blink";
    /// Mouth open.
    pub const MOUTH_OPEN: &str = "mouth_open";
    /// Eyebrow raise.
    pub const EYEBROW_RAISE: &str = "eyebrow_raise";
    /// Coarse head direction: "left", "center" or "right".
    pub const HEAD_DIRECTION: &str = "head_direction";
}

/// Coarse head direction reported by the classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadDirection {
    Left,
    #[default]
    Center,
    Right,
}

impl HeadDirection {
    /// Parse a classifier token. Case-insensitive.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "center" | "centre" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// Equivalent lateral axis value.
    pub fn axis(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Center => 0.0,
            Self::Right => 1.0,
        }
    }
}

/// One gesture sample from the classifier.
///
/// Axes are `None` when the classifier did not report them; that is
/// different from reporting 0.0 because `head_x` falls back to
/// `head_direction` when absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GestureObservation {
    /// Capture time in milliseconds, as reported by the sampler.
    pub timestamp_ms: u64,
    /// Head yaw in [-1, 1].
    pub head_x: Option<f32>,
    /// Head pitch in [-1, 1].
    pub head_y: Option<f32>,
    pub blink: bool,
    pub mouth_open: bool,
    pub eyebrow_raise: bool,
    pub head_direction: HeadDirection,
}

impl GestureObservation {
    /// All signals neutral.
    pub fn neutral(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }

    /// Build from a signal map (`{"mouth_open": true, "head_direction": "left", ...}`).
    ///
    /// Unknown signals are ignored; signals with the wrong type are neutral.
    pub fn from_signals(signals: &Map<String, Value>, timestamp_ms: u64) -> Self {
        let mut obs = Self::neutral(timestamp_ms);

        for (name, value) in signals {
            match name.as_str() {
                signal::HEAD_X => obs.head_x = axis_value(name, value),
                signal::HEAD_Y => obs.head_y = axis_value(name, value),
                signal::BLINK => obs.blink = flag_value(name, value),
                signal::MOUTH_OPEN => obs.mouth_open = flag_value(name, value),
                signal::EYEBROW_RAISE => obs.eyebrow_raise = flag_value(name, value),
                signal::HEAD_DIRECTION => {
                    obs.head_direction = value
                        .as_str()
                        .and_then(HeadDirection::from_token)
                        .unwrap_or_else(|| {
                            debug!("Malformed head_direction {:?}, using center", value);
                            HeadDirection::Center
                        });
                }
                _ => {}
            }
        }

        obs
    }

    /// Build from a classifier response.
    ///
    /// Accepts either the bare signal object or the `{"gestures": {...}}`
    /// envelope. Anything else (including the empty `{}` sent when no face
    /// was found) is a neutral observation.
    pub fn from_value(value: &Value, timestamp_ms: u64) -> Self {
        let signals = match value.get("gestures") {
            Some(inner) => inner.as_object(),
            None => value.as_object(),
        };

        match signals {
            Some(map) => Self::from_signals(map, timestamp_ms),
            None => {
                debug!("Gesture payload is not an object, treating as neutral");
                Self::neutral(timestamp_ms)
            }
        }
    }

    /// Raw lateral target in [-1, 1].
    ///
    /// Uses `head_x` when reported, otherwise the coarse head direction.
    pub fn lateral_target(&self) -> f32 {
        match self.head_x {
            Some(x) => sanitize_axis(x),
            None => self.head_direction.axis(),
        }
    }

    /// Raw vertical target in [-1, 1].
    pub fn vertical_target(&self) -> f32 {
        self.head_y.map(sanitize_axis).unwrap_or(0.0)
    }
}

/// Clamp to [-1, 1]; non-finite values are neutral.
#[inline]
pub fn sanitize_axis(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

fn axis_value(name: &str, value: &Value) -> Option<f32> {
    match value.as_f64() {
        Some(v) if v.is_finite() => Some(sanitize_axis(v as f32)),
        _ => {
            debug!("Malformed axis {} = {:?}, ignoring", name, value);
            None
        }
    }
}

fn flag_value(name: &str, value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        other => {
            debug!("Malformed flag {} = {:?}, using false", name, other);
            false
        }
    }
}

// =============================================================================
// GESTURE SLOT
// =============================================================================

/// Single-slot, last-write-wins cell between the gesture feed and the tick loop.
///
/// The feed side overwrites whatever is in the slot; the tick loop drains it
/// once per tick. Intermediate samples published between two ticks are lost,
/// and a tick that finds the slot empty treats the input as stale. Both are
/// expected: this is racy on purpose and staleness is not an error.
#[derive(Clone, Debug, Default)]
pub struct GestureSlot {
    inner: Arc<Mutex<Option<GestureObservation>>>,
}

impl GestureSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new observation, replacing any unread one.
    pub fn publish(&self, observation: GestureObservation) {
        let mut slot = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(observation);
    }

    /// Take the observation published since the last call, if any.
    pub fn take(&self) -> Option<GestureObservation> {
        let mut slot = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.take()
    }

    /// Check for an unread observation without consuming it.
    pub fn is_fresh(&self) -> bool {
        let slot = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classifier_envelope() {
        let payload = json!({
            "gestures": {
                "mouth_open": true,
                "eyebrow_raise": false,
                "blink": false,
                "head_direction": "left"
            }
        });

        let obs = GestureObservation::from_value(&payload, 300);

        assert_eq!(obs.timestamp_ms, 300);
        assert!(obs.mouth_open);
        assert!(!obs.blink);
        assert_eq!(obs.head_direction, HeadDirection::Left);
        assert_eq!(obs.head_x, None);
        // No axis reported: lateral comes from the direction
        assert_eq!(obs.lateral_target(), -1.0);
    }

    #[test]
    fn test_no_face_is_neutral() {
        let obs = GestureObservation::from_value(&json!({ "gestures": {} }), 5);
        assert_eq!(obs, GestureObservation::neutral(5));

        let obs = GestureObservation::from_value(&json!("garbage"), 6);
        assert_eq!(obs, GestureObservation::neutral(6));
    }

    #[test]
    fn test_malformed_signals_fall_back() {
        let payload = json!({
            "head_x": "far left",
            "head_y": 7.5,
            "blink": "yes",
            "head_direction": 3,
            "unknown_signal": true
        });

        let obs = GestureObservation::from_value(&payload, 0);

        assert_eq!(obs.head_x, None);
        assert_eq!(obs.head_y, Some(1.0)); // clamped
        assert!(!obs.blink);
        assert_eq!(obs.head_direction, HeadDirection::Center);
    }

    #[test]
    fn test_axis_overrides_direction() {
        let obs = GestureObservation::from_value(
            &json!({ "head_x": 0.25, "head_direction": "right" }),
            0,
        );
        assert_eq!(obs.lateral_target(), 0.25);
    }

    #[test]
    fn test_sanitize_axis() {
        assert_eq!(sanitize_axis(f32::NAN), 0.0);
        assert_eq!(sanitize_axis(f32::INFINITY), 1.0);
        assert_eq!(sanitize_axis(-3.0), -1.0);
        assert_eq!(sanitize_axis(0.5), 0.5);
    }

    #[test]
    fn test_slot_last_write_wins() {
        let slot = GestureSlot::new();
        assert!(slot.take().is_none());

        slot.publish(GestureObservation::neutral(1));
        slot.publish(GestureObservation::neutral(2));
        assert!(slot.is_fresh());

        let taken = slot.take().unwrap();
        assert_eq!(taken.timestamp_ms, 2);

        // Drained until the next publish
        assert!(slot.take().is_none());
    }

    #[tokio::test]
    async fn test_slot_shared_across_tasks() {
        let slot = GestureSlot::new();
        let writer = slot.clone();

        tokio::spawn(async move {
            for t in 0..10 {
                writer.publish(GestureObservation::neutral(t));
            }
        })
        .await
        .unwrap();

        assert_eq!(slot.take().map(|o| o.timestamp_ms), Some(9));
    }
}
