//! Input Smoothing and Intent Resolution
//!
//! Turns sporadic, noisy gesture observations into a continuous control
//! state and one discrete intent per tick.
//!
//! Smoothing is frame-rate independent: `damping` is the fraction of the
//! remaining gap closed per `reference_dt`, so for an arbitrary `dt`
//!
//! ```text
//! alpha = 1 - (1 - damping) ^ (dt / reference_dt)
//! ```
//!
//! Two runs sampled at different tick rates approach the same target along
//! the same curve.

use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::config::SmootherConfig;
use crate::core::hash::{StateHash, StateHasher};
use crate::game::observation::{sanitize_axis, GestureObservation, HeadDirection};
use crate::game::state::RunMode;

// =============================================================================
// SMOOTHING MATH
// =============================================================================

/// Blend factor for one step of `dt` seconds.
///
/// Zero, negative or non-finite `dt` gives 0 (no movement).
#[inline]
pub fn smoothing_alpha(damping: f32, dt: f32, reference_dt: f32) -> f32 {
    let dt = sanitize_dt(dt);
    if dt == 0.0 || reference_dt <= 0.0 {
        return 0.0;
    }
    (1.0 - (1.0 - damping).powf(dt / reference_dt)).clamp(0.0, 1.0)
}

/// Move `value` towards `target` by `alpha` of the gap, never past it.
#[inline]
pub fn smooth_toward(value: f32, target: f32, alpha: f32) -> f32 {
    let next = value + (target - value) * alpha;
    if target >= value {
        next.min(target)
    } else {
        next.max(target)
    }
}

/// Negative or non-finite frame intervals count as zero.
#[inline]
pub fn sanitize_dt(dt: f32) -> f32 {
    if dt.is_finite() && dt > 0.0 {
        dt
    } else {
        0.0
    }
}

// =============================================================================
// INTENT
// =============================================================================

/// Discrete action resolved from gestures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Idle,
    MoveLeft,
    MoveRight,
    Jump,
    Freeze,
    Gadget,
}

impl Intent {
    /// Either move direction.
    pub fn is_move(self) -> bool {
        matches!(self, Intent::MoveLeft | Intent::MoveRight)
    }

    /// Stable numeric tag for hashing.
    pub fn tag(self) -> u8 {
        match self {
            Intent::Idle => 0,
            Intent::MoveLeft => 1,
            Intent::MoveRight => 2,
            Intent::Jump => 3,
            Intent::Freeze => 4,
            Intent::Gadget => 5,
        }
    }
}

/// Smoothed controls after one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    /// Smoothed lateral axis in [-1, 1].
    pub lateral: f32,
    /// Smoothed vertical axis in [-1, 1].
    pub vertical: f32,
    /// Resolved intent for this tick.
    pub intent: Intent,
    /// Seconds until the gadget can fire again.
    pub gadget_cooldown: f32,
}

/// Last raw values seen from the feed. Reused while the feed is stale.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct RawTarget {
    lateral: f32,
    vertical: f32,
    blink: bool,
    mouth_open: bool,
    eyebrow_raise: bool,
    head_direction: HeadDirection,
}

impl From<&GestureObservation> for RawTarget {
    fn from(obs: &GestureObservation) -> Self {
        Self {
            lateral: obs.lateral_target(),
            vertical: obs.vertical_target(),
            blink: obs.blink,
            mouth_open: obs.mouth_open,
            eyebrow_raise: obs.eyebrow_raise,
            head_direction: obs.head_direction,
        }
    }
}

// =============================================================================
// SMOOTHER
// =============================================================================

/// Per-run gesture smoother.
#[derive(Clone, Debug)]
pub struct InputSmoother {
    config: SmootherConfig,
    raw: RawTarget,
    state: ControlState,
}

impl InputSmoother {
    /// Neutral smoother.
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            raw: RawTarget::default(),
            state: ControlState::default(),
        }
    }

    /// Current control state.
    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Advance by `dt` seconds.
    ///
    /// `None` means no new observation arrived since the last sample: the
    /// previous raw values stay as targets and smoothing continues.
    ///
    /// A held blink keeps resolving to [`Intent::Gadget`] while the gadget is
    /// charged. The cooldown only starts once the gadget is used, see
    /// [`InputSmoother::honor_gadget`].
    pub fn sample(&mut self, observation: Option<&GestureObservation>, dt: f32) -> ControlState {
        let dt = sanitize_dt(dt);

        if let Some(obs) = observation {
            self.raw = RawTarget::from(obs);
        }

        let alpha = smoothing_alpha(self.config.damping, dt, self.config.reference_dt);
        self.state.lateral = smooth_toward(self.state.lateral, sanitize_axis(self.raw.lateral), alpha);
        self.state.vertical = smooth_toward(self.state.vertical, sanitize_axis(self.raw.vertical), alpha);

        self.state.gadget_cooldown = (self.state.gadget_cooldown - dt).max(0.0);

        self.state.intent = self.resolve_intent();

        self.state
    }

    /// Spend the gadget resolved this tick and start its cooldown.
    ///
    /// Returns false if this tick's intent was not a charged gadget.
    pub fn honor_gadget(&mut self) -> bool {
        if self.state.intent != Intent::Gadget || self.state.gadget_cooldown > 0.0 {
            return false;
        }
        self.state.gadget_cooldown = self.config.gadget_cooldown_secs;
        trace!("Gadget honored, cooldown {}s", self.config.gadget_cooldown_secs);
        true
    }

    /// Priority: gadget > freeze > jump > move > idle.
    fn resolve_intent(&self) -> Intent {
        let raw = &self.raw;

        if raw.blink && self.state.gadget_cooldown <= 0.0 {
            return Intent::Gadget;
        }
        if raw.eyebrow_raise {
            return Intent::Freeze;
        }
        if raw.mouth_open {
            return Intent::Jump;
        }

        match raw.head_direction {
            HeadDirection::Left => Intent::MoveLeft,
            HeadDirection::Right => Intent::MoveRight,
            HeadDirection::Center => {
                let threshold = self.config.move_threshold;
                if raw.lateral <= -threshold {
                    Intent::MoveLeft
                } else if raw.lateral >= threshold {
                    Intent::MoveRight
                } else {
                    Intent::Idle
                }
            }
        }
    }
}

// =============================================================================
// GESTURE RECORDING
// =============================================================================

/// A gesture observation that arrived on a given tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedSample {
    pub tick: u32,
    pub observation: GestureObservation,
}

/// Everything needed to re-simulate one run: seed, mode, tick interval and
/// the fresh observations in tick order. Stale ticks are not stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GestureRecording {
    /// Seed the run was generated from.
    pub seed: u64,
    /// Mode the run was played in.
    pub mode: RunMode,
    /// Fixed tick interval in seconds.
    pub dt: f32,
    /// Last simulated tick.
    pub end_tick: u32,
    samples: Vec<RecordedSample>,
}

impl GestureRecording {
    /// Empty recording for a run.
    pub fn new(seed: u64, mode: RunMode, dt: f32) -> Self {
        Self {
            seed,
            mode,
            dt,
            end_tick: 0,
            samples: Vec::with_capacity(256),
        }
    }

    /// Record one simulated tick. `None` means the feed was stale.
    pub fn record(&mut self, tick: u32, observation: Option<&GestureObservation>) {
        self.end_tick = self.end_tick.max(tick);

        if let Some(obs) = observation {
            self.samples.push(RecordedSample {
                tick,
                observation: obs.clone(),
            });
        }
    }

    /// Fresh observation for `tick`, if one arrived.
    pub fn sample_at(&self, tick: u32) -> Option<&GestureObservation> {
        self.samples
            .binary_search_by_key(&tick, |s| s.tick)
            .ok()
            .map(|idx| &self.samples[idx].observation)
    }

    /// Recorded samples.
    pub fn samples(&self) -> &[RecordedSample] {
        &self.samples
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode from bincode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Domain-separated SHA-256 of the encoded recording.
    pub fn digest(&self) -> Result<StateHash, bincode::Error> {
        let mut hasher = StateHasher::for_recording();
        hasher.update_bytes(&self.to_bytes()?);
        Ok(hasher.finalize())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn smoother() -> InputSmoother {
        InputSmoother::new(SmootherConfig::default())
    }

    fn obs(f: impl FnOnce(&mut GestureObservation)) -> GestureObservation {
        let mut o = GestureObservation::neutral(0);
        f(&mut o);
        o
    }

    #[test]
    fn test_alpha_at_reference_dt_is_damping() {
        let alpha = smoothing_alpha(0.28, DT, DT);
        assert!((alpha - 0.28).abs() < 1e-6);
    }

    #[test]
    fn test_alpha_is_frame_rate_independent() {
        // Two half steps cover the same gap as one full step
        let mut a = 0.0;
        let half = smoothing_alpha(0.28, DT / 2.0, DT);
        a = smooth_toward(a, 1.0, half);
        a = smooth_toward(a, 1.0, half);

        let b = smooth_toward(0.0, 1.0, smoothing_alpha(0.28, DT, DT));

        assert!((a - b).abs() < 1e-5);
    }

    #[test]
    fn test_bad_dt_does_not_move() {
        let mut s = smoother();
        let target = obs(|o| o.head_x = Some(1.0));

        for dt in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let state = s.sample(Some(&target), dt);
            assert_eq!(state.lateral, 0.0);
        }
    }

    #[test]
    fn test_stale_input_keeps_converging() {
        let mut s = smoother();
        let first = s.sample(Some(&obs(|o| o.head_x = Some(1.0))), DT).lateral;

        let mut last = first;
        for _ in 0..30 {
            let now = s.sample(None, DT).lateral;
            assert!(now > last);
            last = now;
        }
        assert!(last > 0.99);
    }

    #[test]
    fn test_direction_fallback_moves_player() {
        let mut s = smoother();
        let state = s.sample(Some(&obs(|o| o.head_direction = HeadDirection::Right)), DT);

        assert_eq!(state.intent, Intent::MoveRight);
        assert!(state.lateral > 0.0);
    }

    #[test]
    fn test_intent_priority() {
        let mut s = smoother();
        let everything = obs(|o| {
            o.blink = true;
            o.eyebrow_raise = true;
            o.mouth_open = true;
            o.head_direction = HeadDirection::Left;
        });
        assert_eq!(s.sample(Some(&everything), DT).intent, Intent::Gadget);
        assert!(s.honor_gadget());

        // Gadget on cooldown: freeze wins next
        assert_eq!(s.sample(Some(&everything), DT).intent, Intent::Freeze);

        let jump_and_move = obs(|o| {
            o.mouth_open = true;
            o.head_x = Some(-0.9);
        });
        assert_eq!(s.sample(Some(&jump_and_move), DT).intent, Intent::Jump);

        let weak_move = obs(|o| o.head_x = Some(0.4));
        assert_eq!(s.sample(Some(&weak_move), DT).intent, Intent::Idle);

        let strong_move = obs(|o| o.head_x = Some(0.5));
        assert_eq!(s.sample(Some(&strong_move), DT).intent, Intent::MoveRight);
    }

    #[test]
    fn test_held_blink_stays_charged_until_used() {
        let mut s = smoother();
        let blink = obs(|o| o.blink = true);

        assert_eq!(s.sample(Some(&blink), DT).intent, Intent::Gadget);
        for _ in 0..120 {
            let state = s.sample(None, DT);
            assert_eq!(state.intent, Intent::Gadget);
            assert_eq!(state.gadget_cooldown, 0.0);
        }
    }

    #[test]
    fn test_gadget_cooldown_expires() {
        let mut s = smoother();
        let blink = obs(|o| o.blink = true);
        let cooldown = SmootherConfig::default().gadget_cooldown_secs;
        let cooldown_ticks = (cooldown / DT).round() as u32;

        assert_eq!(s.sample(Some(&blink), DT).intent, Intent::Gadget);
        assert!(s.honor_gadget());
        assert!(!s.honor_gadget());

        // Held blink through most of the cooldown: no second gadget
        for _ in 0..cooldown_ticks - 5 {
            assert_ne!(s.sample(None, DT).intent, Intent::Gadget);
        }

        let mut fired = false;
        for _ in 0..20 {
            if s.sample(None, DT).intent == Intent::Gadget {
                fired = true;
                break;
            }
        }
        assert!(fired);
    }

    #[test]
    fn test_honor_needs_gadget_intent() {
        let mut s = smoother();
        s.sample(Some(&obs(|o| o.mouth_open = true)), DT);

        assert!(!s.honor_gadget());
        assert_eq!(s.state().gadget_cooldown, 0.0);
    }

    #[test]
    fn test_recording_keeps_fresh_samples_only() {
        let mut rec = GestureRecording::new(7, RunMode::Endless, DT);
        let sample = obs(|o| o.mouth_open = true);

        rec.record(1, None);
        rec.record(2, Some(&sample));
        rec.record(3, None);

        assert_eq!(rec.end_tick, 3);
        assert_eq!(rec.samples().len(), 1);
        assert_eq!(rec.sample_at(2), Some(&sample));
        assert_eq!(rec.sample_at(1), None);
        assert_eq!(rec.sample_at(3), None);
    }

    #[test]
    fn test_recording_bincode() {
        let mut rec = GestureRecording::new(99, RunMode::Endless, DT);
        rec.record(4, Some(&obs(|o| o.head_x = Some(-0.3))));
        rec.record(9, None);

        let bytes = rec.to_bytes().unwrap();
        let decoded = GestureRecording::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, rec);
        assert_eq!(decoded.digest().unwrap(), rec.digest().unwrap());

        rec.record(10, Some(&obs(|o| o.blink = true)));
        assert_ne!(decoded.digest().unwrap(), rec.digest().unwrap());
    }

    proptest! {
        #[test]
        fn prop_smoothing_converges_without_overshoot(
            target in -1.0f32..=1.0,
            start in -1.0f32..=1.0,
            damping in 0.01f32..=1.0,
            dts in prop::collection::vec(0.0f32..0.1, 1..200),
        ) {
            let mut value = start;
            let mut gap = (target - value).abs();

            for dt in dts {
                let alpha = smoothing_alpha(damping, dt, DT);
                let next = smooth_toward(value, target, alpha);

                let next_gap = (target - next).abs();
                prop_assert!(next_gap <= gap);
                // Never crosses the target
                prop_assert!((target - value) * (target - next) >= 0.0);

                value = next;
                gap = next_gap;
            }
        }
    }
}
