//! Run Simulation Tick
//!
//! One step of a run. Order within a tick is fixed:
//!
//! 1. advance travel (speed ramp, distance)
//! 2. sample the smoother with the fresh observation, if any
//! 3. stream the world window around the new position
//! 4. resolve collisions, course progress and pickups
//! 5. spend the gadget if a guard took it, then apply the resulting events to
//!    the state machine
//!
//! Given the same seed, mode, tick interval and observations on the same
//! ticks, a run replays bit-for-bit.

use crate::config::{GameConfig, PoseConfig};
use crate::core::vec3::Vec3;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::{sanitize_dt, smooth_toward, smoothing_alpha, ControlState, GestureRecording};
use crate::game::invariant::InvariantViolation;
use crate::game::observation::GestureObservation;
use crate::game::state::{GamePhase, RunState};
use crate::game::world::{ObstacleKind, WindowDelta};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Run tick after this call
    pub tick: u32,
    /// Whether the run was simulated (it is only while playing)
    pub simulated: bool,
    /// Events generated this tick, plus any queued by commands
    pub events: Vec<GameEvent>,
    /// Entities spawned and retired
    pub window: WindowDelta,
    /// Phase after this tick
    pub phase: GamePhase,
    /// Whether the run is over
    pub run_ended: bool,
}

/// Player pose from smoothed controls.
pub fn player_pose(pose: &PoseConfig, control: &ControlState, distance: f32) -> Vec3 {
    Vec3::new(
        control.lateral * pose.lateral_range,
        pose.eye_height + control.vertical * pose.vertical_range,
        distance,
    )
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `state` - The run state (will be mutated)
/// * `observation` - Observation published since the last tick, `None` if stale
/// * `dt` - Tick interval in seconds; negative or non-finite counts as 0
///
/// Outside `Playing` nothing is simulated; queued events and window notices
/// are still flushed.
pub fn tick(
    state: &mut RunState,
    observation: Option<&GestureObservation>,
    dt: f32,
) -> Result<TickResult, InvariantViolation> {
    let mut result = TickResult {
        tick: state.tick,
        window: state.take_window_delta(),
        phase: state.phase(),
        ..TickResult::default()
    };

    if result.phase != GamePhase::Playing {
        result.run_ended = result.phase.is_ended();
        result.events = state.take_events();
        return Ok(result);
    }

    let dt = sanitize_dt(dt);

    // 0. Advance tick counter
    state.tick += 1;
    result.tick = state.tick;
    result.simulated = true;

    // 1. Travel
    advance_travel(state, dt);

    // 2. Controls and pose
    state.control = state.smoother.sample(observation, dt);
    state.player = player_pose(&state.config.pose, &state.control, state.distance());

    // 3. World window; the obstacle at the cursor stays live until judged
    state.world.hold_from(state.resolver.cursor());
    let delta = state.world.ensure_window(state.distance())?;
    result.window.extend(delta);

    // 4. Resolve
    let (obstacles, collectibles) = state.world.live_mut();
    let events = state.resolver.evaluate(
        state.tick,
        state.player,
        &state.control,
        obstacles,
        collectibles,
    );

    // 5. Apply
    if events.iter().any(|e| {
        matches!(e.data, GameEventData::ObstaclePassed { kind: ObstacleKind::Guard, .. })
    }) && state.smoother.honor_gadget()
    {
        state.control = state.smoother.state();
    }
    let transitions = state.machine.apply(&events)?;
    for event in events.into_iter().chain(transitions) {
        state.push_event(event);
    }

    result.phase = state.phase();
    result.run_ended = result.phase.is_ended();
    result.events = state.take_events();

    Ok(result)
}

/// Ramp speed towards its distance-dependent target and move forward.
fn advance_travel(state: &mut RunState, dt: f32) {
    let ramp = &state.config.speed;
    let target = ramp.base_speed + (state.distance() * ramp.ramp_per_unit).min(ramp.max_bonus);
    let alpha = smoothing_alpha(ramp.ramp_damping, dt, state.config.smoother.reference_dt);

    state.speed = smooth_toward(state.speed, target, alpha);
    state.machine.advance(state.speed * dt);
}

/// Replay a run from a gesture recording.
///
/// Returns the final state and every event, in order.
pub fn replay_run(
    config: &GameConfig,
    recording: &GestureRecording,
) -> Result<(RunState, Vec<GameEvent>), InvariantViolation> {
    let mut state = RunState::from_seed(config.clone(), recording.mode.clone(), recording.seed)?;
    let mut all_events = Vec::new();

    state.start();

    for t in 1..=recording.end_tick {
        let result = tick(&mut state, recording.sample_at(t), recording.dt)?;
        all_events.extend(result.events);

        if result.run_ended {
            break;
        }
    }

    Ok((state, all_events))
}
