//! Gesture Heist Server
//!
//! Runs the WebSocket session server, or a scripted demo run with
//! `--demo` that checks replay determinism.
//!
//! Environment:
//! - `GESTURE_HEIST_CONFIG`: path to a JSON `GameConfig` override
//! - `GESTURE_HEIST_ADDR`: bind address (default `0.0.0.0:8080`)
//! - `RUST_LOG`: log filter (default `info`)

use std::env;
use std::sync::Arc;
use anyhow::{ensure, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gesture_heist::{
    TICK_RATE, VERSION,
    config::GameConfig,
    game::{
        events::GameEventData,
        input::GestureRecording,
        observation::GestureObservation,
        state::{RunMode, RunState},
        tick::{replay_run, tick},
    },
    network::{GameServer, ServerConfig, SessionConfig},
};

const CONFIG_ENV: &str = "GESTURE_HEIST_CONFIG";
const ADDR_ENV: &str = "GESTURE_HEIST_ADDR";

/// Demo length: two minutes of play.
const DEMO_TICKS: u32 = 120 * TICK_RATE;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Gesture Heist Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let game = match env::var(CONFIG_ENV) {
        Ok(path) => GameConfig::from_file(&path)
            .with_context(|| format!("loading {} from {}", CONFIG_ENV, path))?,
        Err(_) => GameConfig::default(),
    };

    if env::args().any(|arg| arg == "--demo") {
        return demo_run(game);
    }

    let mut config = ServerConfig {
        session: SessionConfig {
            game,
            ..SessionConfig::default()
        },
        ..ServerConfig::default()
    };
    if let Ok(addr) = env::var(ADDR_ENV) {
        config.bind_addr = addr
            .parse()
            .with_context(|| format!("invalid {}: {}", ADDR_ENV, addr))?;
    }

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}

/// Autopilot gestures: steer away from the nearest obstacle ahead and jump
/// every few seconds. Only every fourth tick delivers a sample, the way a
/// real classifier lags behind the simulation.
fn autopilot(state: &RunState, t: u32) -> Option<GestureObservation> {
    if t % 4 != 0 {
        return None;
    }

    let mut obs = GestureObservation::neutral(u64::from(t) * 1000 / u64::from(TICK_RATE));

    let ahead = state
        .world
        .obstacles()
        .iter()
        .filter(|o| o.position > state.distance())
        .min_by(|a, b| a.position.total_cmp(&b.position));

    if let Some(obstacle) = ahead {
        obs.head_x = Some(if obstacle.lateral <= 0.0 { 0.9 } else { -0.9 });
    }
    obs.mouth_open = t % (3 * TICK_RATE) == 0;

    Some(obs)
}

/// Scripted endless run, then a replay from its recording.
fn demo_run(config: GameConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Run ===");

    let session_key = [1u8; 16];
    let mut state = RunState::new(config.clone(), RunMode::Endless, session_key)?;
    let dt = 1.0 / TICK_RATE as f32;
    let mut recording = GestureRecording::new(state.seed, state.mode.clone(), dt);

    info!("Session key: {}", hex::encode(session_key));
    info!("RNG Seed: {:016x}", state.seed);

    state.start();

    let mut total_events = 0;
    let mut live_events = Vec::new();

    for t in 1..=DEMO_TICKS {
        let observation = autopilot(&state, t);
        let result = tick(&mut state, observation.as_ref(), dt)?;
        if result.simulated {
            recording.record(result.tick, observation.as_ref());
        }
        total_events += result.events.len();

        // Report every 10 seconds
        if t % (10 * TICK_RATE) == 0 {
            info!(
                "Tick {}: distance {:.1}, speed {:.1}, score {}, {} obstacles live",
                t,
                state.distance(),
                state.speed,
                state.score(),
                state.world.obstacles().len()
            );
        }

        for event in &result.events {
            if let GameEventData::Collision { kind, intent, .. } = &event.data {
                info!("Hit a {:?} while {:?} at tick {}", kind, intent, event.tick);
            }
        }
        live_events.extend(result.events);

        if result.run_ended {
            info!("Run ended at tick {}", t);
            break;
        }
    }

    info!("=== Run Results ===");
    let hash = state.compute_hash();
    info!("Final phase: {:?}", state.phase());
    info!("Score: {} (distance {:.1})", state.score(), state.distance());
    info!("Total events: {}", total_events);
    info!("Recorded samples: {}", recording.samples().len());
    info!("Final State Hash: {}", hex::encode(hash));

    info!("=== Verifying Determinism ===");
    let bytes = recording.to_bytes()?;
    let decoded = GestureRecording::from_bytes(&bytes)?;
    info!("Recording: {} bytes", bytes.len());

    let (replayed, replay_events) = replay_run(&config, &decoded)?;
    let replay_hash = replayed.compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if replay_events != live_events {
        warn!("Replay produced {} events, live run {}", replay_events.len(), live_events.len());
    }
    ensure!(hash == replay_hash, "determinism failure: replay hash differs");
    info!("DETERMINISM VERIFIED: Hashes match!");

    Ok(())
}
