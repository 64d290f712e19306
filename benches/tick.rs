//! Tick loop throughput with noisy gesture input.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use gesture_heist::game::level::Course;
use gesture_heist::game::observation::{GestureObservation, HeadDirection};
use gesture_heist::{tick, DeterministicRng, GameConfig, RunMode, RunState, TICK_RATE};

const TICKS: u32 = 600;

/// Classifier-like feed: a sample on roughly a third of the ticks.
fn gesture_feed(seed: u64) -> Vec<Option<GestureObservation>> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..TICKS)
        .map(|t| {
            if !rng.gen_bool(0.33) {
                return None;
            }
            let mut obs = GestureObservation::neutral(u64::from(t) * 16);
            obs.head_x = Some(rng.gen_range(-1.0..=1.0));
            obs.head_y = Some(rng.gen_range(-0.3..=0.3));
            obs.blink = rng.gen_bool(0.05);
            obs.mouth_open = rng.gen_bool(0.1);
            obs.eyebrow_raise = rng.gen_bool(0.05);
            obs.head_direction = match rng.gen_range(0..3) {
                0 => HeadDirection::Left,
                1 => HeadDirection::Center,
                _ => HeadDirection::Right,
            };
            Some(obs)
        })
        .collect()
}

fn run(mut state: RunState, feed: &[Option<GestureObservation>]) -> RunState {
    let dt = 1.0 / TICK_RATE as f32;
    state.start();
    for obs in feed {
        match tick(&mut state, obs.as_ref(), dt) {
            Ok(result) if !result.run_ended => {}
            _ => break,
        }
    }
    state
}

fn bench_tick(c: &mut Criterion) {
    let feed = gesture_feed(7);
    let config = GameConfig::default();

    c.bench_function("endless_600_ticks", |b| {
        b.iter_batched(
            || RunState::from_seed(config.clone(), RunMode::Endless, 42).unwrap(),
            |state| black_box(run(state, &feed)),
            BatchSize::SmallInput,
        )
    });

    let course = Course::generate(2, &mut DeterministicRng::new(42));
    c.bench_function("vault_course_600_ticks", |b| {
        b.iter_batched(
            || RunState::from_seed(config.clone(), RunMode::Heist(course.clone()), 42).unwrap(),
            |state| black_box(run(state, &feed)),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("state_hash", |b| {
        let state = run(RunState::from_seed(config.clone(), RunMode::Endless, 42).unwrap(), &feed);
        b.iter(|| black_box(state.compute_hash()))
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
