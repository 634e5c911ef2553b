//! Property-based tests for lockstep determinism and scoring invariants.
//!
//! Run with: cargo test --release -p blobber_sim --test properties

use blobber_core::{advance, EngineConfig, TickOutcome, WorldState};
use blobber_env::{Movement, PlayerId, PlayerInput, TickRecord};
use blobber_relay::HubConfig;
use blobber_sim::{check_conservation, InputProfile, SimNetwork};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

const PLAYERS: [&str; 4] = ["ann", "bo", "cy", "di"];

/// (player, dx, dy, bomb)
type Intent = (usize, i8, i8, bool);

fn intent() -> impl Strategy<Value = Intent> {
    (0..PLAYERS.len(), -1i8..=1, -1i8..=1, prop::bool::weighted(0.2))
}

fn script() -> impl Strategy<Value = Vec<Vec<Intent>>> {
    prop::collection::vec(prop::collection::vec(intent(), 0..4), 1..160)
}

fn records(script: &[Vec<Intent>]) -> Vec<TickRecord> {
    script
        .iter()
        .enumerate()
        .map(|(tick, intents)| {
            let inputs = intents
                .iter()
                .map(|&(player, dx, dy, bomb)| PlayerInput {
                    movement: Some(Movement {
                        up: dy < 0,
                        down: dy > 0,
                        left: dx < 0,
                        right: dx > 0,
                    }),
                    place_bomb: bomb,
                    ..PlayerInput::idle(PlayerId::new(PLAYERS[player]))
                })
                .collect();
            TickRecord::new(tick as u64, inputs)
        })
        .collect()
}

fn world(seed: u64) -> WorldState {
    let config = EngineConfig::default()
        .with_seed(seed)
        .with_size(15, 15)
        .with_max_ticks(120);
    WorldState::new(config)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Two engines fed the same records end bit-identical.
    #[test]
    fn prop_same_records_same_world(seed in any::<u64>(), script in script()) {
        let records = records(&script);
        let mut a = world(seed);
        let mut b = world(seed);
        for record in &records {
            let _ = a.apply_tick(record);
        }
        for record in &records {
            let _ = b.apply_tick(record);
        }
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.snapshot_json().unwrap(), b.snapshot_json().unwrap());
    }

    /// Re-applying a tick is rejected and changes nothing.
    #[test]
    fn prop_repeated_tick_is_rejected(seed in any::<u64>(), script in script()) {
        let mut state = world(seed);
        for record in &records(&script) {
            prop_assert!(state.apply_tick(record).is_applied());
            let before = state.clone();
            let outcome = state.apply_tick(record);
            let is_stale = matches!(outcome, TickOutcome::Stale { .. });
            prop_assert!(is_stale);
            prop_assert_eq!(&state, &before);
        }
    }

    /// Painted totals never exceed the open cells and always match the grid;
    /// the pure form never touches its input.
    #[test]
    fn prop_conservation(seed in any::<u64>(), script in script()) {
        let mut state = world(seed);
        for record in &records(&script) {
            let before = state.clone();
            let next = advance(&state, record);
            prop_assert_eq!(&state, &before);
            state = next;
            prop_assert!(check_conservation(&state).is_ok());
        }
        if state.game_over {
            if let Some(winner) = &state.winner {
                let best = state.painted(winner);
                let ties = state.painted_counts.values().filter(|c| **c == best).count();
                prop_assert_eq!(ties, 1);
            }
        }
    }

    /// A joiner at any tick replays exactly 0..N-1 and lands on the same
    /// world as a client that was there from the start.
    #[test]
    fn prop_late_joiner_matches(seed in any::<u64>(), join_at in 1u64..60, extra in 0u64..20) {
        let config = HubConfig::new(Duration::from_millis(50), 100_000, 3);
        let engine = EngineConfig::default().with_seed(seed).with_size(15, 15);
        let mut net = SimNetwork::new(config, engine);
        let rng = |n: u64| ChaCha8Rng::seed_from_u64(seed ^ n);

        let early = net.connect("early", rng(1), InputProfile::AGGRESSIVE, 256);
        for _ in 0..join_at {
            net.play_round();
            net.flush_tick();
            net.deliver_all().unwrap();
        }
        let late = net.connect("late", rng(2), InputProfile::CASUAL, 256);
        for _ in 0..=extra {
            net.play_round();
            net.flush_tick();
            net.deliver_all().unwrap();
        }

        let early = net.client(early).unwrap();
        let late = net.client(late).unwrap();
        prop_assert_eq!(late.stats().replays.clone(), vec![(0, join_at - 1)]);
        prop_assert!(late.stats().sequence_errors.is_empty());
        prop_assert_eq!(early.lockstep().world(), late.lockstep().world());
        prop_assert_eq!(late.lockstep().world().current_tick, Some(join_at + extra));
    }
}
