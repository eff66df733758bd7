//! End-to-end runs of the simulation engine.

use stratify::{
    CancelToken, Executor, KadConfig, Limit, NullExecutor, NullObserver, Observer, Operation,
    OperationFactors, PathKind, PlaybookConfig, PrepopulationEntry, ProbabilisticConfig,
    RandomRange, SimulatedState, Simulation, SimulationConfig, SimulationResult, SizeFactor,
    UsageModelConfig,
};

fn probabilistic(steps: u64, min: u64, max: u64) -> UsageModelConfig {
    UsageModelConfig::Probabilistic(ProbabilisticConfig {
        steps,
        file_size_min: min,
        file_size_max: max,
    })
}

fn kad(steps: u64) -> UsageModelConfig {
    UsageModelConfig::Kad(KadConfig {
        steps,
        operation_factors: OperationFactors {
            write: 5,
            delete: 1,
            increase: 2,
            decrease: 2,
        },
        size_factors: vec![
            SizeFactor {
                size: 1,
                weight: 10,
            },
            SizeFactor { size: 2, weight: 1 },
        ],
        random_range: RandomRange { min: 1, max: 4 },
        chunk_size: 512,
        write_limit: Limit {
            start: 0.2,
            stop: 0.4,
        },
        delete_limit: Limit {
            start: 0.9,
            stop: 0.6,
        },
    })
}

fn config(seed: u64, model: UsageModelConfig) -> SimulationConfig {
    SimulationConfig {
        seed,
        write_playbook: None,
        usage_model: model,
    }
}

#[test]
fn probabilistic_run_respects_capacity_and_occupancy() {
    let mut simulation = Simulation::from_config(
        &config(42, probabilistic(5, 100, 100)),
        SimulatedState::new(1000),
        NullExecutor,
        NullObserver,
    )
    .expect("valid config");
    let report = simulation.run().expect("run succeeds");

    assert!(report.steps_completed >= 1);
    assert!(report.used <= 500);
    assert!(report.used <= report.capacity);

    // On an empty volume the first operation can only create an entry.
    let first = &simulation.history().entries()[0].operation;
    assert!(matches!(
        first,
        Operation::Mkdir { .. } | Operation::Write { .. }
    ));
}

#[test]
fn kad_run_stays_within_capacity() {
    let mut simulation = Simulation::from_config(
        &config(7, kad(500)),
        SimulatedState::new(1_000_000),
        NullExecutor,
        NullObserver,
    )
    .expect("valid config");
    let report = simulation.run().expect("run succeeds");

    assert!(report.steps_completed >= 1);
    assert!(report.used <= report.capacity);

    // Replaying the history against a fresh state holds the capacity
    // invariant after every single step.
    let mut state = SimulatedState::new(1_000_000);
    for entry in simulation.history().entries() {
        state.apply(&entry.operation).expect("logged op is valid");
        assert!(state.used() <= state.capacity());
    }
    assert_eq!(state.used(), report.used);
}

struct CancellingExecutor {
    token: CancelToken,
    cancel_after: usize,
    executed: usize,
}

impl Executor for CancellingExecutor {
    fn execute(&mut self, _operation: &Operation) -> SimulationResult<()> {
        self.executed += 1;
        if self.executed == self.cancel_after {
            self.token.cancel();
        }
        Ok(())
    }
}

#[test]
fn cancellation_stops_between_steps() {
    let token = CancelToken::new();
    let mut simulation = Simulation::new(
        42,
        SimulatedState::new(1_000_000),
        stratify::build_model(&probabilistic(1000, 100, 1000)).expect("valid config"),
        CancellingExecutor {
            token: token.clone(),
            cancel_after: 3,
            executed: 0,
        },
        NullObserver,
    )
    .with_cancel_token(token);

    let report = simulation.run().expect("run succeeds");
    assert!(report.cancelled);
    assert_eq!(report.steps_completed, 3);
}

struct CountingObserver {
    captures: usize,
}

impl Observer for CountingObserver {
    fn capture(&mut self) -> SimulationResult<serde_json::Value> {
        self.captures += 1;
        Ok(serde_json::json!({ "capture": self.captures }))
    }
}

#[test]
fn observer_captures_land_in_the_history() {
    let mut simulation = Simulation::from_config(
        &config(9, probabilistic(10, 64, 256)),
        SimulatedState::new(100_000),
        NullExecutor,
        CountingObserver { captures: 0 },
    )
    .expect("valid config");
    simulation.run().expect("run succeeds");

    for (index, entry) in simulation.history().entries().iter().enumerate() {
        assert_eq!(entry.id, index as u64 + 1);
        assert_eq!(entry.capture["capture"], index as u64 + 1);
    }
}

#[test]
fn prepopulated_entries_survive_a_run_untouched() {
    let mut state = SimulatedState::new(1_000_000);
    state
        .prepopulate(&[
            PrepopulationEntry {
                path: "/sys/kernel.bin".to_string(),
                kind: PathKind::File,
                size: 100_000,
            },
            PrepopulationEntry {
                path: "/sys/modules".to_string(),
                kind: PathKind::Directory,
                size: 0,
            },
        ])
        .expect("prepopulate");

    let mut simulation = Simulation::from_config(
        &config(1234, probabilistic(200, 64, 4096)),
        state,
        NullExecutor,
        NullObserver,
    )
    .expect("valid config");
    simulation.run().expect("run succeeds");

    let state = simulation.state();
    assert_eq!(state.size_of("/sys/kernel.bin"), Some(100_000));
    assert_eq!(state.kind_of("/sys/modules"), Some(PathKind::Directory));
}

#[test]
fn recorded_kad_run_replays_to_the_same_state() {
    let dir = tempfile::tempdir().expect("temp dir");
    let playbook_path = dir.path().join("kad.playbook");

    let mut record_config = config(31337, kad(200));
    record_config.write_playbook = Some(playbook_path.clone());
    let mut recorded = Simulation::from_config(
        &record_config,
        SimulatedState::new(500_000),
        NullExecutor,
        NullObserver,
    )
    .expect("valid config");
    let original = recorded.run().expect("run succeeds");
    assert!(original.steps_completed >= 1);

    let mut replayed = Simulation::from_config(
        &config(0, UsageModelConfig::Playbook(PlaybookConfig { path: playbook_path })),
        SimulatedState::new(500_000),
        NullExecutor,
        NullObserver,
    )
    .expect("valid playbook");
    let replay = replayed.run().expect("replay succeeds");

    assert_eq!(replay.steps_completed, original.steps_completed);
    assert_eq!(replay.used, original.used);
    let recorded_state: Vec<_> = recorded.state().entries().collect();
    let replayed_state: Vec<_> = replayed.state().entries().collect();
    assert_eq!(recorded_state, replayed_state);
}
