use std::sync::atomic::{
    AtomicU64,
    Ordering,
};

use rand::rngs::StdRng;
use rand::{
    Rng,
    SeedableRng,
};
use tdval::target_decoy::DEFAULT_CHECK_INTERVAL;
use tdval::{
    CalibrationStatus,
    InputMap,
    NoProgress,
    ProgressReporter,
    ScoreDirection,
    TargetDecoyMap,
};

#[test]
fn test_fully_separable_distributions() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut map = TargetDecoyMap::new(ScoreDirection::HigherIsBetter);
    let mut best = f64::NEG_INFINITY;
    let mut worst = f64::INFINITY;
    for _ in 0..1000 {
        let target: f64 = rng.random_range(50.0..100.0);
        let decoy: f64 = rng.random_range(0.0..50.0);
        best = best.max(target);
        worst = worst.min(decoy);
        map.put(target, false).unwrap();
        map.put(decoy, true).unwrap();
    }

    assert_eq!(
        map.estimate_probabilities(&NoProgress),
        CalibrationStatus::Completed
    );
    let at_best = map.get_probability(best).unwrap();
    let at_worst = map.get_probability(worst).unwrap();
    assert!(at_best < 0.01, "PEP at the best score: {}", at_best);
    assert!(at_worst > 0.99, "PEP at the worst score: {}", at_worst);
    assert!(!map.suspicious_input());
}

#[test]
fn test_indistinguishable_distributions() {
    let mut map = TargetDecoyMap::new(ScoreDirection::HigherIsBetter);
    for i in 0..500 {
        map.put((2 * i) as f64, false).unwrap();
        map.put((2 * i + 1) as f64, true).unwrap();
    }
    assert!(map.suspicious_input());
    assert!(map.separation_auc().unwrap() < 0.55);

    map.estimate_probabilities(&NoProgress);
    for s in (0..1000).step_by(7) {
        let pep = map.get_probability(s as f64).unwrap();
        assert!((pep - 0.5).abs() < 0.05, "PEP at {} was {}", s, pep);
    }
}

#[test]
fn test_randomly_drawn_identical_distributions_are_suspicious() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut map = TargetDecoyMap::new(ScoreDirection::LowerIsBetter);
    for _ in 0..500 {
        map.put(rng.random_range(0.0..1.0), false).unwrap();
        map.put(rng.random_range(0.0..1.0), true).unwrap();
    }
    assert!(map.suspicious_input());
}

#[test]
fn test_sparse_engine_is_flagged() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut input = InputMap::default();
    for _ in 0..100 {
        let target_exp: f64 = rng.random_range(4.0..10.0);
        let decoy_exp: f64 = rng.random_range(0.0..5.0);
        input.add_entry(0, 10f64.powf(-target_exp), false).unwrap();
        input.add_entry(0, 10f64.powf(-decoy_exp), true).unwrap();
    }
    for i in 0..5 {
        input.add_entry(1, 10f64.powf(-(i as f64)), i % 2 == 1).unwrap();
    }

    assert!(input.is_multiple_search_engines());
    assert_eq!(input.get_map(0).unwrap().get_map_size(), 200);
    let suspicious = input.suspicious_input();
    assert!(suspicious.contains(&1));
    assert!(!suspicious.contains(&0));

    assert_eq!(
        input.estimate_probabilities(&NoProgress),
        CalibrationStatus::Completed
    );
    assert!(input.get_probability(0, 1e-10).unwrap() < 0.01);
}

/// Raises the cancel flag once a given number of observations was reported.
struct CancelAfter {
    position: AtomicU64,
    cancel_at: u64,
}

impl CancelAfter {
    fn new(cancel_at: u64) -> Self {
        Self {
            position: AtomicU64::new(0),
            cancel_at,
        }
    }
}

impl ProgressReporter for CancelAfter {
    fn increment(&self, amount: u64) {
        self.position.fetch_add(amount, Ordering::Relaxed);
    }

    fn set_max(&self, _max: u64) {}

    fn is_cancelled(&self) -> bool {
        self.position.load(Ordering::Relaxed) >= self.cancel_at
    }
}

fn large_map() -> TargetDecoyMap {
    let mut map = TargetDecoyMap::new(ScoreDirection::HigherIsBetter);
    for i in 0..5000 {
        map.put(i as f64 + 2500.0, false).unwrap();
        map.put(i as f64, true).unwrap();
    }
    map
}

#[test]
fn test_cancellation_leaves_map_uncalibrated() {
    let mut map = large_map();
    let n = map.get_map_size() as u64;
    let reporter = CancelAfter::new(n / 10);

    let status = map.estimate_probabilities(&reporter);
    assert_eq!(status, CalibrationStatus::Cancelled);
    let processed = reporter.position.load(Ordering::Relaxed);
    assert!(
        processed < n / 10 + DEFAULT_CHECK_INTERVAL as u64,
        "processed {} of {} before stopping",
        processed,
        n
    );
    assert!(map.is_dirty());
    assert!(map.curve().is_none());
}

#[test]
fn test_cancellation_keeps_previous_curve() {
    let mut map = large_map();
    map.estimate_probabilities(&NoProgress);
    let previous = map.curve().cloned();
    map.put(10_000.0, true).unwrap();

    let reporter = CancelAfter::new(map.get_map_size() as u64 / 10);
    assert!(map.estimate_probabilities(&reporter).is_cancelled());
    assert!(map.is_dirty());
    assert_eq!(map.curve().cloned(), previous);
}

#[test]
fn test_cancellation_stops_remaining_engines() {
    let mut input = InputMap::new(ScoreDirection::HigherIsBetter);
    for engine in 0..3 {
        for i in 0..1000 {
            input.add_entry(engine, i as f64 + 500.0, false).unwrap();
            input.add_entry(engine, i as f64, true).unwrap();
        }
    }
    let reporter = CancelAfter::new(500);
    assert!(input.estimate_probabilities(&reporter).is_cancelled());
    for engine in 0..3 {
        assert!(input.get_map(engine).unwrap().is_dirty());
    }
}

#[test]
fn test_parallel_cancellation_keeps_engine_state() {
    let mut input = InputMap::new(ScoreDirection::HigherIsBetter);
    for engine in 0..4 {
        for i in 0..1000 {
            input.add_entry(engine, i as f64 + 500.0, false).unwrap();
            input.add_entry(engine, i as f64, true).unwrap();
        }
    }
    input.estimate_probabilities(&NoProgress);
    let previous: Vec<_> = (0..4)
        .map(|engine| input.get_map(engine).unwrap().curve().cloned())
        .collect();
    for engine in 0..4 {
        input.add_entry(engine, 10_000.0, true).unwrap();
    }

    let total = input.total_observations() as u64;
    let reporter = CancelAfter::new(total / 10);
    assert_eq!(
        input.estimate_probabilities_parallel(&reporter),
        CalibrationStatus::Cancelled
    );

    let mut untouched = 0;
    for engine in 0..4 {
        let map = input.get_map(engine).unwrap();
        if map.is_dirty() {
            assert_eq!(map.curve().cloned(), previous[engine as usize]);
            untouched += 1;
        } else {
            // finished before the flag was raised, fully recalibrated
            let curve = map.curve().unwrap();
            assert_ne!(Some(curve), previous[engine as usize].as_ref());
            assert_eq!(curve.points().last().unwrap().score, 10_000.0);
        }
    }
    assert!(untouched > 0);
}
