//! Unit tests for SimulationClock

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::{
    ClockConfig, ClockError, SimulationClock, DEFAULT_INITIAL_MULTIPLIER, DEFAULT_MAX_MULTIPLIER,
    DEFAULT_MIN_MULTIPLIER,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn running_clock() -> SimulationClock {
    let config = ClockConfig { start_paused: false, ..Default::default() };
    SimulationClock::with_start_time(config, start()).unwrap()
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_clock_config_default() {
        let config = ClockConfig::default();
        assert_eq!(config.min_multiplier, DEFAULT_MIN_MULTIPLIER);
        assert_eq!(config.max_multiplier, DEFAULT_MAX_MULTIPLIER);
        assert_eq!(config.initial_multiplier, DEFAULT_INITIAL_MULTIPLIER);
        assert!(config.start_paused);
        assert!(config.start_time.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_bounds() {
        let config = ClockConfig { min_multiplier: 0.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ClockError::Config(_))));

        let config = ClockConfig { min_multiplier: 50.0, max_multiplier: 10.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ClockError::Config(_))));

        let config = ClockConfig { max_multiplier: f64::INFINITY, ..Default::default() };
        assert!(matches!(config.validate(), Err(ClockError::Config(_))));

        let config = ClockConfig { initial_multiplier: -1.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ClockError::Config(_))));
    }

    #[test]
    fn test_invalid_config_refused_by_clock() {
        let config = ClockConfig { min_multiplier: -1.0, ..Default::default() };
        assert!(SimulationClock::new(config).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ClockConfig = toml::from_str("max_multiplier = 500.0").unwrap();
        assert_eq!(config.max_multiplier, 500.0);
        assert_eq!(config.min_multiplier, DEFAULT_MIN_MULTIPLIER);
        assert!(config.start_paused);
    }

    #[test]
    fn test_config_file_operations() {
        let config = ClockConfig {
            max_multiplier: 2500.0,
            start_paused: false,
            start_time: Some(start()),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.toml");
        let path = path.to_str().unwrap();

        assert!(config.to_file(path).is_ok());
        let loaded = ClockConfig::from_file(path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_from_file_rejects_invalid_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.toml");
        std::fs::write(&path, "min_multiplier = 20.0\nmax_multiplier = 10.0\n").unwrap();
        assert!(ClockConfig::from_file(path.to_str().unwrap()).is_err());
    }
}

#[cfg(test)]
mod clock_tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let clock = SimulationClock::with_start_time(ClockConfig::default(), start()).unwrap();
        let snapshot = clock.snapshot();
        assert_eq!(snapshot.time, start());
        assert_eq!(snapshot.multiplier, 1.0);
        assert!(snapshot.paused);
    }

    #[test]
    fn test_configured_start_time() {
        let config = ClockConfig { start_time: Some(start()), ..Default::default() };
        let clock = SimulationClock::new(config).unwrap();
        assert_eq!(clock.time(), start());
    }

    #[test]
    fn test_initial_multiplier_clamped() {
        let config = ClockConfig { initial_multiplier: 1.0e6, ..Default::default() };
        let clock = SimulationClock::with_start_time(config, start()).unwrap();
        assert_eq!(clock.multiplier(), DEFAULT_MAX_MULTIPLIER);
    }

    #[test]
    fn test_advance_scales_by_multiplier() {
        let clock = running_clock();
        clock.set_multiplier(50.0).unwrap();

        let snapshot = clock.advance(Duration::from_millis(200));
        assert_eq!(snapshot.time, start() + chrono::Duration::seconds(10));
    }

    #[test]
    fn test_fractional_multiplier() {
        let clock = running_clock();
        clock.set_multiplier(0.5).unwrap();
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.time(), start() + chrono::Duration::milliseconds(500));
    }

    #[test]
    fn test_paused_clock_does_not_advance() {
        let clock = SimulationClock::with_start_time(ClockConfig::default(), start()).unwrap();
        for _ in 0..100 {
            clock.advance(Duration::from_secs(3600));
        }
        assert_eq!(clock.time(), start());
    }

    #[test]
    fn test_pause_and_resume() {
        let clock = running_clock();
        clock.advance(Duration::from_secs(1));
        clock.set_paused(true);
        clock.advance(Duration::from_secs(1));
        assert!(clock.is_paused());
        assert_eq!(clock.time(), start() + chrono::Duration::seconds(1));

        clock.set_paused(false);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.time(), start() + chrono::Duration::seconds(2));
    }

    #[test]
    fn test_set_multiplier_rejects_invalid() {
        let clock = running_clock();
        clock.set_multiplier(20.0).unwrap();

        for value in [-5.0, 0.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(clock.set_multiplier(value), Err(ClockError::InvalidMultiplier(_))));
            assert_eq!(clock.multiplier(), 20.0);
        }
    }

    #[test]
    fn test_set_multiplier_clamps() {
        let clock = running_clock();
        assert_eq!(clock.set_multiplier(0.01), Ok(DEFAULT_MIN_MULTIPLIER));
        assert_eq!(clock.set_multiplier(1.0e9), Ok(DEFAULT_MAX_MULTIPLIER));
        assert_eq!(clock.set_multiplier(250.0), Ok(250.0));
    }

    #[test]
    fn test_set_time_jumps() {
        let clock = running_clock();
        let target = Utc.with_ymd_and_hms(1969, 7, 20, 20, 17, 0).unwrap();
        clock.set_time(target);
        assert_eq!(clock.time(), target);
    }

    #[test]
    fn test_advance_holds_at_range_limit() {
        let config = ClockConfig { start_paused: false, ..Default::default() };
        let clock = SimulationClock::with_start_time(config, DateTime::<Utc>::MAX_UTC).unwrap();
        let snapshot = clock.advance(Duration::from_secs(1));
        assert_eq!(snapshot.time, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let clock = SimulationClock::with_start_time(ClockConfig::default(), start()).unwrap();
        let json = serde_json::to_value(clock.snapshot()).unwrap();
        assert_eq!(json["paused"], true);
        assert_eq!(json["multiplier"], 1.0);
        assert_eq!(json["time"], "2024-06-01T00:00:00Z");
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    const STEPS: u32 = 5_000;

    /// One writer keeps `time - start == multiplier` seconds and `paused == even(seconds)`, one
    /// field per call. Any snapshot mixing fields from different moments breaks the relation.
    #[test]
    fn test_snapshot_never_torn() {
        let clock = Arc::new(running_clock());
        clock.set_paused(true);
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let clock = Arc::clone(&clock);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for k in 1..=STEPS {
                    clock.set_multiplier(f64::from(k)).unwrap();
                    clock.set_time(start() + chrono::Duration::seconds(i64::from(k)));
                    clock.set_paused(k % 2 == 0);
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let clock = Arc::clone(&clock);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    loop {
                        let finished = done.load(Ordering::SeqCst);
                        let snapshot = clock.snapshot();
                        let seconds = (snapshot.time - start()).num_seconds();
                        let multiplier = snapshot.multiplier as i64;
                        assert!(
                            seconds == multiplier || seconds == multiplier - 1,
                            "torn snapshot: {snapshot:?}"
                        );
                        if seconds == multiplier - 1 {
                            assert_eq!(
                                snapshot.paused,
                                seconds % 2 == 0,
                                "torn snapshot: {snapshot:?}"
                            );
                        }
                        if finished {
                            break;
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        let last = clock.snapshot();
        assert_eq!(last.multiplier, f64::from(STEPS));
        assert_eq!(last.time, start() + chrono::Duration::seconds(i64::from(STEPS)));
        assert!(last.paused);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_valid_multiplier_always_in_bounds(value in 1.0e-6..1.0e9f64) {
            let clock = running_clock();
            let effective = clock.set_multiplier(value).unwrap();
            prop_assert!((DEFAULT_MIN_MULTIPLIER..=DEFAULT_MAX_MULTIPLIER).contains(&effective));
            prop_assert_eq!(clock.multiplier(), effective);
        }

        #[test]
        fn prop_time_monotonic_while_running(steps in proptest::collection::vec(0u64..5_000, 1..50)) {
            let clock = running_clock();
            let mut last = clock.time();
            for ms in steps {
                let now = clock.advance(Duration::from_millis(ms)).time;
                prop_assert!(now >= last);
                last = now;
            }
        }
    }
}
