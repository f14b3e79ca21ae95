//! Metrics collection for the SyncCoordinator
//!
//! Counters live in atomics so any task can record without locking. Each recording is also
//! forwarded to the `metrics` facade for whichever exporter the service installs.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time view of the coordinator's metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorMetrics {
    /// Last completed tick
    pub current_tick: u64,

    /// Duration of the last tick in nanoseconds
    pub tick_duration_ns: u64,

    /// Observed tick rate in Hz
    pub tick_rate_hz: f64,

    /// Connected sessions
    pub active_sessions: u64,

    /// Bodies placed in the last tick
    pub bodies_solved: u64,

    /// Bodies omitted from the last tick
    pub solver_failures: u64,

    pub avg_tick_duration_ns: u64,
    pub max_tick_duration_ns: u64,
    pub p95_tick_duration_ns: u64,
    pub p99_tick_duration_ns: u64,

    pub uptime_seconds: u64,
    pub total_ticks_processed: u64,
    pub total_solver_failures: u64,
    pub total_commands_applied: u64,
    pub total_commands_rejected: u64,
    pub total_sessions_registered: u64,
    pub total_sessions_dropped: u64,
}

/// Lock-free metrics collector with a fixed tick-duration history
pub struct MetricsCollector {
    current_tick: AtomicU64,
    tick_durations: Vec<AtomicU64>,
    max_tick_duration: AtomicU64,
    total_ticks: AtomicU64,

    bodies_solved: AtomicU64,
    solver_failures: AtomicU64,
    total_solver_failures: AtomicU64,

    commands_applied: AtomicU64,
    commands_rejected: AtomicU64,

    active_sessions: AtomicU64,
    sessions_registered: AtomicU64,
    sessions_dropped: AtomicU64,

    start_time: Instant,
    history_size: usize,
}

impl MetricsCollector {
    pub fn new(history_size: usize) -> Self {
        let history_size = history_size.max(1);
        Self {
            current_tick: AtomicU64::new(0),
            tick_durations: (0..history_size).map(|_| AtomicU64::new(0)).collect(),
            max_tick_duration: AtomicU64::new(0),
            total_ticks: AtomicU64::new(0),
            bodies_solved: AtomicU64::new(0),
            solver_failures: AtomicU64::new(0),
            total_solver_failures: AtomicU64::new(0),
            commands_applied: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            sessions_registered: AtomicU64::new(0),
            sessions_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
            history_size,
        }
    }

    /// Record a completed tick
    pub fn record_tick(&self, tick: u64, duration: Duration, bodies_solved: u64, failures: u64) {
        let duration_ns = duration.as_nanos() as u64;
        let index = (tick as usize) % self.history_size;

        self.current_tick.store(tick, Ordering::Relaxed);
        self.tick_durations[index].store(duration_ns, Ordering::Relaxed);
        self.total_ticks.fetch_add(1, Ordering::Relaxed);
        self.bodies_solved.store(bodies_solved, Ordering::Relaxed);
        self.solver_failures.store(failures, Ordering::Relaxed);
        self.total_solver_failures.fetch_add(failures, Ordering::Relaxed);
        self.max_tick_duration.fetch_max(duration_ns, Ordering::Relaxed);

        metrics::histogram!("orrery_tick_duration_seconds", duration.as_secs_f64());
        metrics::gauge!("orrery_bodies_solved", bodies_solved as f64);
        metrics::counter!("orrery_ticks_total", 1);
        if failures > 0 {
            metrics::counter!("orrery_solver_failures_total", failures);
        }
    }

    pub fn record_command_applied(&self) {
        self.commands_applied.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("orrery_commands_applied_total", 1);
    }

    pub fn record_command_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("orrery_commands_rejected_total", 1);
    }

    pub fn record_session_registered(&self) {
        self.sessions_registered.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("orrery_sessions_registered_total", 1);
    }

    pub fn record_sessions_dropped(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.sessions_dropped.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("orrery_sessions_dropped_total", count);
    }

    pub fn update_active_sessions(&self, count: usize) {
        self.active_sessions.store(count as u64, Ordering::Relaxed);
        metrics::gauge!("orrery_active_sessions", count as f64);
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> CoordinatorMetrics {
        let current_tick = self.current_tick.load(Ordering::Relaxed);
        let uptime = self.start_time.elapsed().as_secs();
        let total_ticks = self.total_ticks.load(Ordering::Relaxed);

        let tick_rate_hz = if uptime > 0 { total_ticks as f64 / uptime as f64 } else { 0.0 };

        let last_index = (current_tick as usize) % self.history_size;
        let tick_duration_ns = self.tick_durations[last_index].load(Ordering::Relaxed);

        let mut durations: Vec<u64> = self
            .tick_durations
            .iter()
            .map(|d| d.load(Ordering::Relaxed))
            .filter(|&d| d > 0)
            .collect();
        durations.sort_unstable();

        CoordinatorMetrics {
            current_tick,
            tick_duration_ns,
            tick_rate_hz,
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            bodies_solved: self.bodies_solved.load(Ordering::Relaxed),
            solver_failures: self.solver_failures.load(Ordering::Relaxed),
            avg_tick_duration_ns: average(&durations),
            max_tick_duration_ns: self.max_tick_duration.load(Ordering::Relaxed),
            p95_tick_duration_ns: percentile(&durations, 0.95),
            p99_tick_duration_ns: percentile(&durations, 0.99),
            uptime_seconds: uptime,
            total_ticks_processed: total_ticks,
            total_solver_failures: self.total_solver_failures.load(Ordering::Relaxed),
            total_commands_applied: self.commands_applied.load(Ordering::Relaxed),
            total_commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            total_sessions_registered: self.sessions_registered.load(Ordering::Relaxed),
            total_sessions_dropped: self.sessions_dropped.load(Ordering::Relaxed),
        }
    }
}

fn average(sorted: &[u64]) -> u64 {
    if sorted.is_empty() {
        0
    } else {
        sorted.iter().sum::<u64>() / sorted.len() as u64
    }
}

fn percentile(sorted: &[u64], quantile: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = (sorted.len() as f64 * quantile) as usize;
    sorted[index.min(sorted.len() - 1)]
}
