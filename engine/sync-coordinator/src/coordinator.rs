//! The tick loop that keeps clock, positions and viewers in step

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use orbital_mechanics::BodyCatalog;
use parking_lot::{Mutex, RwLock};
use simulation_clock::{ClockError, SimulationClock};
use tokio::sync::{mpsc, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::commands::{ClockCommand, ControlCommand};
use crate::config::CoordinatorConfig;
use crate::error::{CommandError, CoordinatorError};
use crate::events::{ServerEvent, StateSync};
use crate::metrics::MetricsCollector;
use crate::registry::{SessionHandle, SessionId, SessionRegistry};
use crate::snapshot::PositionSnapshot;

/// An accepted clock command waiting for the next tick
#[derive(Debug)]
struct PendingCommand {
    origin: SessionId,
    command: ClockCommand,
}

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub time: DateTime<Utc>,
    pub commands_applied: usize,
    pub commands_rejected: usize,
    pub bodies_solved: usize,
    pub solver_failures: usize,
    pub sessions_delivered: usize,
    pub sessions_dropped: usize,
    pub duration: Duration,
}

/// Serializes viewer commands against the clock and fans out one snapshot per tick
pub struct SyncCoordinator {
    clock: Arc<SimulationClock>,
    catalog: Arc<BodyCatalog>,
    registry: Arc<SessionRegistry>,
    config: CoordinatorConfig,

    command_tx: mpsc::Sender<PendingCommand>,
    /// Held for the whole of a tick. Connects and sync requests take it too, so a viewer never
    /// sees state from the middle of a tick.
    command_rx: Mutex<mpsc::Receiver<PendingCommand>>,

    latest: RwLock<Arc<PositionSnapshot>>,
    tick_sequence: AtomicU64,

    is_running: AtomicBool,
    shutdown: Notify,

    metrics: Arc<MetricsCollector>,
}

impl SyncCoordinator {
    /// Create a coordinator and solve the catalog at the clock's current time, so viewers that
    /// connect before the first tick still get positions
    pub fn new(
        clock: Arc<SimulationClock>,
        catalog: BodyCatalog,
        config: CoordinatorConfig,
    ) -> Result<Self, CoordinatorError> {
        config.validate()?;

        let catalog = Arc::new(catalog.with_parallel_threshold(config.parallel_solve_threshold));
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_capacity);

        let time = clock.time();
        let outcome = catalog.solve(time);
        for (body_id, error) in &outcome.failures {
            warn!(body_id, error = %error, "Body omitted from initial snapshot");
        }
        let initial = Arc::new(PositionSnapshot::new(0, time, outcome.positions));

        info!(
            bodies = catalog.len(),
            tick_period_ms = config.tick_period_ms,
            "Creating SyncCoordinator"
        );

        Ok(Self {
            clock,
            catalog,
            registry: Arc::new(SessionRegistry::new()),
            metrics: Arc::new(MetricsCollector::new(config.metrics_history)),
            config,
            command_tx,
            command_rx: Mutex::new(command_rx),
            latest: RwLock::new(initial),
            tick_sequence: AtomicU64::new(0),
            is_running: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    pub fn clock(&self) -> &Arc<SimulationClock> {
        &self.clock
    }

    pub fn catalog(&self) -> &Arc<BodyCatalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn latest_snapshot(&self) -> Arc<PositionSnapshot> {
        Arc::clone(&self.latest.read())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Register a viewer. The first event on the returned queue is always `stateSync`.
    pub fn connect(&self) -> (SessionId, mpsc::Receiver<ServerEvent>) {
        let _tick_guard = self.command_rx.lock();

        let (handle, receiver) = SessionHandle::channel(self.config.session_queue_capacity);
        let sync = self.state_sync();
        if let Err(e) = handle.deliver(ServerEvent::StateSync(sync)) {
            warn!(error = %e, "Could not queue initial state for new session");
        }

        let id = self.registry.register(handle);
        self.metrics.record_session_registered();
        self.metrics.update_active_sessions(self.registry.len());
        info!(session_id = %id, sessions = self.registry.len(), "Viewer connected");

        (id, receiver)
    }

    pub fn disconnect(&self, id: SessionId) -> bool {
        let removed = self.registry.unregister(id);
        if removed {
            self.metrics.update_active_sessions(self.registry.len());
            info!(session_id = %id, sessions = self.registry.len(), "Viewer disconnected");
        }
        removed
    }

    /// Accept a command from a viewer.
    ///
    /// Clock commands are validated here and applied at the start of the next tick. Focus is
    /// relayed to every viewer and sync requests are answered right away. A refused command never
    /// touches the clock; the origin is told why with `commandRejected`.
    pub fn submit(&self, origin: SessionId, command: ControlCommand) -> Result<(), CommandError> {
        if !self.registry.contains(origin) {
            return Err(CommandError::UnknownSession);
        }

        match command {
            ControlCommand::Focus { body_id, body_name } => {
                debug!(session_id = %origin, body_id, "Relaying focus");
                let report = self.registry.broadcast(&ServerEvent::Focused { body_id, body_name });
                self.record_dropped(report.dropped.len());
                Ok(())
            }
            ControlCommand::RequestSync => {
                let _tick_guard = self.command_rx.lock();
                self.registry
                    .send_to(origin, ServerEvent::StateSync(self.state_sync()))
                    .map_err(|_| CommandError::UnknownSession)
            }
            ControlCommand::SetMultiplier(value) => match self.clock.validate_multiplier(value) {
                Ok(_) => self.enqueue(origin, ClockCommand::SetMultiplier(value)),
                Err(e) => Err(self.reject(origin, e.into())),
            },
            ControlCommand::SetPaused(paused) => self.enqueue(origin, ClockCommand::SetPaused(paused)),
            ControlCommand::SetTime(time) => self.enqueue(origin, ClockCommand::SetTime(time)),
        }
    }

    /// Queue a clock command for the next tick without waiting for room
    fn enqueue(&self, origin: SessionId, command: ClockCommand) -> Result<(), CommandError> {
        self.command_tx.try_send(PendingCommand { origin, command }).map_err(|e| {
            let error = match e {
                mpsc::error::TrySendError::Full(_) => CommandError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => CommandError::QueueClosed,
            };
            self.reject(origin, error)
        })
    }

    /// Run one tick: apply queued commands, advance, solve, broadcast
    pub fn tick(&self) -> TickReport {
        let started = Instant::now();
        let mut commands = self.command_rx.lock();
        let tick = self.tick_sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let mut applied = 0;
        let mut rejected = 0;
        while let Ok(pending) = commands.try_recv() {
            match self.apply(pending) {
                Ok(()) => applied += 1,
                Err(_) => rejected += 1,
            }
        }

        let clock = self.clock.advance(self.config.tick_period());
        let outcome = self.catalog.solve(clock.time);
        for (body_id, error) in &outcome.failures {
            warn!(tick, body_id, error = %error, "Body omitted from snapshot");
        }

        let bodies_solved = outcome.positions.len();
        let solver_failures = outcome.failures.len();
        let snapshot = Arc::new(PositionSnapshot::new(tick, clock.time, outcome.positions));
        *self.latest.write() = Arc::clone(&snapshot);

        let report = self.registry.broadcast(&ServerEvent::PositionsUpdated(snapshot));
        drop(commands);

        let duration = started.elapsed();
        self.metrics.record_tick(tick, duration, bodies_solved as u64, solver_failures as u64);
        self.record_dropped(report.dropped.len());

        TickReport {
            tick,
            time: clock.time,
            commands_applied: applied,
            commands_rejected: rejected,
            bodies_solved,
            solver_failures,
            sessions_delivered: report.delivered,
            sessions_dropped: report.dropped.len(),
            duration,
        }
    }

    /// Drive ticks at the configured period until [`SyncCoordinator::stop`] is called.
    /// Every session queue is closed on the way out.
    pub async fn run(&self) -> Result<(), CoordinatorError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(CoordinatorError::AlreadyRunning);
        }

        info!(tick_period_ms = self.config.tick_period_ms, "Starting sync coordinator loop");

        let mut ticker = tokio::time::interval(self.config.tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_metrics_emission = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.notified() => break,
            }
            if !self.is_running.load(Ordering::SeqCst) {
                break;
            }

            let report = self.tick();
            if report.duration > self.config.max_tick_duration() {
                warn!(
                    tick = report.tick,
                    duration_ms = report.duration.as_millis() as u64,
                    bodies = report.bodies_solved,
                    "Tick exceeded budget"
                );
            }

            if last_metrics_emission.elapsed() >= self.config.metrics_interval() {
                let metrics = self.metrics.get_metrics();
                info!(
                    tick = metrics.current_tick,
                    sessions = metrics.active_sessions,
                    avg_tick_us = metrics.avg_tick_duration_ns / 1_000,
                    p99_tick_us = metrics.p99_tick_duration_ns / 1_000,
                    solver_failures = metrics.total_solver_failures,
                    "Coordinator metrics"
                );
                last_metrics_emission = Instant::now();
            }
        }

        let closed = self.registry.close_all();
        self.metrics.update_active_sessions(0);
        self.is_running.store(false, Ordering::SeqCst);
        info!(closed_sessions = closed, "Sync coordinator stopped");
        Ok(())
    }

    /// Ask the loop to exit after the current tick
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Full state for one viewer. Callers hold the tick guard.
    fn state_sync(&self) -> StateSync {
        StateSync::new(self.clock.snapshot(), &self.latest.read())
    }

    /// Apply one queued command to the clock and announce the result. Called under the tick guard.
    fn apply(&self, pending: PendingCommand) -> Result<(), ClockError> {
        let PendingCommand { origin, command } = pending;

        let event = match command {
            ClockCommand::SetMultiplier(value) => match self.clock.set_multiplier(value) {
                Ok(value) => ServerEvent::MultiplierChanged { value },
                Err(e) => {
                    self.reject(origin, e.clone().into());
                    return Err(e);
                }
            },
            ClockCommand::SetPaused(paused) => {
                self.clock.set_paused(paused);
                ServerEvent::PausedChanged { paused }
            }
            ClockCommand::SetTime(time) => {
                self.clock.set_time(time);
                ServerEvent::TimeChanged { time }
            }
        };

        debug!(session_id = %origin, event = event.name(), "Applied command");
        self.metrics.record_command_applied();
        let report = self.registry.broadcast(&event);
        self.record_dropped(report.dropped.len());
        Ok(())
    }

    /// Tell the origin its command was refused and hand the error back
    fn reject(&self, origin: SessionId, error: CommandError) -> CommandError {
        warn!(session_id = %origin, error = %error, "Rejected command");
        self.metrics.record_command_rejected();

        let event = ServerEvent::CommandRejected { reason: error.to_string() };
        if self.registry.send_to(origin, event).is_err() {
            self.metrics.update_active_sessions(self.registry.len());
        }
        error
    }

    fn record_dropped(&self, dropped: usize) {
        if dropped > 0 {
            self.metrics.record_sessions_dropped(dropped as u64);
            self.metrics.update_active_sessions(self.registry.len());
        }
    }
}
