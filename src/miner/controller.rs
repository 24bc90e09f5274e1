// src/miner/controller.rs
//! Top-level control loop.
//!
//! One task owns the whole coordination surface: it polls the pool on a
//! fixed tick, pushes fresh chain state to the workers, drains completed
//! sessions, keeps the pool topped up, retunes session quotas, and emits
//! periodic reports. Workers never talk to the network or to each other;
//! everything meets here.

use crate::config::Config;
use crate::miner::hasher::{WorkerContext, WorkerEvent};
use crate::miner::pool_manager::WorkerPool;
use crate::miner::pow::ProofOfWork;
use crate::miner::rebalancer::Rebalancer;
use crate::miner::HostCallbacks;
use crate::network::submit::Submitter;
use crate::network::sync::{SyncOutcome, UpdateClient};
use crate::network::telemetry::TelemetryPublisher;
use crate::stats::{Aggregator, MinerMetrics, SessionStats};
use crate::types::{ChainState, TuningState, NO_DL};
use crate::utils::error::MinerError;
use arc_swap::ArcSwapOption;
use crossbeam_channel::{unbounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Base control tick.
pub const UPDATE_DELAY: Duration = Duration::from_millis(2000);

/// Startup poll attempts before giving up for good.
const STARTUP_ATTEMPT_CAP: u32 = 15;

/// Pause between failed startup attempts.
const STARTUP_RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Ticks per cycle wrap; sessions are drained on even ticks.
const CYCLES_WRAP: u32 = 30;

/// Ticks per supercycle wrap (about ten minutes); identity resend rearms
/// on wrap. Counted per tick, independently of the cycle wrap.
const SUPERCYCLES_WRAP: u32 = 300;

/// Supercycle tick count past which identity and hash rate are resent once.
const IDENTITY_RESEND_AFTER: u32 = 15;

/// Grace period for detached submit tasks during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Records worth folding into the stats window; persistent workers exit
/// with an empty record that must not dilute averages.
fn worth_recording(stats: &SessionStats) -> bool {
    stats.hashes > 0 || !stats.hash_time.is_zero()
}

/// The coordination core: owns the pool, the sync client and the stats
/// pipeline, and drives them from one loop
pub struct Miner {
    sync: UpdateClient,
    pool: WorkerPool,
    aggregator: Aggregator,
    rebalancer: Rebalancer,
    tuning: TuningState,
    chain: Arc<ArcSwapOption<ChainState>>,
    events: Receiver<WorkerEvent>,
    metrics: Arc<MinerMetrics>,
    callbacks: Arc<dyn HostCallbacks>,
    active: Arc<AtomicBool>,
    faulted: Arc<AtomicBool>,
    drained: Vec<SessionStats>,
    cycles: u32,
    supercycles: u32,
    last_drain: Instant,
    last_hashes: u64,
}

impl Miner {
    /// Wires the whole stack together. Must be called from within the tokio
    /// runtime; submitter and telemetry capture its handle for the detached
    /// tasks they spawn from worker threads.
    pub fn new(
        config: Config,
        pow: Arc<dyn ProofOfWork>,
        callbacks: Arc<dyn HostCallbacks>,
    ) -> Result<Self, MinerError> {
        let worker = config.worker_name();
        let metrics = Arc::new(MinerMetrics::new());
        let telemetry = match &config.telemetry {
            Some(t) => TelemetryPublisher::new(t.host.clone(), t.invoke.clone(), t.token.clone()),
            None => TelemetryPublisher::disabled(),
        };

        let submitter = Submitter::new(
            config.pool.clone(),
            config.address.clone(),
            worker.clone(),
            metrics.clone(),
            telemetry.clone(),
            callbacks.clone(),
        );

        let active = Arc::new(AtomicBool::new(true));
        let faulted = Arc::new(AtomicBool::new(false));
        install_fault_hook(active.clone(), faulted.clone());

        let (events_tx, events_rx) = unbounded();
        let ctx = WorkerContext {
            metrics: metrics.clone(),
            sink: Arc::new(submitter),
            callbacks: callbacks.clone(),
            events: events_tx,
            active: active.clone(),
        };

        let chain = Arc::new(ArcSwapOption::empty());
        let pool = WorkerPool::new(
            config.mode,
            pow,
            ctx,
            chain.clone(),
            config.effective_hashers(),
        );
        let sync = UpdateClient::new(
            config.pool.clone(),
            worker.clone(),
            config.address.clone(),
            UPDATE_DELAY / 2,
        )?;
        let aggregator = Aggregator::new(worker, metrics.clone(), telemetry);

        Ok(Miner {
            sync,
            pool,
            aggregator,
            rebalancer: Rebalancer,
            tuning: TuningState::default(),
            chain,
            events: events_rx,
            metrics,
            callbacks,
            active,
            faulted,
            drained: Vec::new(),
            cycles: 0,
            supercycles: 0,
            last_drain: Instant::now(),
            last_hashes: 0,
        })
    }

    /// Flag the control loop checks every tick; clear it to stop mining.
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    /// Runs until the active flag clears, then shuts the pool down.
    pub async fn run(&mut self) -> Result<(), MinerError> {
        self.startup().await?;

        while self.active.load(Ordering::Acquire) {
            if let Err(e) = self.tick().await {
                log::error!("Control tick failed: {}", e);
                self.shutdown().await;
                return Err(e);
            }
            tokio::time::sleep(UPDATE_DELAY).await;
            self.advance_cadence();
        }

        self.shutdown().await;
        if self.faulted.load(Ordering::Acquire) {
            return Err(MinerError::WorkerFault(
                "a worker thread panicked".into(),
            ));
        }
        Ok(())
    }

    /// Advances the tick counters. Both wrap independently; the supercycle
    /// wrap rearms the identity and hash-rate resend.
    fn advance_cadence(&mut self) {
        self.cycles = (self.cycles + 1) % CYCLES_WRAP;
        self.supercycles = (self.supercycles + 1) % SUPERCYCLES_WRAP;
        if self.supercycles == 0 {
            self.sync.mark_rate_stale();
        }
    }

    /// Blocks mining until the pool has answered once; repeated failures
    /// here are fatal rather than retried forever.
    async fn startup(&mut self) -> Result<(), MinerError> {
        for attempt in 1..=STARTUP_ATTEMPT_CAP {
            match self.sync.poll(None, true, false, 0.0).await {
                SyncOutcome::Changed { state, .. } => {
                    log::info!(
                        "Connected to pool: height {} difficulty {} limit {}",
                        state.height,
                        state.difficulty,
                        state.limit
                    );
                    self.pool.broadcast(state);
                    return Ok(());
                }
                SyncOutcome::Unchanged | SyncOutcome::Skipped => {
                    // cannot happen with no prior state; treat as a failure
                    log::warn!("Startup poll {} returned no state", attempt);
                }
                SyncOutcome::Failed => {
                    log::warn!(
                        "Startup poll {}/{} failed",
                        attempt,
                        STARTUP_ATTEMPT_CAP
                    );
                }
            }
            if attempt < STARTUP_ATTEMPT_CAP {
                tokio::time::sleep(STARTUP_RETRY_DELAY).await;
            }
        }
        self.active.store(false, Ordering::Release);
        Err(MinerError::Startup(format!(
            "pool unreachable after {} attempts",
            STARTUP_ATTEMPT_CAP
        )))
    }

    async fn tick(&mut self) -> Result<(), MinerError> {
        let current = self.chain.load_full();
        let resend_identity = self.supercycles > IDENTITY_RESEND_AFTER;
        let outcome = self
            .sync
            .poll(
                current.as_deref(),
                false,
                resend_identity,
                self.aggregator.rate(),
            )
            .await;

        if let SyncOutcome::Changed {
            state,
            block_changed,
        } = outcome
        {
            if block_changed {
                let best = self.metrics.reset_best_dl();
                if best != NO_DL {
                    log::info!("New block: best dl this block was {}", best);
                }
            }
            log::info!(
                "Chain update: height {} difficulty {} limit {}",
                state.height,
                state.difficulty,
                state.limit
            );
            self.pool.broadcast(state);
        }

        self.drain_events()?;
        self.pool.top_up(&self.tuning)?;

        if self.cycles % 2 == 0 {
            self.aggregate();
        }
        self.callbacks
            .on_hash_rate(self.aggregator.rate(), self.metrics.best_dl());

        if self.aggregator.maybe_report().is_some() {
            log::info!("Pool sync: {}", self.sync.latency_summary());
            self.sync.reset_window();
        }
        Ok(())
    }

    /// Applies every queued completion event.
    fn drain_events(&mut self) -> Result<(), MinerError> {
        while let Ok(event) = self.events.try_recv() {
            match event {
                WorkerEvent::WorkerDone(mut stats) => {
                    self.pool.on_worker_done(&mut stats, &self.tuning)?;
                    if worth_recording(&stats) {
                        self.drained.push(stats);
                    }
                }
                WorkerEvent::SessionDone(mut stats) => {
                    self.pool.on_session_done(&mut stats, &self.tuning);
                    if worth_recording(&stats) {
                        self.drained.push(stats);
                    }
                }
            }
        }
        Ok(())
    }

    /// Folds drained sessions into the stats window and retunes quotas.
    fn aggregate(&mut self) {
        let sessions = std::mem::take(&mut self.drained);
        for stats in &sessions {
            self.aggregator.fold(stats);
        }

        let total = self.metrics.snapshot().hashes;
        let wall = self.last_drain.elapsed();
        self.aggregator
            .record_drain(total.saturating_sub(self.last_hashes), wall);
        self.last_drain = Instant::now();
        self.last_hashes = total;

        if let Some(next) = self.rebalancer.retune(&self.tuning, &sessions) {
            if next.hashes_per_session != self.tuning.hashes_per_session {
                log::debug!(
                    "Retuned session quota {} -> {}",
                    self.tuning.hashes_per_session,
                    next.hashes_per_session
                );
            }
            self.tuning = next;
        }
    }

    /// Ordered shutdown: signal every worker, then give the detached
    /// submit tasks a moment to land.
    async fn shutdown(&mut self) {
        self.active.store(false, Ordering::Release);
        self.pool.shutdown_all();
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        let _ = self.drain_events();
        log::info!("Miner stopped");
    }
}

/// Worker threads have no error channel back to the loop; a panic in one
/// trips the shared flags so the loop exits and reports the fault.
fn install_fault_hook(active: Arc<AtomicBool>, faulted: Arc<AtomicBool>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if std::thread::current()
            .name()
            .is_some_and(|n| n.starts_with("hasher-"))
        {
            faulted.store(true, Ordering::Release);
            active.store(false, Ordering::Release);
        }
        previous(info);
    }));
}
