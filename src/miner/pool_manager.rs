// src/miner/pool_manager.rs
//! Worker pool lifecycle.
//!
//! Owns the hasher threads: spawns them up to the configured cap (one per
//! control tick so a cold start never floods the host), replaces standard
//! workers when their single session ends, pushes chain-state and tuning
//! updates over each worker's control channel, and tracks scheduled wall
//! time per worker for the stats pipeline.

use crate::miner::hasher::{create_hasher, ControlMsg, WorkerContext};
use crate::miner::pow::ProofOfWork;
use crate::stats::SessionStats;
use crate::types::{ChainState, HasherMode, TuningState};
use crate::utils::error::MinerError;
use crate::utils::ids::uniqid;
use arc_swap::ArcSwapOption;
use crossbeam_channel::{unbounded, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Control endpoint of one live worker thread
struct WorkerHandle {
    ctrl: Sender<ControlMsg>,
    /// Cleared by the thread itself on exit
    alive: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// Spawns and steers the hasher threads
pub struct WorkerPool {
    mode: HasherMode,
    pow: Arc<dyn ProofOfWork>,
    ctx: WorkerContext,
    chain: Arc<ArcSwapOption<ChainState>>,
    max_hashers: usize,
    /// Monotonic spawn counter, part of every worker id
    spawned: u64,
    workers: HashMap<String, WorkerHandle>,
    /// When each worker's current scheduling interval began
    spawn_times: HashMap<String, Instant>,
}

impl WorkerPool {
    /// Builds an empty pool; workers are spawned by [`WorkerPool::top_up`].
    pub fn new(
        mode: HasherMode,
        pow: Arc<dyn ProofOfWork>,
        ctx: WorkerContext,
        chain: Arc<ArcSwapOption<ChainState>>,
        max_hashers: usize,
    ) -> Self {
        WorkerPool {
            mode,
            pow,
            ctx,
            chain,
            max_hashers,
            spawned: 0,
            workers: HashMap::new(),
            spawn_times: HashMap::new(),
        }
    }

    /// Live worker threads.
    pub fn live(&self) -> usize {
        self.workers.values().filter(|w| w.is_alive()).count()
    }

    /// Spawns one worker thread.
    pub fn spawn(&mut self, tuning: &TuningState) -> Result<(), MinerError> {
        let id = format!("{}-{}", self.spawned, uniqid());
        self.spawned += 1;

        let (ctrl_tx, ctrl_rx) = unbounded();
        let mut hasher = create_hasher(self.mode, self.pow.clone(), id.clone(), *tuning);
        if let Some(state) = self.chain.load_full() {
            hasher.update(state);
        }

        let alive = Arc::new(AtomicBool::new(true));
        let thread_alive = alive.clone();
        let ctx = self.ctx.clone();
        log::debug!("Spawning {} worker {}", hasher.kind(), hasher.id());
        std::thread::Builder::new()
            .name(format!("hasher-{}", hasher.id()))
            .spawn(move || {
                hasher.run(&ctx, ctrl_rx);
                thread_alive.store(false, Ordering::Release);
            })?;

        self.spawn_times.insert(id.clone(), Instant::now());
        self.workers.insert(id, WorkerHandle { ctrl: ctrl_tx, alive });
        Ok(())
    }

    /// Keeps the pool at the configured size, one spawn per call.
    pub fn top_up(&mut self, tuning: &TuningState) -> Result<(), MinerError> {
        self.workers.retain(|_, w| w.is_alive());
        if self.live() < self.max_hashers {
            self.spawn(tuning)?;
        }
        Ok(())
    }

    /// Final bookkeeping for an exiting worker; spawns a replacement while
    /// mining is active.
    pub fn on_worker_done(
        &mut self,
        stats: &mut SessionStats,
        tuning: &TuningState,
    ) -> Result<(), MinerError> {
        self.workers.remove(&stats.id);
        stats.scheduled_time = self
            .spawn_times
            .remove(&stats.id)
            .map(|t| t.elapsed())
            .unwrap_or(stats.hash_time);
        if self.ctx.active.load(Ordering::Acquire) {
            self.spawn(tuning)?;
        }
        Ok(())
    }

    /// Interval bookkeeping for a persistent worker that finished a session
    /// and keeps running; pushes the current tuning for its next session.
    pub fn on_session_done(&mut self, stats: &mut SessionStats, tuning: &TuningState) {
        let previous = self.spawn_times.insert(stats.id.clone(), Instant::now());
        stats.scheduled_time = previous
            .map(|t| t.elapsed())
            .unwrap_or(stats.hash_time);
        if let Some(worker) = self.workers.get(&stats.id) {
            if worker.ctrl.send(ControlMsg::Retune(*tuning)).is_err() {
                log::debug!("Worker {} control channel closed", stats.id);
            }
        }
    }

    /// Installs a fresh chain snapshot and pushes it to every live worker.
    pub fn broadcast(&mut self, state: Arc<ChainState>) {
        self.chain.store(Some(state.clone()));
        self.workers.retain(|_, w| w.is_alive());
        for (id, worker) in &self.workers {
            if worker.ctrl.send(ControlMsg::Update(state.clone())).is_err() {
                log::debug!("Worker {} control channel closed", id);
            }
        }
    }

    /// Asks every worker to finish its current session and exit.
    pub fn shutdown_all(&mut self) {
        for worker in self.workers.values() {
            let _ = worker.ctrl.send(ControlMsg::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::hasher::WorkerEvent;
    use crate::miner::testutil::{test_chain, MockPow, RecordingSink};
    use crate::miner::NoopCallbacks;
    use crate::stats::MinerMetrics;
    use crossbeam_channel::Receiver;
    use std::time::Duration;

    fn pool(
        max_hashers: usize,
        chain: Option<ChainState>,
    ) -> (WorkerPool, Receiver<WorkerEvent>) {
        let (events, events_rx) = unbounded();
        let ctx = WorkerContext {
            metrics: Arc::new(MinerMetrics::new()),
            sink: Arc::new(RecordingSink::default()),
            callbacks: Arc::new(NoopCallbacks),
            events,
            active: Arc::new(AtomicBool::new(true)),
        };
        let chain = Arc::new(ArcSwapOption::from_pointee(chain));
        let pool = WorkerPool::new(
            HasherMode::Standard,
            Arc::new(MockPow::constant(10_000)),
            ctx,
            chain,
            max_hashers,
        );
        (pool, events_rx)
    }

    fn tuning() -> TuningState {
        TuningState {
            hashes_per_session: 3,
            session_length: Duration::from_secs(5),
        }
    }

    #[test]
    fn top_up_spawns_one_worker_per_call() {
        let (mut pool, _events_rx) = pool(3, Some(test_chain()));
        pool.top_up(&tuning()).unwrap();
        assert_eq!(pool.spawned, 1);
        pool.top_up(&tuning()).unwrap();
        assert_eq!(pool.spawned, 2);
    }

    #[test]
    fn top_up_respects_the_worker_cap() {
        let (events, _events_rx) = unbounded();
        let ctx = WorkerContext {
            metrics: Arc::new(MinerMetrics::new()),
            sink: Arc::new(RecordingSink::default()),
            callbacks: Arc::new(NoopCallbacks),
            events,
            active: Arc::new(AtomicBool::new(true)),
        };
        let chain = Arc::new(ArcSwapOption::from_pointee(Some(test_chain())));
        // persistent workers stay alive, so the cap is actually exercised
        let mut pool = WorkerPool::new(
            HasherMode::Persistent,
            Arc::new(MockPow::constant(10_000)),
            ctx,
            chain,
            1,
        );

        pool.top_up(&tuning()).unwrap();
        pool.top_up(&tuning()).unwrap();
        pool.top_up(&tuning()).unwrap();
        assert_eq!(pool.spawned, 1);
        assert_eq!(pool.live(), 1);

        pool.ctx.active.store(false, Ordering::Release);
        pool.shutdown_all();
    }

    #[test]
    fn worker_ids_are_unique() {
        let (mut pool, _events_rx) = pool(2, Some(test_chain()));
        pool.spawn(&tuning()).unwrap();
        pool.spawn(&tuning()).unwrap();
        assert_eq!(pool.workers.len(), 2);
    }

    #[test]
    fn finished_standard_worker_is_replaced() {
        let (mut pool, events_rx) = pool(1, Some(test_chain()));
        pool.spawn(&tuning()).unwrap();

        let event = events_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker event");
        let mut stats = match event {
            WorkerEvent::WorkerDone(stats) => stats,
            WorkerEvent::SessionDone(_) => panic!("standard workers exit after one session"),
        };
        assert_eq!(stats.hashes, 3);

        pool.on_worker_done(&mut stats, &tuning()).unwrap();
        assert!(!stats.scheduled_time.is_zero());
        assert_eq!(pool.spawned, 2);

        // replacement produces its own event
        assert!(events_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn no_replacement_after_shutdown() {
        let (mut pool, events_rx) = pool(1, Some(test_chain()));
        pool.spawn(&tuning()).unwrap();

        let mut stats = match events_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(WorkerEvent::WorkerDone(stats)) => stats,
            _ => panic!("expected a WorkerDone event"),
        };
        pool.ctx.active.store(false, Ordering::Release);
        pool.on_worker_done(&mut stats, &tuning()).unwrap();
        assert_eq!(pool.spawned, 1);
    }

    #[test]
    fn broadcast_installs_the_snapshot_for_future_spawns() {
        let (mut pool, events_rx) = pool(1, None);
        pool.broadcast(Arc::new(test_chain()));
        pool.spawn(&tuning()).unwrap();

        // worker got the state at spawn and hashed a full session
        match events_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(WorkerEvent::WorkerDone(stats)) => assert_eq!(stats.hashes, 3),
            _ => panic!("expected a WorkerDone event"),
        }
    }
}
