// src/miner/hasher.rs
//! Session workers.
//!
//! A hasher owns one OS thread and grinds nonces in bounded sessions. Two
//! flavors exist: [`StandardHasher`] runs a single session and exits (the
//! pool respawns a fresh thread), [`PersistentHasher`] loops sessions on one
//! long-lived thread. Both consume control messages between sessions only,
//! so an in-flight hash is never torn.

use crate::miner::pow::ProofOfWork;
use crate::miner::HostCallbacks;
use crate::stats::{MinerMetrics, SessionStats};
use crate::types::{ChainState, HasherMode, Solution, TuningState, BLOCK_FOUND_DL};
use crossbeam_channel::{Receiver, Sender};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Nonce length in characters.
const NONCE_LENGTH: usize = 32;

/// Sleep applied when no chain state has arrived yet.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Where found solutions go; the production sink is the submitter.
pub trait SolutionSink: Send + Sync {
    /// Hands off one solution; must not block the hash loop.
    fn submit(&self, solution: Solution);
}

/// Control messages pushed to a worker between sessions
pub enum ControlMsg {
    /// New chain state snapshot
    Update(Arc<ChainState>),
    /// New session quota and budget
    Retune(TuningState),
    /// Finish the current session and exit
    Shutdown,
}

/// Completion events flowing back to the control loop
pub enum WorkerEvent {
    /// Thread is exiting; stats cover its final session (empty for
    /// persistent workers, whose sessions were already reported)
    WorkerDone(SessionStats),
    /// A persistent worker finished one session and keeps running
    SessionDone(SessionStats),
}

/// Shared environment handed to every worker thread
#[derive(Clone)]
pub struct WorkerContext {
    /// Cumulative process-wide counters
    pub metrics: Arc<MinerMetrics>,
    /// Destination for found solutions
    pub sink: Arc<dyn SolutionSink>,
    /// Host integration points
    pub callbacks: Arc<dyn HostCallbacks>,
    /// Completion events back to the control loop
    pub events: Sender<WorkerEvent>,
    /// Cleared once, on shutdown or fault; workers observe it per hash
    pub active: Arc<AtomicBool>,
}

/// A session worker bound to one thread
pub trait Hasher: Send {
    /// Worker identity, stable for the worker's lifetime.
    fn id(&self) -> &str;

    /// Strategy tag ("standard", "persistent").
    fn kind(&self) -> &'static str;

    /// False once a shutdown message has been consumed.
    fn is_active(&self) -> bool;

    /// Installs chain state before the thread starts.
    fn update(&mut self, state: Arc<ChainState>);

    /// Thread body; returns when the worker is done. Tuning and further
    /// chain updates arrive over `ctrl` and apply at session boundaries.
    fn run(&mut self, ctx: &WorkerContext, ctrl: Receiver<ControlMsg>);
}

/// Builds a hasher for the configured mode.
pub fn create_hasher(
    mode: HasherMode,
    pow: Arc<dyn ProofOfWork>,
    id: String,
    tuning: TuningState,
) -> Box<dyn Hasher> {
    match mode {
        HasherMode::Standard => Box::new(StandardHasher {
            core: SessionCore::new(pow, id, "standard", tuning),
        }),
        HasherMode::Persistent => Box::new(PersistentHasher {
            core: SessionCore::new(pow, id, "persistent", tuning),
        }),
    }
}

/// Random alphanumeric nonce.
pub(crate) fn random_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Shared session machinery for both hasher flavors
struct SessionCore {
    pow: Arc<dyn ProofOfWork>,
    id: String,
    kind: &'static str,
    chain: Option<Arc<ChainState>>,
    /// Hashes attempted per session
    quota: u64,
    /// Wall-time cap per session (twice the target length)
    budget: Duration,
    /// Cleared by a shutdown message
    running: bool,
}

impl SessionCore {
    fn new(pow: Arc<dyn ProofOfWork>, id: String, kind: &'static str, tuning: TuningState) -> Self {
        SessionCore {
            pow,
            id,
            kind,
            chain: None,
            quota: tuning.hashes_per_session,
            budget: tuning.session_budget(),
            running: true,
        }
    }

    /// Applies everything queued on the control channel.
    fn drain(&mut self, ctrl: &Receiver<ControlMsg>) {
        while let Ok(msg) = ctrl.try_recv() {
            match msg {
                ControlMsg::Update(state) => self.chain = Some(state),
                ControlMsg::Retune(tuning) => {
                    self.quota = tuning.hashes_per_session;
                    self.budget = tuning.session_budget();
                }
                ControlMsg::Shutdown => self.running = false,
            }
        }
    }

    /// One bounded session: up to `quota` hashes or `budget` wall time.
    fn run_session(&mut self, ctx: &WorkerContext) -> SessionStats {
        let mut stats = SessionStats::new(self.id.clone(), self.kind);
        let Some(chain) = self.chain.clone() else {
            std::thread::sleep(IDLE_WAIT);
            return stats;
        };
        let difficulty = u64::try_from(&chain.difficulty).unwrap_or(u64::MAX);

        let started = Instant::now();
        for _ in 0..self.quota {
            if !ctx.active.load(Ordering::Acquire) || started.elapsed() > self.budget {
                break;
            }

            let nonce = random_nonce();
            let outcome = match self.pow.hash(&chain, &nonce) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Worker {}: hashing failed: {}", self.id, e);
                    break;
                }
            };

            stats.hashes += 1;
            ctx.metrics.hashes.fetch_add(1, Ordering::Relaxed);
            stats.proof_time += outcome.proof_time;
            stats.aux_time += outcome.aux_time;

            if outcome.dl < stats.best_dl {
                stats.best_dl = outcome.dl;
                if ctx.metrics.record_best_dl(outcome.dl) {
                    ctx.callbacks.on_dur_change(outcome.dl);
                }
            }

            if outcome.dl <= chain.limit {
                let classification = if outcome.dl <= BLOCK_FOUND_DL {
                    stats.finds += 1;
                    ctx.callbacks.on_find(&self.id);
                    "block"
                } else {
                    stats.shares += 1;
                    ctx.callbacks.on_share(&self.id);
                    "share"
                };
                log::info!(
                    "Worker {}: {} found, dl {} (limit {})",
                    self.id,
                    classification,
                    outcome.dl,
                    chain.limit
                );
                ctx.sink.submit(Solution {
                    nonce,
                    argon: outcome.argon,
                    dl: outcome.dl,
                    difficulty,
                    kind: self.kind,
                    public_key: chain.public_key.clone(),
                    height: chain.height,
                });
            }
        }
        stats.hash_time = started.elapsed();
        stats.overhead_time = stats.hash_time.saturating_sub(stats.proof_time);
        stats
    }
}

/// One session per thread; the pool respawns after every exit
pub struct StandardHasher {
    core: SessionCore,
}

impl Hasher for StandardHasher {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn kind(&self) -> &'static str {
        self.core.kind
    }

    fn is_active(&self) -> bool {
        self.core.running
    }

    fn update(&mut self, state: Arc<ChainState>) {
        self.core.chain = Some(state);
    }

    fn run(&mut self, ctx: &WorkerContext, ctrl: Receiver<ControlMsg>) {
        self.core.drain(&ctrl);
        let stats = if self.core.running && ctx.active.load(Ordering::Acquire) {
            self.core.run_session(ctx)
        } else {
            SessionStats::new(self.core.id.clone(), self.core.kind)
        };
        if ctx.events.send(WorkerEvent::WorkerDone(stats)).is_err() {
            log::debug!("Worker {}: event channel closed", self.core.id);
        }
    }
}

/// Long-lived thread looping sessions until shut down
pub struct PersistentHasher {
    core: SessionCore,
}

impl Hasher for PersistentHasher {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn kind(&self) -> &'static str {
        self.core.kind
    }

    fn is_active(&self) -> bool {
        self.core.running
    }

    fn update(&mut self, state: Arc<ChainState>) {
        self.core.chain = Some(state);
    }

    fn run(&mut self, ctx: &WorkerContext, ctrl: Receiver<ControlMsg>) {
        loop {
            self.core.drain(&ctrl);
            if !self.core.running || !ctx.active.load(Ordering::Acquire) {
                // sessions were already reported; exit with an empty record
                let stats = SessionStats::new(self.core.id.clone(), self.core.kind);
                let _ = ctx.events.send(WorkerEvent::WorkerDone(stats));
                return;
            }
            let stats = self.core.run_session(ctx);
            if ctx.events.send(WorkerEvent::SessionDone(stats)).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::testutil::{test_chain, MockPow, RecordingSink};
    use crate::miner::NoopCallbacks;
    use crate::types::NO_DL;
    use crossbeam_channel::unbounded;

    fn context(sink: Arc<RecordingSink>) -> (WorkerContext, Receiver<WorkerEvent>) {
        let (events, events_rx) = unbounded();
        let ctx = WorkerContext {
            metrics: Arc::new(MinerMetrics::new()),
            sink,
            callbacks: Arc::new(NoopCallbacks),
            events,
            active: Arc::new(AtomicBool::new(true)),
        };
        (ctx, events_rx)
    }

    fn tuning(quota: u64) -> TuningState {
        TuningState {
            hashes_per_session: quota,
            session_length: Duration::from_secs(5),
        }
    }

    #[test]
    fn hasher_exposes_identity_and_liveness() {
        let pow = Arc::new(MockPow::constant(10_000));
        let mut hasher =
            create_hasher(HasherMode::Persistent, pow, "w7".into(), tuning(1));
        assert_eq!(hasher.id(), "w7");
        assert_eq!(hasher.kind(), "persistent");
        assert!(hasher.is_active());

        let sink = Arc::new(RecordingSink::default());
        let (ctx, _events_rx) = context(sink);
        ctx.active.store(false, Ordering::Release);
        let (tx, ctrl_rx) = unbounded();
        tx.send(ControlMsg::Shutdown).unwrap();
        hasher.run(&ctx, ctrl_rx);
        assert!(!hasher.is_active());
    }

    #[test]
    fn nonce_is_alphanumeric_and_sized() {
        let nonce = random_nonce();
        assert_eq!(nonce.len(), NONCE_LENGTH);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn standard_hasher_runs_one_session_and_exits() {
        let sink = Arc::new(RecordingSink::default());
        let (ctx, events_rx) = context(sink);
        let pow = Arc::new(MockPow::constant(10_000));
        let mut hasher =
            create_hasher(HasherMode::Standard, pow, "w1".into(), tuning(8));
        hasher.update(Arc::new(test_chain()));

        let (_tx, ctrl_rx) = unbounded();
        hasher.run(&ctx, ctrl_rx);

        match events_rx.try_recv() {
            Ok(WorkerEvent::WorkerDone(stats)) => {
                assert_eq!(stats.hashes, 8);
                assert_eq!(stats.shares, 0);
                assert_eq!(stats.best_dl, 10_000);
            }
            _ => panic!("expected a WorkerDone event"),
        }
        assert!(events_rx.try_recv().is_err());
    }

    #[test]
    fn solutions_are_classified_and_submitted() {
        let sink = Arc::new(RecordingSink::default());
        let (ctx, events_rx) = context(sink.clone());
        // one block find, one share, one miss
        let pow = Arc::new(MockPow::sequence(vec![100, 300, 5000]));
        let mut hasher =
            create_hasher(HasherMode::Standard, pow, "w1".into(), tuning(3));
        hasher.update(Arc::new(test_chain()));

        let (_tx, ctrl_rx) = unbounded();
        hasher.run(&ctx, ctrl_rx);

        let solutions = sink.taken();
        assert_eq!(solutions.len(), 2);
        // the solution carries the worker strategy tag for telemetry;
        // find/share classification shows up in the session counters
        assert_eq!(solutions[0].kind, "standard");
        assert_eq!(solutions[0].dl, 100);
        assert_eq!(solutions[1].kind, "standard");
        assert_eq!(solutions[1].dl, 300);

        match events_rx.try_recv() {
            Ok(WorkerEvent::WorkerDone(stats)) => {
                assert_eq!(stats.finds, 1);
                assert_eq!(stats.shares, 1);
                assert_eq!(stats.best_dl, 100);
            }
            _ => panic!("expected a WorkerDone event"),
        }
    }

    #[test]
    fn shutdown_before_start_skips_the_session() {
        let sink = Arc::new(RecordingSink::default());
        let (ctx, events_rx) = context(sink);
        let pow = Arc::new(MockPow::constant(10_000));
        let mut hasher =
            create_hasher(HasherMode::Standard, pow, "w1".into(), tuning(100));
        hasher.update(Arc::new(test_chain()));

        let (tx, ctrl_rx) = unbounded();
        tx.send(ControlMsg::Shutdown).unwrap();
        hasher.run(&ctx, ctrl_rx);

        match events_rx.try_recv() {
            Ok(WorkerEvent::WorkerDone(stats)) => {
                assert_eq!(stats.hashes, 0);
                assert_eq!(stats.best_dl, NO_DL);
            }
            _ => panic!("expected a WorkerDone event"),
        }
    }

    #[test]
    fn persistent_hasher_reports_sessions_then_exits_empty() {
        let sink = Arc::new(RecordingSink::default());
        let (ctx, events_rx) = context(sink);
        let pow = Arc::new(MockPow::constant(10_000));
        let mut hasher =
            create_hasher(HasherMode::Persistent, pow, "w1".into(), tuning(4));
        hasher.update(Arc::new(test_chain()));

        let (tx, ctrl_rx) = unbounded();
        let handle = std::thread::spawn({
            let mut hasher = hasher;
            let ctx = ctx.clone();
            move || hasher.run(&ctx, ctrl_rx)
        });

        // first session report arrives while the thread keeps running
        let first = events_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("session event");
        match first {
            WorkerEvent::SessionDone(stats) => assert_eq!(stats.hashes, 4),
            WorkerEvent::WorkerDone(_) => panic!("worker exited early"),
        }

        tx.send(ControlMsg::Shutdown).unwrap();
        handle.join().unwrap();

        // the terminal event is an empty WorkerDone
        let mut saw_exit = false;
        while let Ok(event) = events_rx.try_recv() {
            match event {
                WorkerEvent::SessionDone(stats) => assert_eq!(stats.hashes, 4),
                WorkerEvent::WorkerDone(stats) => {
                    assert_eq!(stats.hashes, 0);
                    saw_exit = true;
                }
            }
        }
        assert!(saw_exit);
    }

    #[test]
    fn retune_applies_to_the_next_session() {
        let sink = Arc::new(RecordingSink::default());
        let (ctx, events_rx) = context(sink);
        let pow = Arc::new(MockPow::constant(10_000));
        let mut hasher =
            create_hasher(HasherMode::Standard, pow, "w1".into(), tuning(2));
        hasher.update(Arc::new(test_chain()));

        let (tx, ctrl_rx) = unbounded();
        tx.send(ControlMsg::Retune(tuning(7))).unwrap();
        hasher.run(&ctx, ctrl_rx);

        match events_rx.try_recv() {
            Ok(WorkerEvent::WorkerDone(stats)) => assert_eq!(stats.hashes, 7),
            _ => panic!("expected a WorkerDone event"),
        }
    }

    #[test]
    fn cleared_active_flag_stops_hashing() {
        let sink = Arc::new(RecordingSink::default());
        let (ctx, events_rx) = context(sink);
        ctx.active.store(false, Ordering::Release);
        let pow = Arc::new(MockPow::constant(10_000));
        let mut hasher =
            create_hasher(HasherMode::Standard, pow, "w1".into(), tuning(100));
        hasher.update(Arc::new(test_chain()));

        let (_tx, ctrl_rx) = unbounded();
        hasher.run(&ctx, ctrl_rx);

        match events_rx.try_recv() {
            Ok(WorkerEvent::WorkerDone(stats)) => assert_eq!(stats.hashes, 0),
            _ => panic!("expected a WorkerDone event"),
        }
    }
}
