// src/network/submit.rs
//! Submission pipeline: posts found solutions to the pool.
//!
//! Every candidate becomes a detached task on the runtime, intentionally
//! unstructured concurrency: a slow or blocked submission never delays
//! discovery of further solutions. Transport failures are retried with a
//! linear backoff up to a fixed cap; a semantic rejection from the pool is
//! final and never retried.

use crate::miner::hasher::SolutionSink;
use crate::miner::HostCallbacks;
use crate::network::telemetry::TelemetryPublisher;
use crate::stats::MinerMetrics;
use crate::types::Solution;
use crate::utils::error::MinerError;
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Consecutive transport failures after which a submission is abandoned
/// and counted as a reject.
pub const MAX_SUBMIT_FAILURES: u32 = 5;

/// Offset past which the encoded proof is posted; the prefix encodes the
/// fixed hard-fork parameters the pool already knows.
pub const ARGON_FRAGMENT_OFFSET: usize = 30;

/// Backoff unit between transport retries, scaled by the failure count.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    status: String,
}

/// Terminal result of one submission task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Whether the pool answered "ok"
    pub accepted: bool,
    /// Transport failures encountered along the way
    pub retries: u32,
}

/// Drives one submission to a terminal outcome.
///
/// `post` performs a single attempt: `Ok(true)` accepted, `Ok(false)`
/// semantically rejected (terminal), `Err` transport/protocol failure
/// (retried with backoff, abandoned after [`MAX_SUBMIT_FAILURES`]).
pub(crate) async fn submit_loop<F, Fut>(mut post: F) -> SubmitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, MinerError>>,
{
    let mut failures = 0u32;
    loop {
        match post().await {
            Ok(accepted) => {
                return SubmitOutcome {
                    accepted,
                    retries: failures,
                };
            }
            Err(e) => {
                failures += 1;
                log::warn!("Submit attempt failed ({}/{}): {}", failures, MAX_SUBMIT_FAILURES, e);
                if failures >= MAX_SUBMIT_FAILURES {
                    return SubmitOutcome {
                        accepted: false,
                        retries: failures,
                    };
                }
                tokio::time::sleep(RETRY_BACKOFF * failures).await;
            }
        }
    }
}

/// Posts solutions to the pool with bounded retry
///
/// Cheap to clone; every worker thread holds one and enqueues through it.
#[derive(Clone)]
pub struct Submitter {
    client: reqwest::Client,
    node: String,
    address: String,
    worker: String,
    metrics: Arc<MinerMetrics>,
    telemetry: TelemetryPublisher,
    callbacks: Arc<dyn HostCallbacks>,
    handle: tokio::runtime::Handle,
}

impl Submitter {
    /// Must be called from within the tokio runtime; submit tasks are
    /// spawned onto it later from worker threads.
    pub fn new(
        node: String,
        address: String,
        worker: String,
        metrics: Arc<MinerMetrics>,
        telemetry: TelemetryPublisher,
        callbacks: Arc<dyn HostCallbacks>,
    ) -> Self {
        Submitter {
            client: reqwest::Client::new(),
            node,
            address,
            worker,
            metrics,
            telemetry,
            callbacks,
            handle: tokio::runtime::Handle::current(),
        }
    }

    /// Detached submit task; no return value contract.
    pub fn enqueue(&self, solution: Solution) {
        let this = self.clone();
        self.handle.spawn(async move {
            this.run(solution).await;
        });
    }

    async fn run(&self, solution: Solution) {
        let outcome = submit_loop(|| {
            let this = self.clone();
            let solution = solution.clone();
            async move { this.post_nonce(&solution).await }
        })
        .await;

        if outcome.accepted {
            log::info!(
                "Nonce accepted: dl {} height {} after {} retries",
                solution.dl,
                solution.height,
                outcome.retries
            );
        } else {
            self.metrics.rejects.fetch_add(1, Ordering::Relaxed);
            self.callbacks.on_reject(&self.worker);
            log::warn!(
                "Nonce not accepted: dl {} height {} after {} retries",
                solution.dl,
                solution.height,
                outcome.retries
            );
        }
        self.telemetry
            .discovery(&self.worker, &solution, outcome.retries, outcome.accepted);
    }

    /// One POST attempt. `Ok(true)` accepted, `Ok(false)` rejected by the
    /// pool, `Err` transport or protocol failure.
    async fn post_nonce(&self, solution: &Solution) -> Result<bool, MinerError> {
        self.metrics.submits.fetch_add(1, Ordering::Relaxed);

        let fragment = solution
            .argon
            .get(ARGON_FRAGMENT_OFFSET..)
            .unwrap_or(&solution.argon);
        let height = solution.height.to_string();
        let form = [
            ("argon", fragment),
            ("nonce", solution.nonce.as_str()),
            ("private_key", self.address.as_str()),
            ("public_key", solution.public_key.as_str()),
            ("address", self.address.as_str()),
            ("height", height.as_str()),
        ];

        let resp = self
            .client
            .post(format!("{}/mine.php", self.node))
            .query(&[("q", "submitNonce")])
            .form(&form)
            .send()
            .await
            .map_err(|e| MinerError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MinerError::Transport(format!(
                "submit returned {}",
                resp.status()
            )));
        }

        let body: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| MinerError::Protocol(e.to_string()))?;
        if body.status == "ok" {
            Ok(true)
        } else {
            log::warn!("Raw submit failure: status {}", body.status);
            Ok(false)
        }
    }
}

impl SolutionSink for Submitter {
    fn submit(&self, solution: Solution) {
        self.enqueue(solution);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn accepted_on_first_attempt() {
        let outcome = submit_loop(|| async { Ok::<_, MinerError>(true) }).await;
        assert_eq!(
            outcome,
            SubmitOutcome {
                accepted: true,
                retries: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn semantic_rejection_is_terminal() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let outcome = submit_loop(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Ok::<_, MinerError>(false)
            }
        })
        .await;
        assert_eq!(
            outcome,
            SubmitOutcome {
                accepted: false,
                retries: 0
            }
        );
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandons_after_five_consecutive_transport_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let outcome = submit_loop(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Err::<bool, _>(MinerError::Transport("pool unreachable".into()))
            }
        })
        .await;
        assert_eq!(
            outcome,
            SubmitOutcome {
                accepted: false,
                retries: MAX_SUBMIT_FAILURES
            }
        );
        assert_eq!(calls.load(Ordering::Relaxed), MAX_SUBMIT_FAILURES);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let outcome = submit_loop(move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::Relaxed) < 2 {
                    Err(MinerError::Transport("flaky".into()))
                } else {
                    Ok(true)
                }
            }
        })
        .await;
        assert_eq!(
            outcome,
            SubmitOutcome {
                accepted: true,
                retries: 2
            }
        );
    }

    #[test]
    fn argon_fragment_offset_matches_encoded_prefix() {
        // Encoded proofs start with the fixed hard-fork parameter block;
        // the pool only wants what follows it.
        assert_eq!("$argon2i$v=19$m=524288,t=1,p=1".len(), ARGON_FRAGMENT_OFFSET);
    }
}
