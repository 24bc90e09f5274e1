// src/network/sync.rs
//! Pool sync: polls the pool's info endpoint and turns changes into fresh
//! immutable [`ChainState`] snapshots.
//!
//! Single-flight by construction: the control loop is the only caller and
//! awaits each poll, and a poll is skipped entirely when less than half the
//! base update delay has elapsed since the previous attempt. The HTTP call
//! carries short connect/read timeouts so a stalled network stack cannot
//! wedge the loop.

use crate::types::{ChainState, DEFAULT_LIMIT};
use crate::utils::error::MinerError;
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Connect and read timeout for the info request.
const FETCH_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Deserialize)]
struct InfoEnvelope {
    status: String,
    #[serde(default)]
    data: Option<InfoData>,
}

#[derive(Debug, Deserialize)]
struct InfoData {
    block: String,
    difficulty: String,
    #[serde(default = "default_limit", deserialize_with = "lenient_u64")]
    limit: u64,
    public_key: String,
    height: u64,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

/// Pools have served `limit` both as a number and as a quoted string.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("limit out of range")),
        serde_json::Value::String(s) => s
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("limit not numeric: {}", e))),
        _ => Err(serde::de::Error::custom("limit has unexpected type")),
    }
}

/// Validated payload of one successful info response
#[derive(Debug, Clone, PartialEq)]
pub struct PoolInfo {
    /// Opaque block descriptor
    pub block: String,
    /// Current difficulty, arbitrary precision
    pub difficulty: BigUint,
    /// Submission floor
    pub limit: u64,
    /// Public key proofs must be bound to
    pub public_key: String,
    /// Block height
    pub height: u64,
}

/// Parses and validates an info response body.
pub(crate) fn parse_info(body: &str) -> Result<PoolInfo, MinerError> {
    let envelope: InfoEnvelope = serde_json::from_str(body)?;
    if envelope.status != "ok" {
        return Err(MinerError::Protocol(format!(
            "update status {}",
            envelope.status
        )));
    }
    let data = envelope
        .data
        .ok_or_else(|| MinerError::Protocol("update missing data".into()))?;
    let difficulty = BigUint::from_str(data.difficulty.trim())
        .map_err(|e| MinerError::Protocol(format!("bad difficulty: {}", e)))?;
    Ok(PoolInfo {
        block: data.block,
        difficulty,
        limit: data.limit,
        public_key: data.public_key,
        height: data.height,
    })
}

/// A fresh snapshot together with what kind of change produced it
#[derive(Debug)]
pub struct StateChange {
    /// The rebuilt snapshot
    pub state: ChainState,
    /// The block descriptor itself changed, so per-block markers are stale
    pub block_changed: bool,
}

/// Builds the next snapshot when anything the workers care about changed.
///
/// Field-by-field comparison of block descriptor, difficulty, height and
/// limit; identical info yields `None` so repeats are never re-broadcast.
/// A missing current state counts as a block change.
pub fn next_chain_state(current: Option<&ChainState>, info: &PoolInfo) -> Option<StateChange> {
    let block_changed = current.map_or(true, |c| c.block != info.block);
    let changed = block_changed
        || current.is_some_and(|c| {
            c.difficulty != info.difficulty || c.height != info.height || c.limit != info.limit
        });
    changed.then(|| StateChange {
        state: ChainState {
            block: info.block.clone(),
            difficulty: info.difficulty.clone(),
            limit: info.limit,
            public_key: info.public_key.clone(),
            height: info.height,
            updated_at: Instant::now(),
        },
        block_changed,
    })
}

/// Rolling min/avg/max over one reporting window
#[derive(Debug, Default)]
struct LatencyWindow {
    sum: Duration,
    count: u32,
    min: Option<Duration>,
    max: Option<Duration>,
}

impl LatencyWindow {
    fn record(&mut self, sample: Duration) {
        self.sum += sample;
        self.count += 1;
        self.min = Some(self.min.map_or(sample, |m| m.min(sample)));
        self.max = Some(self.max.map_or(sample, |m| m.max(sample)));
    }

    fn reset(&mut self) {
        *self = LatencyWindow::default();
    }

    fn summary(&self) -> String {
        if self.count == 0 {
            return "n/a".into();
        }
        format!(
            "avg {:?} min {:?} max {:?}",
            self.sum / self.count,
            self.min.unwrap_or_default(),
            self.max.unwrap_or_default()
        )
    }
}

/// Result of one poll attempt
#[derive(Debug)]
pub enum SyncOutcome {
    /// Too soon since the previous attempt; nothing was sent
    Skipped,
    /// Transport, status or decode failure; no state change, retried next tick
    Failed,
    /// Pool answered with the state we already hold
    Unchanged,
    /// Pool reported a change; a fresh snapshot was built
    Changed {
        /// The rebuilt snapshot, ready to broadcast
        state: Arc<ChainState>,
        /// The block descriptor itself changed, so per-block markers are stale
        block_changed: bool,
    },
}

/// Client for the pool's info endpoint
pub struct UpdateClient {
    client: reqwest::Client,
    node: String,
    worker: String,
    address: String,
    min_gap: Duration,
    last_attempt: Option<Instant>,
    /// Whether the pool has seen our hash rate since the last resend window
    sent_rate: bool,
    skips: u32,
    failures: u32,
    updates: u32,
    fetch_latency: LatencyWindow,
    parse_latency: LatencyWindow,
}

impl UpdateClient {
    /// Builds the client; `min_gap` is the smallest spacing between two
    /// non-startup poll attempts.
    pub fn new(
        node: String,
        worker: String,
        address: String,
        min_gap: Duration,
    ) -> Result<Self, MinerError> {
        let client = reqwest::Client::builder()
            .connect_timeout(FETCH_TIMEOUT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(UpdateClient {
            client,
            node,
            worker,
            address,
            min_gap,
            last_attempt: None,
            sent_rate: false,
            skips: 0,
            failures: 0,
            updates: 0,
            fetch_latency: LatencyWindow::default(),
            parse_latency: LatencyWindow::default(),
        })
    }

    /// Marks the identity/hash-rate resend due again (supercycle wrap).
    pub fn mark_rate_stale(&mut self) {
        self.sent_rate = false;
    }

    /// Resets the per-window latency stats and counters.
    pub fn reset_window(&mut self) {
        self.fetch_latency.reset();
        self.parse_latency.reset();
        self.skips = 0;
        self.failures = 0;
        self.updates = 0;
    }

    /// One-line fetch/decode latency digest for the current window.
    pub fn latency_summary(&self) -> String {
        format!(
            "fetch [{}] decode [{}] ({} updates, {} failures, {} skips)",
            self.fetch_latency.summary(),
            self.parse_latency.summary(),
            self.updates,
            self.failures,
            self.skips
        )
    }

    /// One poll attempt against the pool.
    ///
    /// `first_run` bypasses the single-flight gap check (startup retries
    /// pace themselves) and forces the address to be sent. `resend_identity`
    /// re-attaches address and aggregate hash rate once per resend window to
    /// limit pool load.
    pub async fn poll(
        &mut self,
        current: Option<&ChainState>,
        first_run: bool,
        resend_identity: bool,
        hashrate: f64,
    ) -> SyncOutcome {
        if !first_run {
            if let Some(last) = self.last_attempt {
                if last.elapsed() < self.min_gap {
                    self.skips += 1;
                    return SyncOutcome::Skipped;
                }
            }
        }
        self.last_attempt = Some(Instant::now());

        let mut query: Vec<(&str, String)> = vec![
            ("q", "info".to_string()),
            ("worker", self.worker.clone()),
        ];
        if first_run || (!self.sent_rate && resend_identity) {
            query.push(("address", self.address.clone()));
        }
        if !self.sent_rate && resend_identity {
            query.push(("hashrate", format!("{:.3}", hashrate)));
            self.sent_rate = true;
        }

        let fetch_started = Instant::now();
        let resp = match self
            .client
            .get(format!("{}/mine.php", self.node))
            .query(&query)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                self.failures += 1;
                log::warn!("Pool update failed: {}", e);
                return SyncOutcome::Failed;
            }
        };
        if !resp.status().is_success() {
            self.failures += 1;
            log::warn!("Pool update returned {}", resp.status());
            return SyncOutcome::Failed;
        }
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                self.failures += 1;
                log::warn!("Pool update read failed: {}", e);
                return SyncOutcome::Failed;
            }
        };
        self.fetch_latency.record(fetch_started.elapsed());

        let parse_started = Instant::now();
        let info = match parse_info(&body) {
            Ok(info) => info,
            Err(e) => {
                self.failures += 1;
                log::warn!("Pool update rejected: {}", e);
                return SyncOutcome::Failed;
            }
        };
        self.parse_latency.record(parse_started.elapsed());
        self.updates += 1;

        match next_chain_state(current, &info) {
            None => SyncOutcome::Unchanged,
            Some(change) => SyncOutcome::Changed {
                state: Arc::new(change.state),
                block_changed: change.block_changed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_BODY: &str = r#"{"status":"ok","data":{"block":"A","difficulty":"100",
        "limit":240,"public_key":"PK","height":10}}"#;

    #[test]
    fn parses_well_formed_info() {
        let info = parse_info(INFO_BODY).unwrap();
        assert_eq!(info.block, "A");
        assert_eq!(info.difficulty, BigUint::from(100u32));
        assert_eq!(info.limit, 240);
        assert_eq!(info.height, 10);
    }

    #[test]
    fn parses_limit_served_as_string() {
        let body = r#"{"status":"ok","data":{"block":"A","difficulty":"1",
            "limit":"512","public_key":"PK","height":1}}"#;
        assert_eq!(parse_info(body).unwrap().limit, 512);
    }

    #[test]
    fn non_ok_status_is_a_protocol_failure() {
        let body = r#"{"status":"error","data":null}"#;
        assert!(matches!(
            parse_info(body),
            Err(MinerError::Protocol(_))
        ));
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert!(parse_info("not json").is_err());
        assert!(parse_info(r#"{"status":"ok"}"#).is_err());
    }

    #[test]
    fn identical_info_does_not_rebuild_state() {
        let info = parse_info(INFO_BODY).unwrap();
        let first = next_chain_state(None, &info).expect("initial state");
        // identical repeat: idempotent, no re-broadcast
        assert!(next_chain_state(Some(&first.state), &info).is_none());
    }

    #[test]
    fn any_field_change_rebuilds_state() {
        let info = parse_info(INFO_BODY).unwrap();
        let first = next_chain_state(None, &info).unwrap().state;

        let mut bumped = info.clone();
        bumped.difficulty = BigUint::from(101u32);
        assert!(next_chain_state(Some(&first), &bumped).is_some());

        let mut taller = info.clone();
        taller.height = 11;
        assert!(next_chain_state(Some(&first), &taller).is_some());

        let mut new_block = info;
        new_block.block = "B".into();
        let next = next_chain_state(Some(&first), &new_block).unwrap();
        assert_ne!(next.state.block, first.block);
    }

    #[test]
    fn only_descriptor_changes_flag_a_block_change() {
        let info = parse_info(INFO_BODY).unwrap();

        // no prior state: per-block markers have nothing to carry over
        let first = next_chain_state(None, &info).unwrap();
        assert!(first.block_changed);
        let current = first.state;

        // difficulty, height and limit moves keep the marker alive
        let mut bumped = info.clone();
        bumped.difficulty = BigUint::from(101u32);
        assert!(!next_chain_state(Some(&current), &bumped).unwrap().block_changed);

        let mut taller = info.clone();
        taller.height = 11;
        assert!(!next_chain_state(Some(&current), &taller).unwrap().block_changed);

        let mut wider = info.clone();
        wider.limit = 512;
        assert!(!next_chain_state(Some(&current), &wider).unwrap().block_changed);

        // a new descriptor resets it
        let mut new_block = info;
        new_block.block = "B".into();
        assert!(next_chain_state(Some(&current), &new_block).unwrap().block_changed);
    }

    #[test]
    fn latency_window_tracks_min_avg_max() {
        let mut w = LatencyWindow::default();
        w.record(Duration::from_millis(10));
        w.record(Duration::from_millis(30));
        assert_eq!(w.min, Some(Duration::from_millis(10)));
        assert_eq!(w.max, Some(Duration::from_millis(30)));
        assert_eq!(w.sum / w.count, Duration::from_millis(20));
        w.reset();
        assert_eq!(w.count, 0);
        assert_eq!(w.summary(), "n/a");
    }
}
