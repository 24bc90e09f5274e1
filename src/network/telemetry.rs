// src/network/telemetry.rs
//! Best-effort stats reporting to an external collector.
//!
//! Fire-and-forget: every publish spawns a detached task with no return
//! value contract, intentionally unstructured; a slow collector must never
//! block or fail the mining path. Failures are logged and swallowed. When
//! no stats host is configured the publisher is inert.

use crate::types::Solution;
use std::sync::Arc;

struct Inner {
    client: reqwest::Client,
    host: String,
    invoke: String,
    token: String,
    handle: tokio::runtime::Handle,
}

/// Publishes periodic reports and discovery events to the stats host
#[derive(Clone)]
pub struct TelemetryPublisher {
    inner: Option<Arc<Inner>>,
}

impl TelemetryPublisher {
    /// Builds an active publisher. Must be called from within the tokio
    /// runtime so detached publish tasks can be spawned later from worker
    /// threads.
    pub fn new(host: String, invoke: String, token: String) -> Self {
        TelemetryPublisher {
            inner: Some(Arc::new(Inner {
                client: reqwest::Client::new(),
                host,
                invoke,
                token,
                handle: tokio::runtime::Handle::current(),
            })),
        }
    }

    /// A publisher that drops everything; used when no stats host is
    /// configured.
    pub fn disabled() -> Self {
        TelemetryPublisher { inner: None }
    }

    /// Periodic aggregate report: hashes and elapsed window time.
    pub fn report(&self, id: &str, kind: &str, hashes: u64, elapsed_ms: u64) {
        let Some(inner) = &self.inner else { return };
        let query = vec![
            ("q".to_string(), "report".to_string()),
            ("token".to_string(), inner.token.clone()),
            ("id".to_string(), id.to_string()),
            ("type".to_string(), kind.to_string()),
            ("hashes".to_string(), hashes.to_string()),
            ("elapsed".to_string(), elapsed_ms.to_string()),
        ];
        Self::publish(inner.clone(), query);
    }

    /// Discovery event for a submitted solution, accepted or not.
    pub fn discovery(&self, id: &str, solution: &Solution, retries: u32, accepted: bool) {
        let Some(inner) = &self.inner else { return };
        let mut query = vec![
            ("q".to_string(), "discovery".to_string()),
            ("token".to_string(), inner.token.clone()),
            ("id".to_string(), id.to_string()),
            ("type".to_string(), solution.kind.to_string()),
            ("nonce".to_string(), solution.nonce.clone()),
            ("argon".to_string(), solution.argon.clone()),
            ("difficulty".to_string(), solution.difficulty.to_string()),
            ("dl".to_string(), solution.dl.to_string()),
            ("retries".to_string(), retries.to_string()),
        ];
        if accepted {
            query.push(("confirmed".to_string(), String::new()));
        }
        Self::publish(inner.clone(), query);
    }

    fn publish(inner: Arc<Inner>, query: Vec<(String, String)>) {
        inner.handle.clone().spawn(async move {
            let url = format!("{}/{}", inner.host, inner.invoke);
            match inner.client.get(&url).query(&query).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    log::warn!("Failed to report stats: {}", resp.status());
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("Failed to report stats: {}", e);
                }
            }
        });
    }
}
