// src/miner/pow.rs
//! Proof-of-work backend.
//!
//! The [`ProofOfWork`] trait is the seam between the session loops and the
//! actual hashing work; [`Argon2Pow`] is the production implementation,
//! backed by the `rust-argon2` and `sha2` crates. Tests substitute a cheap
//! mock so session and pool behavior can be exercised without real hashing.

use crate::types::ChainState;
use crate::utils::error::MinerError;
use argon2::{Config, Variant, Version};
use num_bigint::BigUint;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha512};
use std::time::{Duration, Instant};

/// Memory cost in KiB, fixed by the current hard fork.
const MEM_COST: u32 = 524_288;
/// Single-pass, single-lane, also fork-fixed.
const TIME_COST: u32 = 1;
const LANES: u32 = 1;
/// Raw hash length in bytes.
const HASH_LENGTH: u32 = 32;
/// Salt length used for every encoded proof.
const SALT_LENGTH: usize = 16;
/// Extra chained digest passes after the initial one.
const DIGEST_ROUNDS: usize = 5;
/// Digest byte positions concatenated (in decimal) into the duration.
const DL_OFFSETS: [usize; 8] = [10, 15, 20, 23, 31, 40, 45, 55];

/// Result of hashing one nonce
#[derive(Debug, Clone)]
pub struct ProofOutcome {
    /// Full encoded proof, parameters and salt included
    pub argon: String,
    /// Distance of this nonce from the block target
    pub dl: u64,
    /// Time spent in the memory-hard proof
    pub proof_time: Duration,
    /// Time spent in the auxiliary digest chain
    pub aux_time: Duration,
}

/// One proof-of-work evaluation: nonce in, encoded proof and distance out
pub trait ProofOfWork: Send + Sync {
    /// Short name for logs and telemetry.
    fn name(&self) -> &'static str;

    /// Hashes `nonce` against the given chain state.
    fn hash(&self, state: &ChainState, nonce: &str) -> Result<ProofOutcome, MinerError>;
}

/// Argon2i + chained SHA-512 proof of work
pub struct Argon2Pow {
    config: Config<'static>,
}

impl Argon2Pow {
    /// Builds the backend with the fork-fixed parameters.
    pub fn new() -> Self {
        Argon2Pow {
            config: Config {
                variant: Variant::Argon2i,
                version: Version::Version13,
                mem_cost: MEM_COST,
                time_cost: TIME_COST,
                lanes: LANES,
                hash_length: HASH_LENGTH,
                ..Config::default()
            },
        }
    }
}

impl Default for Argon2Pow {
    fn default() -> Self {
        Self::new()
    }
}

impl ProofOfWork for Argon2Pow {
    fn name(&self) -> &'static str {
        "argon2i"
    }

    fn hash(&self, state: &ChainState, nonce: &str) -> Result<ProofOutcome, MinerError> {
        let base = format!(
            "{}-{}-{}-{}",
            state.public_key, nonce, state.block, state.difficulty
        );
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_LENGTH)
            .map(char::from)
            .collect();
        let proof_started = Instant::now();
        let argon = argon2::hash_encoded(base.as_bytes(), salt.as_bytes(), &self.config)?;
        let proof_time = proof_started.elapsed();

        let aux_started = Instant::now();
        let digest = chained_digest(&base, &argon);
        let duration = duration_from_digest(&digest);
        let dl = distance(&duration, &state.difficulty);
        let aux_time = aux_started.elapsed();

        Ok(ProofOutcome {
            argon,
            dl,
            proof_time,
            aux_time,
        })
    }
}

/// SHA-512 over base+proof, then the configured number of re-hash passes.
fn chained_digest(base: &str, argon: &str) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(base.as_bytes());
    hasher.update(argon.as_bytes());
    let mut digest = hasher.finalize();
    for _ in 0..DIGEST_ROUNDS {
        digest = Sha512::digest(&digest);
    }
    digest.into()
}

/// Decimal concatenation of the selected digest bytes.
fn duration_from_digest(digest: &[u8; 64]) -> BigUint {
    let mut duration = BigUint::default();
    for &offset in &DL_OFFSETS {
        let byte = digest[offset];
        let scale: u32 = match byte {
            0..=9 => 10,
            10..=99 => 100,
            _ => 1000,
        };
        duration = duration * scale + byte;
    }
    duration
}

/// Distance from target: duration over difficulty, clamped into u64.
fn distance(duration: &BigUint, difficulty: &BigUint) -> u64 {
    if *difficulty == BigUint::default() {
        return u64::MAX;
    }
    u64::try_from(&(duration / difficulty)).unwrap_or(u64::MAX)
}
