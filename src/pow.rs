//! Proof-of-work predicate and search.
//!
//! A proof `p` is valid against its predecessor `q` when the SHA-256 of the
//! decimal text of `p² - q²` starts with [`DIFFICULTY_PREFIX`]. The difference
//! is signed and is formatted with a leading `-` when negative; changing that
//! formatting changes every proof in the chain.

use crate::block::{compute_hash, Proof};
use crate::error::{ChainError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fixed difficulty target: leading hex characters of the digest.
pub const DIFFICULTY_PREFIX: &str = "0000";

/// The cancel flag is polled once per this many attempts.
const CANCEL_POLL_INTERVAL: u64 = 1024;

/// Digest of the proof relation between `new_proof` and `previous_proof`.
pub fn proof_digest(new_proof: Proof, previous_proof: Proof) -> String {
    let new = i128::from(new_proof);
    let previous = i128::from(previous_proof);
    let value = new * new - previous * previous;
    compute_hash(value.to_string().as_bytes())
}

/// Whether a digest meets the difficulty target.
pub fn meets_target(digest: &str) -> bool {
    digest.starts_with(DIFFICULTY_PREFIX)
}

/// Re-derive and check the predicate for a pair of proofs.
pub fn is_valid_proof(new_proof: Proof, previous_proof: Proof) -> bool {
    meets_target(&proof_digest(new_proof, previous_proof))
}

/// Linear search for the smallest positive proof satisfying the predicate.
///
/// Unbounded by default. A cap on attempts and a cancel flag can be attached;
/// both surface as errors rather than changing the search order, so for a
/// given previous proof any successful result is the same golden nonce.
#[derive(Debug, Clone, Default)]
pub struct ProofOfWork {
    max_attempts: Option<u64>,
    cancel: Option<Arc<AtomicBool>>,
}

impl ProofOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up after `attempts` candidates.
    pub fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Stop with [`ChainError::Cancelled`] once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn max_attempts(&self) -> Option<u64> {
        self.max_attempts
    }

    /// Find the golden nonce for `previous_proof`.
    pub fn search(&self, previous_proof: Proof) -> Result<Proof> {
        if previous_proof <= 0 {
            return Err(ChainError::InvalidPreviousProof(previous_proof));
        }

        let mut candidate: Proof = 1;
        let mut attempts: u64 = 0;
        loop {
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(ChainError::AttemptsExhausted {
                    previous_proof,
                    attempts,
                });
            }
            if attempts % CANCEL_POLL_INTERVAL == 0 && self.is_cancelled() {
                tracing::debug!(previous_proof, attempts, "proof search cancelled");
                return Err(ChainError::Cancelled);
            }

            attempts += 1;
            if is_valid_proof(candidate, previous_proof) {
                tracing::debug!(previous_proof, proof = candidate, attempts, "proof found");
                return Ok(candidate);
            }

            candidate = candidate
                .checked_add(1)
                .ok_or(ChainError::AttemptsExhausted {
                    previous_proof,
                    attempts,
                })?;
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
