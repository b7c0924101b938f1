use crate::canonical::to_canonical_vec;
use crate::error::{ChainError, Result};
use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 hash as hex string, used as the block's identity for linkage.
pub type BlockHash = String;

/// Proof-of-work value sealing a block. Always positive.
pub type Proof = i64;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// A sealed block. Only obtainable through [`PendingBlock::finalize`], so the
/// index and hash are always set together.
///
/// Serializes with fields in the order `data, timestamp, index,
/// previous_hash, proof, hash`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Block {
    pub(crate) data: Value,
    pub(crate) timestamp: String,
    pub(crate) index: u64,
    pub(crate) previous_hash: BlockHash,
    pub(crate) proof: Proof,
    pub(crate) hash: BlockHash,
}

/// A block that has its payload, proof and link but no position yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBlock {
    data: Value,
    timestamp: String,
    previous_hash: BlockHash,
    proof: Proof,
}

/// The fields covered by a block hash. `proof` and `hash` are not part of it.
#[derive(Serialize)]
struct HashInput<'a> {
    data: &'a Value,
    timestamp: &'a str,
    index: u64,
    previous_hash: &'a str,
}

impl PendingBlock {
    /// Start a block stamped with the current local time.
    pub fn new(proof: Proof, data: Value, previous_hash: impl Into<BlockHash>) -> Result<Self> {
        Self::with_timestamp(proof, data, previous_hash, Local::now().naive_local())
    }

    /// Start a block with an explicit timestamp (for testing / determinism).
    pub fn with_timestamp(
        proof: Proof,
        data: Value,
        previous_hash: impl Into<BlockHash>,
        timestamp: NaiveDateTime,
    ) -> Result<Self> {
        if proof <= 0 {
            return Err(ChainError::InvalidProof(proof));
        }
        Ok(Self {
            data,
            timestamp: format_timestamp(&timestamp),
            previous_hash: previous_hash.into(),
            proof,
        })
    }

    /// Assign the block's position and seal it with its hash.
    pub fn finalize(self, index: u64) -> Result<Block> {
        let hash = hash_fields(&self.data, &self.timestamp, index, &self.previous_hash)?;
        Ok(Block {
            data: self.data,
            timestamp: self.timestamp,
            index,
            previous_hash: self.previous_hash,
            proof: self.proof,
            hash,
        })
    }
}

impl Block {
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn proof(&self) -> Proof {
        self.proof
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Recompute the hash from the block's current fields. The stored hash is
    /// left untouched.
    pub fn content_hash(&self) -> Result<BlockHash> {
        hash_fields(&self.data, &self.timestamp, self.index, &self.previous_hash)
    }

    /// Verify the block's integrity.
    pub fn verify(&self) -> bool {
        self.content_hash()
            .map(|hash| hash == self.hash)
            .unwrap_or(false)
    }
}

/// Compute the SHA-256 hex digest of some data.
pub fn compute_hash(data: &[u8]) -> BlockHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn hash_fields(data: &Value, timestamp: &str, index: u64, previous_hash: &str) -> Result<BlockHash> {
    let encoded = to_canonical_vec(&HashInput {
        data,
        timestamp,
        index,
        previous_hash,
    })?;
    Ok(compute_hash(&encoded))
}

/// `YYYY-MM-DD HH:MM:SS.ffffff`, dropping the fraction when it is zero.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    let mut out = ts.format("%Y-%m-%d %H:%M:%S").to_string();
    let micros = (ts.nanosecond() / 1_000) % 1_000_000;
    if micros != 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    out
}
