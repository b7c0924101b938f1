use crate::block::{Block, BlockHash, PendingBlock, Proof, GENESIS_PREVIOUS_HASH};
use crate::error::{ChainError, Result};
use crate::pow::{is_valid_proof, ProofOfWork};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Proof of the genesis block.
pub const GENESIS_PROOF: Proof = 1;

/// An append-only sequence of sealed blocks, never empty.
///
/// Single writer: callers that share a chain between threads must serialize
/// access themselves (the HTTP service wraps it in a mutex).
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    pow: ProofOfWork,
}

/// What the miner reports back for a freshly appended block.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MinedBlock {
    pub index: u64,
    pub timestamp: String,
    pub proof: Proof,
    pub previous_hash: BlockHash,
    pub hash: BlockHash,
}

impl From<&Block> for MinedBlock {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index(),
            timestamp: block.timestamp().to_string(),
            proof: block.proof(),
            previous_hash: block.previous_hash().to_string(),
            hash: block.hash().to_string(),
        }
    }
}

/// Why a block failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// `index` does not match the block's position.
    IndexGap,
    /// `previous_hash` differs from the predecessor's hash.
    Linkage,
    /// The proof does not satisfy the predicate against the predecessor's proof.
    ProofOfWork,
    /// The stored hash differs from the hash of the block's fields.
    HashMismatch,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Fault::IndexGap => "index out of sequence",
            Fault::Linkage => "previous hash does not match predecessor",
            Fault::ProofOfWork => "proof does not meet difficulty target",
            Fault::HashMismatch => "stored hash does not match contents",
        };
        f.write_str(text)
    }
}

/// Outcome of a full validation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Number of blocks in the chain that was walked.
    pub length: usize,
    /// First failing block index and the reason, if any.
    pub failure: Option<(u64, Fault)>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }

    pub fn message(&self) -> &'static str {
        if self.is_valid() {
            "The blockchain is valid"
        } else {
            "The blockchain is not valid"
        }
    }
}

impl Chain {
    /// Create a chain holding only the genesis block.
    pub fn new(genesis_data: impl Into<Value>) -> Result<Self> {
        Self::with_pow(genesis_data, ProofOfWork::new())
    }

    /// Create a chain whose mining uses the given search settings.
    pub fn with_pow(genesis_data: impl Into<Value>, pow: ProofOfWork) -> Result<Self> {
        let mut chain = Self {
            blocks: Vec::new(),
            pow,
        };
        chain.create_block(GENESIS_PROOF, genesis_data.into(), GENESIS_PREVIOUS_HASH)?;
        tracing::debug!(hash = %chain.blocks[0].hash(), "genesis block created");
        Ok(chain)
    }

    // ── Core operations ───────────────────────────────────────

    /// Seal a new block at the tail and return it.
    pub fn create_block(
        &mut self,
        proof: Proof,
        data: Value,
        previous_hash: impl Into<BlockHash>,
    ) -> Result<&Block> {
        let index = self.blocks.len() as u64 + 1;
        let block = PendingBlock::new(proof, data, previous_hash)?.finalize(index)?;
        self.blocks.push(block);
        self.get_previous_block()
    }

    /// The last block in the chain.
    pub fn get_previous_block(&self) -> Result<&Block> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    /// Find the golden nonce following `previous_proof`.
    pub fn proof_of_work(&self, previous_proof: Proof) -> Result<Proof> {
        self.pow.search(previous_proof)
    }

    /// Whether every link, proof and hash in the chain checks out.
    pub fn is_chain_valid(&self) -> bool {
        self.verify().is_valid()
    }

    /// Walk the chain from genesis and stop at the first faulty block.
    ///
    /// Linkage and proofs are checked from the second block on; the index and
    /// stored hash of every block, genesis included, are re-derived as well.
    pub fn verify(&self) -> ChainReport {
        let mut previous: Option<&Block> = None;
        for (position, block) in self.blocks.iter().enumerate() {
            if let Some(fault) = check_block(position, block, previous) {
                tracing::warn!(index = block.index(), %fault, "chain validation failed");
                return ChainReport {
                    length: self.blocks.len(),
                    failure: Some((block.index(), fault)),
                };
            }
            previous = Some(block);
        }
        ChainReport {
            length: self.blocks.len(),
            failure: None,
        }
    }

    // ── Service-facing API ────────────────────────────────────

    /// Mine `data` onto the tail: previous block, proof search, append.
    pub fn mine(&mut self, data: Value) -> Result<MinedBlock> {
        let previous = self.get_previous_block()?;
        let previous_proof = previous.proof();
        let previous_hash = previous.hash().to_string();

        let proof = self.proof_of_work(previous_proof)?;
        let block = self.create_block(proof, data, previous_hash)?;
        tracing::info!(index = block.index(), proof, hash = %block.hash(), "block mined");
        Ok(MinedBlock::from(block))
    }

    /// Snapshots of every block, genesis first.
    pub fn list_blocks(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false for a constructed chain.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn check_block(position: usize, block: &Block, previous: Option<&Block>) -> Option<Fault> {
    if block.index() != position as u64 + 1 {
        return Some(Fault::IndexGap);
    }
    if let Some(prev) = previous {
        if block.previous_hash() != prev.hash() {
            return Some(Fault::Linkage);
        }
        if !is_valid_proof(block.proof(), prev.proof()) {
            return Some(Fault::ProofOfWork);
        }
    }
    if !block.verify() {
        return Some(Fault::HashMismatch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::proof_digest;
    use serde_json::json;

    fn mined_chain(blocks: usize) -> Chain {
        let mut chain = Chain::new("Genesis block").unwrap();
        for i in 0..blocks {
            chain.mine(json!({ "n": i })).unwrap();
        }
        chain
    }

    #[test]
    fn genesis_invariant() {
        let chain = Chain::new("Genesis block").unwrap();
        assert_eq!(chain.len(), 1);
        let genesis = &chain.blocks()[0];
        assert_eq!(genesis.index(), 1);
        assert_eq!(genesis.previous_hash(), "0");
        assert_eq!(genesis.proof(), 1);
        assert_eq!(genesis.data(), &json!("Genesis block"));
        assert!(chain.is_chain_valid());
    }

    #[test]
    fn indices_are_sequential_and_linked() {
        let chain = mined_chain(2);
        assert_eq!(chain.len(), 3);
        for (i, block) in chain.blocks().iter().enumerate() {
            assert_eq!(block.index(), i as u64 + 1);
        }
        for pair in chain.blocks().windows(2) {
            assert_eq!(pair[1].previous_hash(), pair[0].hash());
        }
        assert_eq!(chain.blocks()[1].proof(), 533);
        assert_eq!(chain.blocks()[2].proof(), 45293);
    }

    #[test]
    fn chain_built_by_hand_is_valid() {
        let mut chain = Chain::new("Genesis block").unwrap();
        for payload in ["a", "b"] {
            let prev = chain.get_previous_block().unwrap();
            let (prev_proof, prev_hash) = (prev.proof(), prev.hash().to_string());
            let proof = chain.proof_of_work(prev_proof).unwrap();
            chain.create_block(proof, json!(payload), prev_hash).unwrap();
        }
        assert!(chain.is_chain_valid());
        assert_eq!(chain.verify().message(), "The blockchain is valid");
    }

    #[test]
    fn scenario_mine_then_tamper_linkage() {
        let mut chain = Chain::new("Genesis block").unwrap();
        let mined = chain.mine(json!({"x": 1})).unwrap();

        assert_eq!(mined.index, 2);
        assert_eq!(mined.previous_hash, chain.blocks()[0].hash());
        assert!(proof_digest(mined.proof, 1).starts_with("0000"));
        assert!(chain.is_chain_valid());

        chain.blocks[1].previous_hash = "not-a-real-hash".into();
        assert!(!chain.is_chain_valid());
        let report = chain.verify();
        assert_eq!(report.failure, Some((2, Fault::Linkage)));
        assert_eq!(report.message(), "The blockchain is not valid");
    }

    #[test]
    fn tampered_data_detected() {
        let mut chain = mined_chain(1);
        chain.blocks[0].data = json!("Forged genesis");
        assert_eq!(chain.verify().failure, Some((1, Fault::HashMismatch)));

        let mut chain = mined_chain(1);
        chain.blocks[1].data = json!({"n": 42});
        assert_eq!(chain.verify().failure, Some((2, Fault::HashMismatch)));
    }

    #[test]
    fn rehashed_forgery_breaks_linkage() {
        let mut chain = mined_chain(2);
        chain.blocks[1].data = json!("forged");
        chain.blocks[1].hash = chain.blocks[1].content_hash().unwrap();
        assert_eq!(chain.verify().failure, Some((3, Fault::Linkage)));
    }

    #[test]
    fn tampered_proof_detected() {
        let mut chain = mined_chain(1);
        chain.blocks[1].proof = 534;
        assert_eq!(chain.verify().failure, Some((2, Fault::ProofOfWork)));

        let mut chain = mined_chain(1);
        chain.blocks[0].proof = 2;
        assert_eq!(chain.verify().failure, Some((2, Fault::ProofOfWork)));
    }

    #[test]
    fn tampered_timestamp_detected() {
        let mut chain = mined_chain(1);
        chain.blocks[1].timestamp = "1999-12-31 23:59:59".into();
        assert!(!chain.is_chain_valid());
    }

    #[test]
    fn index_gap_detected() {
        let mut chain = mined_chain(1);
        chain.blocks[1].index = 5;
        assert_eq!(chain.verify().failure, Some((5, Fault::IndexGap)));
    }

    #[test]
    fn validation_does_not_mutate() {
        let mut chain = mined_chain(1);
        chain.blocks[1].previous_hash = "x".into();
        let before = chain.list_blocks();
        assert!(!chain.is_chain_valid());
        assert_eq!(chain.blocks(), before.as_slice());
    }

    #[test]
    fn empty_chain_has_no_previous_block() {
        let chain = Chain {
            blocks: Vec::new(),
            pow: ProofOfWork::new(),
        };
        assert!(matches!(chain.get_previous_block(), Err(ChainError::EmptyChain)));
    }

    #[test]
    fn create_block_rejects_non_positive_proof() {
        let mut chain = Chain::new("g").unwrap();
        let tail = chain.get_previous_block().unwrap().hash().to_string();
        assert!(matches!(
            chain.create_block(0, json!(1), tail),
            Err(ChainError::InvalidProof(0))
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn failed_mining_leaves_chain_untouched() {
        let mut chain = Chain::with_pow("g", ProofOfWork::new().with_max_attempts(10)).unwrap();
        assert!(matches!(
            chain.mine(json!(1)),
            Err(ChainError::AttemptsExhausted { attempts: 10, .. })
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn snapshots_are_detached() {
        let chain = mined_chain(1);
        let mut snapshot = chain.list_blocks();
        snapshot[1].data = json!("edited copy");
        assert!(chain.is_chain_valid());
        assert_ne!(chain.blocks()[1].data(), snapshot[1].data());
    }
}
