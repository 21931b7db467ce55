//! # Merkle History
//!
//! Append-only binary Merkle tree over ledger-entry digests, hashed as in
//! RFC 6962:
//!
//! ```text
//! leaf  = SHA256(0x00 || entry_digest)
//! node  = SHA256(0x01 || left || right)
//! empty = SHA256("")
//! ```
//!
//! The tree keeps one perfect-subtree root ("peak") per set bit of the leaf
//! count, largest first. Appending merges equal-height peaks, and the root is
//! the right-to-left fold of the peaks. The pair `{leaf_count, peaks}` is the
//! [`MerkleFrontier`]: enough to continue the tree and to recompute its root.

use serde::{Deserialize, Serialize};
use shared_crypto::{sha256, sha256_many};
use shared_types::Hash;

use crate::errors::IntegrityFault;

/// Domain prefix for leaf hashes.
pub const LEAF_PREFIX: u8 = 0x00;
/// Domain prefix for interior node hashes.
pub const NODE_PREFIX: u8 = 0x01;

/// Hash of a leaf carrying `entry_digest`.
pub fn leaf_hash(entry_digest: &Hash) -> Hash {
    sha256_many(&[&[LEAF_PREFIX], entry_digest])
}

/// Hash of an interior node.
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    sha256_many(&[&[NODE_PREFIX], left, right])
}

/// Root of the empty tree.
pub fn empty_root() -> Hash {
    sha256(b"")
}

/// Compact resumable state of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MerkleFrontier {
    /// Number of leaves.
    pub leaf_count: u64,
    /// Perfect-subtree roots, largest subtree first.
    pub peaks: Vec<Hash>,
}

impl MerkleFrontier {
    /// Check `peaks.len() == popcount(leaf_count)`.
    pub fn validate_shape(&self) -> Result<(), IntegrityFault> {
        let expected = self.leaf_count.count_ones() as usize;
        if self.peaks.len() != expected {
            return Err(IntegrityFault::MalformedTree(format!(
                "{} leaves need {} peaks, found {}",
                self.leaf_count,
                expected,
                self.peaks.len()
            )));
        }
        Ok(())
    }

    /// Root the frontier folds to.
    pub fn root(&self) -> Result<Hash, IntegrityFault> {
        self.validate_shape()?;
        Ok(fold_peaks(&self.peaks))
    }

    /// Frontier after appending one more entry.
    pub fn extend(&self, entry_digest: &Hash) -> Result<Self, IntegrityFault> {
        self.validate_shape()?;
        let mut next = self.clone();
        push_leaf(&mut next.peaks, self.leaf_count, leaf_hash(entry_digest));
        next.leaf_count += 1;
        Ok(next)
    }

    /// Serialized form stored in a signature's `tree` field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IntegrityFault> {
        bincode::serialize(self).map_err(|e| IntegrityFault::MalformedTree(e.to_string()))
    }

    /// Decode and shape-check a serialized frontier.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IntegrityFault> {
        let frontier: Self =
            bincode::deserialize(bytes).map_err(|e| IntegrityFault::MalformedTree(e.to_string()))?;
        frontier.validate_shape()?;
        Ok(frontier)
    }
}

/// Push a leaf hash onto `peaks` for a tree that held `leaf_count` leaves.
///
/// Each trailing one bit of `leaf_count` is a peak of matching height that
/// the new subtree absorbs.
fn push_leaf(peaks: &mut Vec<Hash>, leaf_count: u64, leaf: Hash) {
    let mut carry = leaf;
    for _ in 0..leaf_count.trailing_ones() {
        // Shape was validated by the caller, so the pop cannot miss.
        let Some(left) = peaks.pop() else { break };
        carry = node_hash(&left, &carry);
    }
    peaks.push(carry);
}

fn fold_peaks(peaks: &[Hash]) -> Hash {
    let mut iter = peaks.iter().rev();
    let Some(last) = iter.next() else {
        return empty_root();
    };
    iter.fold(*last, |acc, peak| node_hash(peak, &acc))
}

/// Proof that one leaf is included in a tree of a given size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Zero-based leaf index.
    pub leaf_index: u64,
    /// Tree size the proof is for.
    pub tree_size: u64,
    /// Sibling hashes, leaf to root.
    pub path: Vec<Hash>,
}

/// Full append-only tree: leaf hashes for proofs, peaks for the root.
#[derive(Debug, Clone, Default)]
pub struct MerkleHistory {
    leaves: Vec<Hash>,
    peaks: Vec<Hash>,
}

impl MerkleHistory {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree over `digests`, in order.
    pub fn from_digests<'a>(digests: impl IntoIterator<Item = &'a Hash>) -> Self {
        let mut history = Self::new();
        for digest in digests {
            history.append(digest);
        }
        history
    }

    /// Append one entry digest; returns its leaf index.
    pub fn append(&mut self, entry_digest: &Hash) -> u64 {
        let index = self.len();
        let leaf = leaf_hash(entry_digest);
        push_leaf(&mut self.peaks, index, leaf);
        self.leaves.push(leaf);
        index
    }

    /// Number of leaves.
    pub fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// True if no entry has been appended.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Current root.
    pub fn root(&self) -> Hash {
        fold_peaks(&self.peaks)
    }

    /// Current frontier.
    pub fn frontier(&self) -> MerkleFrontier {
        MerkleFrontier {
            leaf_count: self.len(),
            peaks: self.peaks.clone(),
        }
    }

    /// Root of the first `size` leaves.
    pub fn root_at(&self, size: u64) -> Option<Hash> {
        let size = usize::try_from(size).ok()?;
        self.leaves.get(..size).map(subtree_root)
    }

    /// Inclusion proof for `leaf_index` against the current tree.
    pub fn inclusion_proof(&self, leaf_index: u64) -> Option<InclusionProof> {
        let index = usize::try_from(leaf_index).ok()?;
        if index >= self.leaves.len() {
            return None;
        }
        Some(InclusionProof {
            leaf_index,
            tree_size: self.len(),
            path: audit_path(index, &self.leaves),
        })
    }

    /// Check `proof` places `entry_digest` under `root`.
    pub fn verify_inclusion(proof: &InclusionProof, entry_digest: &Hash, root: &Hash) -> bool {
        if proof.leaf_index >= proof.tree_size {
            return false;
        }
        let mut node_index = proof.leaf_index;
        let mut last_index = proof.tree_size - 1;
        let mut hash = leaf_hash(entry_digest);

        for sibling in &proof.path {
            if last_index == 0 {
                return false;
            }
            if node_index & 1 == 1 || node_index == last_index {
                hash = node_hash(sibling, &hash);
                while node_index & 1 == 0 && node_index != 0 {
                    node_index >>= 1;
                    last_index >>= 1;
                }
            } else {
                hash = node_hash(&hash, sibling);
            }
            node_index >>= 1;
            last_index >>= 1;
        }
        last_index == 0 && hash == *root
    }
}

/// Largest power of two strictly below `n` (`n >= 2`).
fn split_point(n: usize) -> usize {
    1 << (usize::BITS - 1 - (n - 1).leading_zeros())
}

fn subtree_root(leaves: &[Hash]) -> Hash {
    match leaves.len() {
        0 => empty_root(),
        1 => leaves[0],
        n => {
            let k = split_point(n);
            node_hash(&subtree_root(&leaves[..k]), &subtree_root(&leaves[k..]))
        }
    }
}

fn audit_path(index: usize, leaves: &[Hash]) -> Vec<Hash> {
    if leaves.len() <= 1 {
        return Vec::new();
    }
    let k = split_point(leaves.len());
    let (mut path, sibling) = if index < k {
        (audit_path(index, &leaves[..k]), subtree_root(&leaves[k..]))
    } else {
        (audit_path(index - k, &leaves[k..]), subtree_root(&leaves[..k]))
    };
    path.push(sibling);
    path
}
