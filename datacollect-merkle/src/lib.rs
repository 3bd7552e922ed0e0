//! Append-only Merkle hash tree over the event log.
//!
//! Each leaf is `H(eventGuid)`; each internal node is `H(left ‖ right)`,
//! with the last leaf of an odd-sized level duplicated against itself so
//! every level above the leaves halves in size. `H` is SHA-256,
//! hex-encoded throughout — matching the storage adapter's hex node
//! representation, so persisted nodes can be compared byte-for-byte with
//! a clean rebuild.
//!
//! The tree recomputes its levels from the leaf sequence on every
//! `root()`/`proof()` call rather than maintaining an incrementally
//! patched spine; for the event-log scale this engine targets that is
//! cheap enough, and it sidesteps an entire class of cache-invalidation
//! bugs a partial-rebuild implementation would need to get right.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

use datacollect_types::EventGuid;

/// A SHA-256 hash, stored and compared as its hex encoding.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash(String);

impl Hash {
    /// Hashes arbitrary bytes.
    #[must_use]
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Combines two child hashes into their parent's hash.
    #[must_use]
    pub fn combine(left: &Hash, right: &Hash) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(left.0.as_bytes());
        hasher.update(right.0.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wraps an already-hex-encoded hash (e.g. loaded from storage).
    #[must_use]
    pub fn from_hex(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn leaf_hash(guid: &EventGuid) -> Hash {
    Hash::digest(guid.to_string().as_bytes())
}

/// An append-only log of event guids, with Merkle membership proofs.
#[derive(Debug, Clone, Default)]
pub struct MerkleLog {
    leaves: Vec<Hash>,
    index: HashMap<EventGuid, usize>,
}

impl MerkleLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from an ordered sequence of event guids — the
    /// event store's `init` path: the log is never loaded as a tree
    /// directly, only replayed from the event list it is authoritative
    /// over.
    #[must_use]
    pub fn rebuild<I: IntoIterator<Item = EventGuid>>(guids: I) -> Self {
        let mut log = Self::new();
        for guid in guids {
            log.append(guid);
        }
        log
    }

    /// Appends a new leaf for `guid`. A guid already present is a no-op —
    /// the event store only calls this once per accepted (non-duplicate)
    /// event, but idempotence here costs nothing and avoids a corrupt
    /// tree if a caller retries.
    pub fn append(&mut self, guid: EventGuid) {
        if self.index.contains_key(&guid) {
            return;
        }
        let idx = self.leaves.len();
        self.leaves.push(leaf_hash(&guid));
        self.index.insert(guid, idx);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// The current root hash, hex-encoded, or `""` when the log is empty.
    #[must_use]
    pub fn root(&self) -> String {
        match levels(&self.leaves).last() {
            Some(top) if !top.is_empty() => top[0].as_hex().to_string(),
            _ => String::new(),
        }
    }

    /// The ordered sibling-hash path from `guid`'s leaf to the root, or
    /// `None` if `guid` was never appended.
    #[must_use]
    pub fn proof(&self, guid: &EventGuid) -> Option<Vec<Hash>> {
        let mut idx = *self.index.get(guid)?;
        let levels = levels(&self.leaves);
        let mut path = Vec::new();
        for level in &levels[..levels.len().saturating_sub(1)] {
            let sibling_idx = idx ^ 1;
            let sibling = if sibling_idx < level.len() { &level[sibling_idx] } else { &level[idx] };
            path.push(sibling.clone());
            idx /= 2;
        }
        Some(path)
    }

    /// Replays `proof` starting from `guid`'s leaf hash and checks the
    /// result equals `expected_root`. Returns `false` if `guid` is not in
    /// the current log — including when the log was rebuilt after a
    /// guid was tampered with, since the original guid then no longer
    /// resolves to any leaf.
    #[must_use]
    pub fn verify(&self, guid: &EventGuid, proof: &[Hash], expected_root: &str) -> bool {
        let Some(&start_idx) = self.index.get(guid) else { return false };
        let mut idx = start_idx;
        let mut current = leaf_hash(guid);
        for sibling in proof {
            current = if idx % 2 == 0 { Hash::combine(&current, sibling) } else { Hash::combine(sibling, &current) };
            idx /= 2;
        }
        current.as_hex() == expected_root
    }
}

/// Builds every level of the tree bottom-up from the leaf hashes,
/// duplicating the last hash of an odd-sized level.
fn levels(leaves: &[Hash]) -> Vec<Vec<Hash>> {
    if leaves.is_empty() {
        return Vec::new();
    }
    let mut levels = vec![leaves.to_vec()];
    while levels.last().unwrap().len() > 1 {
        let current = levels.last().unwrap();
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        let mut i = 0;
        while i < current.len() {
            let left = &current[i];
            let right = if i + 1 < current.len() { &current[i + 1] } else { left };
            next.push(Hash::combine(left, right));
            i += 2;
        }
        levels.push(next);
    }
    levels
}
