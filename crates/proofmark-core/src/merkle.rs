//! Merkle roots over ordered proof hashes.
//!
//! Construction:
//! - leaves are the batch's `hash_full` values in creation order (no re-hashing)
//! - each level pairs adjacent nodes left to right:
//!   `node = sha256(left_bytes || right_bytes)` over the raw 32-byte digests
//! - an odd trailing node is carried up to the next level unchanged; it is
//!   never paired with itself
//! - a single leaf is its own root
//!
//! Example (leaves `sha256("a")`, `sha256("b")`, `sha256("c")`):
//!
//! ```text
//! level 0:  A        B        C
//! level 1:  H(A||B)           C      <- C carried
//! root:     H(H(A||B) || C)
//! ```

use crate::errors::{ProofmarkError, ProofmarkResult};
use crate::hash::{sha256, HashHex};

/// Compute the root of a non-empty ordered batch.
pub fn compute_merkle_root(hashes: &[HashHex]) -> ProofmarkResult<HashHex> {
    if hashes.is_empty() {
        return Err(ProofmarkError::EmptyBatch);
    }

    let mut level: Vec<[u8; 32]> = hashes.iter().map(HashHex::to_bytes).collect();
    while level.len() > 1 {
        level = next_level(&level);
    }

    Ok(HashHex::from_digest(level[0]))
}

fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut out = Vec::with_capacity(level.len().div_ceil(2));
    for pair in level.chunks(2) {
        match pair {
            [left, right] => out.push(hash_pair(left, right)),
            [odd] => out.push(*odd),
            _ => unreachable!("chunks(2) yields one or two elements"),
        }
    }
    out
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    sha256(&buf)
}
