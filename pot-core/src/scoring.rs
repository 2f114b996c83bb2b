//! Draw Scoring
//!
//! Each entry hash is `sha256(sign_key || decimal(id))` in lowercase hex. At
//! draw time every hash is compared against the anchor block hash position
//! by position; the entries with the highest number of matching hex digits
//! win. Ids are visited in increasing order, so the result depends only on
//! the signing key, the block hash and the entry count.

use sha2::{Digest, Sha256};

use crate::types::EntryId;

/// Digest of (id, cycle signing key)
pub fn sign_entry(id: EntryId, sign_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sign_key.as_bytes());
    hasher.update(id.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Count positions where both strings hold the same character (ASCII case-insensitive)
pub fn hash_match_align(a: &str, b: &str) -> usize {
    a.bytes()
        .zip(b.bytes())
        .filter(|(x, y)| x.eq_ignore_ascii_case(y))
        .count()
}

/// Running maximum score and the entries that reach it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scoreboard {
    highest: usize,
    winners: Vec<EntryId>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one entry's score. A strictly higher score restarts the winner set.
    pub fn observe(&mut self, id: EntryId, score: usize) {
        if score > self.highest {
            self.highest = score;
            self.winners.clear();
        }
        if score == self.highest {
            self.winners.push(id);
        }
    }

    pub fn highest(&self) -> usize {
        self.highest
    }

    pub fn winners(&self) -> &[EntryId] {
        &self.winners
    }

    pub fn into_winners(self) -> Vec<EntryId> {
        self.winners
    }
}

/// Score entries `1..=total` against the anchor block hash
pub fn score_entries(total: u64, sign_key: &str, block_hash: &str) -> Scoreboard {
    let mut board = Scoreboard::new();
    for id in 1..=total {
        board.observe(id, hash_match_align(block_hash, &sign_entry(id, sign_key)));
    }
    board
}
