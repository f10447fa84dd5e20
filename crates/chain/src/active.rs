//! The best-chain array and its queries.

use vitaed_consensus::Hash256;

use crate::index::{BlockId, BlockIndex};

/// Height-indexed view of the current best chain.
#[derive(Default)]
pub struct ActiveChain {
    chain: Vec<BlockId>,
}

impl ActiveChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn height(&self) -> i32 {
        self.chain.len() as i32 - 1
    }

    pub fn tip(&self) -> Option<BlockId> {
        self.chain.last().copied()
    }

    pub fn at(&self, height: i32) -> Option<BlockId> {
        if height < 0 {
            return None;
        }
        self.chain.get(height as usize).copied()
    }

    pub fn contains(&self, index: &BlockIndex, id: BlockId) -> bool {
        self.at(index.get(id).height) == Some(id)
    }

    pub fn next(&self, index: &BlockIndex, id: BlockId) -> Option<BlockId> {
        if self.contains(index, id) {
            self.at(index.get(id).height + 1)
        } else {
            None
        }
    }

    /// Point the chain at a new tip, rewriting entries back to the first
    /// slot that already matches. O(divergence length).
    pub fn set_tip(&mut self, index: &BlockIndex, tip: Option<BlockId>) {
        let Some(tip) = tip else {
            self.chain.clear();
            return;
        };
        let new_len = (index.get(tip).height + 1) as usize;
        if self.chain.len() > new_len {
            self.chain.truncate(new_len);
        } else {
            // grown slots hold a sentinel until the walk below fills them
            self.chain.resize(new_len, usize::MAX);
        }
        let mut walk = Some(tip);
        while let Some(id) = walk {
            let record = index.get(id);
            if self.chain[record.height as usize] == id {
                break;
            }
            self.chain[record.height as usize] = id;
            walk = record.prev;
        }
    }

    /// Hashes walking back from `from` (default: the tip) with steps that
    /// double after the first ten, ending at genesis.
    pub fn get_locator(&self, index: &BlockIndex, from: Option<BlockId>) -> Vec<Hash256> {
        let mut have = Vec::with_capacity(32);
        let mut step = 1i32;
        let mut walk = from.or_else(|| self.tip());

        while let Some(id) = walk {
            let record = index.get(id);
            have.push(record.hash);
            if record.height == 0 {
                break;
            }
            let height = (record.height - step).max(0);
            walk = if self.contains(index, id) {
                // O(1) through the height array
                self.at(height)
            } else {
                // O(log n) through the skip list
                index.ancestor(id, height)
            };
            if have.len() > 10 {
                step *= 2;
            }
        }

        have
    }

    /// Deepest common ancestor of `id` and the active chain.
    pub fn find_fork(&self, index: &BlockIndex, id: BlockId) -> Option<BlockId> {
        let mut walk = Some(id);
        if index.get(id).height > self.height() {
            walk = index.ancestor(id, self.height());
        }
        while let Some(id) = walk {
            if self.contains(index, id) {
                return Some(id);
            }
            walk = index.get(id).prev;
        }
        None
    }
}
