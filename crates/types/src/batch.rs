use thiserror::Error;

use crate::{block::Block, commit::Commit};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch is empty")]
    Empty,
    #[error("batch spans [{start}..{end}] but carries {blocks} blocks and {commits} commits")]
    LengthMismatch { start: u64, end: u64, blocks: usize, commits: usize },
    #[error("expected block at height {expected}, found {found}")]
    NonContiguous { expected: u64, found: u64 },
    #[error("commit at height {0} does not match its block")]
    CommitMismatch(u64),
}

/// A contiguous range of blocks submitted together to DA and referenced on
/// the settlement layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    pub start_height: u64,
    pub end_height: u64,
    pub blocks: Vec<Block>,
    pub commits: Vec<Commit>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Check the structural invariants: `end = start + len - 1`, paired
    /// blocks and commits, contiguous heights.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.blocks.is_empty() {
            return Err(BatchError::Empty);
        }
        let span = self.end_height - self.start_height + 1;
        if span != self.blocks.len() as u64 || self.blocks.len() != self.commits.len() {
            return Err(BatchError::LengthMismatch {
                start: self.start_height,
                end: self.end_height,
                blocks: self.blocks.len(),
                commits: self.commits.len(),
            });
        }
        for (i, (block, commit)) in self.blocks.iter().zip(&self.commits).enumerate() {
            let expected = self.start_height + i as u64;
            if block.header.height != expected {
                return Err(BatchError::NonContiguous { expected, found: block.header.height });
            }
            if commit.height != expected {
                return Err(BatchError::CommitMismatch(expected));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Header;

    fn block_at(height: u64) -> (Block, Commit) {
        let block = Block {
            header: Header { height, chain_id: "test-chain".into(), ..Default::default() },
            ..Default::default()
        };
        let commit = Commit { height, ..Default::default() };
        (block, commit)
    }

    fn batch(range: std::ops::RangeInclusive<u64>) -> Batch {
        let (blocks, commits) = range.clone().map(block_at).unzip();
        Batch { start_height: *range.start(), end_height: *range.end(), blocks, commits }
    }

    #[test]
    fn contiguous_batch_is_valid() {
        assert_eq!(batch(4..=6).validate(), Ok(()));
    }

    #[test]
    fn rejects_empty() {
        let b = Batch { start_height: 1, end_height: 0, ..Default::default() };
        assert_eq!(b.validate(), Err(BatchError::Empty));
    }

    #[test]
    fn rejects_gap() {
        let mut b = batch(4..=6);
        b.blocks[1].header.height = 9;
        assert_eq!(b.validate(), Err(BatchError::NonContiguous { expected: 5, found: 9 }));
    }

    #[test]
    fn rejects_span_mismatch() {
        let mut b = batch(4..=6);
        b.end_height = 7;
        assert!(matches!(b.validate(), Err(BatchError::LengthMismatch { .. })));
    }
}
