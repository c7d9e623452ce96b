//! Upload planning for the data phase of `download`.
//!
//! The body is sent as whole blocks followed by at most one remainder
//! block sized exactly to what is left, so the byte count on the wire
//! always equals the size announced in the `download` command.

use std::io::{Seek, SeekFrom};

/// Split of an upload into full blocks plus a remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    pub total: usize,
    pub block_size: usize,
    pub full_blocks: usize,
    pub remainder: usize,
}

impl BlockPlan {
    pub fn new(total: usize, block_size: usize) -> Self {
        Self {
            total,
            block_size,
            full_blocks: total / block_size,
            remainder: total % block_size,
        }
    }

    /// Number of writes the data phase performs.
    pub fn transfers(&self) -> usize {
        self.full_blocks + usize::from(self.remainder > 0)
    }

    /// Sizes of each write, in order.
    pub fn block_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::repeat_n(self.block_size, self.full_blocks)
            .chain((self.remainder > 0).then_some(self.remainder))
    }
}

/// Bytes left in `source` from its current position to the end.
///
/// The read cursor is restored before returning.
pub fn remaining_len<S: Seek>(source: &mut S) -> std::io::Result<u64> {
    let start = source.stream_position()?;
    let end = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(start))?;
    Ok(end.saturating_sub(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::BLOCK_SIZE;
    use std::io::Cursor;

    #[test]
    fn test_plan_with_remainder() {
        let plan = BlockPlan::new(BLOCK_SIZE * 2 + 100, BLOCK_SIZE);
        assert_eq!(plan.full_blocks, 2);
        assert_eq!(plan.remainder, 100);
        assert_eq!(plan.transfers(), 3);
        let sizes: Vec<_> = plan.block_sizes().collect();
        assert_eq!(sizes, vec![BLOCK_SIZE, BLOCK_SIZE, 100]);
    }

    #[test]
    fn test_plan_exact_multiple() {
        let plan = BlockPlan::new(BLOCK_SIZE * 3, BLOCK_SIZE);
        assert_eq!(plan.transfers(), 3);
        assert_eq!(plan.remainder, 0);
        assert_eq!(plan.block_sizes().sum::<usize>(), BLOCK_SIZE * 3);
    }

    #[test]
    fn test_plan_smaller_than_block() {
        let plan = BlockPlan::new(1024, BLOCK_SIZE);
        assert_eq!(plan.full_blocks, 0);
        assert_eq!(plan.block_sizes().collect::<Vec<_>>(), vec![1024]);
    }

    #[test]
    fn test_plan_empty() {
        let plan = BlockPlan::new(0, BLOCK_SIZE);
        assert_eq!(plan.transfers(), 0);
    }

    #[test]
    fn test_remaining_len_keeps_cursor() {
        let mut source = Cursor::new(vec![0u8; 500]);
        source.set_position(120);
        assert_eq!(remaining_len(&mut source).unwrap(), 380);
        assert_eq!(source.position(), 120);
    }
}
