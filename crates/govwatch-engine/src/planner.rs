//! Block range planner: computes the next half-open scan window for a
//! space from its checkpoint and the chain head, bounded by the batch
//! size. A backlog drains over multiple iterations at a steady pace.

use govwatch_core::types::{BlockRange, Space};

/// Next window to scan, or `None` when there is nothing to do. On
/// `None` the caller must neither query the scanner nor advance the
/// checkpoint.
///
/// Windows are half-open `[from, to)`: the next call's `from` equals
/// this call's `to`, so no block is scanned twice and none is skipped.
pub fn plan(space: &Space, chain_head: u64, max_batch_size: u64) -> Option<BlockRange> {
    let last_processed = space.last_processed_block.unwrap_or(space.start_block);

    // max() guards against a start block raised after the checkpoint
    // was first written.
    let from = last_processed.max(space.start_block);
    let to = chain_head.min(from.saturating_add(max_batch_size));

    if from >= to {
        return None;
    }

    Some(BlockRange { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(start_block: u64, last_processed_block: Option<u64>) -> Space {
        Space {
            ens: "kleros.eth".into(),
            start_block,
            last_processed_block,
            module_address: "0xm".into(),
            oracle_address: "0xo".into(),
        }
    }

    #[test]
    fn resumes_from_the_checkpoint() {
        let range = plan(&space(1, Some(100)), 250, 100).unwrap();
        assert_eq!(range, BlockRange { from: 100, to: 200 });
    }

    #[test]
    fn starts_from_start_block_without_checkpoint() {
        let range = plan(&space(1, None), 50, 200).unwrap();
        assert_eq!(range, BlockRange { from: 1, to: 50 });
    }

    #[test]
    fn skips_when_caught_up() {
        assert_eq!(plan(&space(1, Some(50)), 50, 100), None);
        assert_eq!(plan(&space(1, Some(60)), 50, 100), None);
    }

    #[test]
    fn respects_a_raised_start_block() {
        let range = plan(&space(500, Some(100)), 1_000, 100).unwrap();
        assert_eq!(range, BlockRange { from: 500, to: 600 });
    }

    #[test]
    fn never_exceeds_the_batch_size() {
        for head in [0u64, 1, 10, 99, 100, 101, 1_000, u64::MAX] {
            for last in [None, Some(0), Some(5), Some(99), Some(head)] {
                if let Some(range) = plan(&space(0, last), head, 100) {
                    assert!(range.from < range.to);
                    assert!(range.to - range.from <= 100);
                }
            }
        }
    }
}
