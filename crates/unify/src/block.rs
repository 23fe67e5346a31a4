use rover_primitives::{ChainTag, MarkedTx, UnifiedBlock};

use crate::traits::ForeignBlock;

/// Assembles the unified block for one validated foreign block.
///
/// Deterministic: structurally equal inputs produce byte-equal output.
/// `transactions` must come from [`crate::mark_transactions`] over the same
/// block, which guarantees dense indices.
pub fn build_unified<B: ForeignBlock>(
    chain: ChainTag,
    block: &B,
    transactions: Vec<MarkedTx>,
) -> UnifiedBlock {
    UnifiedBlock {
        chain,
        hash: block.block_id(),
        previous_hash: block.parent_id(),
        timestamp_ms: block.timestamp_ms(),
        height: block.height(),
        merkle_root: block.merkle_root(),
        transactions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mark_transactions,
        test_utils::{make_block, make_tx},
        TxMarker,
    };

    const DESIGNATED: &str = "designated-key";

    #[tokio::test]
    async fn build_is_deterministic() {
        let marker = TxMarker::new(ChainTag::Eth, Some(DESIGNATED.to_string()));
        let block = make_block(42, vec![make_tx("t1", DESIGNATED, true)]);

        let first = build_unified(
            ChainTag::Eth,
            &block,
            mark_transactions(&marker, None, &block).await,
        );
        let second = build_unified(
            ChainTag::Eth,
            &block,
            mark_transactions(&marker, None, &block).await,
        );

        assert_eq!(first, second);
        assert!(first.is_well_formed());
    }

    #[tokio::test]
    async fn marked_never_exceeds_native_count() {
        let marker = TxMarker::new(ChainTag::Eth, Some(DESIGNATED.to_string()));
        let block = make_block(
            42,
            vec![
                make_tx("t1", DESIGNATED, true),
                make_tx("t2", "nobody", true),
            ],
        );

        let unified = build_unified(
            ChainTag::Eth,
            &block,
            mark_transactions(&marker, None, &block).await,
        );
        assert!(unified.transactions.len() <= block.transactions().len());
    }

    #[test]
    fn header_fields_carried_over() {
        let block = make_block(42, vec![]);
        let unified = build_unified(ChainTag::Eth, &block, vec![]);

        assert_eq!(unified.height, 42);
        assert_eq!(unified.hash, block.block_id());
        assert_eq!(unified.previous_hash, block.parent_id());
        assert_eq!(unified.timestamp_ms, block.timestamp_ms());
        assert_eq!(unified.merkle_root, block.merkle_root());
    }
}
