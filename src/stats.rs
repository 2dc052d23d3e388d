use serde::Serialize;

use crate::models::{ActivityRow, Category, Direction, RowKind};

/// Outgoing native activity counts, derived from the displayed list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub native_sends: u64,
    pub stakes: u64,
    pub swaps: u64,
    pub add_liquidity: u64,
    pub remove_liquidity: u64,
    pub gm: u64,
    pub approvals: u64,
    pub nft_mints: u64,
    pub domain_mints: u64,
    pub contract_creations: u64,
    pub relay_creations: u64,
    /// `contract_creations + relay_creations`
    pub deploys: u64,
    pub other: u64,
    pub total: u64,
}

impl ActivityStats {
    /// Counts native, outgoing, non-failed rows of an already reconciled list.
    pub fn from_rows(rows: &[ActivityRow]) -> Self {
        let mut stats = ActivityStats::default();
        let counted = rows.iter().filter(|r| {
            r.kind == RowKind::Native
                && r.direction == Direction::Out
                && r.category != Some(Category::Fail)
        });

        for row in counted {
            stats.total += 1;
            let slot = match row.category.unwrap_or(Category::Other) {
                Category::NativeSend => &mut stats.native_sends,
                Category::Stake => &mut stats.stakes,
                Category::Swap => &mut stats.swaps,
                Category::AddLiquidity => &mut stats.add_liquidity,
                Category::RemoveLiquidity => &mut stats.remove_liquidity,
                Category::Gm => &mut stats.gm,
                Category::Approve => &mut stats.approvals,
                Category::NftMint => &mut stats.nft_mints,
                Category::DomainMint => &mut stats.domain_mints,
                Category::Cc => &mut stats.contract_creations,
                Category::Cco => &mut stats.relay_creations,
                Category::Other => &mut stats.other,
                Category::Fail => continue,
            };
            *slot += 1;
        }

        stats.deploys = stats.contract_creations + stats.relay_creations;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedKind, RawFeedItem};
    use crate::reconcile::{internal_row, native_row};

    const ME: &str = "0x1000000000000000000000000000000000000001";
    const PEER: &str = "0x2000000000000000000000000000000000000002";

    fn out(hash: &str, category: Category) -> ActivityRow {
        native_row(&RawFeedItem::new(FeedKind::External, hash, ME, Some(PEER)), category, ME)
    }

    #[test]
    fn counts_only_outgoing_native_non_failed() {
        let incoming = native_row(
            &RawFeedItem::new(FeedKind::External, "0x10", PEER, Some(ME)),
            Category::NativeSend,
            ME,
        );
        let internal = internal_row(&RawFeedItem::new(FeedKind::Internal, "0x11", ME, Some(PEER)), ME);
        let rows = vec![
            out("0x01", Category::NativeSend),
            out("0x02", Category::NativeSend),
            out("0x03", Category::Fail),
            out("0x04", Category::Cc),
            out("0x05", Category::Cco),
            out("0x06", Category::Swap),
            incoming,
            internal,
        ];

        let stats = ActivityStats::from_rows(&rows);
        assert_eq!(stats.native_sends, 2);
        assert_eq!(stats.deploys, 2);
        assert_eq!(stats.swaps, 1);
        assert_eq!(stats.total, 5);
    }

    #[test]
    fn native_sends_match_activity_filter() {
        let rows = vec![
            out("0x01", Category::NativeSend),
            out("0x02", Category::Other),
            out("0x03", Category::NativeSend),
        ];
        let expected = rows
            .iter()
            .filter(|r| {
                r.kind == RowKind::Native
                    && r.direction == Direction::Out
                    && r.category == Some(Category::NativeSend)
            })
            .count() as u64;
        assert_eq!(ActivityStats::from_rows(&rows).native_sends, expected);
    }
}
