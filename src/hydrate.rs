use std::collections::HashSet;

use crate::chain::ChainCache;
use crate::engine_stats::ENGINE_STATS;
use crate::models::{ChainTx, FeedKind, RawFeedItem};

/// Where a missing hash was first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub hash: String,
    pub block_number: u64,
    pub timestamp: Option<u64>,
}

/// Hashes present in the internal or token feeds but absent from the external
/// feed, in first-seen order, capped at `cap`.
pub fn missing_from_external(
    external: &[RawFeedItem],
    cross_feeds: &[&[RawFeedItem]],
    cap: usize,
) -> Vec<Origin> {
    let known: HashSet<&str> = external.iter().map(|i| i.hash.as_str()).collect();
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for item in cross_feeds.iter().flat_map(|feed| feed.iter()) {
        if known.contains(item.hash.as_str()) || !seen.insert(item.hash.clone()) {
            continue;
        }
        out.push(Origin {
            hash: item.hash.clone(),
            block_number: item.block_number,
            timestamp: item.timestamp,
        });
    }

    if out.len() > cap {
        tracing::debug!("hydration capped: {} missing hashes, fetching {}", out.len(), cap);
        out.truncate(cap);
    }
    out
}

/// Builds a minimal external record from a directly fetched transaction.
pub fn synthesize(origin: &Origin, tx: &ChainTx) -> RawFeedItem {
    let mut item = RawFeedItem::new(FeedKind::External, &origin.hash, &tx.from, tx.to.as_deref());
    item.block_number = tx.block_number.unwrap_or(origin.block_number);
    item.timestamp = origin.timestamp;
    item.value = tx.value;
    item.input = Some(tx.input.clone());
    item
}

/// Recovers external transactions the primary feed did not return. Hashes
/// whose transaction cannot be fetched are skipped; the result never repeats
/// a hash already in `external`.
pub async fn hydrate(
    chain: &ChainCache,
    external: &[RawFeedItem],
    cross_feeds: &[&[RawFeedItem]],
    cap: usize,
    concurrency: usize,
) -> Vec<RawFeedItem> {
    let origins = missing_from_external(external, cross_feeds, cap);
    if origins.is_empty() {
        return Vec::new();
    }

    let fetched = chain
        .transactions_for(origins.iter().map(|o| o.hash.clone()).collect(), concurrency)
        .await;

    let mut items: Vec<RawFeedItem> = origins
        .iter()
        .filter_map(|origin| fetched.get(&origin.hash).map(|tx| synthesize(origin, tx)))
        .collect();

    let undated = items
        .iter()
        .filter(|i| i.timestamp.is_none() && i.block_number > 0)
        .map(|i| i.block_number);
    let stamps = chain.block_timestamps_for(undated, concurrency).await;
    for item in items.iter_mut().filter(|i| i.timestamp.is_none()) {
        item.timestamp = stamps.get(&item.block_number).copied();
    }

    ENGINE_STATS.inc_hydrated(items.len() as u64);
    tracing::debug!("hydrated {}/{} missing transactions", items.len(), origins.len());
    items
}
