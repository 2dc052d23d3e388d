use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::engine_stats::ENGINE_STATS;
use crate::models::{FeedKind, RawFeedItem, TimeWindow};

/// Paginated account feeds, newest first.
#[async_trait]
pub trait FeedGateway: Send + Sync {
    async fn fetch_page(
        &self,
        kind: FeedKind,
        address: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawFeedItem>>;
}

#[derive(Debug, Clone, Copy)]
pub struct PagingPolicy {
    pub page_size: u32,
    /// Pages fetched unconditionally while they come back full.
    pub initial_pages: u32,
    /// Ceiling for budget expansion.
    pub max_pages: u32,
    pub timeout: Duration,
}

impl Default for PagingPolicy {
    fn default() -> Self {
        Self {
            page_size: 100,
            initial_pages: 3,
            max_pages: 50,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Pages through one feed until it runs past `window.start`, runs dry, or the
/// page budget is spent. The budget grows one page at a time beyond
/// `initial_pages` while the oldest record on the last page is still inside
/// the window. An erroring or timed-out page ends the walk; whatever was
/// collected so far is returned.
pub async fn collect_window(
    gateway: &dyn FeedGateway,
    kind: FeedKind,
    address: &str,
    window: TimeWindow,
    policy: PagingPolicy,
) -> Vec<RawFeedItem> {
    let page_size = policy.page_size.max(1);
    let max_pages = policy.max_pages.max(1);
    let mut budget = policy.initial_pages.clamp(1, max_pages);
    let mut out = Vec::new();
    let mut page = 1;

    while page <= budget {
        let fetched = tokio::time::timeout(
            policy.timeout,
            gateway.fetch_page(kind, address, page, page_size),
        )
        .await;
        let items = match fetched {
            Ok(Ok(items)) => items,
            Ok(Err(err)) => {
                tracing::warn!("{} page {} for {} failed: {}", kind.action(), page, address, err);
                ENGINE_STATS.inc_feed_truncations(1);
                break;
            }
            Err(_) => {
                tracing::warn!("{} page {} for {} timed out", kind.action(), page, address);
                ENGINE_STATS.inc_feed_truncations(1);
                break;
            }
        };
        ENGINE_STATS.inc_feed_pages(1);

        let full = items.len() >= page_size as usize;
        let oldest = items.iter().filter_map(|i| i.timestamp).min();
        out.extend(items.into_iter().filter(|i| window.admits(i.timestamp)));

        if !full || oldest.is_some_and(|ts| ts < window.start) {
            break;
        }
        let still_in_window = oldest.is_some_and(|ts| ts >= window.start);
        if page == budget && budget < max_pages && still_in_window {
            budget += 1;
        }
        page += 1;
    }

    if page > budget && budget == max_pages {
        tracing::debug!("{} for {} hit the {} page ceiling", kind.action(), address, max_pages);
    }
    out
}
