//! Wallet activity for one address and time window: fetch every feed, recover
//! missing external transactions, classify, reconcile, count.

use std::collections::HashSet;
use std::sync::Arc;

use ethers_core::types::H160;
use futures_util::{stream, StreamExt};
use serde::Serialize;

use crate::chain::ChainCache;
use crate::classify::{Classifier, FeedHints, Tier1};
use crate::error::ActivityError;
use crate::feed::{collect_window, FeedGateway, PagingPolicy};
use crate::hydrate::hydrate;
use crate::models::{ActivityRow, Category, FeedKind, RawFeedItem, Receipt, TimeWindow};
use crate::reconcile::{internal_row, native_row, reconcile, token_row};
use crate::registry::{is_domain_text, Registry};
use crate::stats::ActivityStats;

#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    pub paging: PagingPolicy,
    pub max_in_flight: usize,
    pub max_hydrate: usize,
    /// Receipt scans for unknown outgoing calls stop here; very active wallets
    /// can be under-classified past this point.
    pub max_mint_candidates: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            paging: PagingPolicy::default(),
            max_in_flight: 10,
            max_hydrate: 300,
            max_mint_candidates: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    pub address: String,
    pub start: u64,
    pub end: u64,
    pub activity: Vec<ActivityRow>,
    pub stats: ActivityStats,
}

#[derive(Debug, Default)]
struct Feeds {
    external: Vec<RawFeedItem>,
    internal: Vec<RawFeedItem>,
    erc20: Vec<RawFeedItem>,
    /// ERC-721 followed by ERC-1155.
    nft: Vec<RawFeedItem>,
}

pub struct ActivityEngine {
    gateway: Arc<dyn FeedGateway>,
    chain: Arc<ChainCache>,
    registry: Arc<Registry>,
    limits: EngineLimits,
}

impl ActivityEngine {
    pub fn new(
        gateway: Arc<dyn FeedGateway>,
        chain: Arc<ChainCache>,
        registry: Arc<Registry>,
        limits: EngineLimits,
    ) -> Self {
        Self {
            gateway,
            chain,
            registry,
            limits,
        }
    }

    pub async fn build_activity(
        &self,
        address: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<ActivityRow>, ActivityError> {
        let (me, window) = validate(address, start, end)?;
        Ok(self.activity_for(&me, window).await)
    }

    pub async fn build_stats(
        &self,
        address: &str,
        start: u64,
        end: u64,
    ) -> Result<ActivityStats, ActivityError> {
        let rows = self.build_activity(address, start, end).await?;
        Ok(ActivityStats::from_rows(&rows))
    }

    /// Activity and the counters derived from that same list.
    pub async fn build_report(
        &self,
        address: &str,
        start: u64,
        end: u64,
    ) -> Result<ActivityReport, ActivityError> {
        let (me, window) = validate(address, start, end)?;
        let activity = self.activity_for(&me, window).await;
        let stats = ActivityStats::from_rows(&activity);
        Ok(ActivityReport {
            address: me,
            start,
            end,
            activity,
            stats,
        })
    }

    async fn activity_for(&self, me: &str, window: TimeWindow) -> Vec<ActivityRow> {
        let mut feeds = self.fetch_feeds(me, window).await;

        let hydrated = hydrate(
            &self.chain,
            &feeds.external,
            &[&feeds.internal, &feeds.erc20, &feeds.nft],
            self.limits.max_hydrate,
            self.limits.max_in_flight,
        )
        .await;
        let hydrated_count = hydrated.len();
        feeds.external.extend(hydrated);

        let hints = FeedHints::from_feeds(me, &feeds.internal, &feeds.nft);
        let categories = self.classify(me, &feeds.external, &hints).await;

        let rows = feeds
            .external
            .iter()
            .zip(categories)
            .map(|(item, category)| native_row(item, category, me))
            .chain(feeds.internal.iter().map(|item| internal_row(item, me)))
            .chain(feeds.erc20.iter().map(|item| token_row(item, me)))
            .chain(feeds.nft.iter().map(|item| token_row(item, me)))
            .collect::<Vec<_>>();
        let activity = reconcile(rows);

        tracing::info!(
            "activity for {}: external={} internal={} erc20={} nft={} hydrated={} rows={}",
            me,
            feeds.external.len(),
            feeds.internal.len(),
            feeds.erc20.len(),
            feeds.nft.len(),
            hydrated_count,
            activity.len()
        );
        activity
    }

    async fn fetch_feeds(&self, me: &str, window: TimeWindow) -> Feeds {
        let gateway = self.gateway.as_ref();
        let paging = self.limits.paging;
        let fetch = move |kind: FeedKind| collect_window(gateway, kind, me, window, paging);

        let (external, internal, erc20, erc721, erc1155) = tokio::join!(
            fetch(FeedKind::External),
            fetch(FeedKind::Internal),
            fetch(FeedKind::Erc20),
            fetch(FeedKind::Erc721),
            fetch(FeedKind::Erc1155),
        );

        let mut nft = erc721;
        nft.extend(erc1155);
        Feeds {
            external: dedup_by_hash(external),
            internal,
            erc20,
            nft,
        }
    }

    /// One category per external record, index-aligned with `external`.
    async fn classify(
        &self,
        me: &str,
        external: &[RawFeedItem],
        hints: &FeedHints,
    ) -> Vec<Category> {
        let classifier = Classifier::new(me, &self.registry, hints);
        let tiers: Vec<Tier1> = external.iter().map(|tx| classifier.tier1(tx)).collect();
        let mut categories: Vec<Category> = tiers.iter().map(|t| t.provisional()).collect();

        let sends: Vec<usize> = indices_of(&tiers, Tier1::NativeSendCandidate);
        let mut mints: Vec<usize> = indices_of(&tiers, Tier1::MintCandidate);
        if mints.len() > self.limits.max_mint_candidates {
            mints.sort_by_key(|&i| {
                let tx = &external[i];
                (!classifier.looks_like_mint(tx), std::cmp::Reverse(tx.timestamp))
            });
            tracing::debug!(
                "mint candidates capped at {} of {} for {}",
                self.limits.max_mint_candidates,
                mints.len(),
                me
            );
            mints.truncate(self.limits.max_mint_candidates);
        }
        if sends.is_empty() && mints.is_empty() {
            return categories;
        }

        let receipts = self
            .chain
            .receipts_for(
                sends.iter().chain(&mints).map(|&i| external[i].hash.clone()),
                self.limits.max_in_flight,
            )
            .await;
        tracing::debug!(
            "{}: {} send candidates, {} mint candidates, {} receipts",
            me,
            sends.len(),
            mints.len(),
            receipts.len()
        );

        for &i in &sends {
            if receipts
                .get(&external[i].hash)
                .is_some_and(|r| Classifier::confirms_native_send(r))
            {
                categories[i] = Category::NativeSend;
            }
        }

        let resolved: Vec<(usize, Option<Category>)> = stream::iter(mints)
            .filter_map(|i| {
                let receipt = receipts.get(&external[i].hash).cloned();
                async move { receipt.map(|r| (i, r)) }
            })
            .map(|(i, receipt)| {
                let classifier = &classifier;
                async move { (i, self.resolve_mint(classifier, &external[i], &receipt).await) }
            })
            .buffer_unordered(self.limits.max_in_flight.max(1))
            .collect()
            .await;

        for (i, category) in resolved {
            if let Some(category) = category {
                categories[i] = category;
            }
        }
        categories
    }

    async fn resolve_mint(
        &self,
        classifier: &Classifier<'_>,
        tx: &RawFeedItem,
        receipt: &Receipt,
    ) -> Option<Category> {
        if classifier.has_domain_evidence(tx, receipt) {
            return Some(Category::DomainMint);
        }
        let contracts = classifier.minting_contracts(receipt);
        if contracts.is_empty() {
            return None;
        }

        for contract in &contracts {
            let Some(label) = self.chain.contract_label(contract).await else {
                continue;
            };
            if label.texts().any(is_domain_text) {
                return Some(Category::DomainMint);
            }
        }
        Some(Category::NftMint)
    }
}

fn indices_of(tiers: &[Tier1], wanted: Tier1) -> Vec<usize> {
    tiers
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == wanted)
        .map(|(i, _)| i)
        .collect()
}

fn dedup_by_hash(items: Vec<RawFeedItem>) -> Vec<RawFeedItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.hash.clone()))
        .collect()
}

/// Lowercased `0x`-prefixed 20-byte address and an ordered window.
pub fn validate(address: &str, start: u64, end: u64) -> Result<(String, TimeWindow), ActivityError> {
    let trimmed = address.trim();
    let well_formed = trimmed.len() == 42
        && trimmed.starts_with("0x")
        && trimmed.parse::<H160>().is_ok();
    if !well_formed {
        return Err(ActivityError::InvalidAddress(address.to_string()));
    }
    if start > end {
        return Err(ActivityError::InvalidWindow { start, end });
    }
    Ok((trimmed.to_lowercase(), TimeWindow { start, end }))
}
