//! Chain lookups shared by every call: transactions, receipts, block
//! timestamps and contract labels, each memoised process-wide and fetched
//! through the retry policy. A lookup that still fails is reported as
//! unknown (`None`) and never aborts the caller.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::Bytes;
use ethers_core::utils::id;
use futures_util::{stream, StreamExt};

use crate::cache::CoalescingCache;
use crate::engine_stats::{EngineStats, ENGINE_STATS};
use crate::models::{ChainTx, Receipt};
use crate::retry::RetryPolicy;

/// The JSON-RPC surface the engine needs.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn transaction(&self, hash: &str) -> Result<Option<ChainTx>>;
    async fn receipt(&self, hash: &str) -> Result<Option<Receipt>>;
    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>>;
    async fn bytecode(&self, address: &str) -> Result<Bytes>;
    async fn call(&self, to: &str, data: Bytes) -> Result<Bytes>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractLabel {
    pub symbol: Option<String>,
    pub name: Option<String>,
}

impl ContractLabel {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.symbol.as_deref().into_iter().chain(self.name.as_deref())
    }
}

pub struct ChainCache {
    rpc: Arc<dyn ChainRpc>,
    retry: RetryPolicy,
    stats: &'static EngineStats,
    transactions: CoalescingCache<String, Option<Arc<ChainTx>>>,
    receipts: CoalescingCache<String, Option<Arc<Receipt>>>,
    blocks: CoalescingCache<u64, Option<u64>>,
    labels: CoalescingCache<String, ContractLabel>,
}

impl ChainCache {
    pub fn new(rpc: Arc<dyn ChainRpc>, retry: RetryPolicy) -> Self {
        Self::with_stats(rpc, retry, &ENGINE_STATS)
    }

    pub fn with_stats(rpc: Arc<dyn ChainRpc>, retry: RetryPolicy, stats: &'static EngineStats) -> Self {
        Self {
            rpc,
            retry,
            stats,
            transactions: CoalescingCache::new(),
            receipts: CoalescingCache::new(),
            blocks: CoalescingCache::new(),
            labels: CoalescingCache::new(),
        }
    }

    pub async fn transaction(&self, hash: &str) -> Option<Arc<ChainTx>> {
        let key = hash.to_lowercase();
        let rpc = self.rpc.clone();
        let what = format!("eth_getTransactionByHash {key}");
        cached(self.stats, &self.transactions, key.clone(), || async {
            let tx = self.retry.run(&what, || rpc.transaction(&key)).await?;
            Ok(tx.map(Arc::new))
        })
        .await
        .flatten()
    }

    /// A receipt the node does not have yet is not memoised; the node may
    /// simply lag the explorer.
    pub async fn receipt(&self, hash: &str) -> Option<Arc<Receipt>> {
        let key = hash.to_lowercase();
        let rpc = self.rpc.clone();
        let what = format!("eth_getTransactionReceipt {key}");
        let receipt = cached(self.stats, &self.receipts, key.clone(), || async {
            let receipt = self.retry.run(&what, || rpc.receipt(&key)).await?;
            self.stats.inc_receipts_checked(1);
            Ok(receipt.map(Arc::new))
        })
        .await
        .flatten();
        if receipt.is_none() {
            self.receipts.forget(&key);
        }
        receipt
    }

    pub async fn block_timestamp(&self, number: u64) -> Option<u64> {
        let rpc = self.rpc.clone();
        let what = format!("eth_getBlockByNumber {number}");
        cached(self.stats, &self.blocks, number, || async {
            self.retry.run(&what, || rpc.block_timestamp(number)).await
        })
        .await
        .flatten()
    }

    /// `symbol()`/`name()` of a contract. Addresses without bytecode get an
    /// empty label; a reverting getter just leaves its field empty.
    pub async fn contract_label(&self, address: &str) -> Option<ContractLabel> {
        let key = address.to_lowercase();
        cached(self.stats, &self.labels, key.clone(), || async {
            let rpc = self.rpc.clone();
            let code = self
                .retry
                .run(&format!("eth_getCode {key}"), || rpc.bytecode(&key))
                .await?;
            if code.is_empty() {
                return Ok(ContractLabel::default());
            }
            let symbol = self.read_string(&key, "symbol()").await;
            let name = self.read_string(&key, "name()").await;
            Ok(ContractLabel { symbol, name })
        })
        .await
    }

    async fn read_string(&self, address: &str, signature: &str) -> Option<String> {
        let data = Bytes::from(id(signature).to_vec());
        let what = format!("eth_call {address} {signature}");
        match self
            .retry
            .run(&what, || self.rpc.call(address, data.clone()))
            .await
        {
            Ok(out) => decode_string_return(&out),
            Err(err) => {
                tracing::debug!("{} unavailable: {}", what, err);
                None
            }
        }
    }

    /// Receipts for many hashes under bounded concurrency, deduplicated.
    /// Hashes whose receipt is unknown are absent from the result.
    pub async fn receipts_for(
        &self,
        hashes: impl IntoIterator<Item = String>,
        limit: usize,
    ) -> HashMap<String, Arc<Receipt>> {
        let mut unique: Vec<String> = hashes.into_iter().map(|h| h.to_lowercase()).collect();
        unique.sort();
        unique.dedup();

        stream::iter(unique)
            .map(|hash| async move {
                let receipt = self.receipt(&hash).await;
                (hash, receipt)
            })
            .buffer_unordered(limit.max(1))
            .filter_map(|(hash, receipt)| async move { receipt.map(|r| (hash, r)) })
            .collect()
            .await
    }

    pub async fn transactions_for(
        &self,
        hashes: Vec<String>,
        limit: usize,
    ) -> HashMap<String, Arc<ChainTx>> {
        stream::iter(hashes)
            .map(|hash| async move {
                let tx = self.transaction(&hash).await;
                (hash, tx)
            })
            .buffer_unordered(limit.max(1))
            .filter_map(|(hash, tx)| async move { tx.map(|t| (hash, t)) })
            .collect()
            .await
    }

    /// Timestamps for many blocks under bounded concurrency. Blocks whose
    /// timestamp is unknown are absent from the result.
    pub async fn block_timestamps_for(
        &self,
        numbers: impl IntoIterator<Item = u64>,
        limit: usize,
    ) -> HashMap<u64, u64> {
        let mut unique: Vec<u64> = numbers.into_iter().collect();
        unique.sort_unstable();
        unique.dedup();

        stream::iter(unique)
            .map(|number| async move { (number, self.block_timestamp(number).await) })
            .buffer_unordered(limit.max(1))
            .filter_map(|(number, ts)| async move { ts.map(|ts| (number, ts)) })
            .collect()
            .await
    }
}

async fn cached<K, V, F, Fut>(
    stats: &EngineStats,
    cache: &CoalescingCache<K, V>,
    key: K,
    load: F,
) -> Option<V>
where
    K: Eq + std::hash::Hash + Clone + std::fmt::Debug,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>>,
{
    if let Some(hit) = cache.peek(&key) {
        stats.inc_cache_hits(1);
        return Some(hit);
    }
    // Counted only by the caller that actually runs the load.
    let counted = || async move {
        stats.inc_rpc_calls(1);
        let out = load().await;
        if out.is_err() {
            stats.inc_rpc_failures(1);
        }
        out
    };
    match cache.get_or_try_populate(key.clone(), counted).await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("chain lookup for {:?} failed: {}", key, err);
            None
        }
    }
}

/// ABI `string` return, falling back to a NUL-padded `bytes32`.
pub fn decode_string_return(out: &[u8]) -> Option<String> {
    if let Ok(tokens) = abi::decode(&[ParamType::String], out) {
        if let Some(Token::String(s)) = tokens.into_iter().next() {
            let s = s.trim().to_string();
            return (!s.is_empty()).then_some(s);
        }
    }
    if out.len() == 32 {
        let end = out.iter().position(|b| *b == 0).unwrap_or(32);
        let s = std::str::from_utf8(&out[..end]).ok()?.trim().to_string();
        return (!s.is_empty()).then_some(s);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingRpc {
        receipt_calls: AtomicUsize,
        /// Leading receipt requests answered with "not found".
        lagging_receipts: AtomicUsize,
    }

    #[async_trait]
    impl ChainRpc for CountingRpc {
        async fn transaction(&self, _hash: &str) -> Result<Option<ChainTx>> {
            Err(anyhow!("unavailable"))
        }

        async fn receipt(&self, hash: &str) -> Result<Option<Receipt>> {
            self.receipt_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            let lagging = self
                .lagging_receipts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if lagging {
                return Ok(None);
            }
            Ok(Some(Receipt {
                hash: hash.to_string(),
                status: Some(true),
                logs: Vec::new(),
                contract_address: None,
            }))
        }

        async fn block_timestamp(&self, number: u64) -> Result<Option<u64>> {
            Ok(Some(1_700_000_000 + number))
        }

        async fn bytecode(&self, address: &str) -> Result<Bytes> {
            if address.ends_with('1') {
                Ok(Bytes::from(vec![0x60, 0x80]))
            } else {
                Ok(Bytes::new())
            }
        }

        async fn call(&self, _to: &str, data: Bytes) -> Result<Bytes> {
            if data[..] == id("symbol()")[..] {
                Ok(Bytes::from(abi::encode(&[Token::String("ENS".to_string())])))
            } else {
                Err(anyhow!("execution reverted"))
            }
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            backoff_step: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn duplicate_receipt_requests_hit_rpc_once() {
        let rpc = Arc::new(CountingRpc::default());
        let cache = ChainCache::new(rpc.clone(), fast_retry());

        let hashes = vec!["0xAA".to_string(), "0xaa".to_string(), "0xbb".to_string()];
        let receipts = cache.receipts_for(hashes, 4).await;
        assert_eq!(receipts.len(), 2);

        let again = cache.receipt("0xaa").await;
        assert!(again.is_some());
        assert_eq!(rpc.receipt_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn coalesced_callers_count_one_rpc_call() {
        static STATS: EngineStats = EngineStats::new();
        let rpc = Arc::new(CountingRpc::default());
        let cache = ChainCache::with_stats(rpc.clone(), fast_retry(), &STATS);

        let lookups = (0..8).map(|_| cache.receipt("0xdd"));
        let receipts = futures_util::future::join_all(lookups).await;
        assert!(receipts.iter().all(Option::is_some));
        assert_eq!(rpc.receipt_calls.load(Ordering::SeqCst), 1);
        assert_eq!(STATS.snapshot().rpc_calls, 1);

        cache.receipt("0xdd").await;
        let snapshot = STATS.snapshot();
        assert_eq!(snapshot.rpc_calls, 1);
        assert_eq!(snapshot.cache_hits, 1);
    }

    #[tokio::test]
    async fn missing_receipt_is_asked_for_again() {
        let rpc = Arc::new(CountingRpc::default());
        rpc.lagging_receipts.store(1, Ordering::SeqCst);
        let cache = ChainCache::new(rpc.clone(), fast_retry());

        assert!(cache.receipt("0xee").await.is_none());
        assert!(cache.receipt("0xee").await.is_some());
        assert!(cache.receipt("0xee").await.is_some());
        assert_eq!(rpc.receipt_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn block_timestamps_are_fetched_once_per_block() {
        let cache = ChainCache::new(Arc::new(CountingRpc::default()), fast_retry());
        let stamps = cache.block_timestamps_for([7, 5, 7], 2).await;
        assert_eq!(stamps.len(), 2);
        assert_eq!(stamps.get(&7), Some(&1_700_000_007));
    }

    #[tokio::test]
    async fn failed_lookup_is_unknown_not_fatal() {
        let cache = ChainCache::new(Arc::new(CountingRpc::default()), fast_retry());
        assert!(cache.transaction("0xcc").await.is_none());
        assert_eq!(cache.block_timestamp(5).await, Some(1_700_000_005));
    }

    #[tokio::test]
    async fn label_tolerates_reverting_getters() {
        let cache = ChainCache::new(Arc::new(CountingRpc::default()), fast_retry());
        let label = cache
            .contract_label("0x0000000000000000000000000000000000000001")
            .await
            .unwrap();
        assert_eq!(label.symbol.as_deref(), Some("ENS"));
        assert_eq!(label.name, None);

        let eoa = cache
            .contract_label("0x0000000000000000000000000000000000000002")
            .await
            .unwrap();
        assert_eq!(eoa, ContractLabel::default());
    }

    #[test]
    fn decodes_bytes32_symbol() {
        let mut raw = [0u8; 32];
        raw[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_string_return(&raw), Some("MKR".to_string()));
        assert_eq!(decode_string_return(&[]), None);
    }
}
