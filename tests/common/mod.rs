#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers_core::abi::{self, Token};
use ethers_core::types::{Bytes, H160, H256, U256};
use ethers_core::utils::{id, keccak256};

use rust_eth_activity_lab::activity::{ActivityEngine, EngineLimits};
use rust_eth_activity_lab::chain::{ChainCache, ChainRpc};
use rust_eth_activity_lab::feed::{FeedGateway, PagingPolicy};
use rust_eth_activity_lab::models::{
    ChainTx, FeedKind, RawFeedItem, Receipt, ReceiptLog, TokenMeta,
};
use rust_eth_activity_lab::registry::Registry;
use rust_eth_activity_lab::retry::RetryPolicy;

pub const ME: &str = "0xa11ce00000000000000000000000000000000001";
pub const PEER: &str = "0xb0b0000000000000000000000000000000000002";
pub const GM_CONTRACT: &str = "0x6a00000000000000000000000000000000000003";
pub const NFT_CONTRACT: &str = "0xc0ffee0000000000000000000000000000000004";
pub const DOMAIN_CONTRACT: &str = "0xd0d0000000000000000000000000000000000005";

pub const START: u64 = 1_700_000_000;
pub const END: u64 = 1_700_100_000;

#[derive(Default)]
pub struct MemoryGateway {
    pub feeds: HashMap<FeedKind, Vec<RawFeedItem>>,
    pub failing: HashSet<FeedKind>,
}

impl MemoryGateway {
    pub fn push(&mut self, item: RawFeedItem) {
        self.feeds.entry(item.kind).or_default().push(item);
    }

    /// Same records, opposite arrival order among equal timestamps.
    pub fn reversed(&self) -> Self {
        Self {
            feeds: self
                .feeds
                .iter()
                .map(|(k, v)| (*k, v.iter().rev().cloned().collect()))
                .collect(),
            failing: self.failing.clone(),
        }
    }
}

#[async_trait]
impl FeedGateway for MemoryGateway {
    async fn fetch_page(
        &self,
        kind: FeedKind,
        _address: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawFeedItem>> {
        if self.failing.contains(&kind) {
            return Err(anyhow!("HTTP 503 for {}", kind.action()));
        }
        let mut items = self.feeds.get(&kind).cloned().unwrap_or_default();
        items.sort_by_key(|i| std::cmp::Reverse(i.timestamp));
        let from = ((page - 1) * page_size) as usize;
        Ok(items.into_iter().skip(from).take(page_size as usize).collect())
    }
}

#[derive(Default)]
pub struct MemoryRpc {
    pub txs: HashMap<String, ChainTx>,
    pub receipts: HashMap<String, Receipt>,
    pub labels: HashMap<String, (Option<String>, Option<String>)>,
    pub down: bool,
    pub receipt_calls: AtomicUsize,
}

#[async_trait]
impl ChainRpc for MemoryRpc {
    async fn transaction(&self, hash: &str) -> Result<Option<ChainTx>> {
        if self.down {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.txs.get(hash).cloned())
    }

    async fn receipt(&self, hash: &str) -> Result<Option<Receipt>> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        if self.down {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.receipts.get(hash).cloned())
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>> {
        Ok(Some(START + number))
    }

    async fn bytecode(&self, address: &str) -> Result<Bytes> {
        if self.labels.contains_key(address) {
            Ok(Bytes::from(vec![0x60, 0x80, 0x60, 0x40]))
        } else {
            Ok(Bytes::new())
        }
    }

    async fn call(&self, to: &str, data: Bytes) -> Result<Bytes> {
        let (symbol, name) = self.labels.get(to).cloned().unwrap_or_default();
        let value = if data[..] == id("symbol()")[..] {
            symbol
        } else if data[..] == id("name()")[..] {
            name
        } else {
            None
        };
        value
            .map(|s| Bytes::from(abi::encode(&[Token::String(s)])))
            .ok_or_else(|| anyhow!("execution reverted"))
    }
}

pub fn engine(gateway: MemoryGateway, rpc: Arc<MemoryRpc>) -> ActivityEngine {
    let registry = Registry::new(vec![GM_CONTRACT.to_string()], Vec::new(), None);
    engine_with_registry(gateway, rpc, registry)
}

pub fn engine_with_registry(
    gateway: MemoryGateway,
    rpc: Arc<MemoryRpc>,
    registry: Registry,
) -> ActivityEngine {
    let retry = RetryPolicy {
        max_attempts: 2,
        backoff_step: Duration::from_millis(1),
        timeout: Duration::from_millis(500),
    };
    let limits = EngineLimits {
        paging: PagingPolicy {
            page_size: 2,
            initial_pages: 1,
            max_pages: 20,
            timeout: Duration::from_millis(500),
        },
        max_in_flight: 4,
        max_hydrate: 50,
        max_mint_candidates: 50,
    };
    ActivityEngine::new(
        Arc::new(gateway),
        Arc::new(ChainCache::new(rpc, retry)),
        Arc::new(registry),
        limits,
    )
}

pub fn external(hash: &str, from: &str, to: Option<&str>, ts: u64) -> RawFeedItem {
    let mut item = RawFeedItem::new(FeedKind::External, hash, from, to);
    item.timestamp = Some(ts);
    item.block_number = ts - START;
    item
}

pub fn internal(hash: &str, from: &str, to: &str, ts: u64) -> RawFeedItem {
    let mut item = RawFeedItem::new(FeedKind::Internal, hash, from, Some(to));
    item.timestamp = Some(ts);
    item.block_number = ts - START;
    item.value = U256::from(10u64);
    item.trace_type = Some("call".to_string());
    item
}

pub fn nft_transfer(kind: FeedKind, hash: &str, from: &str, ts: u64, name: &str) -> RawFeedItem {
    let mut item = RawFeedItem::new(kind, hash, from, Some(ME));
    item.timestamp = Some(ts);
    item.block_number = ts - START;
    item.value = U256::one();
    item.token = Some(TokenMeta {
        contract: NFT_CONTRACT.to_string(),
        symbol: Some("TKN".to_string()),
        name: Some(name.to_string()),
        decimals: None,
        token_id: Some("1".to_string()),
    });
    item
}

pub fn receipt(hash: &str, logs: Vec<ReceiptLog>) -> Receipt {
    Receipt {
        hash: hash.to_string(),
        status: Some(true),
        logs,
        contract_address: None,
    }
}

pub fn topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

pub fn address_topic(address: &str) -> H256 {
    H256::from(address.parse::<H160>().unwrap())
}

pub fn mint_log(contract: &str, to: &str) -> ReceiptLog {
    ReceiptLog {
        address: contract.to_string(),
        topics: vec![
            topic("Transfer(address,address,uint256)"),
            H256::zero(),
            address_topic(to),
            H256::from_low_u64_be(1),
        ],
        data: Bytes::new(),
    }
}

/// Calldata consisting of just the 4-byte selector of `signature`.
pub fn selector_input(signature: &str) -> String {
    let selector = id(signature);
    format!("0x{}", selector.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

pub fn chain_tx(hash: &str, from: &str, to: &str, input: &str) -> ChainTx {
    ChainTx {
        hash: hash.to_string(),
        block_number: Some(42),
        from: from.to_string(),
        to: Some(to.to_string()),
        value: U256::zero(),
        input: input.to_string(),
    }
}
