//! Per-transaction categorisation.
//!
//! Tier 1 runs on every external transaction and never touches the network.
//! Its outcomes 1-12 are final. Native-send and mint/domain candidates are
//! settled afterwards from receipts by the engine through the helpers below.

use std::collections::HashSet;

use ethers_core::types::H256;

use crate::models::{Category, FeedKind, RawFeedItem, Receipt, ZERO_ADDRESS};
use crate::registry::{is_domain_text, Intent, Registry};

/// Hints derived once per call from the internal and token feeds.
#[derive(Debug, Default)]
pub struct FeedHints {
    pub domain_mints: HashSet<String>,
    pub nft_mints: HashSet<String>,
    pub creates: HashSet<String>,
}

impl FeedHints {
    pub fn from_feeds(me: &str, internal: &[RawFeedItem], nft: &[RawFeedItem]) -> Self {
        let mut hints = FeedHints::default();

        for item in nft.iter().filter(|i| i.is_mint_to(me)) {
            hints.nft_mints.insert(item.hash.clone());
            if item.kind == FeedKind::Erc721 && token_text_is_domain(item) {
                hints.domain_mints.insert(item.hash.clone());
            }
        }

        for item in internal {
            let is_create = item
                .trace_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("create") || t.eq_ignore_ascii_case("create2"));
            if is_create && item.from == me {
                hints.creates.insert(item.hash.clone());
            }
        }

        hints
    }
}

fn token_text_is_domain(item: &RawFeedItem) -> bool {
    item.token.as_ref().is_some_and(|t| {
        t.symbol.as_deref().is_some_and(is_domain_text) || t.name.as_deref().is_some_and(is_domain_text)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier1 {
    /// Authoritative; receipts never change it.
    Final(Category),
    /// Provisionally `other`; becomes `native_send` if the receipt is clean.
    NativeSendCandidate,
    /// Provisionally `other`; receipt logs may reveal an NFT or domain mint.
    MintCandidate,
    Other,
}

impl Tier1 {
    pub fn provisional(self) -> Category {
        match self {
            Tier1::Final(category) => category,
            _ => Category::Other,
        }
    }
}

pub struct Classifier<'a> {
    me: &'a str,
    registry: &'a Registry,
    hints: &'a FeedHints,
}

impl<'a> Classifier<'a> {
    pub fn new(me: &'a str, registry: &'a Registry, hints: &'a FeedHints) -> Self {
        Self { me, registry, hints }
    }

    pub fn tier1(&self, tx: &RawFeedItem) -> Tier1 {
        if tx.is_error {
            return Tier1::Final(Category::Fail);
        }

        if let Some(to) = tx.to.as_deref() {
            if self.registry.is_deploy_relay(to) {
                return Tier1::Final(Category::Cc);
            }
            if self.registry.is_relay_target(to) {
                return Tier1::Final(Category::Cco);
            }
            if self.registry.is_gm_contract(to) {
                return Tier1::Final(Category::Gm);
            }
        }

        if self.hints.domain_mints.contains(&tx.hash) {
            return Tier1::Final(Category::DomainMint);
        }
        if self.hints.nft_mints.contains(&tx.hash) {
            return Tier1::Final(Category::NftMint);
        }

        let selector = tx.selector();
        let name = tx.function_name.as_deref().filter(|n| !n.trim().is_empty());
        let families = [
            (Intent::Stake, Category::Stake),
            (Intent::Swap, Category::Swap),
            (Intent::AddLiquidity, Category::AddLiquidity),
            (Intent::RemoveLiquidity, Category::RemoveLiquidity),
            (Intent::Gm, Category::Gm),
            (Intent::Approve, Category::Approve),
        ];
        for (intent, category) in families {
            if self.registry.matches(intent, selector, name) {
                return Tier1::Final(category);
            }
        }

        let outgoing = tx.from == self.me;
        let target = tx.to.as_deref();

        if outgoing
            && target.is_some_and(|to| !is_precompile(to))
            && !tx.value.is_zero()
            && tx.has_empty_calldata()
        {
            return Tier1::NativeSendCandidate;
        }

        if self.hints.creates.contains(&tx.hash) || (outgoing && target.is_none()) {
            return Tier1::Final(Category::Cc);
        }

        if outgoing && !tx.has_empty_calldata() && target.is_some_and(|to| !is_precompile(to)) {
            return Tier1::MintCandidate;
        }

        Tier1::Other
    }

    /// Candidates whose call already looks like a mint or a registration.
    pub fn looks_like_mint(&self, tx: &RawFeedItem) -> bool {
        let selector = tx.selector();
        let name = tx.function_name.as_deref();
        self.registry.matches(Intent::Mint, selector, name)
            || self.registry.matches(Intent::DomainRegister, selector, name)
    }

    /// Receipt-confirmed pure value transfer.
    pub fn confirms_native_send(receipt: &Receipt) -> bool {
        receipt.succeeded() && receipt.logs.is_empty()
    }

    /// A domain event in the logs or a registration call.
    pub fn has_domain_evidence(&self, tx: &RawFeedItem, receipt: &Receipt) -> bool {
        let topic_hit = receipt
            .logs
            .iter()
            .filter_map(|log| log.topics.first())
            .any(|topic0| self.registry.is_domain_topic(topic0));
        topic_hit
            || self
                .registry
                .matches(Intent::DomainRegister, tx.selector(), tx.function_name.as_deref())
    }

    /// Contracts that emitted a mint-shaped transfer from zero to the queried
    /// address, in first-seen order.
    pub fn minting_contracts(&self, receipt: &Receipt) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for log in &receipt.logs {
            let Some(shape) = self.registry.mint_transfer_shape(&log.topics) else {
                continue;
            };
            let from = topic_address(&log.topics[shape.from_topic]);
            let to = topic_address(&log.topics[shape.to_topic]);
            if from == ZERO_ADDRESS && to == self.me && seen.insert(log.address.clone()) {
                out.push(log.address.clone());
            }
        }
        out
    }
}

/// The low 20 bytes of an indexed address topic, lowercase hex.
pub fn topic_address(topic: &H256) -> String {
    format!("0x{:x}", ethers_core::types::H160::from_slice(&topic.as_bytes()[12..]))
}

/// Precompile and system range: the zero address and anything whose top 18
/// bytes are zero.
pub fn is_precompile(address: &str) -> bool {
    let hex = address.trim_start_matches("0x");
    hex.len() == 40 && hex[..36].bytes().all(|b| b == b'0')
}
