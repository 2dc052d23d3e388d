//! Turns classified feed records into display rows and merges them to one
//! row per transaction hash.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use ethers_core::types::U256;
use ethers_core::utils::format_units;

use crate::models::{
    ActivityRow, Category, Direction, FeedKind, RawFeedItem, RowKind, TokenStandard,
};

const NATIVE_DECIMALS: u32 = 18;

/// The `(kind, category)` pair a row competes with during merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
    Native(Category),
    Token(Option<Category>),
    Internal,
}

impl RowClass {
    pub fn of(row: &ActivityRow) -> Self {
        match row.kind {
            RowKind::Native => RowClass::Native(row.category.unwrap_or(Category::Other)),
            RowKind::Token => RowClass::Token(row.category),
            RowKind::Internal => RowClass::Internal,
        }
    }

    /// Higher wins. Token-feed mint evidence (85) outranks an unresolved
    /// native `other` (80) but not a resolved native category.
    pub fn rank(self) -> u8 {
        match self {
            RowClass::Native(category) => match category {
                Category::Fail => 125,
                Category::DomainMint => 120,
                Category::Cc => 115,
                Category::Cco => 112,
                Category::Stake => 105,
                Category::Swap => 104,
                Category::AddLiquidity | Category::RemoveLiquidity => 103,
                Category::Gm => 100,
                Category::NativeSend => 95,
                Category::Approve => 93,
                Category::NftMint => 90,
                Category::Other => 80,
            },
            RowClass::Token(Some(Category::NftMint)) => 85,
            RowClass::Token(_) => 20,
            RowClass::Internal => 10,
        }
    }
}

/// The merge comparator: `Greater` means `a` replaces `b`.
pub fn compare(a: RowClass, b: RowClass) -> Ordering {
    a.rank().cmp(&b.rank())
}

fn normalize_value(value: U256, decimals: u32) -> f64 {
    format_units(value, decimals)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

pub fn native_row(item: &RawFeedItem, category: Category, me: &str) -> ActivityRow {
    ActivityRow {
        kind: RowKind::Native,
        standard: None,
        hash: item.hash.clone(),
        block_number: item.block_number,
        time_ms: item.time_ms(),
        from: item.from.clone(),
        to: item.to.clone(),
        direction: Direction::of(&item.from, me),
        value: item.value,
        value_norm: normalize_value(item.value, NATIVE_DECIMALS),
        category: Some(category),
        contract: None,
        symbol: None,
        token_id: None,
    }
}

pub fn internal_row(item: &RawFeedItem, me: &str) -> ActivityRow {
    ActivityRow {
        kind: RowKind::Internal,
        standard: None,
        hash: item.hash.clone(),
        block_number: item.block_number,
        time_ms: item.time_ms(),
        from: item.from.clone(),
        to: item.to.clone(),
        direction: Direction::of(&item.from, me),
        value: item.value,
        value_norm: normalize_value(item.value, NATIVE_DECIMALS),
        category: None,
        contract: item.contract_address.clone(),
        symbol: None,
        token_id: None,
    }
}

/// ERC-20 rows never carry a category; NFT rows carry `nft_mint` when the
/// feed shows a mint from the zero address to the queried address.
pub fn token_row(item: &RawFeedItem, me: &str) -> ActivityRow {
    let standard = match item.kind {
        FeedKind::Erc721 => TokenStandard::Erc721,
        FeedKind::Erc1155 => TokenStandard::Erc1155,
        _ => TokenStandard::Erc20,
    };
    let token = item.token.clone().unwrap_or_default();
    let (value_norm, category) = match standard {
        TokenStandard::Erc20 => (
            normalize_value(item.value, token.decimals.unwrap_or(NATIVE_DECIMALS)),
            None,
        ),
        TokenStandard::Erc721 | TokenStandard::Erc1155 => {
            let count = if standard == TokenStandard::Erc721 {
                1.0
            } else {
                normalize_value(item.value, 0)
            };
            let mint = item.is_mint_to(me).then_some(Category::NftMint);
            (count, mint)
        }
    };

    ActivityRow {
        kind: RowKind::Token,
        standard: Some(standard),
        hash: item.hash.clone(),
        block_number: item.block_number,
        time_ms: item.time_ms(),
        from: item.from.clone(),
        to: item.to.clone(),
        direction: Direction::of(&item.from, me),
        value: item.value,
        value_norm,
        category,
        contract: (!token.contract.is_empty()).then_some(token.contract),
        symbol: token.symbol,
        token_id: token.token_id,
    }
}

/// One row per lowercase hash, the highest `RowClass` winning; on a tie the
/// row seen first stays. Output is newest first.
pub fn reconcile<I>(rows: I) -> Vec<ActivityRow>
where
    I: IntoIterator<Item = ActivityRow>,
{
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, ActivityRow> = HashMap::new();

    for mut row in rows {
        row.hash = row.hash.to_lowercase();
        match best.entry(row.hash.clone()) {
            Entry::Vacant(slot) => {
                order.push(row.hash.clone());
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                if compare(RowClass::of(&row), RowClass::of(slot.get())) == Ordering::Greater {
                    slot.insert(row);
                }
            }
        }
    }

    let mut out: Vec<ActivityRow> = order
        .into_iter()
        .filter_map(|hash| best.remove(&hash))
        .collect();
    out.sort_by(|a, b| {
        b.time_ms
            .cmp(&a.time_ms)
            .then_with(|| b.block_number.cmp(&a.block_number))
            .then_with(|| a.hash.cmp(&b.hash))
    });
    out
}
