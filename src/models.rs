use ethers_core::types::{Bytes, H256, U256};
use serde::{Serialize, Serializer};

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Which explorer feed a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    External,
    Internal,
    Erc20,
    Erc721,
    Erc1155,
}

impl FeedKind {
    /// Etherscan-compatible `action` parameter for this feed.
    pub fn action(self) -> &'static str {
        match self {
            FeedKind::External => "txlist",
            FeedKind::Internal => "txlistinternal",
            FeedKind::Erc20 => "tokentx",
            FeedKind::Erc721 => "tokennfttx",
            FeedKind::Erc1155 => "token1155tx",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMeta {
    pub contract: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u32>,
    pub token_id: Option<String>,
}

/// One record from any account feed, addresses already lowercased.
#[derive(Debug, Clone)]
pub struct RawFeedItem {
    pub kind: FeedKind,
    pub hash: String,
    pub block_number: u64,
    pub timestamp: Option<u64>,
    pub from: String,
    pub to: Option<String>,
    pub value: U256,
    pub input: Option<String>,
    pub function_name: Option<String>,
    pub is_error: bool,
    /// `call`, `create`, `create2` on internal traces.
    pub trace_type: Option<String>,
    /// Address created by a deployment, when the feed reports one.
    pub contract_address: Option<String>,
    pub token: Option<TokenMeta>,
}

impl RawFeedItem {
    pub fn new(kind: FeedKind, hash: &str, from: &str, to: Option<&str>) -> Self {
        Self {
            kind,
            hash: hash.to_lowercase(),
            block_number: 0,
            timestamp: None,
            from: from.to_lowercase(),
            to: to.map(str::to_lowercase),
            value: U256::zero(),
            input: None,
            function_name: None,
            is_error: false,
            trace_type: None,
            contract_address: None,
            token: None,
        }
    }

    /// Calldata is absent, empty, or a bare `0x`.
    pub fn has_empty_calldata(&self) -> bool {
        match self.input.as_deref().map(str::trim) {
            None => true,
            Some(s) => s.is_empty() || s.eq_ignore_ascii_case("0x"),
        }
    }

    pub fn selector(&self) -> Option<[u8; 4]> {
        let bytes: Bytes = self.input.as_deref()?.parse().ok()?;
        bytes.get(..4).and_then(|s| <[u8; 4]>::try_from(s).ok())
    }

    pub fn is_mint_to(&self, me: &str) -> bool {
        self.from == ZERO_ADDRESS && self.to.as_deref() == Some(me)
    }

    pub fn time_ms(&self) -> u64 {
        self.timestamp.map(|ts| ts.saturating_mul(1000)).unwrap_or(0)
    }
}

/// Transaction as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone)]
pub struct ChainTx {
    pub hash: String,
    pub block_number: Option<u64>,
    pub from: String,
    pub to: Option<String>,
    pub value: U256,
    pub input: String,
}

#[derive(Debug, Clone)]
pub struct ReceiptLog {
    pub address: String,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct Receipt {
    pub hash: String,
    /// `None` for pre-byzantium receipts that carry no status.
    pub status: Option<bool>,
    pub logs: Vec<ReceiptLog>,
    pub contract_address: Option<String>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Native,
    Internal,
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStandard {
    Erc20,
    Erc721,
    Erc1155,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn of(from: &str, me: &str) -> Self {
        if from.eq_ignore_ascii_case(me) {
            Direction::Out
        } else {
            Direction::In
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Fail,
    DomainMint,
    Cc,
    Cco,
    Stake,
    Swap,
    AddLiquidity,
    RemoveLiquidity,
    Gm,
    NativeSend,
    Approve,
    NftMint,
    Other,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRow {
    pub kind: RowKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<TokenStandard>,
    pub hash: String,
    pub block_number: u64,
    pub time_ms: u64,
    pub from: String,
    pub to: Option<String>,
    pub direction: Direction,
    #[serde(serialize_with = "serialize_decimal")]
    pub value: U256,
    pub value_norm: f64,
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
}

fn serialize_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

/// Inclusive unix-seconds window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: u64,
    pub end: u64,
}

impl TimeWindow {
    /// Records without a timestamp are kept; they surface with `timeMs = 0`.
    pub fn admits(&self, timestamp: Option<u64>) -> bool {
        match timestamp {
            Some(ts) => ts >= self.start && ts <= self.end,
            None => true,
        }
    }
}
