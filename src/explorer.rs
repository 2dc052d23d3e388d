use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers_core::types::U256;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::feed::FeedGateway;
use crate::models::{FeedKind, RawFeedItem, TokenMeta};

/// Etherscan-compatible `module=account` client.
#[derive(Clone)]
pub struct ExplorerClient {
    http: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

/// One row as the explorer returns it. Fields may be strings, numbers, null
/// or missing; all of them land here as strings, empty when absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExplorerRecord {
    #[serde(deserialize_with = "lenient")]
    pub hash: String,
    #[serde(deserialize_with = "lenient")]
    pub block_number: String,
    #[serde(deserialize_with = "lenient")]
    pub time_stamp: String,
    #[serde(deserialize_with = "lenient")]
    pub from: String,
    #[serde(deserialize_with = "lenient")]
    pub to: String,
    #[serde(deserialize_with = "lenient")]
    pub value: String,
    #[serde(deserialize_with = "lenient")]
    pub input: String,
    #[serde(deserialize_with = "lenient")]
    pub function_name: String,
    #[serde(deserialize_with = "lenient")]
    pub is_error: String,
    #[serde(rename = "txreceipt_status", deserialize_with = "lenient")]
    pub txreceipt_status: String,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub trace_type: String,
    #[serde(deserialize_with = "lenient")]
    pub contract_address: String,
    #[serde(deserialize_with = "lenient")]
    pub token_name: String,
    #[serde(deserialize_with = "lenient")]
    pub token_symbol: String,
    #[serde(deserialize_with = "lenient")]
    pub token_decimal: String,
    #[serde(rename = "tokenID", deserialize_with = "lenient")]
    pub token_id: String,
    #[serde(deserialize_with = "lenient")]
    pub token_value: String,
}

fn lenient<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => u8::from(b).to_string(),
        _ => String::new(),
    })
}

impl ExplorerClient {
    pub fn new(api_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;
        let base = Url::parse(api_url).context("invalid EXPLORER_API_URL")?;
        Ok(Self { http, base, api_key })
    }

    pub fn page_url(&self, kind: FeedKind, address: &str, page: u32, page_size: u32) -> Url {
        let mut url = self.base.clone();
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("module", "account");
            qp.append_pair("action", kind.action());
            qp.append_pair("address", address);
            qp.append_pair("page", &page.to_string());
            qp.append_pair("offset", &page_size.to_string());
            qp.append_pair("sort", "desc");
            if let Some(key) = &self.api_key {
                qp.append_pair("apikey", key);
            }
        }
        url
    }
}

#[async_trait]
impl FeedGateway for ExplorerClient {
    async fn fetch_page(
        &self,
        kind: FeedKind,
        address: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawFeedItem>> {
        let url = self.page_url(kind, address, page, page_size);
        let envelope: Envelope = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("{} request failed", kind.action()))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("{} returned malformed JSON", kind.action()))?;

        // "No transactions found" arrives as a string result.
        let serde_json::Value::Array(rows) = envelope.result else {
            tracing::debug!("{} page {}: {}", kind.action(), page, envelope.message);
            return Ok(Vec::new());
        };

        Ok(decode_rows(kind, rows))
    }
}

/// Decodes a page of explorer rows. Only non-object rows and rows without a
/// hash are skipped.
pub fn decode_rows(kind: FeedKind, rows: Vec<serde_json::Value>) -> Vec<RawFeedItem> {
    rows.into_iter()
        .filter_map(|row| serde_json::from_value::<ExplorerRecord>(row).ok())
        .filter_map(|record| normalize_record(kind, record))
        .collect()
}

/// Maps an explorer row onto a feed item. Unparseable numbers become zero or
/// absent; only a row without a hash is dropped.
pub fn normalize_record(kind: FeedKind, record: ExplorerRecord) -> Option<RawFeedItem> {
    let hash = record.hash.trim().to_lowercase();
    if hash.is_empty() {
        return None;
    }

    let to = non_empty(&record.to).map(|s| s.to_lowercase());
    let mut item = RawFeedItem::new(kind, &hash, record.from.trim(), to.as_deref());
    item.block_number = record.block_number.trim().parse().unwrap_or(0);
    item.timestamp = record.time_stamp.trim().parse().ok();
    item.value = parse_u256(&record.value);
    item.input = non_empty(&record.input).map(str::to_string);
    item.function_name = non_empty(&record.function_name).map(str::to_string);
    item.is_error = record.is_error.trim() == "1" || record.txreceipt_status.trim() == "0";
    item.trace_type = non_empty(&record.trace_type).map(str::to_lowercase);
    item.contract_address = non_empty(&record.contract_address).map(str::to_lowercase);

    match kind {
        FeedKind::External | FeedKind::Internal => {}
        FeedKind::Erc20 | FeedKind::Erc721 | FeedKind::Erc1155 => {
            if kind == FeedKind::Erc1155 {
                item.value = parse_u256(&record.token_value);
            }
            item.token = Some(TokenMeta {
                contract: item.contract_address.clone().unwrap_or_default(),
                symbol: non_empty(&record.token_symbol).map(str::to_string),
                name: non_empty(&record.token_name).map(str::to_string),
                decimals: record.token_decimal.trim().parse().ok(),
                token_id: non_empty(&record.token_id).map(str::to_string),
            });
        }
    }

    Some(item)
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn parse_u256(s: &str) -> U256 {
    U256::from_dec_str(s.trim()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_carries_window_paging() {
        let client =
            ExplorerClient::new("https://api.example.org/api", Some("KEY".into()), Duration::from_secs(5))
                .unwrap();
        let url = client.page_url(FeedKind::Erc721, "0xabc", 2, 100);
        let query = url.query().unwrap_or_default();
        assert!(query.contains("action=tokennfttx"));
        assert!(query.contains("page=2"));
        assert!(query.contains("offset=100"));
        assert!(query.contains("sort=desc"));
        assert!(query.contains("apikey=KEY"));
    }

    #[test]
    fn external_record_normalizes_and_flags_failure() {
        let record: ExplorerRecord = serde_json::from_value(serde_json::json!({
            "hash": "0xABCD",
            "blockNumber": "123",
            "timeStamp": "1700000000",
            "from": "0xAAAA000000000000000000000000000000000001",
            "to": "",
            "value": "1000",
            "input": "0x",
            "isError": "0",
            "txreceipt_status": "0",
            "contractAddress": "0xCCCC000000000000000000000000000000000003"
        }))
        .unwrap();

        let item = normalize_record(FeedKind::External, record).unwrap();
        assert_eq!(item.hash, "0xabcd");
        assert_eq!(item.from, "0xaaaa000000000000000000000000000000000001");
        assert_eq!(item.to, None);
        assert_eq!(item.value, U256::from(1000u64));
        assert!(item.is_error);
        assert_eq!(
            item.contract_address.as_deref(),
            Some("0xcccc000000000000000000000000000000000003")
        );
    }

    #[test]
    fn malformed_fields_default_instead_of_failing() {
        let record: ExplorerRecord = serde_json::from_value(serde_json::json!({
            "hash": "0x01",
            "blockNumber": "n/a",
            "value": "-5",
            "from": "0x02"
        }))
        .unwrap();
        let item = normalize_record(FeedKind::Internal, record).unwrap();
        assert_eq!(item.block_number, 0);
        assert_eq!(item.timestamp, None);
        assert!(item.value.is_zero());
    }

    #[test]
    fn null_and_numeric_fields_keep_the_row() {
        let rows = vec![
            serde_json::json!({
                "hash": "0xAB",
                "blockNumber": 5,
                "timeStamp": null,
                "from": "0x01",
                "to": null,
                "value": 1000,
                "isError": 0,
                "contractAddress": "0x02"
            }),
            serde_json::json!({
                "hash": "0xac",
                "blockNumber": "6",
                "timeStamp": 1700000000,
                "from": "0x01",
                "to": "0x03",
                "isError": true
            }),
        ];
        let items = decode_rows(FeedKind::External, rows);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].hash, "0xab");
        assert_eq!(items[0].block_number, 5);
        assert_eq!(items[0].timestamp, None);
        assert_eq!(items[0].time_ms(), 0);
        assert_eq!(items[0].to, None);
        assert_eq!(items[0].value, U256::from(1000u64));
        assert!(!items[0].is_error);
        assert_eq!(items[1].timestamp, Some(1_700_000_000));
        assert!(items[1].is_error);
    }

    #[test]
    fn nft_record_carries_token_meta() {
        let record: ExplorerRecord = serde_json::from_value(serde_json::json!({
            "hash": "0x01",
            "from": "0x0000000000000000000000000000000000000000",
            "to": "0x02",
            "contractAddress": "0x03",
            "tokenName": "Monad Name Service",
            "tokenSymbol": "MNS",
            "tokenID": "77"
        }))
        .unwrap();
        let item = normalize_record(FeedKind::Erc721, record).unwrap();
        let token = item.token.unwrap();
        assert_eq!(token.contract, "0x03");
        assert_eq!(token.symbol.as_deref(), Some("MNS"));
        assert_eq!(token.token_id.as_deref(), Some("77"));
    }
}
