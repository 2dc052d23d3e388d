use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, BlockId, Bytes, Log, Transaction, TransactionReceipt,
    TransactionRequest, H160, H256,
};
use ethers_providers::{Http, Middleware, Provider};
use url::Url;

use crate::chain::ChainRpc;
use crate::models::{ChainTx, Receipt, ReceiptLog};

#[derive(Clone)]
pub struct EthClient {
    provider: Provider<Http>,
}

impl EthClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;
        let url = Url::parse(rpc_url).context("invalid ETH_RPC_URL")?;
        let transport = Http::new_with_client(url, client);
        let provider = Provider::new(transport);
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainRpc for EthClient {
    async fn transaction(&self, hash: &str) -> Result<Option<ChainTx>> {
        let hash = parse_hash(hash)?;
        let tx = self
            .provider
            .get_transaction(hash)
            .await
            .with_context(|| format!("failed to fetch tx 0x{:x}", hash))?;
        Ok(tx.map(normalize_tx))
    }

    async fn receipt(&self, hash: &str) -> Result<Option<Receipt>> {
        let hash = parse_hash(hash)?;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .with_context(|| format!("failed to fetch receipt 0x{:x}", hash))?;
        Ok(receipt.map(normalize_receipt))
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>> {
        let block = self
            .provider
            .get_block(BlockId::Number(number.into()))
            .await
            .with_context(|| format!("failed to fetch block {}", number))?;
        Ok(block.map(|b| b.timestamp.low_u64()))
    }

    async fn bytecode(&self, address: &str) -> Result<Bytes> {
        let address = parse_address(address)?;
        self.provider
            .get_code(address, None)
            .await
            .with_context(|| format!("failed to fetch code at {}", address_to_lower_hex(address)))
    }

    async fn call(&self, to: &str, data: Bytes) -> Result<Bytes> {
        let to = parse_address(to)?;
        let request: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.provider
            .call(&request, None)
            .await
            .with_context(|| format!("eth_call to {} failed", address_to_lower_hex(to)))
    }
}

fn parse_hash(hash: &str) -> Result<H256> {
    hash.parse::<H256>()
        .with_context(|| format!("invalid tx hash {}", hash))
}

fn parse_address(address: &str) -> Result<H160> {
    address
        .parse::<H160>()
        .with_context(|| format!("invalid address {}", address))
}

fn normalize_tx(tx: Transaction) -> ChainTx {
    ChainTx {
        hash: format!("0x{:x}", tx.hash),
        block_number: tx.block_number.map(|n| n.as_u64()),
        from: address_to_lower_hex(tx.from),
        to: tx.to.map(address_to_lower_hex),
        value: tx.value,
        input: tx.input.to_string(),
    }
}

fn normalize_receipt(receipt: TransactionReceipt) -> Receipt {
    Receipt {
        hash: format!("0x{:x}", receipt.transaction_hash),
        status: receipt.status.map(|s| s.as_u64() == 1),
        logs: receipt.logs.into_iter().map(normalize_log).collect(),
        contract_address: receipt.contract_address.map(address_to_lower_hex),
    }
}

fn normalize_log(log: Log) -> ReceiptLog {
    ReceiptLog {
        address: address_to_lower_hex(log.address),
        topics: log.topics,
        data: log.data,
    }
}

fn address_to_lower_hex(addr: H160) -> String {
    format!("0x{:x}", addr)
}
