use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::activity::EngineLimits;
use crate::feed::PagingPolicy;
use crate::registry::Registry;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub eth_rpc_url: String,
    pub explorer_api_url: String,
    pub explorer_api_key: Option<String>,
    pub http_bind_addr: String,
    pub gm_contracts: HashSet<String>,
    pub deploy_relay_contracts: HashSet<String>,
    pub relay_target: Option<String>,
    pub page_size: u32,
    pub initial_pages: u32,
    pub max_pages: u32,
    pub request_timeout: Duration,
    pub max_in_flight: usize,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub max_hydrate: usize,
    pub max_mint_candidates: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing ETH_RPC_URL env var")]
    MissingEthRpcUrl,
    #[error("missing EXPLORER_API_URL env var")]
    MissingExplorerApiUrl,
    #[error("invalid value for {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let eth_rpc_url = env::var("ETH_RPC_URL").map_err(|_| ConfigError::MissingEthRpcUrl)?;
        let explorer_api_url =
            env::var("EXPLORER_API_URL").map_err(|_| ConfigError::MissingExplorerApiUrl)?;
        let explorer_api_key = env::var("EXPLORER_API_KEY").ok().filter(|k| !k.is_empty());
        let http_bind_addr = env::var("HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let gm_contracts = env::var("GM_CONTRACTS")
            .map(parse_address_list)
            .unwrap_or_default();
        let deploy_relay_contracts = env::var("DEPLOY_RELAY_CONTRACTS")
            .map(parse_address_list)
            .unwrap_or_default();
        let relay_target = env::var("RELAY_TARGET")
            .ok()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        Ok(Self {
            eth_rpc_url,
            explorer_api_url,
            explorer_api_key,
            http_bind_addr,
            gm_contracts,
            deploy_relay_contracts,
            relay_target,
            page_size: number("FEED_PAGE_SIZE", 100)?,
            initial_pages: number("FEED_INITIAL_PAGES", 3)?,
            max_pages: number("FEED_MAX_PAGES", 50)?,
            request_timeout: Duration::from_millis(number("REQUEST_TIMEOUT_MS", 10_000)?),
            max_in_flight: number("MAX_IN_FLIGHT", 10)?,
            retry_attempts: number("RETRY_ATTEMPTS", 3)?,
            retry_backoff: Duration::from_millis(number("RETRY_BACKOFF_MS", 300)?),
            max_hydrate: number("MAX_HYDRATE", 300)?,
            max_mint_candidates: number("MAX_MINT_CANDIDATES", 250)?,
        })
    }

    pub fn registry(&self) -> Registry {
        Registry::new(
            self.gm_contracts.iter().cloned(),
            self.deploy_relay_contracts.iter().cloned(),
            self.relay_target.clone(),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            backoff_step: self.retry_backoff,
            timeout: self.request_timeout,
        }
    }

    pub fn limits(&self) -> EngineLimits {
        EngineLimits {
            paging: PagingPolicy {
                page_size: self.page_size,
                initial_pages: self.initial_pages,
                max_pages: self.max_pages,
                timeout: self.request_timeout,
            },
            max_in_flight: self.max_in_flight,
            max_hydrate: self.max_hydrate,
            max_mint_candidates: self.max_mint_candidates,
        }
    }
}

fn number<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        _ => Ok(default),
    }
}

fn parse_address_list(raw: String) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_list_is_trimmed_and_lowercased() {
        let set = parse_address_list(" 0xAbC ,,0xdef, ".to_string());
        assert_eq!(set.len(), 2);
        assert!(set.contains("0xabc"));
        assert!(set.contains("0xdef"));
    }
}
