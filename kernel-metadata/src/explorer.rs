//! Etherscan-compatible block explorer client.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy_json_abi::JsonAbi;
use alloy_primitives::Address;
use eyre::{bail, Context, Result};
use kernel_chain_config::default_explorer_url;
use kernel_types::ChainId;
use serde::Deserialize;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{debug, warn};
use url::Url;

use crate::{EnrichmentError, RateLimiter};

/// Source of contract ABIs and verified source code.
pub trait MetadataSource {
    async fn fetch_abi_and_source(
        &self,
        chain_id: ChainId,
        address: Address,
    ) -> Result<(JsonAbi, String), EnrichmentError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplorerConfig {
    /// Shared across all chains. 0 disables limiting
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Attempts per request, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// The n-th retry waits up to `backoff_ms * 2^n`, jittered
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub endpoints: Vec<ExplorerEndpoint>,
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_max_retries() -> usize {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            endpoints: Vec::new(),
        }
    }
}

/// Per-chain override of the explorer URL and API key.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplorerEndpoint {
    pub chain_id: ChainId,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Falls back to the `ETHERSCAN_API_KEY_<chain_id>` environment variable
    #[serde(default)]
    pub api_key: Option<String>,
}

pub fn api_key_env_var(chain_id: ChainId) -> String {
    format!("ETHERSCAN_API_KEY_{chain_id}")
}

#[derive(Debug, Clone)]
struct Endpoint {
    base_url: Url,
    api_key: String,
}

#[derive(Clone)]
pub struct EtherscanClient {
    client: reqwest::Client,
    endpoints: Arc<HashMap<ChainId, Endpoint>>,
    limiter: RateLimiter,
    max_retries: usize,
    backoff_ms: u64,
    max_backoff: Duration,
}

impl EtherscanClient {
    /// Resolves an endpoint for every chain in `chain_ids`. A chain without an
    /// API key is a configuration error.
    pub fn new(config: &ExplorerConfig, chain_ids: &[ChainId]) -> Result<Self> {
        let mut endpoints = HashMap::with_capacity(chain_ids.len());
        for &chain_id in chain_ids {
            let overrides = config.endpoints.iter().find(|e| e.chain_id == chain_id);

            let base_url = match overrides.and_then(|e| e.base_url.as_deref()) {
                Some(url) => url.to_owned(),
                None => default_explorer_url(chain_id)?.to_owned(),
            };
            let base_url = Url::parse(&base_url)
                .wrap_err_with(|| format!("Invalid explorer url for chain {chain_id}"))?;

            let api_key = match overrides.and_then(|e| e.api_key.clone()) {
                Some(key) => key,
                None => match std::env::var(api_key_env_var(chain_id)) {
                    Ok(key) => key,
                    Err(_) => bail!(
                        "Explorer API key for chain {chain_id} is not set. Set {} or configure it",
                        api_key_env_var(chain_id)
                    ),
                },
            };

            endpoints.insert(chain_id, Endpoint { base_url, api_key });
        }

        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoints: Arc::new(endpoints),
            limiter: RateLimiter::per_second(config.requests_per_second),
            max_retries: config.max_retries.max(1),
            backoff_ms: config.backoff_ms,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        })
    }

    pub async fn contract_abi(
        &self,
        chain_id: ChainId,
        address: Address,
    ) -> Result<JsonAbi, EnrichmentError> {
        let result = self.request(chain_id, address, "getabi").await?;
        let serde_json::Value::String(abi) = result else {
            return Err(EnrichmentError::Parse {
                address,
                reason: "getabi result is not a string".to_owned(),
            });
        };
        serde_json::from_str(&abi).map_err(|err| EnrichmentError::Parse {
            address,
            reason: format!("invalid ABI: {err}"),
        })
    }

    pub async fn contract_source(
        &self,
        chain_id: ChainId,
        address: Address,
    ) -> Result<String, EnrichmentError> {
        let result = self.request(chain_id, address, "getsourcecode").await?;
        let entries: Vec<SourceCodeEntry> =
            serde_json::from_value(result).map_err(|err| EnrichmentError::Parse {
                address,
                reason: format!("invalid getsourcecode result: {err}"),
            })?;

        match entries.into_iter().next() {
            Some(entry) if !entry.source_code.trim().is_empty() => {
                Ok(unwrap_source(entry.source_code))
            }
            _ => Err(EnrichmentError::NoSourceCode { chain_id, address }),
        }
    }

    async fn request(
        &self,
        chain_id: ChainId,
        address: Address,
        action: &'static str,
    ) -> Result<serde_json::Value, EnrichmentError> {
        let endpoint = self
            .endpoints
            .get(&chain_id)
            .ok_or(EnrichmentError::UnsupportedChain(chain_id))?;

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.backoff_ms)
            .max_delay(self.max_backoff)
            .map(jitter)
            .take(self.max_retries - 1);

        let attempts = AtomicUsize::new(0);
        let result = RetryIf::spawn(
            strategy,
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                self.attempt(endpoint, chain_id, address, action)
            },
            |err: &String| {
                warn!(chain_id, %address, action, %err, "explorer request failed");
                true
            },
        )
        .await;

        result.map_err(|reason| EnrichmentError::Unavailable {
            chain_id,
            address,
            attempts: attempts.load(Ordering::Relaxed),
            reason,
        })
    }

    /// One rate-limited request. Every error is transient.
    async fn attempt(
        &self,
        endpoint: &Endpoint,
        chain_id: ChainId,
        address: Address,
        action: &'static str,
    ) -> Result<serde_json::Value, String> {
        self.limiter.acquire().await;
        debug!(chain_id, %address, action, "explorer request");

        let response = self
            .client
            .get(endpoint.base_url.clone())
            .query(&[
                ("chainid", chain_id.to_string()),
                ("module", "contract".to_owned()),
                ("action", action.to_owned()),
                ("address", format!("{address:#x}")),
                ("apikey", endpoint.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|err| format!("transport error: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP error {status}"));
        }

        let body: ExplorerResponse = response
            .json()
            .await
            .map_err(|err| format!("invalid response body: {err}"))?;
        body.into_result()
    }
}

impl MetadataSource for EtherscanClient {
    async fn fetch_abi_and_source(
        &self,
        chain_id: ChainId,
        address: Address,
    ) -> Result<(JsonAbi, String), EnrichmentError> {
        let abi = self.contract_abi(chain_id, address).await?;
        let source = self.contract_source(chain_id, address).await?;
        Ok((abi, source))
    }
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

impl ExplorerResponse {
    fn into_result(self) -> Result<serde_json::Value, String> {
        if self.status != "1" {
            return Err(format!("API error: {} ({})", self.message, self.result));
        }
        Ok(self.result)
    }
}

#[derive(Debug, Deserialize)]
struct SourceCodeEntry {
    #[serde(rename = "SourceCode")]
    source_code: String,
}

/// Standard-JSON sources come wrapped in an extra pair of braces.
fn unwrap_source(source: String) -> String {
    let trimmed = source.trim();
    if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
        return trimmed[1..trimmed.len() - 1].to_owned();
    }
    source
}
