use std::{collections::HashSet, path::{Path, PathBuf}, time::Duration};

use eyre::{bail, Context, Result};
use kernel_chain_config::ChainDeployment;
use kernel_metadata::{ExplorerConfig, DEFAULT_CACHE_TTL};
use kernel_types::ChainId;
use serde::Deserialize;

use crate::{LogSourceConfig, RetryConfig};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerConfig {
    #[serde(default = "default_database_pool_size")]
    pub database_pool_size: u32,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub chains: Vec<ChainConfig>,
}

fn default_database_pool_size() -> u32 {
    8
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Enrichment results are kept in memory when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    /// Falls back to the `RPC_URL_<chain_id>` environment variable
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Defaults to the earliest creation block of the tracked contracts
    #[serde(default)]
    pub start_block: Option<u64>,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_batch_size() -> u64 {
    2_000
}

fn default_poll_interval_ms() -> u64 {
    12_000
}

fn default_channel_capacity() -> usize {
    64
}

pub fn rpc_url_env_var(chain_id: ChainId) -> String {
    format!("RPC_URL_{chain_id}")
}

impl ChainConfig {
    pub fn rpc_url(&self) -> Result<String> {
        if let Some(url) = &self.rpc_url {
            return Ok(url.clone());
        }
        let var = rpc_url_env_var(self.chain_id);
        std::env::var(&var).wrap_err_with(|| {
            format!("no rpc url for chain {}: set rpc_url or {var}", self.chain_id)
        })
    }

    pub fn log_source_config(&self, deployment: &ChainDeployment) -> LogSourceConfig {
        LogSourceConfig {
            start_block: self.start_block.unwrap_or_else(|| deployment.start_block()),
            batch_size: self.batch_size,
            confirmations: self.confirmations,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

impl IndexerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&contents).wrap_err_with(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: IndexerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        self.chains.iter().map(|chain| chain.chain_id).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            bail!("no chains configured");
        }
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                bail!("chain {} configured twice", chain.chain_id);
            }
            ChainDeployment::for_chain(chain.chain_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const FULL: &str = r#"
        database_pool_size = 4

        [cache]
        dir = "/var/cache/kernel-indexer"
        ttl_secs = 3600

        [explorer]
        requests_per_second = 2
        max_retries = 5

        [[explorer.endpoints]]
        chain_id = 80094
        base_url = "https://api.berascan.com/api"
        api_key = "BERA"

        [retry]
        backoff_ms = 250
        max_attempts = 10

        [[chains]]
        chain_id = 1
        rpc_url = "http://localhost:8545"
        start_block = 16000000
        batch_size = 500

        [[chains]]
        chain_id = 80094
        rpc_url = "http://localhost:8546"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = IndexerConfig::parse(FULL).unwrap();
        assert_eq!(config.database_pool_size, 4);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.explorer.requests_per_second, 2);
        assert_eq!(config.explorer.endpoints.len(), 1);
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.max_backoff_ms, 60_000);
        assert_eq!(config.chain_ids(), vec![1, 80094]);

        let mainnet = &config.chains[0];
        let source = mainnet.log_source_config(ChainDeployment::for_chain(1).unwrap());
        assert_eq!(source.start_block, 16_000_000);
        assert_eq!(source.batch_size, 500);
        assert_eq!(source.poll_interval, Duration::from_secs(12));
    }

    #[test]
    fn test_defaults() {
        let config = IndexerConfig::parse("[[chains]]\nchain_id = 8453\n").unwrap();
        assert_eq!(config.database_pool_size, 8);
        assert!(config.cache.dir.is_none());
        assert_eq!(config.cache.ttl(), DEFAULT_CACHE_TTL);
        assert_eq!(config.explorer.max_retries, 3);
        assert_eq!(config.retry.max_attempts, 0);

        let deployment = ChainDeployment::for_chain(8453).unwrap();
        let source = config.chains[0].log_source_config(deployment);
        assert_eq!(source.start_block, deployment.start_block());
    }

    #[test]
    fn test_rejects_invalid_configs() {
        assert!(IndexerConfig::parse("chains = []").is_err());
        assert!(IndexerConfig::parse("[[chains]]\nchain_id = 31337\n").is_err());
        let duplicate = "[[chains]]\nchain_id = 1\n[[chains]]\nchain_id = 1\n";
        assert!(IndexerConfig::parse(duplicate).is_err());
        assert!(IndexerConfig::parse("[[chains]]\nchain_id = 1\nrpc = \"x\"\n").is_err());
    }

    #[test]
    fn test_rpc_url_prefers_config() {
        let config = IndexerConfig::parse(FULL).unwrap();
        assert_eq!(config.chains[0].rpc_url().unwrap(), "http://localhost:8545");
        assert_eq!(rpc_url_env_var(10), "RPC_URL_10");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = IndexerConfig::load(file.path()).unwrap();
        assert_eq!(config.chains.len(), 2);
        assert!(IndexerConfig::load(Path::new("/nonexistent/indexer.toml")).is_err());
    }
}
