use std::time::Duration;

use alloy_primitives::Address;
use kernel_types::ChainId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    extractor::{process_abi, process_source},
    storage::{cache_key, CacheStorage},
    ContractMetadata, EnrichmentError, MetadataSource,
};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Unix seconds
    fetched_at: i64,
    metadata: ContractMetadata,
}

/// Enriches contracts through `source`, keeping results in `storage` for `ttl`.
#[derive(Clone)]
pub struct MetadataCache<S, M> {
    storage: S,
    source: M,
    ttl: Duration,
}

impl<S: CacheStorage, M: MetadataSource> MetadataCache<S, M> {
    pub fn new(storage: S, source: M, ttl: Duration) -> Self {
        Self {
            storage,
            source,
            ttl,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn source(&self) -> &M {
        &self.source
    }

    /// Function details of `address`, with roles extracted from its source.
    /// `name` is the contract's directory name.
    pub async fn process_contract(
        &self,
        chain_id: ChainId,
        address: Address,
        name: &str,
    ) -> Result<ContractMetadata, EnrichmentError> {
        let key = cache_key(chain_id, address);
        let now = chrono::Utc::now().timestamp();

        if let Some(metadata) = self.read(&key, now).await {
            debug!(chain_id, %address, name, "metadata cache hit");
            return Ok(metadata);
        }

        info!(chain_id, %address, name, "fetching contract metadata");
        let (abi, source) = self.source.fetch_abi_and_source(chain_id, address).await?;
        let metadata = process_source(name, &source, process_abi(&abi));

        let entry = CacheEntry {
            fetched_at: now,
            metadata,
        };
        match serde_json::to_vec(&entry) {
            Ok(bytes) => {
                if let Err(err) = self.storage.put(&key, bytes).await {
                    warn!(?err, key, "failed to write metadata cache entry");
                }
            }
            Err(err) => warn!(?err, key, "failed to serialize metadata cache entry"),
        }

        Ok(entry.metadata)
    }

    /// Stored metadata if present, readable and younger than the TTL.
    async fn read(&self, key: &str, now: i64) -> Option<ContractMetadata> {
        let bytes = match self.storage.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                warn!(?err, key, "failed to read metadata cache entry");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(?err, key, "discarding unreadable metadata cache entry");
                return None;
            }
        };

        let age = now.saturating_sub(entry.fetched_at);
        if age < 0 || age as u64 >= self.ttl.as_secs() {
            debug!(key, age, "metadata cache entry expired");
            return None;
        }
        Some(entry.metadata)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use alloy_json_abi::JsonAbi;
    use alloy_primitives::address;

    use super::*;
    use crate::{FsStorage, MemoryStorage};

    const CHAIN: ChainId = 1;
    const TRSRY: Address = address!("a8687A15D4BE32CC8F0a8a7B9704a4C3993D9613");

    #[derive(Clone, Default)]
    struct MockSource {
        fetches: Arc<AtomicUsize>,
        fail: bool,
    }

    impl MetadataSource for MockSource {
        async fn fetch_abi_and_source(
            &self,
            chain_id: ChainId,
            address: Address,
        ) -> Result<(JsonAbi, String), EnrichmentError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EnrichmentError::Unavailable {
                    chain_id,
                    address,
                    attempts: 3,
                    reason: "down".to_owned(),
                });
            }
            let abi = JsonAbi::parse([
                "function withdrawReserves(address to_, address token_, uint256 amount_)",
                "function getReserveBalance(address token_) returns (uint256)",
            ])
            .unwrap();
            let source = r#"
                function withdrawReserves(address to_, address token_, uint256 amount_)
                    external
                    permissioned
                    onlyRole("treasury_withdrawer")
                {
                }
                function getReserveBalance(address token_) external view returns (uint256) {}
            "#;
            Ok((abi, source.to_owned()))
        }
    }

    fn memory_cache() -> MetadataCache<MemoryStorage, MockSource> {
        MetadataCache::new(MemoryStorage::new(), MockSource::default(), DEFAULT_CACHE_TTL)
    }

    fn fetches(cache: &MetadataCache<impl CacheStorage, MockSource>) -> usize {
        cache.source().fetches.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_is_served_from_cache() {
        let cache = memory_cache();

        let first = cache.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        assert_eq!(fetches(&cache), 1);

        let second = cache.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        assert_eq!(fetches(&cache), 1);
        assert_eq!(first, second);

        let withdraw = first
            .functions
            .iter()
            .find(|f| f.name == "withdrawReserves")
            .unwrap();
        assert_eq!(withdraw.signature, "withdrawReserves(address,address,uint256)");
        assert_eq!(withdraw.roles, vec!["treasury_withdrawer"]);
    }

    #[tokio::test]
    async fn test_entries_are_keyed_by_chain() {
        let cache = memory_cache();

        cache.process_contract(1, TRSRY, "TRSRY").await.unwrap();
        cache.process_contract(8453, TRSRY, "TRSRY").await.unwrap();
        assert_eq!(fetches(&cache), 2);
        assert_eq!(cache.storage().len().await, 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let cache = memory_cache();
        let key = cache_key(CHAIN, TRSRY);

        let stale = CacheEntry {
            fetched_at: chrono::Utc::now().timestamp() - DEFAULT_CACHE_TTL.as_secs() as i64 - 1,
            metadata: ContractMetadata::default(),
        };
        cache
            .storage()
            .put(&key, serde_json::to_vec(&stale).unwrap())
            .await
            .unwrap();

        let metadata = cache.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        assert_eq!(fetches(&cache), 1);
        assert_eq!(metadata.functions.len(), 2);

        // the refreshed entry replaced the stale one
        cache.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        assert_eq!(fetches(&cache), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_fetches() {
        let cache = MetadataCache::new(MemoryStorage::new(), MockSource::default(), Duration::ZERO);
        cache.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        cache.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        assert_eq!(fetches(&cache), 2);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let cache = memory_cache();
        cache
            .storage()
            .put(&cache_key(CHAIN, TRSRY), b"not json".to_vec())
            .await
            .unwrap();

        let metadata = cache.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        assert_eq!(metadata.functions.len(), 2);
        assert_eq!(fetches(&cache), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_fatal() {
        let storage = MemoryStorage::new();
        storage.should_fail.store(true, Ordering::SeqCst);
        let cache = MetadataCache::new(storage, MockSource::default(), DEFAULT_CACHE_TTL);

        cache.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        cache.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        assert_eq!(fetches(&cache), 2);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let source = MockSource {
            fail: true,
            ..Default::default()
        };
        let cache = MetadataCache::new(MemoryStorage::new(), source, DEFAULT_CACHE_TTL);

        let err = cache
            .process_contract(CHAIN, TRSRY, "TRSRY")
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichmentError::Unavailable { attempts: 3, .. }));
        assert!(cache.storage().is_empty().await);
    }

    #[tokio::test]
    async fn test_fs_storage_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        let first = MetadataCache::new(
            FsStorage::new(dir.path().to_path_buf()).await.unwrap(),
            MockSource::default(),
            DEFAULT_CACHE_TTL,
        );
        first.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        assert!(dir
            .path()
            .join("1/0xa8687a15d4be32cc8f0a8a7b9704a4c3993d9613.json")
            .exists());

        let second = MetadataCache::new(
            FsStorage::new(dir.path().to_path_buf()).await.unwrap(),
            MockSource::default(),
            DEFAULT_CACHE_TTL,
        );
        second.process_contract(CHAIN, TRSRY, "TRSRY").await.unwrap();
        assert_eq!(fetches(&second), 0);
    }
}
