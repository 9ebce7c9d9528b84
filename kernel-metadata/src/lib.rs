#![allow(async_fn_in_trait)]

//! Function and role metadata for deployed contracts, fetched from a block
//! explorer and cached per `(chain_id, address)`.

pub mod cache;
pub mod error;
pub mod explorer;
pub mod extractor;
pub mod rate_limit;
pub mod storage;

pub use self::{
    cache::{MetadataCache, DEFAULT_CACHE_TTL},
    error::EnrichmentError,
    explorer::{EtherscanClient, ExplorerConfig, ExplorerEndpoint, MetadataSource},
    extractor::{process_abi, process_source, ContractMetadata, Guard},
    rate_limit::RateLimiter,
    storage::{CacheStorage, CacheStorageErased, FsStorage, MemoryStorage},
};
