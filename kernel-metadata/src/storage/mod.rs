pub mod fs;
pub mod memory;

use alloy_primitives::Address;
use enum_dispatch::enum_dispatch;
use eyre::Result;
use kernel_types::ChainId;

pub use self::{fs::FsStorage, memory::MemoryStorage};

#[enum_dispatch(CacheStorage)]
#[derive(Clone)]
pub enum CacheStorageErased {
    MemoryStorage,
    FsStorage,
}

/// Byte store for serialized cache entries.
#[enum_dispatch]
pub trait CacheStorage: Clone {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()>;
}

/// `<chain_id>/<lowercase address>.json`
pub fn cache_key(chain_id: ChainId, address: Address) -> String {
    format!("{chain_id}/{address:#x}.json")
}
