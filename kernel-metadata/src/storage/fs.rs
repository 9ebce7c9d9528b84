use std::path::PathBuf;

use eyre::{Context, Result};
use tokio::fs;

use super::CacheStorage;

/// One file per key under `root`.
#[derive(Clone, Debug)]
pub struct FsStorage {
    pub root: PathBuf,
}

impl FsStorage {
    pub async fn new(root: PathBuf) -> Result<FsStorage> {
        fs::create_dir_all(&root)
            .await
            .wrap_err_with(|| format!("Failed to create cache dir {}", root.display()))?;
        Ok(FsStorage { root })
    }
}

impl CacheStorage for FsStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(key);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(fs::read(&path).await?))
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // readers never observe a partially written entry
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_put() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = FsStorage::new(dir.path().join("cache")).await?;

        assert_eq!(storage.get("1/0xab.json").await?, None);

        storage.put("1/0xab.json", b"{}".to_vec()).await?;
        assert_eq!(storage.get("1/0xab.json").await?, Some(b"{}".to_vec()));
        assert!(dir.path().join("cache/1/0xab.json").exists());

        storage.put("1/0xab.json", b"[]".to_vec()).await?;
        assert_eq!(storage.get("1/0xab.json").await?, Some(b"[]".to_vec()));
        Ok(())
    }
}
