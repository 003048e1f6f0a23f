use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

/// On-disk store for message image blobs. The store hands back an opaque
/// filename; messages carry that reference and the HTTP layer serves the
/// directory statically.
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a blob under a generated name, keeping the original extension
    /// so browsers sniff the right content type. Returns the reference.
    pub async fn store(&self, original_name: Option<&str>, data: &[u8]) -> Result<String> {
        let ext = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let filename = format!("{}{}", Uuid::new_v4(), ext);
        fs::write(self.dir.join(&filename), data).await?;
        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> UploadStore {
        let dir = std::env::temp_dir().join(format!("courier-uploads-{}", Uuid::new_v4()));
        UploadStore::new(dir).await.unwrap()
    }

    #[tokio::test]
    async fn stores_blob_and_keeps_extension() {
        let store = store().await;
        let name = store.store(Some("cat.jpg"), b"not really a jpeg").await.unwrap();
        assert!(name.ends_with(".jpg"));

        let bytes = fs::read(store.dir().join(&name)).await.unwrap();
        assert_eq!(bytes, b"not really a jpeg");
    }

    #[tokio::test]
    async fn missing_original_name_still_stores() {
        let store = store().await;
        let name = store.store(None, b"blob").await.unwrap();
        assert!(!name.contains('.'));
        assert!(store.dir().join(&name).exists());
    }
}
