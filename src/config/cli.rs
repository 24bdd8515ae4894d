use crate::core::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// 本機檔案系統；相對路徑以 `base_path` 為根，絕對路徑照用
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        tracing::debug!("Reading {}", full_path.display());
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let root = self.resolve(dir);
        let mut pending = vec![PathBuf::new()];
        let mut files = Vec::new();

        while let Some(relative) = pending.pop() {
            let mut entries = tokio::fs::read_dir(root.join(&relative)).await?;
            while let Some(entry) = entries.next_entry().await? {
                let child = relative.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    pending.push(child);
                } else {
                    files.push(Path::new(dir).join(child).to_string_lossy().into_owned());
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
