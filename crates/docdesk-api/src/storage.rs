use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 16;

/// On-disk home of uploaded documents.
///
/// Every upload lands in one flat directory as `{uuid}{.ext}`; the user's
/// filename is only kept in the database, never used as a path.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh collision-free name that keeps a cleaned-up extension of
    /// `original`, so downloads still open with the right application.
    pub fn stored_name(original: &str) -> String {
        let id = Uuid::new_v4();
        match extension_of(original) {
            Some(ext) => format!("{id}.{ext}"),
            None => id.to_string(),
        }
    }

    pub fn file_path(&self, stored_name: &str) -> PathBuf {
        self.dir.join(stored_name)
    }

    /// Removes a stored file. A file that is already gone only warns.
    pub async fn delete_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                info!("Deleted stored file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file {} already gone", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of many files. Failures are logged and skipped.
    pub async fn delete_files<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut removed = 0;
        for path in paths {
            match self.delete_file(Path::new(&path)).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to delete {}: {}", path, e),
            }
        }
        removed
    }
}

fn extension_of(original: &str) -> Option<String> {
    let (_, ext) = original.rsplit_once('.')?;
    let ext: String = ext
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_name_keeps_clean_extension() {
        let name = Storage::stored_name("Quarterly Report.PDF");
        assert!(name.ends_with(".pdf"));
        assert_eq!(name.len(), 36 + 4);

        assert!(!Storage::stored_name("README").contains('.'));
        assert!(Storage::stored_name("evil.p/h\\p").ends_with(".php"));
        assert!(!Storage::stored_name("trailing.").contains('.'));
    }

    #[test]
    fn stored_names_are_unique() {
        assert_ne!(Storage::stored_name("a.txt"), Storage::stored_name("a.txt"));
    }

    #[tokio::test]
    async fn delete_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("uploads")).await.unwrap();
        let path = storage.file_path("present.txt");
        tokio::fs::write(&path, b"x").await.unwrap();

        storage.delete_file(&path).await.unwrap();
        assert!(!path.exists());
        storage.delete_file(&path).await.unwrap();

        let removed = storage
            .delete_files(vec![path.display().to_string()])
            .await;
        assert_eq!(removed, 1);
    }
}
