//! Document persistence helpers.
//!
//! Every record in this crate is a self-contained JSON document, one file per
//! id. Writes go to a temporary file in the target directory followed by an
//! atomic rename, so a reader never observes a partially written record.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Serialize `value` as pretty JSON and atomically move it into place.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| Error::corrupt_record(path, e))?;
    let path: PathBuf = path.to_owned();

    // Blocking FS work runs on a thread-pool thread.
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let dir = path.parent().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("record path has no parent directory: {}", path.display()),
            )
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| std::io::Error::other(format!("storage task panicked: {e}")))??;

    Ok(())
}

/// Read a JSON document. A missing file is `Ok(None)`; a malformed one is a
/// storage failure naming the offending path.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::corrupt_record(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Delete a document if it exists. Missing files are not an error — the
/// retention sweep may race a concurrent delete.
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");

        let doc = Doc {
            name: "probe".to_string(),
            count: 3,
        };
        write_json_atomic(&path, &doc).await.unwrap();

        let loaded: Option<Doc> = read_json(&path).await.unwrap();
        assert_eq!(loaded, Some(doc));
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let loaded: Option<Doc> = read_json(&dir.path().join("absent.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_read_malformed_is_storage_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let result: Result<Option<Doc>> = read_json(&path).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(
            &path,
            &Doc {
                name: "x".to_string(),
                count: 0,
            },
        )
        .await
        .unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["doc.json".to_string()]);
    }
}
