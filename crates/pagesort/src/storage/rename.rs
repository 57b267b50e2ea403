use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::filesystem::{move_file, path_taken};
use super::DocumentRenamer;
use crate::error::StorageError;
use crate::sanitize::redact_path;

/// Renames documents on the local filesystem.
///
/// The directory and extension of the document are kept; only the stem
/// changes. An existing file is never overwritten.
#[derive(Debug, Clone, Default)]
pub struct FsRenamer;

impl FsRenamer {
    pub fn new() -> Self {
        Self
    }
}

fn validate_file_name(name: &str) -> Result<(), StorageError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(StorageError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// `<dir of document_path>/<new_file_name>.<ext of document_path>`
pub fn renamed_path(document_path: &Path, new_file_name: &str) -> PathBuf {
    let file_name = match document_path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", new_file_name, ext),
        None => new_file_name.to_string(),
    };
    match document_path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

#[async_trait]
impl DocumentRenamer for FsRenamer {
    async fn rename(
        &self,
        document_path: &str,
        new_file_name: &str,
    ) -> Result<PathBuf, StorageError> {
        validate_file_name(new_file_name)?;

        let current = Path::new(document_path);
        let target = renamed_path(current, new_file_name);
        if target == current {
            return Ok(target);
        }
        if path_taken(&target).await {
            return Err(StorageError::FileExists(target));
        }

        move_file(current, &target).await?;
        tracing::debug!(
            from = %redact_path(current),
            to = %redact_path(&target),
            "Document renamed on disk"
        );
        Ok(target)
    }
}
