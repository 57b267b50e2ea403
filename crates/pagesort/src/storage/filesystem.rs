use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Highest numbered suffix tried before giving up on a name.
const MAX_CONFLICT_SUFFIX: u32 = 1000;

/// Move a file from `src` to `dst`. Uses `rename` first (fast, atomic on the
/// same filesystem) and falls back to copy + delete for cross-device moves.
pub async fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if tokio::fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }

    tokio::fs::copy(src, dst)
        .await
        .map_err(|e| StorageError::MoveFile {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source: e,
        })?;
    tokio::fs::remove_file(src)
        .await
        .map_err(|e| StorageError::MoveFile {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source: e,
        })?;
    Ok(())
}

pub async fn copy_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    tokio::fs::copy(src, dst)
        .await
        .map(|_| ())
        .map_err(|e| StorageError::CopyFile {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source: e,
        })
}

pub async fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })
}

/// True if anything, including a broken symlink, occupies `path`.
pub async fn path_taken(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

/// Finds a free name in `directory`, appending `_2`, `_3`, ... to the stem.
///
/// Returns a candidate only; a concurrent writer may still take it.
pub async fn resolve_conflict(directory: &Path, file_name: &str) -> Result<PathBuf, StorageError> {
    let path = directory.join(file_name);
    if !path_taken(&path).await {
        return Ok(path);
    }

    let (base, ext) = split_extension(file_name);
    for counter in 2..=MAX_CONFLICT_SUFFIX {
        let candidate = match ext {
            Some(ext) => format!("{}_{}.{}", base, counter, ext),
            None => format!("{}_{}", base, counter),
        };
        let candidate = directory.join(candidate);
        if !path_taken(&candidate).await {
            return Ok(candidate);
        }
    }

    Err(StorageError::FileExists(path))
}

/// Splits `name.ext` into `("name", Some("ext"))`. A leading dot is part of
/// the stem.
pub fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(0) | None => (file_name, None),
        Some(dot) => (&file_name[..dot], Some(&file_name[dot + 1..])),
    }
}
