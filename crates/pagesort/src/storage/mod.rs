//! Filesystem side of finished documents: splitting pages out of the clone
//! and renaming the result.

pub mod filesystem;
pub mod rename;
pub mod split;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;

pub use rename::FsRenamer;
pub use split::{count_pages, PdfSplitter};

/// Renames a document, keeping its directory and extension.
#[async_trait]
pub trait DocumentRenamer: Send + Sync {
    /// Returns the new full path of the document.
    async fn rename(&self, document_path: &str, new_file_name: &str)
        -> Result<PathBuf, StorageError>;
}

/// Copies selected pages of a PDF into a new PDF.
#[async_trait]
pub trait DocumentSplitter: Send + Sync {
    /// Returns the path actually written, which differs from `output_path`
    /// when that name is already taken.
    async fn split(
        &self,
        source: &Path,
        pages: &[u32],
        output_path: &Path,
    ) -> Result<PathBuf, StorageError>;
}
