//! Page image extraction.
//!
//! Every page of the document clone gets one `<page>.webp` in the images
//! directory. Pages that already have an image are skipped, so an
//! interrupted extraction resumes where it stopped.

pub mod magick;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{PagesortError, StorageError};
use crate::paths::DocumentPaths;
use crate::pipeline::progress::ProgressReporter;

pub use magick::MagickExtractor;

/// Cooperative cancellation shared between a caller and a running extraction.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub document_path: PathBuf,
    pub document_clone_path: PathBuf,
    pub images_directory: PathBuf,
}

impl From<&DocumentPaths> for ExtractionRequest {
    fn from(paths: &DocumentPaths) -> Self {
        Self {
            document_path: PathBuf::from(&paths.document_path),
            document_clone_path: PathBuf::from(&paths.document_clone_path),
            images_directory: PathBuf::from(&paths.images_directory),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    pub total_pages: u32,
    /// Pages extracted by this call.
    pub newly_extracted: Vec<u32>,
    /// Every page that has an image now, sorted.
    pub extracted_pages: Vec<u32>,
    pub cancelled: bool,
}

impl ExtractionReport {
    pub fn is_complete(&self) -> bool {
        self.extracted_pages.len() as u32 == self.total_pages
    }
}

#[async_trait]
pub trait ImageExtractor: Send + Sync {
    async fn extract(
        &self,
        request: &ExtractionRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ExtractionReport, PagesortError>;
}

/// A contiguous run of pages rendered by one `magick` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBatch {
    pub first: u32,
    pub last: u32,
}

impl PageBatch {
    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.first..=self.last
    }

    pub fn page_count(&self) -> u32 {
        self.last - self.first + 1
    }
}

/// Page numbers that already have a `<page>.webp` in `images_directory`.
///
/// A missing directory means nothing was extracted yet.
pub async fn scan_extracted_pages(images_directory: &Path) -> Result<BTreeSet<u32>, StorageError> {
    let mut pages = BTreeSet::new();
    let mut entries = match tokio::fs::read_dir(images_directory).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(pages),
        Err(e) => {
            return Err(StorageError::ReadDirectory {
                path: images_directory.to_path_buf(),
                source: e,
            })
        }
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::ReadDirectory {
            path: images_directory.to_path_buf(),
            source: e,
        })?
    {
        if let Some(page) = page_number_of(&entry.path()) {
            pages.insert(page);
        }
    }
    Ok(pages)
}

/// `12.webp` -> `Some(12)`; anything else, including `index-3.webp`, is ignored.
fn page_number_of(path: &Path) -> Option<u32> {
    if path.extension().and_then(|e| e.to_str()) != Some("webp") {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|page| *page > 0)
}

/// Pages `1..=total_pages` without an image, ascending.
pub fn missing_pages(total_pages: u32, extracted: &BTreeSet<u32>) -> Vec<u32> {
    (1..=total_pages)
        .filter(|page| !extracted.contains(page))
        .collect()
}

/// Groups ascending pages into contiguous runs: `[1,2,3,7,9,10]` -> `1-3, 7, 9-10`.
pub fn contiguous_runs(pages: &[u32]) -> Vec<PageBatch> {
    let mut runs: Vec<PageBatch> = Vec::new();
    for &page in pages {
        match runs.last_mut() {
            Some(run) if page == run.last + 1 => run.last = page,
            _ => runs.push(PageBatch {
                first: page,
                last: page,
            }),
        }
    }
    runs
}

/// Splits runs so no batch is longer than `batch_size` pages.
pub fn plan_batches(missing: &[u32], batch_size: usize) -> Vec<PageBatch> {
    let size = batch_size.max(1) as u32;
    let mut batches = Vec::new();
    for run in contiguous_runs(missing) {
        let mut first = run.first;
        while first <= run.last {
            let last = (first + size - 1).min(run.last);
            batches.push(PageBatch { first, last });
            first = last + 1;
        }
    }
    batches
}
