//! In-memory stand-ins for the extractor, classifier, splitter and renamer.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use pagesort::extractor::{ExtractionRequest, ExtractionReport};
use pagesort::{
    CancelFlag, ClassificationResult, Classifier, DocumentRenamer, DocumentSplitter,
    ImageExtractor, PagesortError, ProcessError, ProgressReporter, StorageError,
};

/// Writes an empty `<page>.webp` for every page of a fixed-size document.
pub struct StubExtractor {
    pub total_pages: u32,
}

#[async_trait]
impl ImageExtractor for StubExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest,
        _progress: &dyn ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ExtractionReport, PagesortError> {
        std::fs::create_dir_all(&request.images_directory).unwrap();
        if request.document_path != request.document_clone_path {
            std::fs::copy(&request.document_path, &request.document_clone_path).unwrap();
        }
        let mut newly_extracted = Vec::new();
        for page in 1..=self.total_pages {
            if cancel.is_cancelled() {
                break;
            }
            std::fs::write(request.images_directory.join(format!("{page}.webp")), b"webp").unwrap();
            newly_extracted.push(page);
        }
        Ok(ExtractionReport {
            total_pages: self.total_pages,
            extracted_pages: newly_extracted.clone(),
            newly_extracted,
            cancelled: cancel.is_cancelled(),
        })
    }
}

/// Answers by the file name of the first page image: `3.webp` -> page 3.
pub struct ScriptedClassifier {
    answers: Mutex<HashMap<u32, Result<ClassificationResult, String>>>,
    gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call waits until the gate is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn answer(self, first_page: u32, result: ClassificationResult) -> Self {
        self.answers.lock().unwrap().insert(first_page, Ok(result));
        self
    }

    pub fn fail(self, first_page: u32, message: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(first_page, Err(message.to_string()));
        self
    }
}

fn page_of(path: &Path) -> Option<u32> {
    path.file_stem()?.to_str()?.parse().ok()
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, pages: &[PathBuf]) -> Result<ClassificationResult, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let first = pages.first().and_then(|p| page_of(p)).unwrap_or(0);
        match self.answers.lock().unwrap().get(&first) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(message)) => Err(ProcessError::ClassificationFailed(message.clone())),
            None => Err(ProcessError::ClassificationFailed(format!(
                "no answer scripted for page {first}"
            ))),
        }
    }
}

/// Always fails, as a full disk would.
pub struct FailingSplitter;

#[async_trait]
impl DocumentSplitter for FailingSplitter {
    async fn split(
        &self,
        _source: &Path,
        _pages: &[u32],
        output_path: &Path,
    ) -> Result<PathBuf, StorageError> {
        Err(StorageError::WritePdf {
            path: output_path.to_path_buf(),
            reason: "No space left on device".to_string(),
        })
    }
}

/// Computes the renamed path without touching the disk and records calls.
#[derive(Default)]
pub struct RecordingRenamer {
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl DocumentRenamer for RecordingRenamer {
    async fn rename(&self, document_path: &str, new_file_name: &str) -> Result<PathBuf, StorageError> {
        self.calls
            .lock()
            .unwrap()
            .push((document_path.to_string(), new_file_name.to_string()));
        Ok(Path::new(document_path).with_file_name(format!("{new_file_name}.pdf")))
    }
}

/// Refuses every rename because the target exists.
pub struct TakenRenamer;

#[async_trait]
impl DocumentRenamer for TakenRenamer {
    async fn rename(&self, document_path: &str, new_file_name: &str) -> Result<PathBuf, StorageError> {
        Err(StorageError::FileExists(
            Path::new(document_path).with_file_name(format!("{new_file_name}.pdf")),
        ))
    }
}
