use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::error::{PagesortError, ProcessError, Result, StageError, StoreError};
use crate::extractor::{CancelFlag, ExtractionReport, ExtractionRequest};
use crate::paths::DocumentPaths;
use crate::sanitize::{redact_path, redact_str};
use crate::stage::{
    begin_preprocess, complete_document, complete_preprocess, fail_document, fail_preprocess,
    finalize, promote_to_document, Partition, SelectedPages, Stage, StageId, StageRecord,
};
use crate::store::{MoveOutcome, RenameOutcome, WorkflowStore};

use super::progress::{PipelineStep, ProgressEvent, ProgressReporter};
use super::Collaborators;

/// One opened document: its derived paths, its records and the
/// collaborators that do the work.
pub struct Pipeline {
    config: Arc<Config>,
    paths: DocumentPaths,
    store: Arc<WorkflowStore>,
    collaborators: Collaborators,
    /// Page count reported by the last extraction, 0 until then.
    page_count: AtomicU32,
}

impl Pipeline {
    pub fn open(config: Config, document_path: &str, collaborators: Collaborators) -> Self {
        let paths = DocumentPaths::from_document_path(document_path);
        info!(
            document = %redact_str(document_path),
            "Opened document"
        );
        Self {
            config: Arc::new(config),
            paths,
            store: Arc::new(WorkflowStore::new()),
            collaborators,
            page_count: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &DocumentPaths {
        &self.paths
    }

    pub fn store(&self) -> &Arc<WorkflowStore> {
        &self.store
    }

    fn document_name(&self) -> String {
        redact_str(&self.paths.document_path)
    }

    /// Renders every page of the document that has no image yet.
    pub async fn extract_images(
        &self,
        progress: &dyn ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ExtractionReport> {
        let span = info_span!("extract_images", document = %self.document_name());
        self.step_extract_images(progress, cancel)
            .instrument(span)
            .await
    }

    async fn step_extract_images(
        &self,
        progress: &dyn ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ExtractionReport> {
        progress.report(ProgressEvent::started(PipelineStep::ExtractImages, None));
        let request = ExtractionRequest::from(&self.paths);

        match self
            .collaborators
            .extractor
            .extract(&request, progress, cancel)
            .await
        {
            Ok(report) => {
                self.page_count.store(report.total_pages, Ordering::SeqCst);
                progress.report(ProgressEvent::completed(PipelineStep::ExtractImages, None));
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Image extraction failed");
                progress.report(ProgressEvent::failed(
                    PipelineStep::ExtractImages,
                    None,
                    e.to_string(),
                ));
                Err(e)
            }
        }
    }

    /// Starts a new record for `pages`, in the pending partition.
    ///
    /// Once images were extracted, pages past the end of the document are
    /// rejected.
    pub fn select_pages(&self, pages: Vec<u32>) -> Result<StageId> {
        let selected = SelectedPages::new(pages)?;
        let page_count = self.page_count.load(Ordering::SeqCst);
        if page_count > 0 {
            if let Some(page) = selected.as_slice().iter().find(|page| **page > page_count) {
                return Err(StageError::PageOutOfRange {
                    page: *page,
                    page_count,
                }
                .into());
            }
        }
        self.begin(selected)
    }

    fn begin(&self, selected: SelectedPages) -> Result<StageId> {
        let id = StageId::generate();
        let record = begin_preprocess(
            id.clone(),
            selected,
            self.paths.data_directory.clone(),
            self.paths.images_directory.clone(),
        );
        self.store.add(record)?;
        debug!(id = %id, "Pages selected");
        Ok(id)
    }

    /// Classifies a pending record and moves it to succeeded or errored.
    ///
    /// A classifier failure is recorded on the record and is not an error
    /// here. If the session was closed meanwhile the result is dropped and
    /// [`ProcessError::SessionClosed`] is returned.
    pub async fn classify(&self, id: &StageId, progress: &dyn ProgressReporter) -> Result<StageRecord> {
        let span = info_span!("classify", id = %id, document = %self.document_name());
        self.step_classify(id, progress).instrument(span).await
    }

    async fn step_classify(&self, id: &StageId, progress: &dyn ProgressReporter) -> Result<StageRecord> {
        let epoch = self.store.epoch();
        let record = self.lookup(id)?;
        if !matches!(record.stage(), Stage::PagePending) {
            return Err(wrong_stage(&record, "classify"));
        }

        progress.report(ProgressEvent::started(PipelineStep::Classify, Some(id)));
        let pages = record.page_image_paths();
        let next = match self.collaborators.classifier.classify(&pages).await {
            Ok(result) => {
                progress.report(ProgressEvent::completed(PipelineStep::Classify, Some(id)));
                complete_preprocess(record, result)?
            }
            Err(e) => {
                warn!(error = %e, "Classification failed");
                progress.report(ProgressEvent::failed(
                    PipelineStep::Classify,
                    Some(id),
                    e.to_string(),
                ));
                let message = match e {
                    ProcessError::ClassificationFailed(message) => message,
                    other => other.to_string(),
                };
                fail_preprocess(record, message)?
            }
        };

        self.commit(epoch, id, "page_pending", next)
    }

    /// Splits a classified page range into its own PDF and finishes it.
    ///
    /// The document is named after the suggested file name; a split failure
    /// leaves the record in the errored partition.
    pub async fn process_document(
        &self,
        id: &StageId,
        progress: &dyn ProgressReporter,
    ) -> Result<StageRecord> {
        let span = info_span!("process_document", id = %id, document = %self.document_name());
        self.step_process_document(id, progress)
            .instrument(span)
            .await
    }

    async fn step_process_document(
        &self,
        id: &StageId,
        progress: &dyn ProgressReporter,
    ) -> Result<StageRecord> {
        let epoch = self.store.epoch();
        let record = self.lookup(id)?;
        let file_name = match record.stage() {
            Stage::PageSucceeded { result, .. } => result.suggested_file_name.clone(),
            _ => return Err(wrong_stage(&record, "process document")),
        };

        progress.report(ProgressEvent::started(PipelineStep::SplitDocument, Some(id)));
        let done_directory = PathBuf::from(
            self.paths
                .done_directory(&self.config.storage.done_directory),
        );
        let output = done_directory.join(format!("{}.pdf", file_name));
        let source = PathBuf::from(&self.paths.document_clone_path);

        let split = self
            .collaborators
            .splitter
            .split(&source, record.selected_pages().as_slice(), &output)
            .await;

        let next = match split {
            Ok(written) => {
                let name = file_stem(&written).unwrap_or(file_name);
                debug!(file = %redact_path(&written), "Pages split");
                let promoted =
                    promote_to_document(record, written.to_string_lossy().into_owned(), name)?;
                progress.report(ProgressEvent::completed(
                    PipelineStep::SplitDocument,
                    Some(id),
                ));
                finalize(complete_document(promoted)?)?
            }
            Err(e) => {
                let error = ProcessError::SplitFailed {
                    path: output.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %e, "Splitting pages failed");
                progress.report(ProgressEvent::failed(
                    PipelineStep::SplitDocument,
                    Some(id),
                    error.to_string(),
                ));
                let promoted = promote_to_document(
                    record,
                    output.to_string_lossy().into_owned(),
                    file_name,
                )?;
                fail_document(promoted, error.to_string())?
            }
        };

        self.commit(epoch, id, "page_succeeded", next)
    }

    /// Renames a finished document on disk and records the new name.
    pub async fn rename(&self, id: &StageId, raw_name: &str) -> Result<StageRecord> {
        let span = info_span!("rename", id = %id, document = %self.document_name());
        self.step_rename(id, raw_name).instrument(span).await
    }

    async fn step_rename(&self, id: &StageId, raw_name: &str) -> Result<StageRecord> {
        let renamer = self.collaborators.renamer.as_ref();
        match self.store.rename_finished(id, raw_name, renamer).await? {
            RenameOutcome::Renamed(record) => Ok(record),
            RenameOutcome::Discarded => Err(ProcessError::SessionClosed.into()),
        }
    }

    /// Drops an errored record and starts a fresh attempt on the same pages.
    pub fn retry(&self, id: &StageId) -> Result<StageId> {
        let _span = info_span!("retry", id = %id).entered();
        let record = self.lookup(id)?;
        if record.partition() != Partition::Errored {
            return Err(StoreError::NotInPartition {
                id: id.clone(),
                partition: Partition::Errored,
            }
            .into());
        }

        let removed = self.store.remove(id)?;
        let new_id = self.begin(removed.selected_pages().clone())?;
        info!(new_id = %new_id, "Retrying pages");
        Ok(new_id)
    }

    /// `<prefix>-<file_name>` of a document-level record.
    pub fn display_name(&self, id: &StageId) -> Option<String> {
        self.store.get(id).and_then(|record| record.display_name())
    }

    /// Ends the session. Results still in flight are discarded.
    pub fn close(&self) -> u64 {
        let epoch = self.store.clear();
        info!(document = %self.document_name(), epoch, "Session closed");
        epoch
    }

    fn lookup(&self, id: &StageId) -> Result<StageRecord> {
        self.store
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()).into())
    }

    fn commit(
        &self,
        epoch: u64,
        id: &StageId,
        from_stage: &'static str,
        record: StageRecord,
    ) -> Result<StageRecord> {
        match self
            .store
            .move_to_partition_from(epoch, id, from_stage, record.clone())?
        {
            MoveOutcome::Applied => Ok(record),
            MoveOutcome::Discarded => {
                warn!(id = %id, "Session closed while working, result dropped");
                Err(ProcessError::SessionClosed.into())
            }
        }
    }
}

fn wrong_stage(record: &StageRecord, operation: &'static str) -> PagesortError {
    StageError::InvalidTransition {
        id: record.id().clone(),
        from: record.stage().name(),
        operation,
    }
    .into()
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
