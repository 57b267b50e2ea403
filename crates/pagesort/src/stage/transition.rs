//! Pure stage transitions.
//!
//! Each function consumes a record and returns the next one. None of them
//! touch the filesystem, the clock or the store; the pipeline does that.
//! A transition applied to the wrong stage is a programming error and
//! returns [`StageError::InvalidTransition`].

use super::history::FileNameHistory;
use super::record::{ClassificationResult, DocumentFile, Stage, StageRecord};
use super::{SelectedPages, StageId};
use crate::error::StageError;

fn invalid(id: &StageId, from: &Stage, operation: &'static str) -> StageError {
    StageError::InvalidTransition {
        id: id.clone(),
        from: from.name(),
        operation,
    }
}

pub fn begin_preprocess(
    id: StageId,
    selected_pages: SelectedPages,
    data_directory: String,
    images_directory: String,
) -> StageRecord {
    StageRecord {
        id,
        selected_pages,
        data_directory,
        images_directory,
        stage: Stage::PagePending,
    }
}

pub fn complete_preprocess(
    record: StageRecord,
    result: ClassificationResult,
) -> Result<StageRecord, StageError> {
    match record.stage {
        Stage::PagePending => {
            let page_number_prefix = record.selected_pages.page_number_prefix();
            Ok(StageRecord {
                stage: Stage::PageSucceeded {
                    result,
                    page_number_prefix,
                },
                ..record
            })
        }
        ref other => Err(invalid(&record.id, other, "complete preprocess")),
    }
}

pub fn fail_preprocess(
    record: StageRecord,
    error_message: String,
) -> Result<StageRecord, StageError> {
    match record.stage {
        Stage::PagePending => Ok(StageRecord {
            stage: Stage::PageErrored { error_message },
            ..record
        }),
        ref other => Err(invalid(&record.id, other, "fail preprocess")),
    }
}

/// Moves a classified page range to document level.
pub fn promote_to_document(
    record: StageRecord,
    document_path: String,
    file_name: String,
) -> Result<StageRecord, StageError> {
    match record.stage {
        Stage::PageSucceeded {
            result,
            page_number_prefix,
        } => Ok(StageRecord {
            stage: Stage::DocumentPending {
                classification: result,
                page_number_prefix,
                document: DocumentFile {
                    document_path,
                    file_name,
                },
            },
            ..record
        }),
        other => Err(invalid(&record.id, &other, "promote")),
    }
}

pub fn complete_document(record: StageRecord) -> Result<StageRecord, StageError> {
    match record.stage {
        Stage::DocumentPending {
            classification,
            page_number_prefix,
            document,
        } => Ok(StageRecord {
            stage: Stage::DocumentSucceeded {
                classification,
                page_number_prefix,
                document,
            },
            ..record
        }),
        other => Err(invalid(&record.id, &other, "complete document")),
    }
}

pub fn fail_document(
    record: StageRecord,
    error_message: String,
) -> Result<StageRecord, StageError> {
    match record.stage {
        Stage::DocumentPending {
            classification,
            page_number_prefix,
            document,
        } => Ok(StageRecord {
            stage: Stage::DocumentErrored {
                classification,
                page_number_prefix,
                document,
                error_message,
            },
            ..record
        }),
        other => Err(invalid(&record.id, &other, "fail document")),
    }
}

/// Seals a processed document. The history starts with its current name.
pub fn finalize(record: StageRecord) -> Result<StageRecord, StageError> {
    match record.stage {
        Stage::DocumentSucceeded {
            classification,
            page_number_prefix,
            document,
        } => {
            let file_name_history = FileNameHistory::starting_with(document.file_name.clone());
            Ok(StageRecord {
                stage: Stage::Finished {
                    classification,
                    page_number_prefix,
                    document,
                    file_name_history,
                },
                ..record
            })
        }
        other => Err(invalid(&record.id, &other, "finalize")),
    }
}

/// Records a completed rename of a finished document.
pub fn apply_rename(
    record: StageRecord,
    new_document_path: String,
    clean_name: String,
) -> Result<StageRecord, StageError> {
    match record.stage {
        Stage::Finished {
            classification,
            page_number_prefix,
            mut file_name_history,
            ..
        } => {
            file_name_history.push(clean_name.clone());
            Ok(StageRecord {
                stage: Stage::Finished {
                    classification,
                    page_number_prefix,
                    document: DocumentFile {
                        document_path: new_document_path,
                        file_name: clean_name,
                    },
                    file_name_history,
                },
                ..record
            })
        }
        other => Err(invalid(&record.id, &other, "rename")),
    }
}
