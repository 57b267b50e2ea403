use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::history::FileNameHistory;
use super::{LifecycleStatus, Partition, SelectedPages, StageId};
use crate::paths::{page_image_path, separator_for};

/// A date the classifier found in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateEntry {
    pub date: String,
    pub description: String,
}

/// What the classifier says about a range of pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClassificationResult {
    pub dates: Vec<DateEntry>,
    pub type_name: String,
    pub type_abbr: String,
    pub summary: String,
    pub suggested_file_name: String,
}

impl ClassificationResult {
    /// Checks the fields every later stage relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.dates.is_empty() {
            return Err("classification contains no dates".to_string());
        }
        if self.type_name.trim().is_empty() {
            return Err("classification has an empty type_name".to_string());
        }
        if self.type_abbr.trim().is_empty() {
            return Err("classification has an empty type_abbr".to_string());
        }
        if self.suggested_file_name.trim().is_empty() {
            return Err("classification has an empty suggested_file_name".to_string());
        }
        Ok(())
    }
}

/// Location and name of the split document a record produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFile {
    pub document_path: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "stage",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Stage {
    PagePending,
    PageSucceeded {
        result: ClassificationResult,
        page_number_prefix: String,
    },
    PageErrored {
        error_message: String,
    },
    DocumentPending {
        classification: ClassificationResult,
        page_number_prefix: String,
        document: DocumentFile,
    },
    DocumentSucceeded {
        classification: ClassificationResult,
        page_number_prefix: String,
        document: DocumentFile,
    },
    DocumentErrored {
        classification: ClassificationResult,
        page_number_prefix: String,
        document: DocumentFile,
        error_message: String,
    },
    Finished {
        classification: ClassificationResult,
        page_number_prefix: String,
        document: DocumentFile,
        file_name_history: FileNameHistory,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::PagePending => "page_pending",
            Stage::PageSucceeded { .. } => "page_succeeded",
            Stage::PageErrored { .. } => "page_errored",
            Stage::DocumentPending { .. } => "document_pending",
            Stage::DocumentSucceeded { .. } => "document_succeeded",
            Stage::DocumentErrored { .. } => "document_errored",
            Stage::Finished { .. } => "finished",
        }
    }

    pub fn lifecycle_status(&self) -> LifecycleStatus {
        match self {
            Stage::PagePending | Stage::DocumentPending { .. } => LifecycleStatus::Pending,
            Stage::PageSucceeded { .. }
            | Stage::DocumentSucceeded { .. }
            | Stage::Finished { .. } => LifecycleStatus::Succeeded,
            Stage::PageErrored { .. } | Stage::DocumentErrored { .. } => LifecycleStatus::Errored,
        }
    }
}

/// One unit of work at one point of its lifecycle.
///
/// Records are immutable values; [`super::transition`] produces the next
/// one. Fields are private so the stage can only change through those
/// functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub(crate) id: StageId,
    pub(crate) selected_pages: SelectedPages,
    pub(crate) data_directory: String,
    pub(crate) images_directory: String,
    pub(crate) stage: Stage,
}

impl StageRecord {
    pub fn id(&self) -> &StageId {
        &self.id
    }

    pub fn selected_pages(&self) -> &SelectedPages {
        &self.selected_pages
    }

    pub fn data_directory(&self) -> &str {
        &self.data_directory
    }

    pub fn images_directory(&self) -> &str {
        &self.images_directory
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn lifecycle_status(&self) -> LifecycleStatus {
        self.stage.lifecycle_status()
    }

    /// Partition of the workflow store this record belongs in.
    pub fn partition(&self) -> Partition {
        match (&self.stage, self.lifecycle_status()) {
            (Stage::Finished { .. }, _) => Partition::Finished,
            (_, LifecycleStatus::Pending) => Partition::Pending,
            (_, LifecycleStatus::Succeeded) => Partition::Succeeded,
            (_, LifecycleStatus::Errored) => Partition::Errored,
        }
    }

    /// The classification, only while the record reports success.
    pub fn result(&self) -> Option<&ClassificationResult> {
        match &self.stage {
            Stage::PageSucceeded { result, .. } => Some(result),
            Stage::DocumentSucceeded { classification, .. }
            | Stage::Finished { classification, .. } => Some(classification),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.stage {
            Stage::PageErrored { error_message }
            | Stage::DocumentErrored { error_message, .. } => Some(error_message),
            _ => None,
        }
    }

    /// The classification carried by any record past page classification.
    pub fn classification(&self) -> Option<&ClassificationResult> {
        match &self.stage {
            Stage::PagePending | Stage::PageErrored { .. } => None,
            Stage::PageSucceeded { result, .. } => Some(result),
            Stage::DocumentPending { classification, .. }
            | Stage::DocumentSucceeded { classification, .. }
            | Stage::DocumentErrored { classification, .. }
            | Stage::Finished { classification, .. } => Some(classification),
        }
    }

    pub fn page_number_prefix(&self) -> Option<&str> {
        match &self.stage {
            Stage::PagePending | Stage::PageErrored { .. } => None,
            Stage::PageSucceeded {
                page_number_prefix, ..
            }
            | Stage::DocumentPending {
                page_number_prefix, ..
            }
            | Stage::DocumentSucceeded {
                page_number_prefix, ..
            }
            | Stage::DocumentErrored {
                page_number_prefix, ..
            }
            | Stage::Finished {
                page_number_prefix, ..
            } => Some(page_number_prefix),
        }
    }

    pub fn document(&self) -> Option<&DocumentFile> {
        match &self.stage {
            Stage::DocumentPending { document, .. }
            | Stage::DocumentSucceeded { document, .. }
            | Stage::DocumentErrored { document, .. }
            | Stage::Finished { document, .. } => Some(document),
            _ => None,
        }
    }

    pub fn file_name_history(&self) -> Option<&FileNameHistory> {
        match &self.stage {
            Stage::Finished {
                file_name_history, ..
            } => Some(file_name_history),
            _ => None,
        }
    }

    /// `<prefix>-<file_name>`, the name shown for document-level records.
    pub fn display_name(&self) -> Option<String> {
        let prefix = self.page_number_prefix()?;
        let document = self.document()?;
        Some(format!("{}-{}", prefix, document.file_name))
    }

    /// Image files of the selected pages, in selection order.
    pub fn page_image_paths(&self) -> Vec<PathBuf> {
        let separator = separator_for(&self.images_directory);
        self.selected_pages
            .as_slice()
            .iter()
            .map(|page| page_image_path(&self.images_directory, separator, *page))
            .collect()
    }
}
