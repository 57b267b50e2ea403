//! Units of work and the lifecycle they move through.
//!
//! A unit of work is a range of pages. It is classified (page stage),
//! split into its own named PDF (document stage) and finally becomes a
//! finished document that can still be renamed.
//!
//! ```text
//! PagePending ──▶ PageSucceeded ──▶ DocumentPending ──▶ DocumentSucceeded ──▶ Finished
//!      │                                  │
//!      └──▶ PageErrored                   └──▶ DocumentErrored
//! ```
//!
//! [`transition`] holds the pure functions that move a record between
//! stages; [`history`] guards the list of accepted file names.

pub mod history;
pub mod record;
pub mod transition;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StageError;

pub use history::{clean_file_name, FileNameHistory};
pub use record::{ClassificationResult, DateEntry, DocumentFile, Stage, StageRecord};
pub use transition::{
    apply_rename, begin_preprocess, complete_document, complete_preprocess, fail_document,
    fail_preprocess, finalize, promote_to_document,
};

/// Stable identifier of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Ordered, non-empty set of 1-based page numbers.
///
/// Order is whatever the caller selected; it is never re-sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SelectedPages(Vec<u32>);

impl SelectedPages {
    pub fn new(pages: Vec<u32>) -> Result<Self, StageError> {
        if pages.is_empty() {
            return Err(StageError::EmptySelection);
        }
        let mut seen = std::collections::HashSet::with_capacity(pages.len());
        for page in &pages {
            if *page == 0 {
                return Err(StageError::ZeroPage);
            }
            if !seen.insert(*page) {
                return Err(StageError::DuplicatePage(*page));
            }
        }
        Ok(Self(pages))
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Token prefixed to generated file names.
    ///
    /// First page zero-padded to three digits; a multi-page selection adds
    /// `_` and the last page. Both follow selection order.
    pub fn page_number_prefix(&self) -> String {
        let first = self.0[0];
        let last = self.0[self.0.len() - 1];
        if self.0.len() == 1 {
            format!("{:03}", first)
        } else {
            format!("{:03}_{:03}", first, last)
        }
    }
}

impl<'de> Deserialize<'de> for SelectedPages {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let pages = Vec::<u32>::deserialize(deserializer)?;
        SelectedPages::new(pages).map_err(D::Error::custom)
    }
}

/// Outcome of a record's current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Pending,
    Succeeded,
    Errored,
}

/// The four disjoint lists of the workflow store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Pending,
    Succeeded,
    Errored,
    Finished,
}

impl Partition {
    pub const ALL: [Partition; 4] = [
        Partition::Pending,
        Partition::Succeeded,
        Partition::Errored,
        Partition::Finished,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Partition::Pending => 0,
            Partition::Succeeded => 1,
            Partition::Errored => 2,
            Partition::Finished => 3,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Pending => write!(f, "pending"),
            Partition::Succeeded => write!(f, "succeeded"),
            Partition::Errored => write!(f, "errored"),
            Partition::Finished => write!(f, "finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_pages_rejects_empty() {
        assert_eq!(SelectedPages::new(vec![]), Err(StageError::EmptySelection));
    }

    #[test]
    fn test_selected_pages_rejects_duplicates() {
        assert_eq!(
            SelectedPages::new(vec![1, 2, 1]),
            Err(StageError::DuplicatePage(1))
        );
    }

    #[test]
    fn test_selected_pages_keep_input_order() {
        let pages = SelectedPages::new(vec![5, 2, 9]).unwrap();
        assert_eq!(pages.as_slice(), &[5, 2, 9]);
    }

    #[test]
    fn test_prefix_single_page() {
        let pages = SelectedPages::new(vec![3]).unwrap();
        assert_eq!(pages.page_number_prefix(), "003");
    }

    #[test]
    fn test_prefix_range_uses_first_and_last_in_selection_order() {
        let pages = SelectedPages::new(vec![12, 4, 7]).unwrap();
        assert_eq!(pages.page_number_prefix(), "012_007");
    }

    #[test]
    fn test_selected_pages_rejects_page_zero() {
        assert_eq!(SelectedPages::new(vec![2, 0]), Err(StageError::ZeroPage));
    }

    #[test]
    fn test_selected_pages_deserialize_validates() {
        let ok: SelectedPages = serde_json::from_str("[2,1]").unwrap();
        assert_eq!(ok.as_slice(), &[2, 1]);
        assert!(serde_json::from_str::<SelectedPages>("[]").is_err());
    }

    #[test]
    fn test_stage_id_generate_is_unique() {
        assert_ne!(StageId::generate(), StageId::generate());
    }

    #[test]
    fn test_partition_display() {
        assert_eq!(Partition::Finished.to_string(), "finished");
        assert_eq!(Partition::ALL.len(), 4);
    }
}
