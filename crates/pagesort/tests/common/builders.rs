//! Records and results at a given stage, built through the public transitions.

#![allow(dead_code)]

use pagesort::stage::{
    begin_preprocess, complete_document, complete_preprocess, finalize, promote_to_document,
    ClassificationResult, DateEntry,
};
use pagesort::{SelectedPages, StageId, StageRecord};

pub fn classification(suggested_file_name: &str) -> ClassificationResult {
    ClassificationResult {
        dates: vec![DateEntry {
            date: "2024-03-01".to_string(),
            description: "issue date".to_string(),
        }],
        type_name: "Invoice".to_string(),
        type_abbr: "INV".to_string(),
        summary: "Electricity invoice".to_string(),
        suggested_file_name: suggested_file_name.to_string(),
    }
}

pub fn pending(id: &str, pages: Vec<u32>) -> StageRecord {
    begin_preprocess(
        StageId::from(id),
        SelectedPages::new(pages).expect("valid selection"),
        "/scans/batch-data".to_string(),
        "/scans/batch-data/images".to_string(),
    )
}

pub fn succeeded(id: &str, pages: Vec<u32>, name: &str) -> StageRecord {
    complete_preprocess(pending(id, pages), classification(name)).expect("pending record")
}

/// A finished record whose document lives at `document_path`.
pub fn finished(id: &str, pages: Vec<u32>, document_path: &str, file_name: &str) -> StageRecord {
    let promoted = promote_to_document(
        succeeded(id, pages, file_name),
        document_path.to_string(),
        file_name.to_string(),
    )
    .expect("succeeded record");
    finalize(complete_document(promoted).expect("document pending")).expect("document succeeded")
}
