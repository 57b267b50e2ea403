//! Page classification.
//!
//! A classifier looks at the rendered images of a page selection and returns
//! a [`ClassificationResult`]: the document type, its dates, a summary and a
//! suggested file name. Backends only have to produce model text; turning that
//! text into a validated result is shared here.

pub mod anthropic;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::sanitize::sanitize_file_name;
use crate::stage::ClassificationResult;

pub use anthropic::AnthropicClassifier;

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classifies the pages whose images are at `pages`, in selection order.
    async fn classify(&self, pages: &[PathBuf]) -> Result<ClassificationResult, ProcessError>;
}

/// Returns the first balanced `{...}` object in `text`, ignoring braces
/// inside JSON strings.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses model output into a validated result with a filesystem-safe
/// suggested name.
pub fn parse_classification(text: &str) -> Result<ClassificationResult, ProcessError> {
    let json = extract_json(text).ok_or_else(|| {
        ProcessError::ClassificationFailed("response contains no JSON object".to_string())
    })?;

    let mut result: ClassificationResult = serde_json::from_str(json).map_err(|e| {
        ProcessError::ClassificationFailed(format!("failed to parse classification: {}", e))
    })?;
    result.validate().map_err(ProcessError::ClassificationFailed)?;

    result.suggested_file_name = sanitize_file_name(&result.suggested_file_name);
    if result.suggested_file_name.is_empty() {
        return Err(ProcessError::ClassificationFailed(
            "suggested_file_name has no usable characters".to_string(),
        ));
    }
    Ok(result)
}
