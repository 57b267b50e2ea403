//! Working-directory layout derived from a document path.
//!
//! Every opened document gets a sibling data directory:
//!
//! ```text
//! C:\docs\file.pdf
//! C:\docs\file-data\            data directory
//! C:\docs\file-data\file.pdf    clone all work reads from
//! C:\docs\file-data\images\     one <page>.webp per page
//! C:\docs\file-data\done\       split, named documents
//! ```
//!
//! Paths are built as strings so a Windows path keeps its backslashes even
//! when the crate runs elsewhere.

use std::path::PathBuf;

use serde::Serialize;

const DATA_SUFFIX: &str = "-data";
const IMAGES_DIR: &str = "images";
const IMAGE_EXTENSION: &str = "webp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPaths {
    pub document_path: String,
    pub data_directory: String,
    pub images_directory: String,
    pub document_clone_path: String,
    #[serde(skip)]
    separator: char,
}

impl DocumentPaths {
    pub fn from_document_path(document_path: &str) -> Self {
        let separator = separator_for(document_path);
        let data_directory = data_directory_for(document_path);
        let images_directory = format!("{}{}{}", data_directory, separator, IMAGES_DIR);
        let document_clone_path = format!(
            "{}{}{}",
            data_directory,
            separator,
            basename(document_path)
        );

        Self {
            document_path: document_path.to_string(),
            data_directory,
            images_directory,
            document_clone_path,
            separator,
        }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Directory that receives the split, named documents.
    pub fn done_directory(&self, name: &str) -> String {
        format!("{}{}{}", self.data_directory, self.separator, name)
    }

    pub fn page_image_path(&self, page: u32) -> PathBuf {
        page_image_path(&self.images_directory, self.separator, page)
    }
}

/// `<images>/<page>.webp`, using the separator of the images directory.
pub fn page_image_path(images_directory: &str, separator: char, page: u32) -> PathBuf {
    PathBuf::from(format!(
        "{}{}{}.{}",
        images_directory, separator, page, IMAGE_EXTENSION
    ))
}

pub fn data_directory_for(document_path: &str) -> String {
    match document_path.strip_suffix(".pdf") {
        Some(stem) => format!("{}{}", stem, DATA_SUFFIX),
        None => format!("{}{}", document_path, DATA_SUFFIX),
    }
}

/// Backslash when the path already uses one, otherwise the platform separator.
pub fn separator_for(path: &str) -> char {
    if path.contains('\\') {
        '\\'
    } else {
        std::path::MAIN_SEPARATOR
    }
}

/// Last path component, splitting on both separators.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
