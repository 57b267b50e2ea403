use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lopdf::{Document, Object, ObjectId};

use super::filesystem::{ensure_directory, resolve_conflict};
use super::DocumentSplitter;
use crate::error::StorageError;

/// Writes a subset of a PDF's pages into a new PDF with `lopdf`.
#[derive(Debug, Clone, Default)]
pub struct PdfSplitter;

impl PdfSplitter {
    pub fn new() -> Self {
        Self
    }
}

/// Number of pages in the PDF at `path`.
pub fn count_pages(path: &Path) -> Result<u32, StorageError> {
    let document = Document::load(path).map_err(|e| StorageError::ReadPdf {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(document.get_pages().len() as u32)
}

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 32;

/// Attributes `page_id` inherits and does not set itself.
fn inherited_attributes(document: &Document, page_id: ObjectId) -> Vec<(Vec<u8>, Object)> {
    let mut found = Vec::new();
    let Ok(page) = document.get_dictionary(page_id) else {
        return found;
    };
    let mut missing: Vec<&[u8]> = INHERITABLE_KEYS
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let Some(node_id) = parent else { break };
        if missing.is_empty() {
            break;
        }
        let Ok(node) = document.get_dictionary(node_id) else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    found
}

fn write_selected_pages(source: &Path, pages: &[u32], output: &Path) -> Result<(), StorageError> {
    let mut document = Document::load(source).map_err(|e| StorageError::ReadPdf {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    let write_error = |reason: String| StorageError::WritePdf {
        path: output.to_path_buf(),
        reason,
    };

    let existing = document.get_pages();
    let mut ordered: Vec<ObjectId> = Vec::with_capacity(pages.len());
    for page in pages {
        match existing.get(page) {
            Some(page_id) => ordered.push(*page_id),
            None => {
                return Err(StorageError::ReadPdf {
                    path: source.to_path_buf(),
                    reason: format!(
                        "page {} does not exist (document has {} pages)",
                        page,
                        existing.len()
                    ),
                })
            }
        }
    }

    // The output page tree is flat: the root's kids in selection order.
    let root_id = document
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| write_error(e.to_string()))?;

    for page_id in &ordered {
        let inherited = inherited_attributes(&document, *page_id);
        let page = document
            .get_dictionary_mut(*page_id)
            .map_err(|e| write_error(e.to_string()))?;
        for (key, value) in inherited {
            page.set(key, value);
        }
        page.set("Parent", root_id);
    }

    let kids: Vec<Object> = ordered.iter().map(|id| Object::Reference(*id)).collect();
    let root = document
        .get_dictionary_mut(root_id)
        .map_err(|e| write_error(e.to_string()))?;
    root.set("Kids", kids);
    root.set("Count", ordered.len() as i64);

    document.prune_objects();
    document.renumber_objects();

    document
        .save(output)
        .map_err(|e| write_error(e.to_string()))?;
    Ok(())
}

#[async_trait]
impl DocumentSplitter for PdfSplitter {
    async fn split(
        &self,
        source: &Path,
        pages: &[u32],
        output_path: &Path,
    ) -> Result<PathBuf, StorageError> {
        let directory = output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let file_name = output_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidFileName(output_path.display().to_string()))?;

        ensure_directory(&directory).await?;
        let target = resolve_conflict(&directory, file_name).await?;

        let source = source.to_path_buf();
        let pages = pages.to_vec();
        let output = target.clone();
        tokio::task::spawn_blocking(move || write_selected_pages(&source, &pages, &output))
            .await
            .map_err(|e| StorageError::WritePdf {
                path: target.clone(),
                reason: e.to_string(),
            })??;

        Ok(target)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use lopdf::{dictionary, Document, Object, Stream};

    /// Writes a minimal PDF with `page_count` empty pages.
    pub fn write_pdf(path: &Path, page_count: u32) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::new();
        for page in 1..=page_count {
            let content = format!("BT /F1 12 Tf 72 720 Td (page {}) Tj ET", page);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }
}
