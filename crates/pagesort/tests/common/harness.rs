//! Isolated session environment for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

use pagesort::{
    Classifier, Collaborators, Config, DocumentRenamer, DocumentSplitter, FsRenamer, Pipeline,
    PdfSplitter,
};

use super::fakes::StubExtractor;

pub struct TestHarness {
    temp_dir: TempDir,
    /// Scanned source document inside the temp directory.
    pub document_path: PathBuf,
    pub total_pages: u32,
}

impl TestHarness {
    /// A temp directory holding `scan.pdf` with `total_pages` pages.
    pub fn new(total_pages: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let document_path = temp_dir.path().join("scan.pdf");
        write_pdf(&document_path, total_pages);
        Self {
            temp_dir,
            document_path,
            total_pages,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Stub extraction and the given classifier, with the real splitter and
    /// renamer.
    pub fn collaborators(&self, classifier: impl Classifier + 'static) -> Collaborators {
        self.collaborators_with(
            classifier,
            Arc::new(PdfSplitter::new()),
            Arc::new(FsRenamer::new()),
        )
    }

    pub fn collaborators_with(
        &self,
        classifier: impl Classifier + 'static,
        splitter: Arc<dyn DocumentSplitter>,
        renamer: Arc<dyn DocumentRenamer>,
    ) -> Collaborators {
        Collaborators {
            extractor: Arc::new(StubExtractor {
                total_pages: self.total_pages,
            }),
            classifier: Arc::new(classifier),
            renamer,
            splitter,
        }
    }

    pub fn open(&self, collaborators: Collaborators) -> Pipeline {
        Pipeline::open(
            Config::default(),
            self.document_path.to_str().expect("utf-8 temp path"),
            collaborators,
        )
    }
}

/// Writes a minimal PDF with `page_count` pages.
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
    doc.save(path).expect("Failed to write test PDF");
}

pub fn page_count(path: &Path) -> u32 {
    Document::load(path)
        .expect("Failed to load PDF")
        .get_pages()
        .len() as u32
}
