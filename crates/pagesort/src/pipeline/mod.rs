pub mod progress;
pub mod runner;

use std::sync::Arc;

use crate::classifier::{AnthropicClassifier, Classifier};
use crate::config::Config;
use crate::error::ConfigError;
use crate::extractor::{ImageExtractor, MagickExtractor};
use crate::storage::{DocumentRenamer, DocumentSplitter, FsRenamer, PdfSplitter};

pub use progress::{
    BroadcastProgress, ExtractionProgress, NoopProgress, PipelineStep, ProgressEvent,
    ProgressReporter,
};
pub use runner::Pipeline;

/// External systems a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn ImageExtractor>,
    pub classifier: Arc<dyn Classifier>,
    pub renamer: Arc<dyn DocumentRenamer>,
    pub splitter: Arc<dyn DocumentSplitter>,
}

impl Collaborators {
    /// ImageMagick, the Anthropic API, `lopdf` and the local filesystem.
    ///
    /// Fails when the classifier's API key is not set.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            extractor: Arc::new(MagickExtractor::new(config.extractor.clone())),
            classifier: Arc::new(AnthropicClassifier::from_config(&config.classifier)?),
            renamer: Arc::new(FsRenamer::new()),
            splitter: Arc::new(PdfSplitter::new()),
        })
    }
}
