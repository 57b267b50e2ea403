pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod paths;
pub mod pipeline;
pub mod sanitize;
pub mod stage;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use classifier::{AnthropicClassifier, Classifier};
pub use config::{load_config, Config};
pub use error::{
    ConfigError, PagesortError, ProcessError, Result, StageError, StorageError, StoreError,
    TelemetryError,
};
pub use extractor::{CancelFlag, ExtractionReport, ImageExtractor, MagickExtractor};
pub use paths::DocumentPaths;
pub use pipeline::{Collaborators, Pipeline, ProgressEvent, ProgressReporter};
pub use stage::{ClassificationResult, Partition, SelectedPages, Stage, StageId, StageRecord};
pub use storage::{DocumentRenamer, DocumentSplitter, FsRenamer, PdfSplitter};
pub use store::{StoreEvent, WorkflowStore};
pub use telemetry::init_logging;
