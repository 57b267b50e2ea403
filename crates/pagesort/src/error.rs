use std::path::PathBuf;
use thiserror::Error;

use crate::stage::{Partition, StageId};

#[derive(Error, Debug)]
pub enum PagesortError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Missing API key: environment variable '{0}' is not set")]
    MissingApiKey(String),
}

/// Raised when a transition is applied to a record in the wrong stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("Cannot {operation} record {id} from stage {from}")]
    InvalidTransition {
        id: StageId,
        from: &'static str,
        operation: &'static str,
    },

    #[error("Selected pages must not be empty")]
    EmptySelection,

    #[error("Page {0} is selected more than once")]
    DuplicatePage(u32),

    #[error("Page numbers start at 1")]
    ZeroPage,

    #[error("Page {page} does not exist (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record {0} already exists in the workflow store")]
    DuplicateId(StageId),

    #[error("Record {0} not found in the workflow store")]
    NotFound(StageId),

    #[error("Record {id} not found in the {partition} partition")]
    NotInPartition { id: StageId, partition: Partition },

    #[error("Replacement record {actual} does not match id {expected}")]
    IdMismatch { expected: StageId, actual: StageId },

    #[error("Record {id} moved on to stage {actual} while leaving stage {expected}")]
    StageChanged {
        id: StageId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Record {0} is being renamed")]
    RenameInProgress(StageId),
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    #[error("Image extraction failed (exit code {code:?}): {stderr}")]
    ExtractionFailed { code: Option<i32>, stderr: String },

    #[error("Rename failed: {0}")]
    RenameFailed(#[source] StorageError),

    #[error("Failed to split pages into '{path}': {reason}")]
    SplitFailed { path: PathBuf, reason: String },

    #[error("Session was closed before the result arrived")]
    SessionClosed,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy file from '{from}' to '{to}': {source}")]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Invalid file name: '{0}'")]
    InvalidFileName(String),

    #[error("Failed to read PDF '{path}': {reason}")]
    ReadPdf { path: PathBuf, reason: String },

    #[error("Failed to write PDF '{path}': {reason}")]
    WritePdf { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install log subscriber: {0}")]
    Init(String),
}

pub type Result<T> = std::result::Result<T, PagesortError>;
