use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::stage::StageId;

/// Steps of a session that report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    ExtractImages,
    Classify,
    SplitDocument,
    Rename,
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStep::ExtractImages => write!(f, "Extracting page images"),
            PipelineStep::Classify => write!(f, "Classifying pages"),
            PipelineStep::SplitDocument => write!(f, "Splitting document"),
            PipelineStep::Rename => write!(f, "Renaming document"),
        }
    }
}

/// Snapshot of a running image extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionProgress {
    pub pages_processed: u32,
    pub pages_to_process: u32,
    pub total_document_pages: u32,
    pub estimated_seconds_remaining: u64,
    /// Every page that has an image, sorted.
    pub extracted_page_numbers: Vec<u32>,
}

/// Events emitted while a session works.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        step: PipelineStep,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<StageId>,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Extraction(ExtractionProgress),
    Completed {
        step: PipelineStep,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<StageId>,
        timestamp: DateTime<Utc>,
    },
    Failed {
        step: PipelineStep,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<StageId>,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn started(step: PipelineStep, id: Option<&StageId>) -> Self {
        ProgressEvent::Started {
            step,
            id: id.cloned(),
            message: format!("{}...", step),
            timestamp: Utc::now(),
        }
    }

    pub fn completed(step: PipelineStep, id: Option<&StageId>) -> Self {
        ProgressEvent::Completed {
            step,
            id: id.cloned(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(step: PipelineStep, id: Option<&StageId>, error: impl Into<String>) -> Self {
        ProgressEvent::Failed {
            step,
            id: id.cloned(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for callers that do not track progress.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Fans progress events out to any number of subscribers.
#[derive(Clone)]
pub struct BroadcastProgress {
    sender: Arc<broadcast::Sender<ProgressEvent>>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }
}
