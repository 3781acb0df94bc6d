//! Pipeline progress notifications.
//!
//! The pipeline itself is transport-agnostic; a streaming transport can
//! forward these events as they happen.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Error, ErrorKind};
use crate::types::Answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum Stage {
    Embedder,
    Retriever,
    Refiner { iteration: usize },
    Reranker,
    Generator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum PipelineEvent {
    Stage(Stage),
    Answer(Answer),
    Error { kind: &'static str, message: String },
}

impl PipelineEvent {
    pub fn error(err: &Error) -> Self {
        let kind = match err.kind() {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Capability => "capability",
            ErrorKind::Config => "config",
        };
        Self::Error { kind, message: err.to_string() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stage(_) => "stage",
            Self::Answer(_) => "answer",
            Self::Error { .. } => "error",
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Discards every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: PipelineEvent) {}
}

impl ProgressSink for UnboundedSender<PipelineEvent> {
    fn emit(&self, event: PipelineEvent) {
        // A closed receiver means nobody is listening anymore.
        let _ = self.send(event);
    }
}
