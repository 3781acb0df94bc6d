//! Domain types shared by the stores, the retrieval pipeline and the answer
//! orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type PassageId = String;
pub type DocumentId = String;
pub type NodeId = String;
pub type Meta = BTreeMap<String, serde_json::Value>;

/// Smallest retrievable unit of document text.
///
/// - `id`: globally unique passage identifier (`<document_id>:<ordinal>`)
/// - `document_id`: identity of the owning document
/// - `ordinal`: position within the parent document
/// - `heading`: nearest heading above the passage, when the source had one
/// - `embedding`: present once the passage has been embedded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub document_id: DocumentId,
    pub ordinal: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Passage {
    pub fn new(document_id: impl Into<String>, ordinal: usize, text: impl Into<String>) -> Self {
        let document_id = document_id.into();
        Self {
            id: format!("{document_id}:{ordinal}"),
            document_id,
            ordinal,
            text: text.into(),
            heading: None,
            embedding: None,
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A stored document and how many passages it contributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: DocumentId,
    pub passages: usize,
}

/// Indicates which search produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// A row returned by a store search.
///
/// For vector search `score` is the similarity `1 - distance`; for lexical
/// search it is the store's text-similarity score. Higher is always better,
/// but scores are only comparable within one list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: PassageId,
    pub document_id: DocumentId,
    pub text: String,
    pub score: f32,
    pub source: SourceKind,
}

/// One entry of a ranked retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub passage_id: PassageId,
    pub document_id: DocumentId,
    pub snippet: String,
    pub score: f32,
}

/// Relative weights of the two retrieval signals. They need not sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic: f32,
    pub lexical: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { semantic: 0.7, lexical: 0.3 }
    }
}

impl FusionWeights {
    pub fn new(semantic: f32, lexical: f32) -> crate::error::Result<Self> {
        let weights = Self { semantic, lexical };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if !(self.semantic >= 0.0 && self.lexical >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "fusion weights must be non-negative (semantic={}, lexical={})",
                self.semantic, self.lexical
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    #[serde(default)]
    pub metadata: Meta,
}

/// Directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub relation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMembership {
    pub node_id: NodeId,
    pub passage_id: PassageId,
}

/// Whole graph as one serializable value: nodes, edges and passage memberships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub memberships: Vec<NodeMembership>,
}

/// Policy for the refinement loop, supplied per request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGate {
    pub min_sources: usize,
    pub min_avg_score: f32,
    pub max_iterations: usize,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self { min_sources: 2, min_avg_score: 0.35, max_iterations: 1 }
    }
}

/// Outcome of evaluating a result set against a [`QualityGate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityReport {
    pub count: usize,
    pub avg_score: f32,
    pub passed: bool,
}

impl QualityGate {
    pub fn evaluate(&self, results: &[RankedCandidate]) -> QualityReport {
        let count = results.len();
        let avg_score = if count == 0 {
            0.0
        } else {
            results.iter().map(|r| r.score).sum::<f32>() / count as f32
        };
        let passed = count >= self.min_sources && avg_score >= self.min_avg_score;
        QualityReport { count, avg_score, passed }
    }
}

/// Verbosity requested from the generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    #[default]
    Minimal,
    Medium,
    High,
}

impl FromStr for Effort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" | "brief" => Ok(Self::Minimal),
            "medium" => Ok(Self::Medium),
            "high" | "thorough" => Ok(Self::High),
            other => Err(Error::InvalidInput(format!("unknown effort level '{other}'"))),
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Minimal => "minimal",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub document_id: DocumentId,
    pub passage_id: PassageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl From<&RankedCandidate> for Source {
    fn from(c: &RankedCandidate) -> Self {
        Self {
            document_id: c.document_id.clone(),
            passage_id: c.passage_id.clone(),
            snippet: Some(c.snippet.clone()),
        }
    }
}

/// The terminal artifact of the pipeline. `sources[i]` is cited as `[i+1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

impl Answer {
    pub const NOT_SURE: &'static str = "I'm not sure.";

    pub fn not_sure() -> Self {
        Self { text: Self::NOT_SURE.to_string(), sources: Vec::new() }
    }
}
