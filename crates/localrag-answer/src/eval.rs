//! Accuracy run over a question/expected-answer dataset.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use localrag_core::error::Result;

use crate::orchestrator::{AnswerRequest, Orchestrator};

/// One dataset row. Rows without `expected` are answered but never count as
/// correct.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvalCase {
    pub question: String,
    #[serde(default)]
    pub expected: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub ms: u64,
}

/// Case-insensitive containment of a non-empty expected string.
pub fn is_correct(answer: &str, expected: Option<&str>) -> bool {
    match expected {
        Some(e) if !e.is_empty() => answer.to_lowercase().contains(&e.to_lowercase()),
        _ => false,
    }
}

/// Answer every case in order with `template`'s settings. The first pipeline
/// failure aborts the run.
pub async fn evaluate(orchestrator: &Orchestrator, cases: &[EvalCase], template: &AnswerRequest) -> Result<EvalReport> {
    let start = Instant::now();
    let mut correct = 0usize;
    for (i, case) in cases.iter().enumerate() {
        let request = AnswerRequest { question: case.question.clone(), ..template.clone() };
        let outcome = orchestrator.answer(&request).await?;
        let hit = is_correct(&outcome.answer.text, case.expected.as_deref());
        tracing::debug!(case = i, hit, "eval case answered");
        correct += usize::from(hit);
    }
    let total = cases.len();
    let accuracy = if total == 0 { 0.0 } else { correct as f64 / total as f64 };
    let ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(total, correct, accuracy, ms, "eval finished");
    Ok(EvalReport { total, correct, accuracy, ms })
}
