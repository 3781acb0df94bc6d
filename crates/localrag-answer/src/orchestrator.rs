//! Retrieval, quality-gated refinement, optional reranking and generation as
//! one explicit state machine.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use localrag_core::config::Settings;
use localrag_core::error::{call, Capability, Error, Result};
use localrag_core::progress::{NoProgress, PipelineEvent, ProgressSink, Stage};
use localrag_core::traits::Generator;
use localrag_core::types::{Answer, Effort, QualityGate, RankedCandidate};
use localrag_hybrid::HybridRetriever;

use crate::prompt::{build_prompt, sources_for};
use crate::refine::{QueryRefiner, TermFrequencyRefiner};
use crate::rerank::Reranker;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question: String,
    pub top_k: usize,
    pub rerank: bool,
    pub model: String,
    pub effort: Effort,
    pub gate: QualityGate,
}

impl Default for AnswerRequest {
    fn default() -> Self {
        Self {
            question: String::new(),
            top_k: 5,
            rerank: false,
            model: DEFAULT_MODEL.to_string(),
            effort: Effort::Minimal,
            gate: QualityGate::default(),
        }
    }
}

impl AnswerRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), ..Self::default() }
    }

    /// Request defaults taken from the loaded settings.
    pub fn from_settings(question: impl Into<String>, settings: &Settings) -> Self {
        Self {
            question: question.into(),
            top_k: settings.retrieval.top_k,
            rerank: settings.reranker.enabled,
            model: settings.generator.model.clone(),
            effort: settings.generator.effort,
            gate: settings.quality,
        }
    }
}

/// Whether the answer was generated from retrieved passages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Evidence {
    Grounded,
    /// Nothing was retrieved; the fixed "not sure" answer was returned.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerOutcome {
    pub answer: Answer,
    pub results: Vec<RankedCandidate>,
    /// Refinement rounds performed.
    pub iterations: usize,
    pub evidence: Evidence,
}

enum State {
    Retrieving { query: String, iteration: usize },
    Evaluating { results: Vec<RankedCandidate>, iteration: usize },
    Refining { results: Vec<RankedCandidate>, iteration: usize },
    Reranking { results: Vec<RankedCandidate>, iterations: usize },
    Generating { results: Vec<RankedCandidate>, iterations: usize },
    Done(AnswerOutcome),
}

pub struct Orchestrator {
    retriever: Arc<HybridRetriever>,
    generator: Arc<dyn Generator>,
    reranker: Option<Reranker>,
    refiner: Box<dyn QueryRefiner>,
    generate_timeout: Duration,
}

impl Orchestrator {
    pub fn new(retriever: Arc<HybridRetriever>, generator: Arc<dyn Generator>) -> Self {
        let generate_timeout = retriever.timeouts().generate();
        Self { retriever, generator, reranker: None, refiner: Box::new(TermFrequencyRefiner::default()), generate_timeout }
    }

    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_refiner(mut self, refiner: Box<dyn QueryRefiner>) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }

    pub async fn answer(&self, request: &AnswerRequest) -> Result<AnswerOutcome> {
        self.answer_with_progress(request, &NoProgress).await
    }

    /// Reports every stage to `progress`, then either the answer or the error.
    pub async fn answer_with_progress(&self, request: &AnswerRequest, progress: &dyn ProgressSink) -> Result<AnswerOutcome> {
        match self.run(request, progress).await {
            Ok(outcome) => {
                progress.emit(PipelineEvent::Answer(outcome.answer.clone()));
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(error = %err, "answer pipeline failed");
                progress.emit(PipelineEvent::error(&err));
                Err(err)
            }
        }
    }

    async fn run(&self, request: &AnswerRequest, progress: &dyn ProgressSink) -> Result<AnswerOutcome> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".into()));
        }
        if request.top_k == 0 {
            return Err(Error::InvalidInput("top_k must be at least 1".into()));
        }
        let gate = request.gate;

        let mut state = State::Retrieving { query: question.to_string(), iteration: 0 };
        loop {
            state = match state {
                State::Retrieving { query, iteration } => {
                    let results = self.retriever.retrieve_with_progress(&query, request.top_k, progress).await?;
                    State::Evaluating { results, iteration }
                }
                State::Evaluating { results, iteration } => {
                    let report = gate.evaluate(&results);
                    tracing::debug!(iteration, count = report.count, avg = report.avg_score, passed = report.passed, "quality gate");
                    if !report.passed && iteration < gate.max_iterations {
                        State::Refining { results, iteration }
                    } else if request.rerank {
                        State::Reranking { results, iterations: iteration }
                    } else {
                        State::Generating { results, iterations: iteration }
                    }
                }
                State::Refining { results, iteration } => {
                    let iteration = iteration + 1;
                    progress.emit(PipelineEvent::Stage(Stage::Refiner { iteration }));
                    let query = self.refiner.refine(question, &results);
                    tracing::debug!(iteration, query = %query, "refined query");
                    State::Retrieving { query, iteration }
                }
                State::Reranking { results, iterations } => match &self.reranker {
                    Some(reranker) => {
                        progress.emit(PipelineEvent::Stage(Stage::Reranker));
                        let results = reranker.rerank(question, results).await?;
                        State::Generating { results, iterations }
                    }
                    None => {
                        tracing::debug!("rerank requested but no judge configured");
                        State::Generating { results, iterations }
                    }
                },
                State::Generating { results, iterations } => {
                    if results.is_empty() {
                        State::Done(AnswerOutcome { answer: Answer::not_sure(), results, iterations, evidence: Evidence::Empty })
                    } else {
                        progress.emit(PipelineEvent::Stage(Stage::Generator));
                        let prompt = build_prompt(question, &results, request.effort);
                        let text = call(
                            Capability::Generator,
                            self.generate_timeout,
                            self.generator.generate(&request.model, &prompt),
                        )
                        .await?;
                        let answer = Answer { text, sources: sources_for(&results) };
                        State::Done(AnswerOutcome { answer, results, iterations, evidence: Evidence::Grounded })
                    }
                }
                State::Done(outcome) => return Ok(outcome),
            };
        }
    }
}
