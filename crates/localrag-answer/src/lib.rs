//! Question answering over hybrid retrieval.

pub mod eval;
pub mod orchestrator;
pub mod prompt;
pub mod refine;
pub mod rerank;

pub use eval::{evaluate, EvalCase, EvalReport};
pub use orchestrator::{AnswerOutcome, AnswerRequest, Evidence, Orchestrator};
pub use prompt::build_prompt;
pub use refine::{QueryRefiner, TermFrequencyRefiner};
pub use rerank::Reranker;
