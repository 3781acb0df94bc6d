use anyhow::Result;
use std::fmt::Write as _;

use localrag_answer::AnswerOutcome;
use localrag_core::error::{Error, ErrorKind};
use localrag_core::progress::PipelineEvent;
use localrag_core::types::{DocumentSummary, Passage, RankedCandidate};

const SNIPPET_CHARS: usize = 160;

/// Process exit status for a failed command.
///
/// 2: invalid input, 3: capability failure, 4: configuration, 1: anything else.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>().map(Error::kind) {
        Some(ErrorKind::InvalidInput) => 2,
        Some(ErrorKind::Capability) => 3,
        Some(ErrorKind::Config) => 4,
        None => 1,
    }
}

/// `event: <name>\ndata: <json>\n\n`
pub fn sse_frame(event: &PipelineEvent) -> Result<String> {
    let value = serde_json::to_value(event)?;
    let data = value.get("data").cloned().unwrap_or(serde_json::Value::Null);
    Ok(format!("event: {}\ndata: {}\n\n", event.name(), serde_json::to_string(&data)?))
}

pub fn render_candidates(results: &[RankedCandidate]) -> String {
    if results.is_empty() {
        return "No results.\n".to_string();
    }
    let mut out = String::new();
    for (i, c) in results.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. [{:.3}] {} ({})", i + 1, c.score, c.passage_id, c.document_id);
        let _ = writeln!(out, "    {}", shorten(&c.snippet));
    }
    out
}

pub fn render_answer(outcome: &AnswerOutcome) -> String {
    let mut out = format!("{}\n", outcome.answer.text);
    if !outcome.answer.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (i, s) in outcome.answer.sources.iter().enumerate() {
            let _ = writeln!(out, "[{}] {} ({})", i + 1, s.document_id, s.passage_id);
        }
    }
    out
}

pub fn render_documents(docs: &[DocumentSummary]) -> String {
    if docs.is_empty() {
        return "No documents.\n".to_string();
    }
    let mut out = String::new();
    for d in docs {
        let _ = writeln!(out, "{:>5}  {}", d.passages, d.document_id);
    }
    out
}

pub fn render_document(document_id: &str, passages: &[Passage]) -> String {
    let mut out = format!("{document_id} ({} passages)\n", passages.len());
    for p in passages {
        match &p.heading {
            Some(h) => {
                let _ = writeln!(out, "\n[{}] {h}", p.ordinal);
            }
            None => {
                let _ = writeln!(out, "\n[{}]", p.ordinal);
            }
        }
        let _ = writeln!(out, "{}", p.text.trim());
    }
    out
}

fn shorten(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(SNIPPET_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localrag_answer::Evidence;
    use localrag_core::progress::Stage;
    use localrag_core::types::{Answer, Source};

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(exit_code(&Error::InvalidInput("q".into()).into()), 2);
        assert_eq!(exit_code(&Error::Rerank("bad".into()).into()), 3);
        assert_eq!(exit_code(&Error::InvalidConfig("x".into()).into()), 4);
        assert_eq!(exit_code(&anyhow::anyhow!("disk full")), 1);
    }

    #[test]
    fn sse_frames_carry_name_and_payload() {
        let frame = sse_frame(&PipelineEvent::Stage(Stage::Refiner { iteration: 1 })).unwrap();
        let (head, data) = frame.split_once("\ndata: ").unwrap();
        assert_eq!(head, "event: stage");
        assert!(data.ends_with("\n\n"));
        let payload: serde_json::Value = serde_json::from_str(data.trim_end()).unwrap();
        assert_eq!(payload, serde_json::json!({ "name": "refiner", "iteration": 1 }));
        let err = sse_frame(&PipelineEvent::error(&Error::InvalidInput("empty".into()))).unwrap();
        assert!(err.starts_with("event: error\ndata: {"));
        assert!(err.contains("\"kind\":\"invalid_input\""));
    }

    #[test]
    fn answer_lists_sources_in_citation_order() {
        let outcome = AnswerOutcome {
            answer: Answer {
                text: "Boil it [1].".into(),
                sources: vec![Source { document_id: "water.md".into(), passage_id: "water.md:0".into(), snippet: None }],
            },
            results: Vec::new(),
            iterations: 0,
            evidence: Evidence::Grounded,
        };
        assert_eq!(render_answer(&outcome), "Boil it [1].\n\nSources:\n[1] water.md (water.md:0)\n");
    }

    #[test]
    fn documents_render_counts_and_passages() {
        let docs = [DocumentSummary { document_id: "water.md".into(), passages: 12 }];
        assert_eq!(render_documents(&docs), "   12  water.md\n");
        assert_eq!(render_documents(&[]), "No documents.\n");

        let passages = [Passage::new("water.md", 0, "Boil it.").with_heading("Boiling"), Passage::new("water.md", 1, "Filter it. ")];
        assert_eq!(
            render_document("water.md", &passages),
            "water.md (2 passages)\n\n[0] Boiling\nBoil it.\n\n[1]\nFilter it.\n"
        );
    }

    #[test]
    fn long_snippets_are_shortened() {
        let c = RankedCandidate { passage_id: "p".into(), document_id: "d".into(), snippet: "word ".repeat(100), score: 0.5 };
        let text = render_candidates(&[c]);
        assert!(text.contains("..."));
        assert!(text.starts_with(" 1. [0.500] p (d)"));
    }
}
