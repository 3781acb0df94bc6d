use localrag_core::types::{Effort, RankedCandidate, Source};

const SYSTEM: &str = "You are a RAG assistant. Use only the provided sources. Cite using [1], [2], etc.";

pub fn instruction(effort: Effort) -> &'static str {
    match effort {
        Effort::Minimal => "Provide a brief answer.",
        Effort::Medium => "Provide a concise but reasoned answer.",
        Effort::High => "Provide a thorough, well-structured answer.",
    }
}

/// Numbers `context` as `[1]..[n]` in the given order.
pub fn build_prompt(question: &str, context: &[RankedCandidate], effort: Effort) -> String {
    let citations = context
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}", i + 1, c.snippet))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{SYSTEM}\n\nQuestion: {question}\n\nSources:\n{citations}\n\n{}", instruction(effort))
}

/// `sources[i]` is the passage cited as `[i + 1]` by [`build_prompt`].
pub fn sources_for(context: &[RankedCandidate]) -> Vec<Source> {
    context.iter().map(Source::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, snippet: &str) -> RankedCandidate {
        RankedCandidate { passage_id: id.into(), document_id: format!("doc-{id}"), snippet: snippet.into(), score: 0.5 }
    }

    #[test]
    fn exact_layout() {
        let prompt = build_prompt("How?", &[candidate("a", "alpha"), candidate("b", "beta")], Effort::Minimal);
        assert_eq!(
            prompt,
            "You are a RAG assistant. Use only the provided sources. Cite using [1], [2], etc.\n\n\
             Question: How?\n\nSources:\n[1] alpha\n\n[2] beta\n\nProvide a brief answer."
        );
    }

    #[test]
    fn citations_line_up_with_sources() {
        let ctx = [candidate("x", "first"), candidate("y", "second"), candidate("z", "third")];
        let prompt = build_prompt("q", &ctx, Effort::High);
        let sources = sources_for(&ctx);
        for (i, c) in ctx.iter().enumerate() {
            assert!(prompt.contains(&format!("[{}] {}", i + 1, c.snippet)));
            assert_eq!(sources[i].passage_id, c.passage_id);
            assert_eq!(sources[i].snippet.as_deref(), Some(c.snippet.as_str()));
        }
        assert!(!prompt.contains("[4]"));
        assert!(prompt.ends_with("Provide a thorough, well-structured answer."));
    }

    #[test]
    fn effort_picks_instruction() {
        assert_eq!(instruction(Effort::Medium), "Provide a concise but reasoned answer.");
        assert!(build_prompt("q", &[], Effort::Medium).ends_with("Provide a concise but reasoned answer."));
    }
}
