//! Weighted fusion of the vector and lexical signals.

use std::collections::HashMap;

use localrag_core::types::{FusionWeights, RankedCandidate, SearchHit};

/// Min-max normalize into `[0, 1]`. Constant input maps to `0.5`; empty
/// input stays empty.
pub fn min_max_normalize(values: &[f32]) -> Vec<f32> {
    let Some(first) = values.first() else { return Vec::new() };
    let (min, max) = values.iter().fold((*first, *first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max == min {
        return vec![0.5; values.len()];
    }
    let span = max - min;
    values.iter().map(|v| (v - min) / span).collect()
}

struct Row<'a> {
    document_id: &'a str,
    snippet: &'a str,
    vector: Option<f32>,
    lexical: Option<f32>,
}

/// Union both hit lists, normalize each signal over the union (a missing
/// signal counts as 0 before normalization) and rank by the weighted sum.
///
/// Ties on the fused score are broken by ascending passage id. Snippet and
/// document id come from the vector row when a passage appears in both.
pub fn fuse(vector: &[SearchHit], lexical: &[SearchHit], weights: FusionWeights, top_k: usize) -> Vec<RankedCandidate> {
    if top_k == 0 {
        return Vec::new();
    }
    let mut order: Vec<&str> = Vec::new();
    let mut rows: HashMap<&str, Row<'_>> = HashMap::new();
    for hit in vector {
        rows.entry(hit.id.as_str()).or_insert_with(|| {
            order.push(hit.id.as_str());
            Row { document_id: &hit.document_id, snippet: &hit.text, vector: Some(hit.score), lexical: None }
        });
    }
    for hit in lexical {
        let row = rows.entry(hit.id.as_str()).or_insert_with(|| {
            order.push(hit.id.as_str());
            Row { document_id: &hit.document_id, snippet: &hit.text, vector: None, lexical: None }
        });
        row.lexical.get_or_insert(hit.score);
    }

    let vec_raw: Vec<f32> = order.iter().map(|id| rows[id].vector.unwrap_or(0.0)).collect();
    let lex_raw: Vec<f32> = order.iter().map(|id| rows[id].lexical.unwrap_or(0.0)).collect();
    let vec_norm = min_max_normalize(&vec_raw);
    let lex_norm = min_max_normalize(&lex_raw);

    let mut fused: Vec<RankedCandidate> = order
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let row = &rows[id];
            RankedCandidate {
                passage_id: (*id).to_string(),
                document_id: row.document_id.to_string(),
                snippet: row.snippet.to_string(),
                score: weights.semantic * vec_norm[i] + weights.lexical * lex_norm[i],
            }
        })
        .collect();
    sort_candidates(&mut fused);
    fused.truncate(top_k);
    fused
}

/// Score descending, then passage id ascending.
pub fn sort_candidates(candidates: &mut [RankedCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.passage_id.cmp(&b.passage_id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_edges() {
        assert!(min_max_normalize(&[]).is_empty());
        assert_eq!(min_max_normalize(&[3.0, 3.0]), vec![0.5, 0.5]);
        assert_eq!(min_max_normalize(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn first_occurrence_wins_within_a_signal() {
        let hit = |id: &str, text: &str, score: f32| SearchHit {
            id: id.into(),
            document_id: "d".into(),
            text: text.into(),
            score,
            source: localrag_core::types::SourceKind::Vector,
        };
        let out = fuse(&[hit("a", "first", 0.9), hit("a", "second", 0.1)], &[], FusionWeights::default(), 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].snippet, "first");
    }
}
