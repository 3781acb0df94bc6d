//! Trigram similarity in the style of PostgreSQL's `pg_trgm`.
//!
//! Each alphanumeric word is lowercased and padded with two leading blanks
//! and one trailing blank before its trigrams are taken. Similarity is the
//! Jaccard index of the two trigram sets.

use std::collections::HashSet;

pub const DEFAULT_THRESHOLD: f32 = 0.3;

pub fn trigrams(text: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let padded: Vec<char> = format!("  {} ", word.to_lowercase()).chars().collect();
        for w in padded.windows(3) {
            out.insert(w.iter().collect());
        }
    }
    out
}

pub fn similarity(a: &str, b: &str) -> f32 {
    similarity_of(&trigrams(a), &trigrams(b))
}

pub fn similarity_of(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
