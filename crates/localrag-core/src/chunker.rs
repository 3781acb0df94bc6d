//! Splitting raw documents into passages.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ChunkerKind;
use crate::types::Passage;

pub trait Chunker: Send + Sync {
    fn chunk(&self, text: &str) -> Vec<String>;
}

/// Splits after `.`, `!` or `?` when followed by whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceChunker;

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut start = 0;
        let mut chars = text.char_indices().peekable();
        while let Some((_, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?') {
                if let Some(&(next, n)) = chars.peek() {
                    if n.is_whitespace() {
                        push_trimmed(&mut out, &text[start..next]);
                        start = next;
                    }
                }
            }
        }
        push_trimmed(&mut out, &text[start..]);
        out
    }
}

/// Starts a new chunk at every markdown heading line (`#` to `######`).
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownHeadingChunker;

impl Chunker for MarkdownHeadingChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in text.lines() {
            if is_heading(line) && !current.is_empty() {
                push_trimmed(&mut out, &current.join("\n"));
                current.clear();
            }
            current.push(line);
        }
        push_trimmed(&mut out, &current.join("\n"));
        out
    }
}

/// Blank-line separated paragraphs; long paragraphs are cut into word windows
/// with overlap.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    pub max_words: usize,
    pub overlap_percent: f32,
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self { max_words: 300, overlap_percent: 0.2 }
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            let max_words = self.max_words.max(1);
            let words: Vec<&str> = paragraph.split_whitespace().collect();
            if words.len() <= max_words {
                out.push(paragraph.to_string());
                continue;
            }
            let overlap = ((max_words as f32 * self.overlap_percent) as usize).min(max_words - 1);
            let mut start = 0;
            while start < words.len() {
                let end = (start + max_words).min(words.len());
                out.push(words[start..end].join(" "));
                if end >= words.len() {
                    break;
                }
                start = end - overlap;
            }
        }
        out
    }
}

pub fn chunker_for(kind: ChunkerKind) -> Box<dyn Chunker> {
    match kind {
        ChunkerKind::Sentence => Box::new(SentenceChunker),
        ChunkerKind::Markdown => Box::new(MarkdownHeadingChunker),
        ChunkerKind::Paragraph => Box::new(ParagraphChunker::default()),
    }
}

/// Chunk one document into passages, tracking the nearest markdown heading.
pub fn passages_from_text(document_id: &str, text: &str, chunker: &dyn Chunker) -> Vec<Passage> {
    let mut heading: Option<String> = None;
    chunker
        .chunk(text)
        .into_iter()
        .enumerate()
        .map(|(ordinal, chunk)| {
            if let Some(h) = chunk.lines().find(|l| is_heading(l)) {
                heading = Some(h.trim_start_matches('#').trim().to_string());
            }
            let passage = Passage::new(document_id, ordinal, chunk);
            match &heading {
                Some(h) => passage.with_heading(h.clone()),
                None => passage,
            }
        })
        .collect()
}

/// Walk `root` for `.txt` and `.md` files and chunk each into passages.
///
/// Document ids are the file path relative to `root`.
pub fn load_directory(root: &Path, chunker: &dyn Chunker) -> Result<Vec<Passage>> {
    let mut passages = Vec::new();
    for path in list_documents(root) {
        let bytes = fs::read(&path)?;
        let text = String::from_utf8_lossy(&bytes);
        let document_id = path.strip_prefix(root).unwrap_or(path.as_path()).to_string_lossy().replace('\\', "/");
        let chunks = passages_from_text(&document_id, &text, chunker);
        tracing::debug!(document = %document_id, passages = chunks.len(), "chunked document");
        passages.extend(chunks);
    }
    Ok(passages)
}

pub fn list_documents(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("txt" | "md")))
        .collect();
    files.sort();
    files
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(char::is_whitespace)
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
}
