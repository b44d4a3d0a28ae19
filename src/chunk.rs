//! Long-text chunking — bounded-length segments cut at sentence boundaries.
//!
//! Each chunk is synthesised as one inference unit, so chunk length bounds
//! peak latent memory.  Splitting happens at blank-line paragraph breaks
//! first, then at sentence boundaries; sentences are never split further,
//! so a single oversized sentence becomes an oversized chunk.

use fancy_regex::Regex as FancyRegex;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::Lang;

/// Default per-chunk character limit.
pub const MAX_CHUNK_LEN: usize = 300;

/// Korean needs tighter segmentation than the other languages.
pub const MAX_CHUNK_LEN_KO: usize = 120;

/// Per-chunk character limit for `lang`.
pub fn max_chunk_len(lang: Lang) -> usize {
    match lang {
        Lang::Ko => MAX_CHUNK_LEN_KO,
        _ => MAX_CHUNK_LEN,
    }
}

static RE_PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Sentence boundary: whitespace after `.`/`!`/`?`, except after a known
/// abbreviation (titles, Latin abbreviations, street/unit abbreviations) or
/// a single capital-letter initial.  Look-behind needs fancy-regex.
static RE_SENTENCE_BOUNDARY: Lazy<FancyRegex> = Lazy::new(|| {
    FancyRegex::new(
        r"(?<!\b(?:Dr|Mr|Mrs|Ms|Prof|Sr|Jr|St|Ave|Rd|Blvd|Dept|Inc|Ltd|Co|Corp|etc|vs|No|approx)\.)(?<!\b(?:i\.e|e\.g|Ph\.D)\.)(?<!\b[A-Z]\.)(?<=[.!?])\s+",
    )
    .unwrap()
});

/// Split a paragraph into sentences, keeping each sentence's terminal
/// punctuation and dropping the boundary whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last = 0;
    for m in RE_SENTENCE_BOUNDARY.find_iter(text).filter_map(|m| m.ok()) {
        sentences.push(text[last..m.start()].trim().to_string());
        last = m.end();
    }
    if last < text.len() {
        sentences.push(text[last..].trim().to_string());
    }
    sentences.retain(|s| !s.is_empty());
    if sentences.is_empty() {
        vec![text.trim().to_string()]
    } else {
        sentences
    }
}

/// Split `text` into chunks of at most `max_len` characters, preserving
/// document order.  Sentences are packed greedily; a sentence longer than
/// `max_len` is emitted as its own chunk rather than being cut mid-sentence.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    for para in RE_PARAGRAPH.split(text) {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        if para.chars().count() <= max_len {
            chunks.push(para.to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0;
        for sentence in split_sentences(para) {
            let sentence_len = sentence.chars().count();
            if !current.is_empty() && current_len + 1 + sentence_len > max_len {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(&sentence);
            current_len += sentence_len;
        }
        if !current.is_empty() {
            chunks.push(current);
        }
    }

    chunks
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
