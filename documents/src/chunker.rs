//! Deterministic sentence-based chunking of policy text.
//!
//! Text is split on sentence-terminal punctuation and greedily packed into
//! chunks of bounded size. Pages that lack sentence punctuation (tables,
//! bullet lists) fall back to blank-line paragraphs. Every chunk carries a
//! `[Source: <label>]` header so the model can cite where an answer came from.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Separator placed between sentences packed into the same chunk.
const SENTENCE_SEPARATOR: &str = ". ";

/// A labeled piece of policy text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Human-readable name of the source document.
    pub source_label: String,

    /// Header plus body, bounded by the chunker's hard limit.
    pub text: String,

    /// Position of the chunk in its document, or in the corpus once assembled.
    pub ordinal: usize,
}

impl Chunk {
    /// Create a chunk from already-formatted text.
    pub fn new(source_label: impl Into<String>, text: impl Into<String>, ordinal: usize) -> Self {
        Self {
            source_label: source_label.into(),
            text: text.into(),
            ordinal,
        }
    }

    /// Build a chunk by prefixing `body` with the source header and
    /// truncating the result to `limit` characters.
    pub fn labeled(source_label: &str, body: &str, ordinal: usize, limit: usize) -> Self {
        let text = format!("{}{body}", Self::header(source_label));
        Self::new(source_label, truncate_chars(&text, limit), ordinal)
    }

    /// The header that prefixes every chunk of `source_label`.
    pub fn header(source_label: &str) -> String {
        format!("[Source: {source_label}]\n\n")
    }

    /// The chunk text without its source header.
    pub fn body(&self) -> &str {
        let header = Self::header(&self.source_label);
        self.text.strip_prefix(header.as_str()).unwrap_or(&self.text)
    }

    /// Length of the chunk text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Configuration for the chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Soft cap on a packed sentence buffer, in characters.
    pub max_chunk_size: usize,

    /// Buffers and bodies must be strictly longer than this to be kept.
    pub min_chunk_size: usize,

    /// Sentences shorter than this are treated as noise.
    pub min_sentence_length: usize,

    /// Below this many sentence chunks the paragraph fallback is used.
    pub min_sentence_chunks: usize,

    /// Paragraphs must be strictly longer than this in the fallback.
    pub min_paragraph_length: usize,

    /// Maximum paragraphs taken in the fallback.
    pub max_paragraphs: usize,

    /// Maximum chunks kept per document (earliest first).
    pub max_chunks_per_document: usize,
}

impl ChunkerConfig {
    /// Hard character limit applied to every chunk text.
    pub fn hard_limit(&self) -> usize {
        self.max_chunk_size * 2
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 600,
            min_chunk_size: 100,
            min_sentence_length: 30,
            min_sentence_chunks: 3,
            min_paragraph_length: 80,
            max_paragraphs: 12,
            max_chunks_per_document: 15,
        }
    }
}

/// Splits raw policy text into labeled chunks.
///
/// Chunking is a pure function of the input text, the label and the
/// configuration: the same input always yields the same chunk sequence.
#[derive(Debug, Clone, Default)]
pub struct PolicyChunker {
    config: ChunkerConfig,
}

impl PolicyChunker {
    /// Create a new chunker with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chunker with custom configuration.
    pub fn with_config(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk `raw_text` from the document named `source_label`.
    ///
    /// Ordinals start at zero for each document.
    pub fn chunk(&self, raw_text: &str, source_label: &str) -> Vec<Chunk> {
        let mut bodies = self.split_sentences(raw_text);
        if bodies.len() < self.config.min_sentence_chunks {
            debug!(
                "{source_label}: {} sentence chunks, falling back to paragraphs",
                bodies.len()
            );
            bodies = self.split_paragraphs(raw_text);
        }

        let limit = self.config.hard_limit();
        bodies
            .iter()
            .map(|body| truncate_chars(body, limit))
            .filter(|body| body.chars().count() > self.config.min_chunk_size)
            .take(self.config.max_chunks_per_document)
            .enumerate()
            .map(|(ordinal, body)| Chunk::labeled(source_label, body, ordinal, limit))
            .collect()
    }

    /// Greedily pack sentences into buffers of at most `max_chunk_size`.
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let separator_len = SENTENCE_SEPARATOR.chars().count();
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for sentence in text.split(is_sentence_terminal) {
            let sentence = sentence.trim();
            let sentence_len = sentence.chars().count();
            if sentence_len < self.config.min_sentence_length {
                continue;
            }

            if current.is_empty() {
                current.push_str(sentence);
                current_len = sentence_len;
                continue;
            }

            let joined_len = current_len + separator_len + sentence_len;
            if joined_len > self.config.max_chunk_size {
                let closed = std::mem::replace(&mut current, sentence.to_string());
                if current_len > self.config.min_chunk_size {
                    chunks.push(closed);
                }
                current_len = sentence_len;
            } else {
                current.push_str(SENTENCE_SEPARATOR);
                current.push_str(sentence);
                current_len = joined_len;
            }
        }

        if current_len > self.config.min_chunk_size {
            chunks.push(current);
        }

        chunks
    }

    /// Split on blank lines, keeping long enough paragraphs.
    fn split_paragraphs(&self, text: &str) -> Vec<String> {
        text.split("\n\n")
            .map(str::trim)
            .filter(|p| p.chars().count() > self.config.min_paragraph_length)
            .take(self.config.max_paragraphs)
            .map(String::from)
            .collect()
    }
}

fn is_sentence_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ';')
}

/// Truncate to at most `limit` characters without splitting a code point.
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sentence(i: usize) -> String {
        format!("Passengers on itinerary number {i:04} may check two standard bags without any extra fee")
    }

    fn policy_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("{}.", sentence(i)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_chunks_are_bounded_and_labeled() {
        let chunker = PolicyChunker::new();
        let chunks = chunker.chunk(&policy_text(40), "Baggage Faqs");

        assert!(chunks.len() >= 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.source_label, "Baggage Faqs");
            assert!(chunk.text.starts_with("[Source: Baggage Faqs]\n\n"));
            assert!(chunk.char_len() > 100);
            assert!(chunk.char_len() <= 1200);
            assert!(chunk.body().chars().count() <= 600);
        }
    }

    #[test]
    fn test_sentences_joined_with_separator() {
        let chunker = PolicyChunker::new();
        let chunks = chunker.chunk(&policy_text(40), "Faq");

        let body = chunks[0].body();
        assert!(body.starts_with(&sentence(0)));
        assert!(body.contains(&format!("{}. {}", sentence(0), sentence(1))));
    }

    #[test]
    fn test_short_fragments_are_dropped() {
        let chunker = PolicyChunker::new();
        let mut text = policy_text(40);
        text.push_str(" Fees apply. See below! Yes? No;");

        let chunks = chunker.chunk(&text, "Faq");
        assert!(chunks.iter().all(|c| !c.text.contains("Fees apply")));
        assert!(chunks.iter().all(|c| !c.text.contains("See below")));
    }

    #[test]
    fn test_paragraph_fallback_without_punctuation() {
        let chunker = PolicyChunker::new();
        let paragraphs: Vec<String> = (0..4)
            .map(|i| {
                format!(
                    "Table row {i} lists the checked bag allowance for economy travel between domestic airports and the matching weight limit in pounds"
                )
            })
            .collect();
        let text = paragraphs.join("\n\n");

        let chunks = chunker.chunk(&text, "Allowance Table");
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[2].body(), paragraphs[2]);
    }

    #[test]
    fn test_paragraph_fallback_is_capped() {
        let chunker = PolicyChunker::new();
        let text = (0..20)
            .map(|i| format!("Paragraph {i} describes oversize items such as golf bags and surfboards along with their handling charges"))
            .collect::<Vec<_>>()
            .join("\n\n");

        let chunks = chunker.chunk(&text, "Special Items");
        assert_eq!(chunks.len(), 12);
    }

    #[test]
    fn test_per_document_cap_keeps_earliest_chunks() {
        let chunker = PolicyChunker::new();
        let chunks = chunker.chunk(&policy_text(300), "Contract");

        assert_eq!(chunks.len(), 15);
        assert!(chunks[0].body().starts_with(&sentence(0)));
    }

    #[test]
    fn test_long_text_is_hard_truncated() {
        let chunker = PolicyChunker::new();
        let text = "checked baggage ".repeat(200);

        let chunks = chunker.chunk(&text, "Contract");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_len(), 1200);
    }

    #[test]
    fn test_multibyte_text_does_not_split_code_points() {
        let chunker = PolicyChunker::new();
        let text = "bagagem despachada é permitida ".repeat(100);

        let chunks = chunker.chunk(&text, "Política");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].char_len() <= 1200);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let chunker = PolicyChunker::new();
        let text = policy_text(60);
        assert_eq!(chunker.chunk(&text, "Faq"), chunker.chunk(&text, "Faq"));
    }

    #[test]
    fn test_empty_text_produces_no_chunks() {
        let chunker = PolicyChunker::new();
        assert!(chunker.chunk("", "Empty").is_empty());
        assert!(chunker.chunk("Too short.", "Empty").is_empty());
    }

    #[test]
    fn test_body_strips_header() {
        let chunk = Chunk::labeled("Faq", "Carry-on bags must fit in the overhead bin.", 0, 1200);
        assert_eq!(chunk.body(), "Carry-on bags must fit in the overhead bin.");
    }
}
