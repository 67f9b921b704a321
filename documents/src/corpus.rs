//! Assembling the chunk list for a whole document set.

use tracing::{info, warn};

use crate::chunker::{Chunk, PolicyChunker};
use crate::loader::Document;

/// Label of the placeholder chunk emitted when there is nothing to index.
pub const SENTINEL_LABEL: &str = "placeholder";

const SENTINEL_BODY: &str = "No airline baggage policy documents have been indexed yet. \
Add policy pages to the documents directory and rebuild the index to get answers grounded in real policy text.";

impl Chunk {
    /// The placeholder chunk that keeps an empty corpus queryable.
    pub fn sentinel() -> Self {
        Self::labeled(SENTINEL_LABEL, SENTINEL_BODY, 0, usize::MAX)
    }

    /// Whether this is the placeholder chunk.
    pub fn is_sentinel(&self) -> bool {
        self.source_label == SENTINEL_LABEL && self.body() == SENTINEL_BODY
    }
}

/// Chunk every document and number the chunks across the corpus.
///
/// Never returns an empty list: when no document yields a chunk, the result
/// is a single sentinel chunk.
pub fn chunk_documents(documents: &[Document], chunker: &PolicyChunker) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for document in documents {
        let produced = chunker.chunk(&document.text, &document.label);
        info!(
            "Extracted {} chunks from {}",
            produced.len(),
            document.path.display()
        );
        chunks.extend(produced);
    }

    if chunks.is_empty() {
        warn!("No policy chunks produced, using placeholder corpus");
        return vec![Chunk::sentinel()];
    }

    for (ordinal, chunk) in chunks.iter_mut().enumerate() {
        chunk.ordinal = ordinal;
    }

    info!("Total chunks: {}", chunks.len());
    chunks
}
