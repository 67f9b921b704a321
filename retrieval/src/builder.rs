//! Offline index build: load, chunk, embed, persist.

use tracing::info;

use baggage_documents::{Chunk, PolicyChunker, chunk_documents};
use baggage_embeddings::{EmbeddingProvider, VectorIndex};

use crate::config::RagConfig;
use crate::error::{Result, RetrievalError};
use crate::snapshot::SnapshotStore;

/// Summary of a completed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Documents loaded.
    pub documents: usize,

    /// Chunks indexed.
    pub chunks: usize,

    /// Vector dimension.
    pub dimension: usize,

    /// Id shared by the snapshot files.
    pub build_id: String,

    /// Whether the index holds only the placeholder chunk.
    pub placeholder: bool,
}

/// Load and chunk the configured documents, then embed them into an
/// in-memory index. Nothing is written to disk.
pub async fn index_documents(
    config: &RagConfig,
    provider: &dyn EmbeddingProvider,
) -> Result<(usize, VectorIndex<Chunk>)> {
    let documents = config.document_loader().load()?;
    let chunker = PolicyChunker::with_config(config.chunker.clone());
    let chunks = chunk_documents(&documents, &chunker);

    let required = config.index.min_chunks;
    if chunks.len() < required {
        return Err(RetrievalError::InsufficientCorpus {
            chunks: chunks.len(),
            required,
        });
    }

    let index = VectorIndex::build(chunks, |chunk| chunk.text.as_str(), provider).await?;
    Ok((documents.len(), index))
}

/// Build the index from scratch and persist it as a snapshot.
///
/// Any failure aborts before the snapshot is touched.
pub async fn build_index(config: &RagConfig, provider: &dyn EmbeddingProvider) -> Result<BuildReport> {
    info!("Building index from {}", config.documents.dir.display());
    let (documents, index) = index_documents(config, provider).await?;

    let build_id = SnapshotStore::new(&config.index.dir).save(&index)?;
    let placeholder = index.items().iter().all(Chunk::is_sentinel);

    Ok(BuildReport {
        documents,
        chunks: index.len(),
        dimension: index.dimension(),
        build_id,
        placeholder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProviderType;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> RagConfig {
        let mut config = RagConfig::default();
        config.documents.dir = dir.path().join("raw");
        config.index.dir = dir.path().join("index");
        config.embedding.provider = EmbeddingProviderType::Hashing;
        config
    }

    #[tokio::test]
    async fn test_build_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        std::fs::create_dir_all(&config.documents.dir).unwrap();
        let text = (0..40)
            .map(|i| format!("Rule {i}: each checked bag over fifty pounds incurs an overweight fee at the counter."))
            .collect::<Vec<_>>()
            .join(" ");
        std::fs::write(config.documents.dir.join("policy.txt"), text).unwrap();

        let provider = config.embedding_provider().unwrap();
        let report = build_index(&config, provider.as_ref()).await.unwrap();

        assert_eq!(report.documents, 1);
        assert!(report.chunks > 1);
        assert!(!report.placeholder);
        let loaded = SnapshotStore::new(&config.index.dir).load().unwrap();
        assert_eq!(loaded.len(), report.chunks);
    }

    #[tokio::test]
    async fn test_empty_directory_builds_placeholder() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let provider = config.embedding_provider().unwrap();
        let report = build_index(&config, provider.as_ref()).await.unwrap();

        assert_eq!(report.documents, 0);
        assert_eq!(report.chunks, 1);
        assert!(report.placeholder);
    }

    #[tokio::test]
    async fn test_insufficient_corpus_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.index.min_chunks = 5;

        let provider = config.embedding_provider().unwrap();
        let err = build_index(&config, provider.as_ref()).await.unwrap_err();

        assert!(matches!(
            err,
            RetrievalError::InsufficientCorpus { chunks: 1, required: 5 }
        ));
        assert!(!SnapshotStore::new(&config.index.dir).exists());
    }
}
