//! Flat similarity index over embedded items.

use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest};
use crate::similarity::{normalize, top_k};

/// A ranked search result borrowing the matched item.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a, T> {
    /// The matched item.
    pub item: &'a T,

    /// Cosine similarity with the query.
    pub score: f32,

    /// Position of the item in the index.
    pub position: usize,
}

/// An exact inner-product index.
///
/// Position `i` of the vectors always corresponds to position `i` of the
/// items. Every stored vector is unit length, so the inner product equals
/// cosine similarity.
#[derive(Debug, Clone)]
pub struct VectorIndex<T> {
    dimension: usize,
    vectors: Vec<Embedding>,
    items: Vec<T>,
}

impl<T> VectorIndex<T> {
    /// Create an index with no entries.
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Assemble an index from already computed vectors.
    pub fn from_parts(dimension: usize, vectors: Vec<Embedding>, items: Vec<T>) -> Result<Self> {
        if vectors.len() != items.len() {
            return Err(EmbeddingError::LengthMismatch {
                vectors: vectors.len(),
                items: items.len(),
            });
        }

        let mut vectors = vectors;
        for vector in &mut vectors {
            if vector.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            normalize(vector);
        }

        Ok(Self {
            dimension,
            vectors,
            items,
        })
    }

    /// Embed every item with `provider` and index the results.
    ///
    /// The index dimension is whatever the provider returns for the first
    /// item; every other vector must match it. The provider's declared
    /// dimension only applies to an empty index.
    pub async fn build<F>(
        items: Vec<T>,
        text_of: F,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self>
    where
        F: Fn(&T) -> &str,
    {
        if items.is_empty() {
            return Ok(Self::empty(provider.default_dimension()));
        }

        let requests: Vec<EmbeddingRequest> = items
            .iter()
            .map(|item| EmbeddingRequest::new(text_of(item)))
            .collect();

        info!(
            "Embedding {} items with provider: {}",
            requests.len(),
            provider.name()
        );
        let responses = provider.embed_batch(requests).await?;
        let vectors: Vec<Embedding> = responses.into_iter().map(|r| r.embedding).collect();

        let dimension = vectors
            .first()
            .map_or_else(|| provider.default_dimension(), Vec::len);
        if dimension != provider.default_dimension() {
            warn!(
                "Provider {} returned {dimension}-d vectors but declares {}; indexing at {dimension}",
                provider.name(),
                provider.default_dimension()
            );
        }

        Self::from_parts(dimension, vectors, items)
    }

    /// Embed `query` and return the `k` closest items, best first.
    ///
    /// An empty index or `k == 0` returns no hits without calling the
    /// provider.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<SearchHit<'_, T>>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let response = provider.embed(EmbeddingRequest::new(query)).await?;
        self.search_vector(response.embedding, k)
    }

    /// Return the `k` items closest to an already computed query vector.
    pub fn search_vector(&self, mut query: Embedding, k: usize) -> Result<Vec<SearchHit<'_, T>>> {
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        normalize(&mut query);

        let ranked = top_k(&query, &self.vectors, k)?;
        debug!("Search returned {} of {} items", ranked.len(), self.len());

        Ok(ranked
            .into_iter()
            .map(|(position, score)| SearchHit {
                item: &self.items[position],
                score,
                position,
            })
            .collect())
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the index holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Indexed items in position order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Stored unit vectors in position order.
    pub fn vectors(&self) -> &[Embedding] {
        &self.vectors
    }
}
