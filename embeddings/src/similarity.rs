//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical vectors
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (magnitude_a * magnitude_b))
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Find the `k` vectors with the highest inner product against `query`.
///
/// Both sides are expected to be unit length, so the score is the cosine
/// similarity. Results are `(position, score)` pairs, best first; equal
/// scores keep the lower position first.
pub fn top_k(query: &[f32], vectors: &[Embedding], k: usize) -> Result<Vec<(usize, f32)>> {
    let mut scores: Vec<(usize, OrderedFloat<f32>)> = Vec::with_capacity(vectors.len());

    for (position, vector) in vectors.iter().enumerate() {
        let score = dot_product(query, vector)?;
        scores.push((position, OrderedFloat(score)));
    }

    // Stable sort keeps insertion order among ties
    scores.sort_by(|a, b| b.1.cmp(&a.1));
    scores.truncate(k);

    Ok(scores
        .into_iter()
        .map(|(position, score)| (position, score.0))
        .collect())
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut Embedding) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).is_err());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_is_untouched() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_top_k_orders_by_score() {
        let query = vec![1.0, 0.0, 0.0];
        let vectors = vec![
            vec![0.0, 1.0, 0.0],     // 0.0
            vec![1.0, 0.0, 0.0],     // 1.0
            vec![0.6, 0.8, 0.0],     // 0.6
        ];

        let results = top_k(&query, &vectors, 2).unwrap();
        let positions: Vec<usize> = results.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![1, 2]);
        assert!((results[1].1 - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_top_k_ties_prefer_lower_position() {
        let query = vec![1.0, 0.0];
        let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]];

        let results = top_k(&query, &vectors, 3).unwrap();
        let positions: Vec<usize> = results.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_top_k_larger_than_input() {
        let query = vec![1.0, 0.0];
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];

        assert_eq!(top_k(&query, &vectors, 10).unwrap().len(), 2);
        assert!(top_k(&query, &vectors, 0).unwrap().is_empty());
    }

    #[test]
    fn test_top_k_rejects_wrong_dimension() {
        let query = vec![1.0, 0.0, 0.0];
        let vectors = vec![vec![1.0, 0.0]];

        assert!(matches!(
            top_k(&query, &vectors, 1),
            Err(EmbeddingError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }
}
