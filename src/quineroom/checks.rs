//! Pairwise similarity checks over chat messages.
//!
//! A [`SimilarityMetric`] looks at an ordered, contiguous window of messages and answers one
//! question: does **every** adjacent pair in the window satisfy the metric's predicate? The
//! set of metrics is closed and chosen once, when the checker is built:
//!
//! | Metric | Predicate on an adjacent pair |
//! |--------|-------------------------------|
//! | `Equality` | contents are byte-for-byte identical |
//! | `CosineSimilarity` | cosine of the two embeddings `> threshold` |
//! | `JaroSimilarity` | Jaro score `> threshold` (0.0..=1.0) |
//! | `FuzzyRatio` | indel ratio `> threshold` (0..=100) |
//!
//! All threshold comparisons are strict: a pair scoring exactly the threshold does not count.
//!
//! ```rust
//! use quineroom::{Message, SimilarityMetric};
//!
//! # async {
//! let lol = Message::new("LOL", "a", None);
//! let metric = SimilarityMetric::Equality;
//! assert!(metric.check(&[&lol, &lol, &lol]).await.unwrap());
//! # };
//! ```

use std::fmt;
use std::sync::Arc;

use crate::quineroom::client_wrapper::{ClientError, EmbeddingClient};
use crate::quineroom::message::Message;

/// Length of the vector substituted when the embedding model is missing.
pub const ZERO_VECTOR_DIM: usize = 512;

/// The closed set of similarity strategies used by the convergence checker.
#[derive(Clone)]
pub enum SimilarityMetric {
    /// Contents must be identical.
    Equality,
    /// Embeddings of adjacent contents must have cosine similarity above `threshold`.
    ///
    /// Every evaluated message costs one embedding call; results are not cached between
    /// calls.
    CosineSimilarity {
        embedder: Arc<dyn EmbeddingClient>,
        model: String,
        threshold: f64,
    },
    /// Jaro similarity of adjacent contents must exceed `threshold`.
    JaroSimilarity { threshold: f64 },
    /// Indel-based fuzzy ratio (0-100) of adjacent contents must exceed `threshold`.
    FuzzyRatio { threshold: f64 },
}

impl fmt::Debug for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityMetric::Equality => write!(f, "Equality"),
            SimilarityMetric::CosineSimilarity {
                model, threshold, ..
            } => f
                .debug_struct("CosineSimilarity")
                .field("model", model)
                .field("threshold", threshold)
                .finish(),
            SimilarityMetric::JaroSimilarity { threshold } => f
                .debug_struct("JaroSimilarity")
                .field("threshold", threshold)
                .finish(),
            SimilarityMetric::FuzzyRatio { threshold } => f
                .debug_struct("FuzzyRatio")
                .field("threshold", threshold)
                .finish(),
        }
    }
}

impl SimilarityMetric {
    pub fn cosine(
        embedder: Arc<dyn EmbeddingClient>,
        model: impl Into<String>,
        threshold: f64,
    ) -> Self {
        SimilarityMetric::CosineSimilarity {
            embedder,
            model: model.into(),
            threshold,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SimilarityMetric::Equality => "equality",
            SimilarityMetric::CosineSimilarity { .. } => "cosine_similarity",
            SimilarityMetric::JaroSimilarity { .. } => "jaro_similarity",
            SimilarityMetric::FuzzyRatio { .. } => "fuzzy",
        }
    }

    /// Returns `true` iff every adjacent pair of `window` satisfies the metric.
    ///
    /// Only the cosine metric can fail, and only when the embedding backend fails for a reason
    /// other than a missing model.
    pub async fn check(&self, window: &[&Message]) -> Result<bool, ClientError> {
        let pairs = || window.windows(2).map(|pair| (&pair[0].content, &pair[1].content));
        match self {
            SimilarityMetric::Equality => Ok(pairs().all(|(a, b)| a == b)),
            SimilarityMetric::JaroSimilarity { threshold } => {
                Ok(pairs().all(|(a, b)| jaro_similarity(a, b) > *threshold))
            }
            SimilarityMetric::FuzzyRatio { threshold } => {
                Ok(pairs().all(|(a, b)| fuzzy_ratio(a, b) > *threshold))
            }
            SimilarityMetric::CosineSimilarity {
                embedder,
                model,
                threshold,
            } => {
                let mut embeddings = Vec::with_capacity(window.len());
                for message in window {
                    embeddings.push(embed_or_zero(embedder.as_ref(), model, &message.content).await?);
                }
                Ok(embeddings.windows(2).all(|pair| {
                    cosine_similarity(&pair[0], &pair[1]).map_or(false, |sim| sim > *threshold)
                }))
            }
        }
    }
}

async fn embed_or_zero(
    embedder: &dyn EmbeddingClient,
    model: &str,
    text: &str,
) -> Result<Vec<f32>, ClientError> {
    match embedder.embed(model, text).await {
        Ok(embedding) => Ok(embedding),
        Err(ClientError::ModelNotFound(_)) => {
            log::warn!("Embedding model {} not found", model);
            Ok(vec![0.0; ZERO_VECTOR_DIM])
        }
        Err(err) => Err(err),
    }
}

/// Cosine similarity between two embedding vectors.
///
/// `None` when the similarity is undefined: different lengths, empty input, or a zero-norm
/// vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

/// Jaro similarity in `0.0..=1.0`, computed over Unicode scalar values.
///
/// Returns `0.0` when either string is empty.
pub fn jaro_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let search_range = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut a_matched = vec![false; a.len()];
    let mut b_matched = vec![false; b.len()];
    let mut common = 0usize;

    for (i, ca) in a.iter().enumerate() {
        let low = i.saturating_sub(search_range);
        let high = (i + search_range).min(b.len() - 1);
        if low > high {
            continue;
        }
        for j in low..=high {
            if !b_matched[j] && b[j] == *ca {
                a_matched[i] = true;
                b_matched[j] = true;
                common += 1;
                break;
            }
        }
    }

    if common == 0 {
        return 0.0;
    }

    let mut transpositions = 0usize;
    let mut k = 0usize;
    for (i, ca) in a.iter().enumerate() {
        if !a_matched[i] {
            continue;
        }
        while !b_matched[k] {
            k += 1;
        }
        if *ca != b[k] {
            transpositions += 1;
        }
        k += 1;
    }
    let transpositions = (transpositions / 2) as f64;

    let common = common as f64;
    (common / a.len() as f64 + common / b.len() as f64 + (common - transpositions) / common) / 3.0
}

/// Fuzzy ratio on a 0-100 scale: `100 * (1 - indel_distance / (len_a + len_b))`, rounded to
/// the nearest integer with ties to even.
///
/// Returns `0.0` when either string is empty.
pub fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let total = (a.len() + b.len()) as f64;
    let lcs = longest_common_subsequence(&a, &b) as f64;
    // indel distance = total - 2 * lcs
    (100.0 * (2.0 * lcs) / total).round_ties_even()
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct ConstantEmbedder;

    #[async_trait]
    impl EmbeddingClient for ConstantEmbedder {
        async fn embed(&self, _model: &str, _text: &str) -> Result<Vec<f32>, ClientError> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn jaro_known_values() {
        assert!(approx(jaro_similarity("MARTHA", "MARHTA"), 0.9444444444444445));
        assert!(approx(jaro_similarity("DIXON", "DICKSONX"), 0.7666666666666666));
        assert!(approx(jaro_similarity("same", "same"), 1.0));
        assert_eq!(jaro_similarity("abc", "xyz"), 0.0);
        assert_eq!(jaro_similarity("", "abc"), 0.0);
    }

    #[test]
    fn fuzzy_known_values() {
        assert_eq!(fuzzy_ratio("this is a test", "this is a test!"), 97.0);
        assert_eq!(fuzzy_ratio("LOL", "LOL"), 100.0);
        assert_eq!(fuzzy_ratio("abc", "xyz"), 0.0);
        assert_eq!(fuzzy_ratio("", ""), 0.0);
        // 12.5 rounds to even.
        assert_eq!(fuzzy_ratio("a", "abbbbbbbbbbbbbb"), 12.0);
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert!(approx(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }

    #[tokio::test]
    async fn equality_requires_every_adjacent_pair() {
        let a = Message::new("x", "m", None);
        let b = Message::new("y", "m", None);
        let metric = SimilarityMetric::Equality;
        assert!(metric.check(&[&a, &a]).await.unwrap());
        assert!(!metric.check(&[&a, &a, &b]).await.unwrap());
        assert!(!metric.check(&[&a, &b, &a]).await.unwrap());
    }

    #[tokio::test]
    async fn thresholds_are_strict() {
        let a = Message::new("this is a test", "m", None);
        let b = Message::new("this is a test!", "m", None);

        let at = SimilarityMetric::FuzzyRatio { threshold: 97.0 };
        assert!(!at.check(&[&a, &b]).await.unwrap());
        let below = SimilarityMetric::FuzzyRatio { threshold: 96.9 };
        assert!(below.check(&[&a, &b]).await.unwrap());

        let score = jaro_similarity(&a.content, &b.content);
        let at = SimilarityMetric::JaroSimilarity { threshold: score };
        assert!(!at.check(&[&a, &b]).await.unwrap());
        let below = SimilarityMetric::JaroSimilarity {
            threshold: score - 1e-9,
        };
        assert!(below.check(&[&a, &b]).await.unwrap());
    }

    #[tokio::test]
    async fn cosine_threshold_is_strict() {
        let a = Message::new("LOL", "m", None);
        let b = Message::new("lol", "m", None);

        let at = SimilarityMetric::cosine(Arc::new(ConstantEmbedder), "embed", 1.0);
        assert!(!at.check(&[&a, &b]).await.unwrap());
        let below = SimilarityMetric::cosine(Arc::new(ConstantEmbedder), "embed", 1.0 - 1e-9);
        assert!(below.check(&[&a, &b]).await.unwrap());
    }
}
