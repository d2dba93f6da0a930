//! Embedding service abstractions.
//!
//! The index treats the embedding model as an opaque, deterministic function
//! `text -> vector[D]`. This module provides the trait for that function and
//! the providers shipped with the crate.
//!
//! # Providers
//!
//! - [`HashingEmbedding`] - Deterministic feature hashing, no model files
//! - `OnnxEmbedding` - Built-in ONNX model (requires `builtin-embeddings` feature)
//!
//! # Example
//!
//! ```rust
//! use newsindex::embedding::{EmbeddingService, HashingEmbedding};
//!
//! let service = HashingEmbedding::new(384);
//! let embedding = service.embed("Company X faces fraud probe").unwrap();
//! assert_eq!(embedding.len(), 384);
//!
//! // Empty text still yields a vector of the right length
//! assert_eq!(service.embed("").unwrap(), vec![0.0; 384]);
//! ```

#[cfg(feature = "builtin-embeddings")]
pub mod onnx;

use crate::error::{IndexError, Result, ValidationError};
use crate::types::Embedding;

/// Embedding service trait for generating vector representations of text.
///
/// Implementations must be thread-safe (`Send + Sync`) and deterministic for
/// a fixed model version: the same text always maps to the same vector.
///
/// # Implementing a Custom Provider
///
/// ```rust,ignore
/// use newsindex::embedding::EmbeddingService;
/// use newsindex::{Embedding, Result};
///
/// struct RemoteEmbedding {
///     client: MyApiClient,
///     dimension: usize,
/// }
///
/// impl EmbeddingService for RemoteEmbedding {
///     fn embed(&self, text: &str) -> Result<Embedding> {
///         Ok(self.client.get_embedding(text)?)
///     }
///
///     fn dimension(&self) -> usize {
///         self.dimension
///     }
/// }
/// ```
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding for a single text.
    ///
    /// Empty text must still produce a vector of length `dimension()`.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Embedding` if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generates embeddings for multiple texts, in input order.
    ///
    /// The default implementation embeds one text at a time.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Returns the dimension of embeddings produced by this service.
    fn dimension(&self) -> usize;

    /// Validates that an embedding has the correct dimension.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DimensionMismatch` if dimensions don't match.
    fn validate_embedding(&self, embedding: &Embedding) -> Result<()> {
        let expected = self.dimension();
        let actual = embedding.len();

        if actual != expected {
            return Err(IndexError::Validation(ValidationError::dimension_mismatch(
                expected, actual,
            )));
        }

        Ok(())
    }
}

/// Deterministic feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a, 64 bit) into one of
/// `dimension` buckets with a hash-derived sign, and the resulting vector is
/// L2-normalized. Texts without tokens map to the zero vector.
///
/// This is not a semantic model: only shared tokens raise similarity. It
/// gives the index a fully offline default and a stable fixture for tests.
#[derive(Clone, Debug)]
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    /// Creates a hashing embedder producing `dimension`-length vectors.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl EmbeddingService for HashingEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        if self.dimension == 0 {
            return Err(IndexError::embedding(
                "Hashing embedder configured with zero dimension",
            ));
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        Ok(l2_normalize(vector))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Splits text into lowercase alphanumeric tokens.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(PRIME)
    })
}

/// L2 normalizes a vector in place. The zero vector stays zero.
pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Creates an embedding service based on the configuration.
///
/// # Errors
///
/// Returns an error if:
/// - Builtin embeddings requested but feature not enabled
/// - ONNX model loading fails (for builtin provider)
pub fn create_embedding_service(
    config: &crate::config::Config,
) -> Result<Box<dyn EmbeddingService>> {
    use crate::config::EmbeddingProvider;

    match &config.embedding_provider {
        EmbeddingProvider::Hashing => Ok(Box::new(HashingEmbedding::new(config.dimension()))),

        #[cfg(feature = "builtin-embeddings")]
        EmbeddingProvider::Builtin { model_path } => Ok(Box::new(
            onnx::OnnxEmbedding::with_dimension(model_path.clone(), config.dimension())?,
        )),

        #[cfg(not(feature = "builtin-embeddings"))]
        EmbeddingProvider::Builtin { .. } => Err(IndexError::embedding(
            "Builtin embeddings require the 'builtin-embeddings' feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hashing_embedding_dimension() {
        let service = HashingEmbedding::new(384);
        assert_eq!(service.dimension(), 384);
        assert_eq!(service.embed("hello world").unwrap().len(), 384);
    }

    #[test]
    fn test_hashing_embedding_is_deterministic() {
        let service = HashingEmbedding::new(64);
        let a = service.embed("Tata Motors shares rose 5%").unwrap();
        let b = service.embed("Tata Motors shares rose 5%").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hashing_embedding_ignores_case_and_punctuation() {
        let service = HashingEmbedding::new(64);
        let a = service.embed("Fraud, PROBE!").unwrap();
        let b = service.embed("fraud probe").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hashing_embedding_is_normalized() {
        let service = HashingEmbedding::new(128);
        let v = service.embed("analysts warn of margin pressure").unwrap();
        assert!((dot(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedding_empty_text_is_zero_vector() {
        let service = HashingEmbedding::new(16);
        assert_eq!(service.embed("").unwrap(), vec![0.0; 16]);
        assert_eq!(service.embed("  ... !!").unwrap(), vec![0.0; 16]);
    }

    #[test]
    fn test_hashing_embedding_zero_dimension_fails() {
        let service = HashingEmbedding::new(0);
        assert!(service.embed("text").unwrap_err().is_embedding());
    }

    #[test]
    fn test_embed_batch_preserves_order() {
        let service = HashingEmbedding::new(32);
        let batch = service.embed_batch(&["alpha", "beta"]).unwrap();
        assert_eq!(batch[0], service.embed("alpha").unwrap());
        assert_eq!(batch[1], service.embed("beta").unwrap());
    }

    #[test]
    fn test_validate_embedding_dimension() {
        let service = HashingEmbedding::new(3);
        assert!(service.validate_embedding(&vec![1.0, 2.0, 3.0]).is_ok());
        assert!(service
            .validate_embedding(&vec![1.0, 2.0])
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_hashing_embedding_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HashingEmbedding>();
    }

    #[test]
    fn test_create_embedding_service_hashing() {
        let config = crate::config::Config::default();
        let service = create_embedding_service(&config).unwrap();
        assert_eq!(service.dimension(), 384);
    }

    #[cfg(not(feature = "builtin-embeddings"))]
    #[test]
    fn test_create_embedding_service_builtin_requires_feature() {
        let config = crate::config::Config::with_builtin_embeddings();
        let result = create_embedding_service(&config);
        assert!(result.is_err());
    }
}
