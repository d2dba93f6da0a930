//! ONNX-based embedding generation.
//!
//! This module provides embedding generation using ONNX Runtime.
//! It requires the `builtin-embeddings` feature to be enabled.
//!
//! # Supported Models
//!
//! - **bge-small-en-v1.5** (384 dimensions) - Default, the reference deployment model
//! - **bge-base-en-v1.5** (768 dimensions) - Higher quality, larger
//!
//! Both are pooled from the `[CLS]` token and L2-normalized, matching how
//! the BGE family is meant to be used for retrieval.
//!
//! ```text
//! Text → Tokenize → ONNX Inference → CLS Pool → L2 Normalize → Embedding
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use newsindex::embedding::onnx::OnnxEmbedding;
//!
//! let service = OnnxEmbedding::new(None)?;
//! let embedding = service.embed("Tata Motors signs joint venture")?;
//! assert_eq!(embedding.len(), 384);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::embedding::{l2_normalize, EmbeddingService};
use crate::error::{IndexError, Result};
use crate::types::Embedding;

const SMALL_MODEL_NAME: &str = "bge-small-en-v1.5";
const BASE_MODEL_NAME: &str = "bge-base-en-v1.5";
const SMALL_DIMENSION: usize = 384;
const BASE_DIMENSION: usize = 768;

/// Both BGE models accept 512 tokens.
const MAX_LENGTH: usize = 512;

const MODEL_FILENAME: &str = "model.onnx";
const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// ONNX-based embedding service.
///
/// The model and tokenizer are loaded eagerly at construction time, so a
/// missing model surfaces at `DocumentIndex::open()` rather than on the
/// first `add_document()`.
pub struct OnnxEmbedding {
    /// `Session::run()` needs `&mut self`; the trait hands out `&self`.
    session: Mutex<Session>,

    tokenizer: Tokenizer,

    dimension: usize,
}

impl OnnxEmbedding {
    /// Creates a service backed by bge-small-en-v1.5 (384d).
    ///
    /// `model_path` is a directory containing `model.onnx` and
    /// `tokenizer.json`; `None` uses the model cache directory.
    pub fn new(model_path: Option<PathBuf>) -> Result<Self> {
        Self::with_dimension(model_path, SMALL_DIMENSION)
    }

    /// Creates a service for a specific dimension.
    ///
    /// Without a `model_path`, 384 selects bge-small-en-v1.5 and 768 selects
    /// bge-base-en-v1.5; other dimensions need an explicit model directory.
    pub fn with_dimension(model_path: Option<PathBuf>, dimension: usize) -> Result<Self> {
        let model_dir = resolve_model_dir(model_path.as_deref(), dimension)?;

        info!(
            model_dir = %model_dir.display(),
            dimension,
            "Loading ONNX embedding model"
        );

        Self::load_from_dir(&model_dir, dimension)
    }

    /// Downloads the default model files for `dimension` into the cache
    /// directory and returns that directory.
    pub fn download_default_model(dimension: usize) -> Result<PathBuf> {
        let model_name = default_model_name(dimension)?;
        let cache_dir = default_cache_dir(model_name);

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            IndexError::embedding(format!(
                "Failed to create model cache directory {}: {e}",
                cache_dir.display()
            ))
        })?;

        let base = format!("https://huggingface.co/BAAI/{model_name}/resolve/main");
        for (remote, local) in [
            (format!("{base}/onnx/{MODEL_FILENAME}"), MODEL_FILENAME),
            (format!("{base}/{TOKENIZER_FILENAME}"), TOKENIZER_FILENAME),
        ] {
            let dest = cache_dir.join(local);
            if !dest.exists() {
                info!(url = %remote, dest = %dest.display(), "Downloading model file");
                download_file(&remote, &dest)?;
            }
        }

        info!(dir = %cache_dir.display(), "Model files ready");
        Ok(cache_dir)
    }

    fn load_from_dir(model_dir: &Path, dimension: usize) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILENAME);
        let tokenizer_path = model_dir.join(TOKENIZER_FILENAME);

        if !model_path.exists() {
            return Err(IndexError::embedding(format!(
                "Model file not found: {}. \
                 Download with OnnxEmbedding::download_default_model({dimension}) \
                 or provide a directory containing '{MODEL_FILENAME}'",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(IndexError::embedding(format!(
                "Tokenizer file not found: {}",
                tokenizer_path.display()
            )));
        }

        let session = create_session(&model_path)?;
        let tokenizer = load_tokenizer(&tokenizer_path)?;

        debug!(dimension, "ONNX embedding model loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension,
        })
    }

    /// Runs one padded batch through the model and returns the pooled,
    /// normalized embedding of each text.
    fn run_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let encodings = texts
            .iter()
            .map(|t| self.tokenizer.encode(*t, true))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| IndexError::embedding(format!("Tokenization failed: {e}")))?;

        let seq_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len().min(MAX_LENGTH))
            .max()
            .unwrap_or(0);
        let batch = texts.len();

        let mut input_ids = vec![0i64; batch * seq_len];
        let mut attention_mask = vec![0i64; batch * seq_len];
        for (i, enc) in encodings.iter().enumerate() {
            let ids = enc.get_ids();
            let mask = enc.get_attention_mask();
            for j in 0..ids.len().min(seq_len) {
                input_ids[i * seq_len + j] = i64::from(ids[j]);
                attention_mask[i * seq_len + j] = i64::from(mask[j]);
            }
        }
        let token_type_ids = vec![0i64; batch * seq_len];

        let tensor = |data: Vec<i64>| -> Result<ort::value::Tensor<i64>> {
            let array = Array2::from_shape_vec((batch, seq_len), data)
                .map_err(|e| IndexError::embedding(format!("Tensor shape error: {e}")))?;
            ort::value::Tensor::from_array(array)
                .map_err(|e| IndexError::embedding(format!("Tensor creation failed: {e}")))
        };
        let ids_tensor = tensor(input_ids)?;
        let mask_tensor = tensor(attention_mask)?;
        let type_tensor = tensor(token_type_ids)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| IndexError::embedding(format!("Session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])
            .map_err(|e| IndexError::embedding(format!("ONNX inference failed: {e}")))?;

        // [batch, seq_len, dim]
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| IndexError::embedding(format!("Output extraction failed: {e}")))?;

        (0..batch)
            .map(|i| {
                let offset = i * seq_len * self.dimension;
                cls_pool(data, offset, self.dimension).map(l2_normalize)
            })
            .collect()
    }
}

impl EmbeddingService for OnnxEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }
        self.run_batch(&[text])?
            .pop()
            .ok_or_else(|| IndexError::embedding("Model returned no embedding"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let non_empty: Vec<&str> = texts
            .iter()
            .copied()
            .filter(|t| !t.trim().is_empty())
            .collect();
        let mut embedded = if non_empty.is_empty() {
            Vec::new()
        } else {
            self.run_batch(&non_empty)?
        }
        .into_iter();

        texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    Ok(vec![0.0; self.dimension])
                } else {
                    embedded
                        .next()
                        .ok_or_else(|| IndexError::embedding("Model returned too few embeddings"))
                }
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn create_session(model_path: &Path) -> Result<Session> {
    Session::builder()
        .map_err(|e| IndexError::embedding(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| IndexError::embedding(format!("Failed to set optimization level: {e}")))?
        .commit_from_file(model_path)
        .map_err(|e| {
            IndexError::embedding(format!(
                "Failed to load ONNX model from {}: {e}",
                model_path.display()
            ))
        })
}

fn load_tokenizer(tokenizer_path: &Path) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
        IndexError::embedding(format!(
            "Failed to load tokenizer from {}: {e}",
            tokenizer_path.display()
        ))
    })?;

    tokenizer
        .with_truncation(Some(tokenizers::TruncationParams {
            max_length: MAX_LENGTH,
            strategy: tokenizers::TruncationStrategy::LongestFirst,
            ..Default::default()
        }))
        .map_err(|e| IndexError::embedding(format!("Failed to set truncation: {e}")))?;

    // Padding is done per batch in run_batch().
    tokenizer.with_padding(None);

    Ok(tokenizer)
}

fn default_model_name(dimension: usize) -> Result<&'static str> {
    match dimension {
        SMALL_DIMENSION => Ok(SMALL_MODEL_NAME),
        BASE_DIMENSION => Ok(BASE_MODEL_NAME),
        _ => Err(IndexError::embedding(format!(
            "No default model for dimension {dimension}. \
             Provide a model_path, or use 384 ({SMALL_MODEL_NAME}) or 768 ({BASE_MODEL_NAME})"
        ))),
    }
}

fn resolve_model_dir(model_path: Option<&Path>, dimension: usize) -> Result<PathBuf> {
    match model_path {
        Some(path) => {
            if !path.exists() {
                return Err(IndexError::embedding(format!(
                    "Model directory not found: {}",
                    path.display()
                )));
            }
            Ok(path.to_path_buf())
        }
        None => {
            let cache_dir = default_cache_dir(default_model_name(dimension)?);
            if !cache_dir.join(MODEL_FILENAME).exists() {
                return Err(IndexError::embedding(format!(
                    "Model not found at {}. \
                     Download with: OnnxEmbedding::download_default_model({dimension})",
                    cache_dir.display()
                )));
            }
            Ok(cache_dir)
        }
    }
}

/// Linux: `~/.cache/newsindex/models/{name}/`
fn default_cache_dir(model_name: &str) -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("newsindex")
        .join("models")
        .join(model_name)
}

/// Takes the `[CLS]` (first token) hidden state of one sequence.
fn cls_pool(data: &[f32], offset: usize, dim: usize) -> Result<Vec<f32>> {
    data.get(offset..offset + dim)
        .map(<[f32]>::to_vec)
        .ok_or_else(|| IndexError::embedding("Model output shorter than expected"))
}

fn download_file(url: &str, dest: &Path) -> Result<()> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| IndexError::embedding(format!("Download failed for {url}: {e}")))?;

    let mut reader = response.into_body().into_reader();
    let mut file = std::fs::File::create(dest).map_err(|e| {
        IndexError::embedding(format!("Failed to create file {}: {e}", dest.display()))
    })?;

    std::io::copy(&mut reader, &mut file).map_err(|e| {
        IndexError::embedding(format!("Failed to write to {}: {e}", dest.display()))
    })?;

    Ok(())
}
