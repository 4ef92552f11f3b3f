//! ONNX Runtime embedding pipeline for sentence-transformers models.
//!
//! Mean-pooled embeddings from a model directory holding `model.onnx` and
//! `tokenizer.json` (e.g. all-MiniLM-L6-v2, 384 dimensions).

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::embedder::{Embed, EmbedError, normalize};

struct Inner {
    session: Session,
    tokenizer: Tokenizer,
}

/// Sentence embedder backed by ONNX Runtime.
///
/// The session needs exclusive access per run, so concurrent callers queue on
/// an internal lock.
pub struct OnnxEmbedder {
    inner: Mutex<Inner>,
    dim: usize,
}

impl OnnxEmbedder {
    /// Load an embedding model from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let session = Session::builder()?.commit_from_file(&model_path)?;
        let dim = infer_dim(session.outputs()[0].dtype()).unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        // Clauses can be long; MiniLM was trained on 256 tokens.
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: 256,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        info!(dim, model = %model_path.display(), "loaded embedding model");
        Ok(Self {
            inner: Mutex::new(Inner { session, tokenizer }),
            dim,
        })
    }

    fn run(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let backend = |e: &dyn std::fmt::Display| EmbedError::Backend(e.to_string());
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| EmbedError::Backend("embedding session lock poisoned".into()))?;
        let Inner { session, tokenizer } = &mut *guard;

        let encodings = tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| backend(&e))?;
        let batch = Batch::from_encodings(&encodings);
        let shape = [batch.rows as i64, batch.width as i64];
        let tensor = |v: &[i64]| Tensor::from_array((shape, v.to_vec().into_boxed_slice())).map_err(|e| backend(&e));

        let outputs = session
            .run(ort::inputs![
                "input_ids" => tensor(&batch.ids)?,
                "attention_mask" => tensor(&batch.mask)?,
                "token_type_ids" => tensor(&batch.type_ids)?,
            ])
            .map_err(|e| backend(&e))?;

        // Token states: [rows, tokens, dim].
        let (out_shape, states) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| backend(&e))?;
        let out_shape: &[i64] = out_shape;
        let [rows, tokens, dim] = out_shape else {
            return Err(EmbedError::Backend(format!("unexpected output shape {out_shape:?}")));
        };
        if *rows as usize != batch.rows {
            return Err(EmbedError::Backend(format!("model returned {rows} rows for {} inputs", batch.rows)));
        }
        if *dim as usize != self.dim {
            return Err(EmbedError::Dimension {
                expected: self.dim,
                got: *dim as usize,
            });
        }

        Ok((0..batch.rows)
            .map(|row| batch.mean_pool(row, states, *tokens as usize, self.dim))
            .collect())
    }
}

/// Padded, row-major model inputs for one batch.
struct Batch {
    rows: usize,
    width: usize,
    ids: Vec<i64>,
    mask: Vec<i64>,
    type_ids: Vec<i64>,
}

impl Batch {
    fn from_encodings(encodings: &[tokenizers::Encoding]) -> Self {
        let rows = encodings.len();
        let width = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let mut batch = Self {
            rows,
            width,
            ids: vec![0; rows * width],
            mask: vec![0; rows * width],
            type_ids: vec![0; rows * width],
        };
        for (row, enc) in encodings.iter().enumerate() {
            let base = row * width;
            let fields = enc.get_ids().iter().zip(enc.get_attention_mask()).zip(enc.get_type_ids());
            for (col, ((&id, &mask), &type_id)) in fields.enumerate() {
                batch.ids[base + col] = i64::from(id);
                batch.mask[base + col] = i64::from(mask);
                batch.type_ids[base + col] = i64::from(type_id);
            }
        }
        batch
    }

    /// Attention-weighted mean of one row's token states, L2-normalised.
    fn mean_pool(&self, row: usize, states: &[f32], tokens: usize, dim: usize) -> Vec<f32> {
        let mut pooled = vec![0.0f32; dim];
        let mut weight = 0.0f32;
        for col in 0..tokens.min(self.width) {
            let m = self.mask[row * self.width + col] as f32;
            if m == 0.0 {
                continue;
            }
            let token = &states[(row * tokens + col) * dim..][..dim];
            for (p, x) in pooled.iter_mut().zip(token) {
                *p += x * m;
            }
            weight += m;
        }
        if weight > 0.0 {
            pooled.iter_mut().for_each(|p| *p /= weight);
        }
        normalize(&mut pooled);
        pooled
    }
}

impl Embed for OnnxEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.run(texts)
    }
}

/// Last dimension of the model's output tensor, when the model declares it.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
