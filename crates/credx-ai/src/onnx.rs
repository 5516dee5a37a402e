//! ONNX Runtime sentence encoder for sentence-transformers models.
//!
//! Produces attention-masked mean-pooled token embeddings from a model
//! directory containing `model.onnx` and `tokenizer.json` (e.g.
//! all-MiniLM-L6-v2, 384 dimensions).

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::encoder::Encoder;

const MAX_TOKENS: usize = 256;

/// [`Encoder`] backed by ONNX Runtime.
///
/// The session requires `&mut` to run, so it sits behind a mutex; one
/// inference runs at a time while tokenization stays concurrent.
pub struct OnnxEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    /// Same vocabulary, but without truncation or padding, for splitting
    /// long texts into token windows.
    chunk_tokenizer: Tokenizer,
    dim: usize,
    model_id: String,
}

impl OnnxEncoder {
    /// Load from a directory containing `model.onnx` and `tokenizer.json`.
    ///
    /// The directory's file name becomes the encoder's `model_id`, which
    /// the bundle records and verifies on reload.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let session = Session::builder()?.commit_from_file(&model_path)?;

        // Infer embedding dimension from the model output shape.
        let dim = infer_dim(session.outputs()[0].dtype()).unwrap_or(384);

        let chunk_tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        let mut tokenizer = chunk_tokenizer.clone();
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
        // Pad every input in a batch to the same length.
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        let model_id = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx-encoder".to_string());

        info!(dim, model = %model_path.display(), "loaded embedding model");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            chunk_tokenizer,
            dim,
            model_id,
        })
    }
}

impl Encoder for OnnxEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    /// Token-window chunking: splits on the model's own token boundaries
    /// so no chunk exceeds what the encoder actually reads.
    fn chunk(&self, text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
        let chunk_size = chunk_size.max(1).min(MAX_TOKENS);
        let Ok(encoding) = self.chunk_tokenizer.encode(text, false) else {
            return vec![text.to_string()];
        };
        let ids = encoding.get_ids();
        if ids.len() <= chunk_size {
            return vec![text.to_string()];
        }

        let step = chunk_size - overlap.min(chunk_size - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + chunk_size).min(ids.len());
            match self.chunk_tokenizer.decode(&ids[start..end], true) {
                Ok(chunk) => chunks.push(chunk),
                Err(_) => return vec![text.to_string()],
            }
            if end == ids.len() {
                break;
            }
            start += step;
        }
        chunks
    }

    fn encode(&self, chunks: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = chunks.len();
        let encodings = self
            .tokenizer
            .encode_batch(chunks.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Flat input tensors: [batch_size, seq_len].
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = tid as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))?;
        let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let outputs = session.run(ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
            "token_type_ids" => type_tensor,
        ])?;

        // Token embeddings: [batch_size, seq_len, dim].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size && dims[2] as usize == self.dim,
            "unexpected output shape: {dims:?}, expected [{batch_size}, {seq_len}, {}]",
            self.dim
        );
        let actual_seq_len = dims[1] as usize;

        // Mean pooling over real tokens only.
        let mut vectors = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut pooled = vec![0.0f32; self.dim];
            let mut token_count = 0.0f32;

            for j in 0..actual_seq_len {
                let mask_val = attention_mask[i * seq_len + j] as f32;
                if mask_val > 0.0 {
                    let offset = (i * actual_seq_len + j) * self.dim;
                    for (d, p) in pooled.iter_mut().enumerate() {
                        *p += output_data[offset + d] * mask_val;
                    }
                    token_count += mask_val;
                }
            }
            if token_count > 0.0 {
                for p in &mut pooled {
                    *p /= token_count;
                }
            }
            vectors.push(pooled);
        }

        Ok(vectors)
    }
}

/// Try to infer the embedding dimension from the ONNX model output type.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::embed::Embedder;

    fn model_dir() -> Option<PathBuf> {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("all-MiniLM-L6-v2");
        if dir.join("model.onnx").exists() {
            Some(dir)
        } else {
            eprintln!(
                "skipping: model not found. Download from HuggingFace:\n  \
                 curl -L -o models/all-MiniLM-L6-v2/model.onnx \
                 https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx"
            );
            None
        }
    }

    #[test]
    fn load_model() {
        let Some(dir) = model_dir() else { return };
        let encoder = OnnxEncoder::load(&dir).unwrap();
        assert_eq!(encoder.dim(), 384);
        assert_eq!(encoder.model_id(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn encode_batch() {
        let Some(dir) = model_dir() else { return };
        let encoder = OnnxEncoder::load(&dir).unwrap();
        let chunks = vec![
            "Chemical exposure limits in the workplace".to_string(),
            "Fire safety regulations for commercial buildings".to_string(),
        ];
        let vecs = encoder.encode(&chunks).unwrap();
        assert_eq!(vecs.len(), 2);
        for v in &vecs {
            assert_eq!(v.len(), 384);
        }
    }

    #[test]
    fn similar_texts_closer() {
        let Some(dir) = model_dir() else { return };
        let embedder = Embedder::new(Arc::new(OnnxEncoder::load(&dir).unwrap()));

        let vecs = embedder
            .embed(&[
                "workplace health and safety",
                "control of substances hazardous to health",
                "income tax legislation",
            ])
            .unwrap();

        let sim = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(
            sim(&vecs[0], &vecs[1]) > sim(&vecs[0], &vecs[2]),
            "safety texts should embed closer than safety vs tax"
        );
    }

    #[test]
    fn token_chunking_splits_long_text() {
        let Some(dir) = model_dir() else { return };
        let encoder = OnnxEncoder::load(&dir).unwrap();
        let long = "occupational safety ".repeat(500);
        let chunks = encoder.chunk(&long, 128, 16);
        assert!(chunks.len() > 1, "long text should split into windows");
    }
}
