//! The sentence-encoder seam between the embedder and concrete model
//! runtimes.

use crate::chunk::chunk_words;

/// A sentence encoder: maps text chunks to fixed-dimension vectors.
///
/// Implementations with their own tokenizer override [`Encoder::chunk`]
/// to split on token windows; the default falls back to whitespace-word
/// windows.
pub trait Encoder: Send + Sync {
    /// Identifier persisted in the bundle so a reloaded service can
    /// verify it reconstructs the same embedding space.
    fn model_id(&self) -> &str;

    /// Output vector width, constant for the encoder's lifetime.
    fn dim(&self) -> usize;

    /// Split text into encoder-ready chunks.
    fn chunk(&self, text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
        chunk_words(text, chunk_size, overlap)
    }

    /// Encode chunks, one vector per chunk. Rows need not be normalized;
    /// the embedder normalizes after pooling.
    fn encode(&self, chunks: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Deterministic hash-sinusoid encoder for tests and offline runs.
///
/// Same text always produces the same vector at minimal CPU cost; blank
/// text produces the zero vector so the zero-row edge case is exercised.
pub struct StubEncoder {
    dim: usize,
    model_id: String,
}

impl StubEncoder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            model_id: "stub-encoder".to_string(),
        }
    }
}

impl Encoder for StubEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode(&self, chunks: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(chunks
            .iter()
            .map(|chunk| {
                if chunk.trim().is_empty() {
                    return vec![0.0; self.dim];
                }
                let seed = fnv1a(chunk.as_bytes());
                (0..self.dim)
                    .map(|i| ((seed >> (i % 32)) as f32 * 1e-4).sin())
                    .collect()
            })
            .collect())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}
