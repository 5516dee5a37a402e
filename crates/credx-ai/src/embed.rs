//! Text → vector embedding: chunk long inputs, encode each chunk, pool
//! the chunk vectors, L2-normalize the result.
//!
//! Output contract: one row per input text, constant width, unit norm —
//! except all-zero rows (blank input), which stay zero rather than
//! dividing by a zero norm.

use std::sync::Arc;

use crate::encoder::Encoder;

pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const DEFAULT_OVERLAP: usize = 50;

/// How per-chunk vectors collapse into one per-text vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pooling {
    /// Arithmetic mean of the chunk vectors.
    #[default]
    Mean,
    /// Element-wise maximum.
    Max,
    /// Chunk vectors weighted by character length, weights normalized
    /// to sum to 1.
    Weighted,
}

/// Chunk-and-pool embedder over a sentence encoder.
pub struct Embedder {
    encoder: Arc<dyn Encoder>,
    chunk_size: usize,
    overlap: usize,
    pooling: Pooling,
}

impl Embedder {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            encoder,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            pooling: Pooling::default(),
        }
    }

    pub fn with_pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = pooling;
        self
    }

    pub fn with_chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.overlap = overlap;
        self
    }

    /// Embedding width.
    pub fn dim(&self) -> usize {
        self.encoder.dim()
    }

    /// Identifier of the underlying encoder, persisted in the bundle.
    pub fn model_id(&self) -> &str {
        self.encoder.model_id()
    }

    /// Embed texts into a `(N, dim)` matrix of unit-norm rows.
    pub fn embed(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let dim = self.encoder.dim();
        let mut rows = Vec::with_capacity(texts.len());

        for text in texts {
            let mut chunks = self.encoder.chunk(text, self.chunk_size, self.overlap);
            if chunks.is_empty() {
                chunks.push(String::new());
            }

            let vecs = self.encoder.encode(&chunks)?;
            anyhow::ensure!(
                vecs.len() == chunks.len(),
                "encoder returned {} vectors for {} chunks",
                vecs.len(),
                chunks.len()
            );
            for v in &vecs {
                anyhow::ensure!(
                    v.len() == dim,
                    "encoder returned dim {} (expected {dim})",
                    v.len()
                );
            }

            let mut pooled = pool(&vecs, &chunks, self.pooling);
            l2_normalize(&mut pooled);
            rows.push(pooled);
        }

        Ok(rows)
    }
}

fn pool(vecs: &[Vec<f32>], chunks: &[String], pooling: Pooling) -> Vec<f32> {
    let dim = vecs[0].len();
    match pooling {
        Pooling::Mean => {
            let mut out = vec![0.0f32; dim];
            for v in vecs {
                for (o, x) in out.iter_mut().zip(v) {
                    *o += x;
                }
            }
            let n = vecs.len() as f32;
            for o in &mut out {
                *o /= n;
            }
            out
        }
        Pooling::Max => {
            let mut out = vec![f32::NEG_INFINITY; dim];
            for v in vecs {
                for (o, &x) in out.iter_mut().zip(v) {
                    *o = o.max(x);
                }
            }
            out
        }
        Pooling::Weighted => {
            let lengths: Vec<f32> = chunks.iter().map(|c| c.chars().count() as f32).collect();
            let total: f32 = lengths.iter().sum();
            if total == 0.0 {
                // All chunks empty; degenerate to mean.
                return pool(vecs, chunks, Pooling::Mean);
            }
            let mut out = vec![0.0f32; dim];
            for (v, len) in vecs.iter().zip(&lengths) {
                let w = len / total;
                for (o, x) in out.iter_mut().zip(v) {
                    *o += w * x;
                }
            }
            out
        }
    }
}

/// L2-normalize in place; the zero vector is left untouched.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::StubEncoder;

    fn embedder(dim: usize) -> Embedder {
        Embedder::new(Arc::new(StubEncoder::new(dim)))
    }

    #[test]
    fn row_count_matches_input_count() {
        let e = embedder(16);
        let rows = e.embed(&["one", "two", "three"]).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn dimension_constant_across_calls() {
        let e = embedder(16);
        let a = e.embed(&["short"]).unwrap();
        let long = "lorem ".repeat(2000);
        let b = e.embed(&[long.as_str()]).unwrap();
        assert_eq!(a[0].len(), 16);
        assert_eq!(b[0].len(), 16);
    }

    #[test]
    fn rows_have_unit_norm() {
        let e = embedder(32);
        let long = "word ".repeat(1500);
        let rows = e.embed(&["hello world", long.as_str()]).unwrap();
        for row in &rows {
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4, "expected unit norm, got {norm}");
        }
    }

    #[test]
    fn blank_text_embeds_to_zero_vector() {
        let e = embedder(16);
        let rows = e.embed(&[""]).unwrap();
        assert!(rows[0].iter().all(|&v| v == 0.0));
        assert!(rows[0].iter().all(|v| v.is_finite()), "must not produce NaN");
    }

    /// Encoder returning a distinct basis vector per chunk index, for
    /// checking pooling math exactly.
    struct BasisEncoder;

    impl Encoder for BasisEncoder {
        fn model_id(&self) -> &str {
            "basis"
        }
        fn dim(&self) -> usize {
            4
        }
        fn encode(&self, chunks: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(chunks
                .iter()
                .enumerate()
                .map(|(i, _)| {
                    let mut v = vec![0.0; 4];
                    v[i % 4] = 1.0;
                    v
                })
                .collect())
        }
    }

    // 10 words with chunk_size 4 / overlap 1 → 3 chunks → basis e0,e1,e2.
    fn ten_words() -> String {
        (0..10)
            .map(|i| format!("w{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn mean_pooling_averages_chunks() {
        let e = Embedder::new(Arc::new(BasisEncoder)).with_chunking(4, 1);
        let rows = e.embed(&[ten_words().as_str()]).unwrap();
        // mean of e0,e1,e2 then normalized: equal mass on first 3 axes.
        let row = &rows[0];
        assert!((row[0] - row[1]).abs() < 1e-6);
        assert!((row[1] - row[2]).abs() < 1e-6);
        assert_eq!(row[3], 0.0);
    }

    #[test]
    fn max_pooling_takes_elementwise_max() {
        let e = Embedder::new(Arc::new(BasisEncoder))
            .with_chunking(4, 1)
            .with_pooling(Pooling::Max);
        let rows = e.embed(&[ten_words().as_str()]).unwrap();
        let row = &rows[0];
        // max over e0,e1,e2 = [1,1,1,0], normalized.
        assert!(row[0] > 0.0 && row[1] > 0.0 && row[2] > 0.0);
        assert_eq!(row[3], 0.0);
    }

    #[test]
    fn weighted_pooling_favors_longer_chunks() {
        // Chunks: "w0 w1 w2 w3" (11 ch), "w3 w4 w5 w6" (11), "w6 w7 w8 w9" (11)
        // equal lengths → same as mean; perturb by using longer words later.
        let text = "a a a a bbbbbbbbbb bbbbbbbbbb bbbbbbbbbb bbbbbbbbbb";
        let e = Embedder::new(Arc::new(BasisEncoder))
            .with_chunking(4, 0)
            .with_pooling(Pooling::Weighted);
        let rows = e.embed(&[text]).unwrap();
        let row = &rows[0];
        // Second chunk is longer, so axis 1 outweighs axis 0.
        assert!(
            row[1] > row[0],
            "longer chunk should carry more weight: {row:?}"
        );
    }
}
