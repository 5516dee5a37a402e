//! Embedding and classification for credx.
//!
//! The [`Embedder`] chunks and pools text into fixed-width vectors over
//! a pluggable [`Encoder`]; the [`ClassifierService`] scores those
//! vectors with the trained bundle and accepts incremental updates.
//! The ONNX-backed encoder lives behind the `onnx` feature.

pub mod chunk;
pub mod embed;
pub mod encoder;
mod error;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod service;
pub mod train;

pub use embed::{Embedder, Pooling};
pub use encoder::{Encoder, StubEncoder};
pub use error::ClassifierError;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEncoder;
pub use service::{Classification, ClassifierService};
pub use train::{TrainConfig, TrainingSample, ensure_bundle, initial_train};
