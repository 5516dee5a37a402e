//! The model bundle: the persisted unit of classifier state.
//!
//! One bundle carries the read-only inference model, the (lazily
//! created) online model, the label mappings, and the embedder
//! identifier needed to reconstruct the same embedding space.
//! Created by initial training, reloaded at service start, and
//! rewritten in full on every incremental update.

use serde::{Deserialize, Serialize};

use crate::labels::LabelSpace;
use crate::model::{InferenceModel, LinearModel};

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelBundle {
    #[serde(default = "format_version")]
    pub version: u32,
    /// Calibrated or margin classifier used read-only for inference.
    pub inference: InferenceModel,
    /// Incrementally-updatable linear model; absent until the first
    /// update derives or creates one.
    pub online: Option<LinearModel>,
    pub labels: LabelSpace,
    /// Identifier of the sentence encoder the models were trained
    /// against (e.g. `all-MiniLM-L6-v2`). Classifying with a different
    /// embedding space would be silently wrong, so loaders verify it.
    pub embed_model: String,
}

fn format_version() -> u32 {
    BUNDLE_FORMAT_VERSION
}

impl ModelBundle {
    pub fn new(
        inference: InferenceModel,
        online: Option<LinearModel>,
        labels: LabelSpace,
        embed_model: impl Into<String>,
    ) -> Self {
        Self {
            version: BUNDLE_FORMAT_VERSION,
            inference,
            online,
            labels,
            embed_model: embed_model.into(),
        }
    }
}
