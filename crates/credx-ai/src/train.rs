//! Initial (offline) training: turn a labeled corpus into a model
//! bundle the service can load and update incrementally.

use std::collections::HashMap;
use std::sync::Arc;

use credx_core::{InferenceModel, LabelSpace, LinearModel, ModelBundle};
use credx_store::{BundleStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embed::Embedder;
use crate::error::ClassifierError;

/// One labeled document, as read from a training corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub text: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Full passes over the corpus.
    pub epochs: usize,
    /// Classes with fewer samples than this are dropped before training.
    pub min_class_samples: usize,
    pub learning_rate: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            min_class_samples: 2,
            learning_rate: 0.05,
        }
    }
}

/// Train a fresh bundle from scratch.
///
/// Classes below `min_class_samples` are dropped (they cannot support a
/// train/validation split, let alone calibration); at least two classes
/// must survive. The online slot starts empty — the first incremental
/// update derives it from the trained model.
pub fn initial_train(
    embedder: &Embedder,
    samples: &[TrainingSample],
    cfg: &TrainConfig,
) -> Result<ModelBundle, ClassifierError> {
    if samples.is_empty() {
        return Err(ClassifierError::invalid_input("no training samples"));
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for s in samples {
        *counts.entry(s.label.as_str()).or_default() += 1;
    }
    let mut kept: Vec<&str> = Vec::new();
    for (label, count) in &counts {
        if *count < cfg.min_class_samples {
            warn!(label, count, min = cfg.min_class_samples, "dropping sparse class");
        } else {
            kept.push(label);
        }
    }
    if kept.len() < 2 {
        return Err(ClassifierError::invalid_input(format!(
            "need at least 2 trainable classes, have {}",
            kept.len()
        )));
    }

    let labels = LabelSpace::from_labels(kept);

    let usable: Vec<&TrainingSample> = samples
        .iter()
        .filter(|s| labels.index_of(&s.label).is_some())
        .collect();
    let texts: Vec<&str> = usable.iter().map(|s| s.text.as_str()).collect();
    let ys: Vec<usize> = usable
        .iter()
        .map(|s| labels.index_of(&s.label).unwrap_or_default())
        .collect();

    info!(
        samples = usable.len(),
        classes = labels.len(),
        epochs = cfg.epochs,
        "training initial model"
    );
    let xs = embedder.embed(&texts).map_err(ClassifierError::Embedding)?;

    let mut model =
        LinearModel::new(labels.len(), embedder.dim()).with_learning_rate(cfg.learning_rate);
    for _ in 0..cfg.epochs {
        model.fit_batch(&xs, &ys)?;
    }

    Ok(ModelBundle::new(
        InferenceModel::Margin(model),
        None,
        labels,
        embedder.model_id(),
    ))
}

/// Load the stored bundle, or train and persist one when storage is
/// empty.
pub fn ensure_bundle(
    store: &Arc<dyn BundleStore>,
    embedder: &Embedder,
    samples: &[TrainingSample],
    cfg: &TrainConfig,
) -> Result<ModelBundle, ClassifierError> {
    match store.load() {
        Ok(bundle) => {
            if bundle.embed_model != embedder.model_id() {
                return Err(ClassifierError::EmbedderMismatch {
                    expected: bundle.embed_model,
                    actual: embedder.model_id().to_string(),
                });
            }
            Ok(bundle)
        }
        Err(StoreError::NotFound(_)) => {
            info!("no stored bundle; training from provided corpus");
            let bundle = initial_train(embedder, samples, cfg)?;
            store.save(&bundle)?;
            Ok(bundle)
        }
        Err(e) => Err(ClassifierError::Persistence(e)),
    }
}
