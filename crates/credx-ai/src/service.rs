//! The classification service: owns the in-memory model bundle, serves
//! lock-free reads, and serializes incremental updates.
//!
//! The bundle splits into two pieces with different mutability. The
//! inference model and label mappings are fixed at load time and read
//! without any lock; only a full offline retrain replaces them. The
//! online model lives behind a mutex: an update derives or creates it,
//! fits the new batch on a working copy, persists the whole bundle, and
//! only then swaps the copy in — so a failed update leaves both memory
//! and storage exactly as they were.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use credx_core::{InferenceModel, LabelSpace, LinearModel, ModelBundle};
use credx_store::{BundleStore, StoreError};
use tracing::{error, info};

use crate::embed::Embedder;
use crate::error::ClassifierError;

/// Result of classifying one text.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Arg-max label.
    pub label: String,
    /// Probability of the arg-max label.
    pub confidence: f32,
    /// `(label, probability)` pairs, descending; ties keep index order.
    pub top_probs: Vec<(String, f32)>,
    /// Full label → probability map.
    pub all_probs: HashMap<String, f32>,
}

pub struct ClassifierService {
    embedder: Embedder,
    inference: InferenceModel,
    labels: LabelSpace,
    embed_model: String,
    online: Mutex<Option<LinearModel>>,
    store: Arc<dyn BundleStore>,
}

impl std::fmt::Debug for ClassifierService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierService")
            .field("labels", &self.labels)
            .field("embed_model", &self.embed_model)
            .finish_non_exhaustive()
    }
}

impl ClassifierService {
    /// Build a service around an already-loaded bundle.
    pub fn from_bundle(
        bundle: ModelBundle,
        embedder: Embedder,
        store: Arc<dyn BundleStore>,
    ) -> Result<Self, ClassifierError> {
        if bundle.embed_model != embedder.model_id() {
            return Err(ClassifierError::EmbedderMismatch {
                expected: bundle.embed_model,
                actual: embedder.model_id().to_string(),
            });
        }
        // Reject malformed bundles at load time; classify relies on the
        // label space and the model agreeing on shape.
        if bundle.labels.len() != bundle.inference.class_count() {
            return Err(ClassifierError::InconsistentBundle(format!(
                "{} labels but the inference model has {} classes",
                bundle.labels.len(),
                bundle.inference.class_count()
            )));
        }
        if bundle.inference.dim() != embedder.dim() {
            return Err(ClassifierError::InconsistentBundle(format!(
                "inference model expects dim {} but the embedder produces {}",
                bundle.inference.dim(),
                embedder.dim()
            )));
        }
        info!(
            classes = bundle.labels.len(),
            embed_model = %bundle.embed_model,
            has_online = bundle.online.is_some(),
            "classifier service ready"
        );
        Ok(Self {
            embedder,
            inference: bundle.inference,
            labels: bundle.labels,
            embed_model: bundle.embed_model,
            online: Mutex::new(bundle.online),
            store,
        })
    }

    /// Load the bundle from storage and build the service.
    pub fn open(
        store: Arc<dyn BundleStore>,
        embedder: Embedder,
    ) -> Result<Self, ClassifierError> {
        let bundle = match store.load() {
            Ok(b) => b,
            Err(StoreError::NotFound(_)) => return Err(ClassifierError::BundleMissing),
            Err(e) => return Err(ClassifierError::Persistence(e)),
        };
        Self::from_bundle(bundle, embedder, store)
    }

    pub fn labels(&self) -> &LabelSpace {
        &self.labels
    }

    /// Classify one text into the trained categories.
    ///
    /// Read-only: never takes the update lock, so it stays non-blocking
    /// while an update is in flight.
    pub fn classify(&self, text: &str, top_k: usize) -> Result<Classification, ClassifierError> {
        if text.trim().is_empty() {
            return Err(ClassifierError::invalid_input("empty text"));
        }
        if top_k == 0 {
            return Err(ClassifierError::invalid_input("top_k must be at least 1"));
        }

        let rows = self.embedder.embed(&[text]).map_err(|e| {
            error!(error = %e, "embedding failed during classification");
            ClassifierError::Embedding(e)
        })?;
        let probs = self.inference.probabilities(&rows[0]).inspect_err(|e| {
            error!(error = %e, "scoring failed during classification");
        })?;

        // Arg-max; strict greater-than keeps the first index on ties.
        let mut top_idx = 0;
        for (i, &p) in probs.iter().enumerate() {
            if p > probs[top_idx] {
                top_idx = i;
            }
        }
        let confidence = probs[top_idx];

        // Label count equals class count, checked in from_bundle.
        let mut pairs: Vec<(String, f32)> = self
            .labels
            .names()
            .map(str::to_string)
            .zip(probs.iter().copied())
            .collect();
        let label = pairs[top_idx].0.clone();
        let all_probs: HashMap<String, f32> = pairs.iter().cloned().collect();

        // sort_by is stable, so equal probabilities keep index order.
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs.truncate(top_k);

        info!(label = %label, confidence, "classification result");
        Ok(Classification {
            label,
            confidence,
            top_probs: pairs,
            all_probs,
        })
    }

    /// Incrementally fit the online model on a labeled batch and persist
    /// the updated bundle.
    ///
    /// The inference model is deliberately *not* recalibrated here:
    /// online updates are cheap and immediate, calibration quality waits
    /// for the offline retrain.
    pub fn incremental_update(
        &self,
        texts: &[&str],
        labels: &[&str],
    ) -> Result<(), ClassifierError> {
        if texts.is_empty() {
            return Err(ClassifierError::invalid_input("empty update batch"));
        }
        if texts.len() != labels.len() {
            return Err(ClassifierError::invalid_input(format!(
                "{} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }

        // The label set never grows online; unknown labels are a hard error.
        let ys: Vec<usize> = labels
            .iter()
            .map(|l| {
                self.labels
                    .index_of(l)
                    .ok_or_else(|| ClassifierError::UnknownLabel(l.to_string()))
            })
            .collect::<Result<_, _>>()?;

        info!(samples = texts.len(), "starting incremental update");
        let xs = self.embedder.embed(texts).map_err(|e| {
            error!(error = %e, "embedding failed during incremental update");
            ClassifierError::Embedding(e)
        })?;

        let mut guard = self
            .online
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut working = match guard.as_ref() {
            Some(model) => model.clone(),
            None => match self.inference.base_linear() {
                Some(base) => {
                    info!("deriving online model from the inference base estimator");
                    base.clone()
                }
                None => {
                    info!(
                        classes = self.labels.len(),
                        "no extractable base estimator; creating fresh online model"
                    );
                    LinearModel::new(self.labels.len(), self.embedder.dim())
                }
            },
        };

        working.fit_batch(&xs, &ys)?;

        // Persist before swapping in, so a storage failure leaves the
        // in-memory bundle untouched.
        let bundle = ModelBundle::new(
            self.inference.clone(),
            Some(working.clone()),
            self.labels.clone(),
            &self.embed_model,
        );
        self.store.save(&bundle).inspect_err(|e| {
            error!(error = %e, "persisting updated bundle failed");
        })?;

        *guard = Some(working);
        info!("incremental update completed and bundle persisted");
        Ok(())
    }

    /// Snapshot of the current bundle (as it would be persisted).
    pub fn bundle(&self) -> ModelBundle {
        let online = self
            .online
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        ModelBundle::new(
            self.inference.clone(),
            online,
            self.labels.clone(),
            &self.embed_model,
        )
    }
}
