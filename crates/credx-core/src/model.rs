//! Classifier models: the online linear model, Platt-calibrated wrappers,
//! and the capability-tagged inference variant.
//!
//! Two logically separate pieces of state flow through the system:
//! the *inference model* (read-only after training, produces the label
//! distribution served to callers) and the *online model* (a plain
//! linear model that accepts incremental mini-batch fits). The inference
//! model declares upfront whether it emits margin scores or native
//! probabilities, so callers branch on the declared capability instead
//! of probing for methods.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("feature dimension mismatch: model expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("class index {class} out of range for {classes} classes")]
    ClassOutOfRange { class: usize, classes: usize },

    #[error("calibrated model needs at least one member")]
    EmptyEnsemble,

    #[error("calibrated members disagree on class count")]
    InconsistentMembers,
}

/// Convert raw scores into a probability distribution.
///
/// Subtracts the maximum before exponentiating for numerical stability,
/// which also makes the result invariant to adding a constant to every
/// score.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Multinomial logistic model with per-class coefficient rows and
/// intercepts over a fixed `(classes, dim)` shape.
///
/// The shape is declared at construction, so the model always knows the
/// complete class set — there is no partially-classed state, whether the
/// model was trained from scratch or extracted from a calibrated wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearModel {
    coefficients: Vec<Vec<f32>>,
    intercepts: Vec<f32>,
    dim: usize,
    /// Samples seen across all fit calls.
    steps: u64,
    #[serde(default = "default_learning_rate")]
    learning_rate: f32,
}

fn default_learning_rate() -> f32 {
    0.05
}

impl LinearModel {
    /// Zero-initialized model over the full class set.
    pub fn new(classes: usize, dim: usize) -> Self {
        Self {
            coefficients: vec![vec![0.0; dim]; classes],
            intercepts: vec![0.0; classes],
            dim,
            steps: 0,
            learning_rate: default_learning_rate(),
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn class_count(&self) -> usize {
        self.coefficients.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Total samples this model has been fit on.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Margin score per class: `w_k · x + b_k`.
    pub fn decision_function(&self, x: &[f32]) -> Result<Vec<f32>, ModelError> {
        if x.len() != self.dim {
            return Err(ModelError::DimensionMismatch {
                expected: self.dim,
                actual: x.len(),
            });
        }
        Ok(self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| w.iter().zip(x).map(|(wi, xi)| wi * xi).sum::<f32>() + b)
            .collect())
    }

    /// One incremental pass of SGD on multinomial log loss — the
    /// `partial_fit` equivalent. Inputs are parallel slices of feature
    /// rows and class indices; an empty batch is a no-op.
    pub fn fit_batch(&mut self, xs: &[Vec<f32>], ys: &[usize]) -> Result<(), ModelError> {
        debug_assert_eq!(xs.len(), ys.len());
        let classes = self.class_count();

        // Validate the whole batch before touching any weights.
        for x in xs {
            if x.len() != self.dim {
                return Err(ModelError::DimensionMismatch {
                    expected: self.dim,
                    actual: x.len(),
                });
            }
        }
        for &y in ys {
            if y >= classes {
                return Err(ModelError::ClassOutOfRange { class: y, classes });
            }
        }

        for (x, &y) in xs.iter().zip(ys) {
            let scores = self
                .decision_function(x)
                .expect("batch pre-validated against model dim");
            let probs = softmax(&scores);
            for k in 0..classes {
                let grad = probs[k] - if k == y { 1.0 } else { 0.0 };
                let row = &mut self.coefficients[k];
                for (wi, xi) in row.iter_mut().zip(x) {
                    *wi -= self.learning_rate * grad * xi;
                }
                self.intercepts[k] -= self.learning_rate * grad;
            }
            self.steps += 1;
        }
        Ok(())
    }
}

/// Platt scaling for one class: `p = 1 / (1 + exp(a·s + b))`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SigmoidCalibrator {
    pub a: f32,
    pub b: f32,
}

impl SigmoidCalibrator {
    pub fn apply(&self, score: f32) -> f32 {
        1.0 / (1.0 + (self.a * score + self.b).exp())
    }
}

/// One cross-validation member of a calibrated ensemble: a fitted base
/// linear model plus one sigmoid per class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibratedMember {
    pub base: LinearModel,
    pub calibrators: Vec<SigmoidCalibrator>,
}

impl CalibratedMember {
    fn probabilities(&self, x: &[f32]) -> Result<Vec<f32>, ModelError> {
        let scores = self.base.decision_function(x)?;
        let mut probs: Vec<f32> = scores
            .iter()
            .zip(&self.calibrators)
            .map(|(&s, c)| c.apply(s))
            .collect();
        normalize_distribution(&mut probs);
        Ok(probs)
    }
}

/// Calibrated classifier: an ensemble of sigmoid-calibrated members
/// whose per-class probabilities are averaged.
///
/// A single-member ensemble exposes its base linear model for online
/// updates; a multi-member ensemble has no single base estimator to
/// extract, so callers fall back to a fresh online model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibratedModel {
    members: Vec<CalibratedMember>,
}

impl CalibratedModel {
    pub fn new(members: Vec<CalibratedMember>) -> Result<Self, ModelError> {
        let Some(first) = members.first() else {
            return Err(ModelError::EmptyEnsemble);
        };
        let classes = first.base.class_count();
        if members
            .iter()
            .any(|m| m.base.class_count() != classes || m.calibrators.len() != classes)
        {
            return Err(ModelError::InconsistentMembers);
        }
        Ok(Self { members })
    }

    pub fn class_count(&self) -> usize {
        self.members[0].base.class_count()
    }

    pub fn dim(&self) -> usize {
        self.members[0].base.dim()
    }

    /// Mean of the members' calibrated distributions, renormalized.
    pub fn predict_proba(&self, x: &[f32]) -> Result<Vec<f32>, ModelError> {
        let mut acc = vec![0.0f32; self.class_count()];
        for member in &self.members {
            let probs = member.probabilities(x)?;
            for (a, p) in acc.iter_mut().zip(&probs) {
                *a += p;
            }
        }
        let n = self.members.len() as f32;
        for a in &mut acc {
            *a /= n;
        }
        normalize_distribution(&mut acc);
        Ok(acc)
    }

    /// The base estimator, when the ensemble has exactly one member.
    pub fn base_linear(&self) -> Option<&LinearModel> {
        match self.members.as_slice() {
            [only] => Some(&only.base),
            _ => None,
        }
    }
}

/// The inference model, tagged by its declared output capability.
///
/// `Margin` emits one raw score per class and is converted to a
/// distribution via [`softmax`]; `Calibrated` emits well-formed
/// probabilities that are used unmodified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InferenceModel {
    Margin(LinearModel),
    Calibrated(CalibratedModel),
}

impl InferenceModel {
    pub fn class_count(&self) -> usize {
        match self {
            Self::Margin(m) => m.class_count(),
            Self::Calibrated(c) => c.class_count(),
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::Margin(m) => m.dim(),
            Self::Calibrated(c) => c.dim(),
        }
    }

    /// Label distribution for one embedded row.
    pub fn probabilities(&self, x: &[f32]) -> Result<Vec<f32>, ModelError> {
        match self {
            Self::Margin(m) => Ok(softmax(&m.decision_function(x)?)),
            Self::Calibrated(c) => c.predict_proba(x),
        }
    }

    /// The extractable base estimator for seeding the online model,
    /// if this wrapping exposes one.
    pub fn base_linear(&self) -> Option<&LinearModel> {
        match self {
            Self::Margin(m) => Some(m),
            Self::Calibrated(c) => c.base_linear(),
        }
    }
}

/// Scale a non-negative vector so it sums to 1; uniform if all zero.
fn normalize_distribution(probs: &mut [f32]) {
    let sum: f32 = probs.iter().sum();
    if sum > 0.0 {
        for p in probs.iter_mut() {
            *p /= sum;
        }
    } else if !probs.is_empty() {
        let uniform = 1.0 / probs.len() as f32;
        probs.fill(uniform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[2.0, 0.5, -1.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn softmax_shift_invariant() {
        let a = softmax(&[2.0, 0.5]);
        let b = softmax(&[2.0 + 137.5, 0.5 + 137.5]);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn softmax_stable_for_large_scores() {
        let probs = softmax(&[1000.0, 999.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn softmax_reference_values() {
        // decision scores [2.0, 0.5] → approx [0.818, 0.182]
        let probs = softmax(&[2.0, 0.5]);
        assert!((probs[0] - 0.818).abs() < 1e-3, "got {}", probs[0]);
        assert!((probs[1] - 0.182).abs() < 1e-3, "got {}", probs[1]);
    }

    #[test]
    fn decision_function_is_affine() {
        let mut model = LinearModel::new(2, 3);
        model.coefficients = vec![vec![2.0, 0.0, 0.0], vec![0.5, 0.0, 0.0]];
        model.intercepts = vec![0.0, 0.0];

        let scores = model.decision_function(&[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(scores, vec![2.0, 0.5]);
    }

    #[test]
    fn decision_function_rejects_wrong_dim() {
        let model = LinearModel::new(2, 3);
        let err = model.decision_function(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn fit_batch_moves_scores_toward_label() {
        let mut model = LinearModel::new(2, 2);
        let xs = vec![vec![1.0, 0.0]; 20];
        let ys = vec![0usize; 20];
        model.fit_batch(&xs, &ys).unwrap();

        let scores = model.decision_function(&[1.0, 0.0]).unwrap();
        assert!(
            scores[0] > scores[1],
            "class 0 should dominate after fitting, got {scores:?}"
        );
    }

    #[test]
    fn fit_batch_counts_steps() {
        let mut model = LinearModel::new(3, 2);
        model
            .fit_batch(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[0, 2])
            .unwrap();
        model.fit_batch(&[vec![0.5, 0.5]], &[1]).unwrap();
        assert_eq!(model.steps(), 3);
    }

    #[test]
    fn fit_batch_rejects_out_of_range_class_untouched() {
        let mut model = LinearModel::new(2, 2);
        let before = model.clone();
        let err = model.fit_batch(&[vec![1.0, 0.0]], &[7]).unwrap_err();
        assert!(matches!(err, ModelError::ClassOutOfRange { class: 7, .. }));
        assert_eq!(model, before, "failed fit must not mutate weights");
    }

    #[test]
    fn fit_batch_empty_is_noop() {
        let mut model = LinearModel::new(2, 2);
        let before = model.clone();
        model.fit_batch(&[], &[]).unwrap();
        assert_eq!(model, before);
    }

    #[test]
    fn linear_model_json_roundtrip() {
        let mut model = LinearModel::new(2, 2);
        model.fit_batch(&[vec![1.0, 0.0]], &[0]).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let parsed: LinearModel = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, model);
        assert_eq!(parsed.steps(), 1);
    }

    fn margin_member(w0: f32, w1: f32) -> CalibratedMember {
        let mut base = LinearModel::new(2, 2);
        base.coefficients = vec![vec![w0, 0.0], vec![w1, 0.0]];
        CalibratedMember {
            base,
            calibrators: vec![
                SigmoidCalibrator { a: -1.0, b: 0.0 },
                SigmoidCalibrator { a: -1.0, b: 0.0 },
            ],
        }
    }

    #[test]
    fn calibrated_probabilities_are_distribution() {
        let model = CalibratedModel::new(vec![margin_member(2.0, 0.5)]).unwrap();
        let probs = model.predict_proba(&[1.0, 0.0]).unwrap();
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[0] > probs[1], "higher margin should stay more likely");
    }

    #[test]
    fn calibrated_empty_ensemble_rejected() {
        assert!(matches!(
            CalibratedModel::new(vec![]),
            Err(ModelError::EmptyEnsemble)
        ));
    }

    #[test]
    fn single_member_exposes_base_estimator() {
        let model = CalibratedModel::new(vec![margin_member(2.0, 0.5)]).unwrap();
        assert!(model.base_linear().is_some());

        let ensemble =
            CalibratedModel::new(vec![margin_member(2.0, 0.5), margin_member(1.0, 1.0)]).unwrap();
        assert!(ensemble.base_linear().is_none());
    }

    #[test]
    fn inference_margin_applies_softmax() {
        let mut base = LinearModel::new(2, 2);
        base.coefficients = vec![vec![2.0, 0.0], vec![0.5, 0.0]];
        let inference = InferenceModel::Margin(base);

        let probs = inference.probabilities(&[1.0, 0.0]).unwrap();
        assert!((probs[0] - 0.818).abs() < 1e-3);
        assert!((probs[1] - 0.182).abs() < 1e-3);
    }

    #[test]
    fn inference_calibrated_uses_native_probabilities() {
        let member = margin_member(2.0, 0.5);
        let expected = CalibratedModel::new(vec![member.clone()])
            .unwrap()
            .predict_proba(&[1.0, 0.0])
            .unwrap();

        let inference = InferenceModel::Calibrated(CalibratedModel::new(vec![member]).unwrap());
        let probs = inference.probabilities(&[1.0, 0.0]).unwrap();
        assert_eq!(probs, expected);
    }

    #[test]
    fn inference_model_json_roundtrip() {
        let inference = InferenceModel::Margin(LinearModel::new(3, 4));
        let json = serde_json::to_string(&inference).unwrap();
        let parsed: InferenceModel = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, inference);
    }
}
