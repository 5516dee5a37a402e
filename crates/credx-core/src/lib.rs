pub mod bundle;
pub mod labels;
pub mod model;

pub use bundle::ModelBundle;
pub use labels::LabelSpace;
pub use model::{
    CalibratedMember, CalibratedModel, InferenceModel, LinearModel, ModelError,
    SigmoidCalibrator, softmax,
};
