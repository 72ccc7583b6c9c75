//! Feature extraction and encoding
//!
//! Converts race store rows and session rows into model-ready features.

pub mod encoding;
pub mod field;
pub mod scaler;
pub mod sequence;

pub use encoding::LabelEncoder;
pub use field::FieldFeatures;
pub use scaler::StandardScaler;
pub use sequence::{SequenceArtifacts, SequenceFeatureBuilder, SequenceInput};
