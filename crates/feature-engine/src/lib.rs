//! Feature Engineering Engine
//!
//! Maps raw sensor readings onto the fixed feature order the classifier was
//! trained with and applies the stored training-time scaling.

mod error;
mod normalizer;
mod scaler;
mod schema;

pub use error::FeatureError;
pub use normalizer::{FeatureNormalizer, FeatureVector};
pub use scaler::NormalizationParameters;
pub use schema::FeatureSchema;
