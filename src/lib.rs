//! Synthetic diagonal-edge dataset and a two stage convolutional classifier
//! trained on it with burn.

pub mod data;
pub mod evaluation;
pub mod export;
pub mod loss;
pub mod model;
pub mod training;

mod error;

pub use error::{Error, Result};

/// Backend for test cases
#[cfg(test)]
pub type TestBackend = burn::backend::NdArray<f32>;

/// Backend for autodiff test cases
#[cfg(test)]
pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;
