use burn::record::RecorderError;

/// Errors raised while building, training or exporting the classifier.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid label {0}, expected a class index in 0..3")]
    InvalidLabel(usize),

    #[error("Training requires at least one example")]
    EmptyDataset,

    #[error("Report interval must be greater than zero")]
    InvalidReportInterval,

    #[error("Tensor data error: {0}")]
    Data(String),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
