use thiserror::Error;

/// Main error type for the EchoBoost system
#[derive(Error, Debug)]
pub enum EbError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Fold error: {0}")]
    Fold(#[from] FoldError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Estimation canceled")]
    Canceled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Input-data errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Response matrix is empty")]
    EmptyResponse,

    #[error("Predictor matrix is empty")]
    EmptyPredictors,

    #[error("Time axis mismatch: response has {response} samples, predictors have {predictors}")]
    LengthMismatch { response: usize, predictors: usize },

    #[error("Invalid sampling step: {tstep}")]
    InvalidSamplingStep { tstep: f64 },

    #[error("Empty lag window: tstart {tstart} to tstop {tstop} spans no samples")]
    EmptyLagWindow { tstart: f64, tstop: f64 },

    #[error("Lag window of {kernel_len} samples too long for {samples} remaining samples")]
    LagWindowTooLong { kernel_len: usize, samples: usize },

    #[error("Unknown error norm: {name}")]
    UnknownErrorNorm { name: String },
}

/// Cross-validation fold errors
#[derive(Error, Debug)]
pub enum FoldError {
    #[error("Fold index {index} out of range for {count} folds")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Fold count must be at least 1")]
    ZeroFoldCount,

    #[error("Too few samples: {samples} samples cannot be split into {folds} folds")]
    TooFewSamples { samples: usize, folds: usize },

    #[error("Fold range ends at {end} but the axis has {samples} samples")]
    RangeOutOfBounds { end: usize, samples: usize },
}

/// Result-record errors
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record version mismatch: found {found}, supported {supported}")]
    VersionMismatch { found: u32, supported: u32 },
}

/// Result type alias for EchoBoost operations
pub type EbResult<T> = Result<T, EbError>;

/// Helper trait for converting string errors
pub trait IntoEbError {
    fn into_eb_error(self) -> EbError;
}

impl IntoEbError for String {
    fn into_eb_error(self) -> EbError {
        EbError::Internal(self)
    }
}

impl IntoEbError for &str {
    fn into_eb_error(self) -> EbError {
        EbError::Internal(self.to_string())
    }
}

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::EbError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::EbError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::EbError::Config(format!($($arg)*))
    };
}
