use thiserror::Error;

/// An error that might occur while building scans or processing regions of interest
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoiError {
    #[error("Scan {index} has {mz_len} m/z values but {intensity_len} intensity values")]
    MismatchedArrays {
        index: usize,
        mz_len: usize,
        intensity_len: usize,
    },
    #[error("Scan {index} has a non-finite m/z value {value} at position {position}")]
    NonFiniteMZ {
        index: usize,
        position: usize,
        value: f64,
    },
    #[error("Scan {index} has an invalid intensity {value} at position {position}")]
    InvalidIntensity {
        index: usize,
        position: usize,
        value: f32,
    },
    #[error("Scan {index} has a non-finite retention time {value}")]
    NonFiniteTime { index: usize, value: f64 },
    #[error("Scan indices must be strictly increasing, but {next} follows {previous}")]
    ScanOrder { previous: usize, next: usize },
    #[error("Scan {index} has retention time {next}, earlier than the preceding {previous}")]
    TimeOrder {
        index: usize,
        previous: f64,
        next: f64,
    },
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Region of interest {0} has not been summarized")]
    Unsummarized(usize),
}
