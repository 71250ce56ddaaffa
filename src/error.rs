//! Error kinds.
//!
//! [`ExtractionError`] is the closed set of reasons a single recording unit can
//! fail. Every unit-level failure is caught at the unit boundary; the kind
//! decides whether the enclosing subject attempt is worth retrying.
use thiserror::Error;

/// Why one recording unit (or one subject fetch) produced no output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// No event of the dataset vocabulary occurs in the unit, or every trial
    /// window fell outside the recording.
    #[error("no usable events: {0}")]
    NoEvents(String),

    /// Channel selection or bandpass filtering failed.
    #[error("filter failed: {0}")]
    FilterFailure(String),

    /// The upstream source could not deliver the recordings.
    #[error("fetch failed: {0}")]
    FetchFailure(String),

    /// Writing the table, its sidecar, or the manifest failed.
    #[error("I/O failed: {0}")]
    IoFailure(String),
}

impl ExtractionError {
    /// Transient kinds are retried at subject granularity; the rest are
    /// deterministic and retrying them cannot change the outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FetchFailure(_) | Self::IoFailure(_))
    }

    /// Short kind tag, used in log lines and manifest entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoEvents(_) => "no_events",
            Self::FilterFailure(_) => "filter_failure",
            Self::FetchFailure(_) => "fetch_failure",
            Self::IoFailure(_) => "io_failure",
        }
    }
}

impl From<std::io::Error> for ExtractionError {
    fn from(e: std::io::Error) -> Self {
        Self::IoFailure(e.to_string())
    }
}

/// Fatal configuration problems, raised before any work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown dataset '{name}' (known: {known})")]
    UnknownDataset { name: String, known: String },
}
