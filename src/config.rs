//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of a preparation run.
//! It is built once (by the binary, or by a test) and passed by reference into
//! the controller; nothing in the crate reads global state.
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::registry::DatasetSpec;

/// Configuration for a preparation run over one or more datasets.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use mi_prep::PipelineConfig;
/// use std::time::Duration;
///
/// let cfg = PipelineConfig {
///     output_root:   "/tmp/mi".into(),
///     retry_backoff: Duration::from_millis(10),
///     ..PipelineConfig::default()
/// };
/// assert_eq!(cfg.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Local cache the recording source reads from.
    ///
    /// Default: `./data`.
    pub cache_dir: PathBuf,

    /// Directory under which one output directory per dataset is created
    /// (`data_bnci2014_001`, `data_physionet_mi`, …).
    ///
    /// Default: `.`.
    pub output_root: PathBuf,

    /// Lower passband edge of the zero-phase bandpass, in Hz.
    ///
    /// Default: `8.0` Hz.
    pub l_freq: f32,

    /// Upper passband edge of the zero-phase bandpass, in Hz.
    ///
    /// Must stay below the Nyquist frequency of every recording, otherwise
    /// the unit fails with a filter error.
    ///
    /// Default: `30.0` Hz.
    pub h_freq: f32,

    /// Attempts per subject before it is abandoned.
    ///
    /// Only transient failures (fetch, I/O) consume further attempts.
    /// A value of `0` is treated as `1`.
    ///
    /// Default: `3`.
    pub max_retries: u32,

    /// Fixed sleep between two attempts on the same subject.
    ///
    /// Default: 5 s.
    pub retry_backoff: Duration,

    /// Factor applied to EEG/EOG/EMG samples when writing tables.
    ///
    /// Recordings are held in volts; the default writes microvolts, the unit
    /// MNE uses when exporting epochs to a data frame. Stim and misc channels
    /// are written unscaled.
    ///
    /// Default: `1e6`.
    pub value_scale: f32,
}

impl Default for PipelineConfig {
    /// 8–30 Hz · 3 attempts · 5 s backoff · µV output.
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./data"),
            output_root: PathBuf::from("."),
            l_freq: 8.0,
            h_freq: 30.0,
            max_retries: 3,
            retry_backoff: Duration::from_secs(5),
            value_scale: 1e6,
        }
    }
}

impl PipelineConfig {
    /// Output directory of `spec`, e.g. `./data_bnci2014_001`.
    pub fn dataset_dir(&self, spec: &DatasetSpec) -> PathBuf {
        self.output_root.join(spec.output_dir)
    }

    /// Effective attempt count (never zero).
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Convenience for tests and embedding: point both roots somewhere else.
    pub fn with_roots(cache_dir: &Path, output_root: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            output_root: output_root.to_path_buf(),
            ..Self::default()
        }
    }
}
