//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc bandpass FIR design, matching
//!   `mne.filter.create_filter(fir_window='hamming', phase='zero')`.
//! - [`apply`]: Overlap-add zero-phase convolution, matching MNE's
//!   `_overlap_add_filter` / `_1d_overlap_filter`.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_zero_phase, filter_1d, OverlapAdd};
pub use design::{auto_filter_length, auto_trans_bandwidth, design_bandpass, firwin_bandpass, hamming};
