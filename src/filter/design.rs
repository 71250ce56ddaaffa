//! FIR bandpass design matching MNE / `scipy.signal.firwin`.
//!
//! For a bandpass `[l_freq, h_freq]` Hz at sampling rate `sfreq`:
//!   • lower transition = min(max(0.25 * l_freq, 2.0), l_freq)
//!   • upper transition = min(max(0.25 * h_freq, 2.0), sfreq / 2 − h_freq)
//!   • filter length N  = ceil(3.3 / min(transitions) * sfreq), rounded to odd
//!   • windowed-sinc design (Hamming window), cutoffs at the transition
//!     midpoints, unit gain at the band centre
use anyhow::{bail, Result};
use std::f64::consts::PI;

/// MNE-compatible `(lower, upper)` transition bandwidths in Hz.
pub fn auto_trans_bandwidth(l_freq: f32, h_freq: f32, sfreq: f32) -> (f32, f32) {
    let l_trans = (0.25 * l_freq).max(2.0).min(l_freq);
    let h_trans = (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq);
    (l_trans, h_trans)
}

/// Compute the number of FIR taps for a given transition bandwidth.
/// Returns an odd integer (required for zero-phase linear-phase FIR).
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f32, sfreq: f32) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Design a zero-phase bandpass FIR filter.
///
/// Matches `mne.filter.create_filter(None, sfreq, l_freq, h_freq,
///   filter_length='auto', fir_window='hamming', fir_design='firwin', phase='zero')`
/// up to floating-point rounding.
///
/// Fails when the band is empty, non-positive, or reaches the Nyquist
/// frequency.
pub fn design_bandpass(l_freq: f32, h_freq: f32, sfreq: f32) -> Result<Vec<f32>> {
    let nyq = sfreq / 2.0;
    if !(sfreq.is_finite() && sfreq > 0.0) {
        bail!("invalid sampling rate {sfreq} Hz");
    }
    if !(l_freq > 0.0 && l_freq < h_freq) {
        bail!("invalid band {l_freq}–{h_freq} Hz");
    }
    if h_freq >= nyq {
        bail!("upper edge {h_freq} Hz must be below Nyquist ({nyq} Hz)");
    }

    let (l_trans, h_trans) = auto_trans_bandwidth(l_freq, h_freq, sfreq);
    let n = auto_filter_length(l_trans.min(h_trans), sfreq);

    // Cutoffs at the midpoints of the transition bands.
    let low_cut = l_freq - l_trans / 2.0;
    let high_cut = h_freq + h_trans / 2.0;

    let h = firwin_bandpass(n, low_cut, high_cut, sfreq);
    Ok(h.iter().map(|&v| v as f32).collect())
}

/// Hamming-windowed sinc bandpass with cutoffs `low_hz` and `high_hz`.
///
/// The response is scaled to unit gain at the centre of the band, as
/// `scipy.signal.firwin(..., pass_zero=False, scale=True)` does.
pub fn firwin_bandpass(n: usize, low_hz: f32, high_hz: f32, sfreq: f32) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let nyq = sfreq as f64 / 2.0;
    let fl = low_hz as f64 / nyq;
    let fh = high_hz as f64 / nyq;

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            (lowpass_sinc(fh, x) - lowpass_sinc(fl, x)) * win[i]
        })
        .collect();

    // Unit gain at the band centre.
    let f0 = (fl + fh) / 2.0;
    let gain: f64 = h
        .iter()
        .enumerate()
        .map(|(i, &v)| v * (PI * f0 * (i as f64 - alpha)).cos())
        .sum();
    h.iter_mut().for_each(|v| *v /= gain);
    h
}

/// Ideal lowpass impulse response at normalised cutoff `fc` (1 = Nyquist).
///
/// `f(x) = sin(π·fc·x) / (π·x)`;  `lim_{x→0} f(x) = fc`.
fn lowpass_sinc(fc: f64, x: f64) -> f64 {
    if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) }
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}
