mod common;
use common::sines;
use mi_prep::filter::{apply_fir_zero_phase, auto_trans_bandwidth, design_bandpass, filter_1d};
use mi_prep::{ChannelKind, ChannelSelection, ExtractionError};

/// RMS over the central half of `x`, away from edge effects.
fn mid_rms(x: &[f32]) -> f32 {
    let (a, b) = (x.len() / 4, 3 * x.len() / 4);
    let s: f32 = x[a..b].iter().map(|v| v * v).sum();
    (s / (b - a) as f32).sqrt()
}

fn tone(freq: f32, sfreq: f32, n: usize) -> Vec<f32> {
    sines(1, n, sfreq, &[freq]).row(0).mapv(|v| v * 1e6).to_vec()
}

// ── Coefficient tests ─────────────────────────────────────────────────────────

#[test]
fn bandpass_8_30_at_250hz_has_413_taps() {
    let (l_trans, h_trans) = auto_trans_bandwidth(8.0, 30.0, 250.0);
    assert_eq!((l_trans, h_trans), (2.0, 7.5));
    assert_eq!(design_bandpass(8.0, 30.0, 250.0).unwrap().len(), 413);
}

#[test]
fn bandpass_coeffs_symmetric() {
    let h = design_bandpass(8.0, 30.0, 512.0).unwrap();
    let n = h.len();
    assert_eq!(n % 2, 1);
    for i in 0..n / 2 {
        let diff = (h[i] - h[n - 1 - i]).abs();
        assert!(diff < 1e-7, "h[{i}]={} ≠ h[{}]={}", h[i], n - 1 - i, h[n - 1 - i]);
    }
}

// ── Application tests ─────────────────────────────────────────────────────────

#[test]
fn passband_tone_preserved() {
    let sfreq = 250.0;
    let h = design_bandpass(8.0, 30.0, sfreq).unwrap();
    let x = tone(15.0, sfreq, 5000);
    let y = filter_1d(&x, &h).unwrap();
    let ratio = mid_rms(&y) / mid_rms(&x);
    assert!((ratio - 1.0).abs() < 0.02, "15 Hz gain {ratio:.4}");
}

#[test]
fn stopband_tones_attenuated() {
    let sfreq = 250.0;
    let h = design_bandpass(8.0, 30.0, sfreq).unwrap();
    for f in [2.0, 45.0] {
        let x = tone(f, sfreq, 5000);
        let y = filter_1d(&x, &h).unwrap();
        let ratio = mid_rms(&y) / mid_rms(&x);
        assert!(ratio < 0.05, "{f} Hz gain {ratio:.4} not attenuated");
    }
}

#[test]
fn zero_phase_no_lag() {
    // A passband tone comes out aligned with the input.
    let sfreq = 250.0;
    let h = design_bandpass(8.0, 30.0, sfreq).unwrap();
    let x = tone(20.0, sfreq, 4000);
    let y = filter_1d(&x, &h).unwrap();
    let mid = 2000;
    let err = x[mid..mid + 250]
        .iter()
        .zip(&y[mid..mid + 250])
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f32, f32::max);
    assert!(err < 0.05, "max deviation {err:.4}");
}

#[test]
fn only_picked_rows_filtered() {
    let sfreq = 250.0;
    let mut data = sines(2, 2000, sfreq, &[2.0]);
    let before = data.row(1).to_owned();
    let h = design_bandpass(8.0, 30.0, sfreq).unwrap();
    apply_fir_zero_phase(&mut data, &h, |ch| ch == 0).unwrap();
    assert_eq!(data.row(1), before);
    assert!(mid_rms(&data.row(0).to_vec()) < 0.05 * mid_rms(&before.to_vec()));
}

#[test]
fn recording_filter_skips_stim_channel() {
    let mut raw = common::recording_with_stim(&["C3", "C4"], 250.0, 8.0, &[]);
    raw.data.row_mut(2).fill(5.0);
    raw.filter(8.0, 30.0).unwrap();
    assert_eq!(raw.ch_kinds[2], ChannelKind::Stim);
    assert!(raw.data.row(2).iter().all(|&v| v == 5.0));

    raw.pick(&ChannelSelection::EegOnly).unwrap();
    assert_eq!(raw.n_chan(), 2);
}

#[test]
fn band_above_nyquist_is_filter_failure() {
    let mut raw = common::recording(&["C3"], 50.0, 4.0, &[]);
    let err = raw.filter(8.0, 30.0).unwrap_err();
    assert!(matches!(err, ExtractionError::FilterFailure(_)), "{err:?}");
}
