//! Overlap-add zero-phase FIR convolution.
//!
//! Matches MNE's `_overlap_add_filter` + `_1d_overlap_filter`.
//!
//! Zero-phase is achieved by shifting the output left by `(N-1)/2` samples,
//! NOT by running filtfilt. The edge transient is suppressed by
//! reflect-limited padding of `N-1` samples on each side.
use std::sync::Arc;

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// A planned overlap-add convolution for one kernel and one signal length.
///
/// Planning (FFT block size, kernel spectrum, FFT plans) is done once and
/// reused for every channel of a recording.
pub struct OverlapAdd {
    n_h: usize,
    n_x: usize,
    n_fft: usize,
    h_fft: Vec<Complex<f32>>,
    fwd: Arc<dyn Fft<f32>>,
    inv: Arc<dyn Fft<f32>>,
}

impl OverlapAdd {
    /// Plan the convolution of signals of length `n_x` with kernel `h`.
    ///
    /// `h` must have odd length (guaranteed by `design_bandpass`).
    pub fn new(h: &[f32], n_x: usize) -> Result<Self> {
        let n_h = h.len();
        if n_h % 2 == 0 {
            bail!("zero-phase FIR needs an odd kernel length, got {n_h}");
        }
        let n_edge = n_h - 1;
        let n_ext = n_x + 2 * n_edge;
        let n_fft = choose_fft_len(n_h, n_ext);

        let mut planner: FftPlanner<f32> = FftPlanner::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);

        let mut h_fft = zero_padded(h, n_fft);
        fwd.process(&mut h_fft);

        Ok(Self { n_h, n_x, n_fft, h_fft, fwd, inv })
    }

    /// Filter one signal of the planned length.
    pub fn apply(&self, x: &[f32]) -> Result<Vec<f32>> {
        if x.len() != self.n_x {
            bail!("planned for {} samples, got {}", self.n_x, x.len());
        }
        if x.is_empty() {
            return Ok(vec![]);
        }

        let n_h = self.n_h;
        let n_fft = self.n_fft;
        // Shift for zero-phase: (N-1)/2  (N must be odd).
        let shift = (n_h - 1) / 2;
        let n_edge = n_h - 1;

        let x_ext = reflect_limited_pad(x, n_edge, n_edge);
        let n_ext = x_ext.len();

        let n_seg = n_fft - n_h + 1;
        let n_segments = n_ext.div_ceil(n_seg);
        let mut x_filtered = vec![0.0_f32; n_ext];
        let inv_scale = 1.0 / n_fft as f32;

        for seg_idx in 0..n_segments {
            let start = seg_idx * n_seg;
            let stop = (start + n_seg).min(n_ext);

            let mut buf = zero_padded(&x_ext[start..stop], n_fft);
            self.fwd.process(&mut buf);
            for (b, &hf) in buf.iter_mut().zip(self.h_fft.iter()) {
                *b *= hf;
            }
            self.inv.process(&mut buf);

            // Accumulate, compensating the kernel delay.
            let out_start = start.saturating_sub(shift);
            let out_end = (out_start + n_fft).min(n_ext);
            let prod_start = shift.saturating_sub(start);

            for (o, p) in (out_start..out_end).zip(prod_start..) {
                if p < buf.len() {
                    x_filtered[o] += buf[p].re * inv_scale;
                }
            }
        }

        Ok(x_filtered[n_edge..n_edge + self.n_x].to_vec())
    }
}

/// Apply a zero-phase FIR filter to the selected rows of `data` ([C, T]) in-place.
///
/// Rows for which `pick(row)` is false are left untouched.
pub fn apply_fir_zero_phase<F>(data: &mut Array2<f32>, h: &[f32], pick: F) -> Result<()>
where
    F: Fn(usize) -> bool,
{
    let plan = OverlapAdd::new(h, data.ncols())?;
    for ch in 0..data.nrows() {
        if !pick(ch) {
            continue;
        }
        let row: Vec<f32> = data.row(ch).to_vec();
        let filtered = plan.apply(&row)?;
        data.row_mut(ch).assign(&ArrayView1::from(&filtered));
    }
    Ok(())
}

/// Filter a single 1-D signal with the overlap-add algorithm.
///
/// Returns a vector of the same length as `x`.
pub fn filter_1d(x: &[f32], h: &[f32]) -> Result<Vec<f32>> {
    OverlapAdd::new(h, x.len())?.apply(x)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn zero_padded(x: &[f32], n: usize) -> Vec<Complex<f32>> {
    x.iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .chain(std::iter::repeat(Complex::default()))
        .take(n)
        .collect()
}

/// Reflect-limited padding (matches MNE's `_smart_pad`).
///
/// Left:  `pad[i] = 2*x[0] - x[n_l-i]`  for i in 1..=n_l
/// Right: `pad[i] = 2*x[-1] - x[-(i+1)]` for i in 1..=n_r
/// Padding beyond the signal length is filled with zeros.
fn reflect_limited_pad(x: &[f32], n_l: usize, n_r: usize) -> Vec<f32> {
    let n = x.len();
    let actual_l = n_l.min(n - 1);
    let actual_r = n_r.min(n - 1);

    let mut out = Vec::with_capacity(n_l + n + n_r);
    out.resize(n_l - actual_l, 0.0);
    for i in (1..=actual_l).rev() {
        out.push(2.0 * x[0] - x[i]);
    }

    out.extend_from_slice(x);

    let last = x[n - 1];
    for i in 1..=actual_r {
        out.push(2.0 * last - x[n - 1 - i]);
    }
    out.resize(out.len() + (n_r - actual_r), 0.0);

    out
}

/// Choose the FFT block size (power of 2 minimising operation count).
///
/// Matches MNE's cost function:
///   `cost = ceil(n_x / (N - n_h + 1)) * N * (log2(N) + 1) + 4e-5 * N * n_x`
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_fft = 2 * n_h - 1;
    let max_pow = (n_x.max(1) as f64).log2().ceil() as u32 + 1;
    let min_pow = (min_fft as f64).log2().ceil() as u32;

    let mut best_n = 1_usize << max_pow.max(min_pow);
    let mut best_cost = f64::INFINITY;

    for pow in min_pow..=max_pow {
        let n = 1_usize << pow;
        if n < min_fft {
            continue;
        }
        let n_seg = (n - n_h + 1) as f64;
        let cost = (n_x as f64 / n_seg).ceil() * n as f64 * (pow as f64 + 1.0)
            + 4e-5 * n as f64 * n_x as f64;
        if cost < best_cost {
            best_cost = cost;
            best_n = n;
        }
    }
    best_n
}
