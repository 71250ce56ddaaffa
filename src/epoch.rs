//! Trial windowing.
//!
//! Two shapes of window are supported:
//! - event-relative: `[tmin, tmax]` seconds around each event onset, both
//!   ends inclusive (as `mne.Epochs` does). Windows that leave the recording
//!   are dropped.
//! - whole-run: one window from the start of the run, split into
//!   per-cue segments so each sample carries the event that governs it.
use std::ops::Range;

use log::debug;

use crate::recording::Event;

/// One event-relative trial window.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWindow {
    pub event: Event,
    /// Sample range in the recording (half-open).
    pub samples: Range<usize>,
    /// Time of the first sample relative to the event onset, in seconds.
    pub t0: f64,
}

/// Sample offsets `(first, last)` of a `[tmin, tmax]` window at `sfreq`.
pub fn window_offsets(tmin: f64, tmax: f64, sfreq: f32) -> (i64, i64) {
    let sf = sfreq as f64;
    ((tmin * sf).round() as i64, (tmax * sf).round() as i64)
}

/// Cut one window per event; windows that do not fit in `n_times` samples
/// are dropped.
pub fn event_windows(events: &[Event], n_times: usize, sfreq: f32, tmin: f64, tmax: f64) -> Vec<EventWindow> {
    let (first, last) = window_offsets(tmin, tmax, sfreq);
    let mut out = Vec::with_capacity(events.len());
    for &event in events {
        let start = event.sample as i64 + first;
        let end = event.sample as i64 + last + 1;
        if start < 0 || end > n_times as i64 || end <= start {
            debug!("dropping event at sample {}: window [{start}, {end}) outside 0..{n_times}", event.sample);
            continue;
        }
        out.push(EventWindow {
            event,
            samples: start as usize..end as usize,
            t0: first as f64 / sfreq as f64,
        });
    }
    out
}

/// A stretch of a whole-run window governed by one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub code: i32,
    pub samples: Range<usize>,
}

/// Split the first `secs` seconds of a run into segments, each running from
/// one event to the next (or to the end of the window).
///
/// The window is clamped to the `n_times` samples available. Samples before
/// the first event belong to no segment.
pub fn run_segments(events: &[Event], n_times: usize, sfreq: f32, secs: f64) -> Vec<Segment> {
    let window_end = ((secs * sfreq as f64).round() as usize).min(n_times);
    let mut out = Vec::new();
    for (i, event) in events.iter().enumerate() {
        if event.sample >= window_end {
            break;
        }
        let next = events
            .get(i + 1)
            .map_or(window_end, |e| e.sample.min(window_end));
        if next > event.sample {
            out.push(Segment { code: event.code, samples: event.sample..next });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(sample: usize, code: i32) -> Event {
        Event { sample, code }
    }

    #[test]
    fn window_is_inclusive_of_both_ends() {
        // 2–6 s at 250 Hz → 1001 samples.
        let w = event_windows(&[ev(1000, 1)], 5000, 250.0, 2.0, 6.0);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].samples, 1500..2501);
        approx::assert_abs_diff_eq!(w[0].t0, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn out_of_bounds_windows_dropped() {
        let events = [ev(0, 1), ev(100, 2), ev(960, 1)];
        // -0.5..1.0 s at 100 Hz: first starts before 0, last runs past 1000.
        let w = event_windows(&events, 1000, 100.0, -0.5, 1.0);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].event.code, 2);
        assert_eq!(w[0].samples, 50..201);
    }

    #[test]
    fn segments_follow_events_and_clamp() {
        let events = [ev(10, 1), ev(50, 2), ev(50, 3), ev(80, 1), ev(500, 2)];
        let segs = run_segments(&events, 1000, 100.0, 1.0);
        assert_eq!(
            segs,
            vec![
                Segment { code: 1, samples: 10..50 },
                Segment { code: 3, samples: 50..80 },
                Segment { code: 1, samples: 80..100 },
            ]
        );
    }

    #[test]
    fn segments_clamped_to_recording() {
        let segs = run_segments(&[ev(0, 1)], 300, 100.0, 60.0);
        assert_eq!(segs, vec![Segment { code: 1, samples: 0..300 }]);
    }
}
