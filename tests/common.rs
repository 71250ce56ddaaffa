/// Shared helpers: synthetic recordings and scripted recording sources.
use std::cell::Cell;
use std::collections::HashMap;
use std::f32::consts::PI;
use std::time::Duration;

use mi_prep::{
    Annotation, ChannelKind, DatasetSpec, ExtractionError, RawRecording, RecordingSource,
    Run, RunId, Session, Sleeper,
};
use ndarray::Array2;

#[allow(unused)]
/// Sum of unit-amplitude sines (volts × 1e-6), one row per channel.
pub fn sines(n_chan: usize, n_times: usize, sfreq: f32, freqs: &[f32]) -> Array2<f32> {
    Array2::from_shape_fn((n_chan, n_times), |(c, t)| {
        let tt = t as f32 / sfreq;
        freqs
            .iter()
            .map(|&f| (2.0 * PI * f * tt + c as f32 * 0.3).sin())
            .sum::<f32>()
            * 1e-6
    })
}

#[allow(unused)]
/// EEG recording with the given `(onset_secs, description)` markers.
pub fn recording(
    ch_names: &[&str],
    sfreq: f32,
    secs: f32,
    markers: &[(f64, &str)],
) -> RawRecording {
    let n_times = (secs * sfreq) as usize;
    RawRecording {
        data: sines(ch_names.len(), n_times, sfreq, &[12.0]),
        sfreq,
        ch_names: ch_names.iter().map(|s| s.to_string()).collect(),
        ch_kinds: vec![ChannelKind::Eeg; ch_names.len()],
        annotations: markers
            .iter()
            .map(|&(onset, d)| Annotation { onset, duration: 0.0, description: d.to_string() })
            .collect(),
        description: None,
    }
}

/// Same as [`recording`] with one trailing stim channel.
#[allow(unused)]
pub fn recording_with_stim(ch_names: &[&str], sfreq: f32, secs: f32, markers: &[(f64, &str)]) -> RawRecording {
    let mut raw = recording(ch_names, sfreq, secs, markers);
    let stim = Array2::<f32>::zeros((1, raw.n_times()));
    raw.data = ndarray::concatenate(ndarray::Axis(0), &[raw.data.view(), stim.view()]).unwrap();
    raw.ch_names.push("STI".into());
    raw.ch_kinds.push(ChannelKind::Stim);
    raw
}

#[allow(unused)]
pub fn session(id: &str, runs: Vec<(&str, RawRecording)>) -> Session {
    Session {
        id: id.to_string(),
        runs: runs
            .into_iter()
            .map(|(key, recording)| Run { id: RunId::new(key), recording })
            .collect(),
    }
}

/// In-memory source. Each subject can be scripted to fail a number of times
/// before it delivers.
#[allow(unused)]
#[derive(Default)]
pub struct ScriptedSource {
    pub subjects: HashMap<u32, Vec<Session>>,
    pub failures_before_success: HashMap<u32, usize>,
    pub calls: Cell<usize>,
    failed: Cell<usize>,
}

#[allow(unused)]
impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: u32, sessions: Vec<Session>) -> Self {
        self.subjects.insert(subject, sessions);
        self
    }

    pub fn failing(mut self, subject: u32, times: usize) -> Self {
        self.failures_before_success.insert(subject, times);
        self
    }
}

impl RecordingSource for ScriptedSource {
    fn fetch_subject(&self, _spec: &DatasetSpec, subject: u32) -> Result<Vec<Session>, ExtractionError> {
        self.calls.set(self.calls.get() + 1);
        let budget = self.failures_before_success.get(&subject).copied().unwrap_or(0);
        if self.failed.get() < budget {
            self.failed.set(self.failed.get() + 1);
            return Err(ExtractionError::FetchFailure("connection reset".into()));
        }
        self.subjects
            .get(&subject)
            .cloned()
            .ok_or_else(|| ExtractionError::FetchFailure(format!("subject {subject} unavailable")))
    }
}

/// Records every requested sleep instead of sleeping.
#[allow(unused)]
#[derive(Default)]
pub struct CountingSleeper {
    pub sleeps: Cell<usize>,
    pub total: Cell<Duration>,
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, d: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
        self.total.set(self.total.get() + d);
    }
}

/// Names of the `.csv` files in `dir`, sorted.
#[allow(unused)]
pub fn csv_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.ends_with(".csv"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
