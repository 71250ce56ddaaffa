//! Raw recordings and the upstream source contract.
//!
//! A [`RecordingSource`] hands the controller every recording of one subject
//! as an ordered list of sessions, each an ordered list of runs. The crate
//! ships one source ([`crate::io::SafetensorsCache`]); anything that can
//! produce [`RawRecording`]s can stand in for it.
use std::fmt;

use ndarray::{Array2, Axis};

use crate::error::ExtractionError;
use crate::filter;
use crate::registry::{ChannelSelection, DatasetSpec};

/// Sensor type of a channel, as far as channel selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Eeg,
    Eog,
    Emg,
    Stim,
    Misc,
}

impl ChannelKind {
    /// Parse an MNE-style channel type name; anything unknown is `Misc`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "eeg" => Self::Eeg,
            "eog" => Self::Eog,
            "emg" => Self::Emg,
            "stim" => Self::Stim,
            _ => Self::Misc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eeg => "eeg",
            Self::Eog => "eog",
            Self::Emg => "emg",
            Self::Stim => "stim",
            Self::Misc => "misc",
        }
    }

    /// Physiological data channels: filtered and written in µV.
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Eeg | Self::Eog | Self::Emg)
    }
}

/// A timestamped marker in the annotation stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Seconds from the start of the recording.
    pub onset: f64,
    /// Seconds; zero for instantaneous markers.
    pub duration: f64,
    pub description: String,
}

/// A decoded discrete event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Sample offset from the start of the recording.
    pub sample: usize,
    /// Raw event code (before any relabeling).
    pub code: i32,
}

/// One continuous multi-channel recording.
#[derive(Debug, Clone)]
pub struct RawRecording {
    /// [C, T] samples in volts.
    pub data: Array2<f32>,
    /// Sampling rate (Hz).
    pub sfreq: f32,
    pub ch_names: Vec<String>,
    pub ch_kinds: Vec<ChannelKind>,
    pub annotations: Vec<Annotation>,
    /// Free-text recording description; reported as the reference electrode
    /// when the dataset registry has no better information.
    pub description: Option<String>,
}

impl RawRecording {
    #[inline]
    pub fn n_chan(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Total duration in seconds.
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq as f64
    }

    /// Restrict channels according to `selection`.
    pub fn pick(&mut self, selection: &ChannelSelection) -> Result<(), ExtractionError> {
        let keep: Vec<usize> = match selection {
            ChannelSelection::All => return Ok(()),
            ChannelSelection::EegOnly => (0..self.n_chan())
                .filter(|&i| self.ch_kinds[i] == ChannelKind::Eeg)
                .collect(),
            ChannelSelection::Named(names) => names
                .iter()
                .map(|name| {
                    self.ch_names.iter().position(|n| n == name).ok_or_else(|| {
                        ExtractionError::FilterFailure(format!("channel '{name}' not in recording"))
                    })
                })
                .collect::<Result<_, _>>()?,
        };
        if keep.is_empty() {
            return Err(ExtractionError::FilterFailure("channel selection left no channels".into()));
        }
        self.data = self.data.select(Axis(0), &keep);
        self.ch_names = keep.iter().map(|&i| self.ch_names[i].clone()).collect();
        self.ch_kinds = keep.iter().map(|&i| self.ch_kinds[i]).collect();
        Ok(())
    }

    /// Zero-phase bandpass of every data channel in place.
    ///
    /// Stim and misc channels are left untouched, as MNE's `raw.filter` does
    /// by default.
    pub fn filter(&mut self, l_freq: f32, h_freq: f32) -> Result<(), ExtractionError> {
        if self.n_times() == 0 {
            return Err(ExtractionError::FilterFailure("recording has no samples".into()));
        }
        let h = filter::design_bandpass(l_freq, h_freq, self.sfreq)
            .map_err(|e| ExtractionError::FilterFailure(e.to_string()))?;
        let kinds = &self.ch_kinds;
        filter::apply_fir_zero_phase(&mut self.data, &h, |ch| kinds[ch].is_data())
            .map_err(|e| ExtractionError::FilterFailure(e.to_string()))
    }

    /// Decode the annotation stream into events, sorted by sample.
    ///
    /// `code_of` maps an annotation description to its raw code; unknown
    /// descriptions and onsets past the end of the data are dropped.
    pub fn events<F>(&self, code_of: F) -> Vec<Event>
    where
        F: Fn(&str) -> Option<i32>,
    {
        let sfreq = self.sfreq as f64;
        let n_times = self.n_times();
        let mut events: Vec<Event> = self
            .annotations
            .iter()
            .filter(|a| a.onset >= 0.0)
            .filter_map(|a| {
                let code = code_of(&a.description)?;
                let sample = (a.onset * sfreq).round() as usize;
                (sample < n_times).then_some(Event { sample, code })
            })
            .collect();
        events.sort_by_key(|e| e.sample);
        events
    }
}

/// Identity of a run as delivered by the source (`run_4`, `0`, …).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }

    /// Trailing component after the last `_` (`run_4` → `4`).
    pub fn label(&self) -> &str {
        self.0.rsplit('_').next().unwrap_or(&self.0)
    }

    /// Run number, when the label is an integer.
    pub fn number(&self) -> Option<u32> {
        self.label().parse().ok()
    }
}

/// `(subject, session, run)` identity of one recording.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordingUnit {
    pub subject: u32,
    pub session: String,
    pub run: RunId,
}

impl RecordingUnit {
    pub fn new(subject: u32, session: impl Into<String>, run: RunId) -> Self {
        Self { subject, session: session.into(), run }
    }
}

impl fmt::Display for RecordingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject {}, session {}, run {}", self.subject, self.session, self.run.label())
    }
}

/// One run as delivered by the source.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: RunId,
    pub recording: RawRecording,
}

/// One session (visit) of a subject.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub runs: Vec<Run>,
}

/// Every session of one subject, in source order.
pub type SubjectRecordings = Vec<Session>;

/// Upstream data source.
pub trait RecordingSource {
    /// Every session of `subject` in `spec`, in source order.
    ///
    /// Failures to obtain the data are reported as
    /// [`ExtractionError::FetchFailure`] and retried by the caller.
    fn fetch_subject(&self, spec: &DatasetSpec, subject: u32) -> Result<SubjectRecordings, ExtractionError>;
}
