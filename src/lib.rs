//! # mi-prep: motor-imagery EEG trial extraction
//!
//! `mi-prep` turns cached multi-subject motor-imagery recordings into
//! per-run, long-format CSV tables ready for classifier training. Every run
//! goes through the same steps; everything that differs between datasets
//! lives in the static [`registry`].
//!
//! ## Pipeline overview
//!
//! ```text
//! {cache_dir}/{dataset}/subject_{id}/{session}/{run}.safetensors
//!   │
//!   ├─ io::SafetensorsCache     RecordingSource: subject → sessions → runs
//!   ├─ RawRecording::pick       EEG only / named subset
//!   ├─ filter                   zero-phase FIR bandpass, 8–30 Hz
//!   ├─ RawRecording::events     annotations → (sample, code)
//!   ├─ extract                  effective events, windows, labels, split
//!   ├─ output                   atomic CSV + JSON sidecar
//!   └─ manifest                 done / empty / failed per unit
//!        │
//!        └─→ {output_root}/{output_dir}/subject_{s}_[session_{x}_]run_{r}_[train_|test_]data.csv
//! ```
//!
//! The [`controller`] walks subjects in order, skips units the manifest
//! already records as finished and retries transient failures with a fixed
//! backoff.
//!
//! ## Quick start
//!
//! ```no_run
//! use mi_prep::{registry, run_dataset, PipelineConfig, SafetensorsCache};
//!
//! let cfg    = PipelineConfig::default();
//! let source = SafetensorsCache::new(&cfg.cache_dir);
//! let spec   = registry::lookup("BNCI2014_001").unwrap();
//! let report = run_dataset(spec, &cfg, &source).unwrap();
//! println!("{} runs written", report.runs_written);
//! ```
//!
//! ## Extracting a single run
//!
//! ```no_run
//! use mi_prep::io::read_recording;
//! use mi_prep::{extract, registry, PipelineConfig, RecordingUnit, RunId};
//! use std::path::Path;
//!
//! let raw   = read_recording(Path::new("data/BNCI2014_001/subject_1/0train/run_0.safetensors")).unwrap();
//! let unit  = RecordingUnit::new(1, "0train", RunId::new("run_0"));
//! let table = extract(&registry::BNCI2014_001, &unit, raw, &PipelineConfig::default()).unwrap();
//! println!("{} trials, {} rows", table.n_trials(), table.n_rows());
//! ```

pub mod config;
pub mod controller;
pub mod epoch;
pub mod error;
pub mod extract;
pub mod filter;
pub mod io;
pub mod manifest;
pub mod output;
pub mod recording;
pub mod registry;
pub mod table;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::PipelineConfig;

// controller
pub use controller::{run_dataset, Controller, DatasetReport, Sleeper, ThreadSleeper};

// epoch
pub use epoch::{event_windows, run_segments, EventWindow, Segment};

// error
pub use error::{ConfigurationError, ExtractionError};

// extract
pub use extract::{effective_events, extract};

// filter: design helpers + convolution
pub use filter::{
    auto_trans_bandwidth, auto_filter_length, design_bandpass,
    firwin_bandpass, hamming,
    apply_fir_zero_phase, filter_1d,
};

// io: safetensors cache
pub use io::{read_recording, write_recording, SafetensorsCache, StWriter};

// manifest
pub use manifest::{Manifest, ManifestEntry, UnitStatus};

// output
pub use output::{file_stem, sidecar_path, table_path, write_table};

// recording
pub use recording::{
    Annotation, ChannelKind, Event, RawRecording, RecordingSource,
    RecordingUnit, Run, RunId, Session, SubjectRecordings,
};

// registry
pub use registry::{ChannelSelection, DatasetSpec, RelabelRule, RunClass, SplitRule, WindowRule};

// table
pub use table::{TableMetadata, TrialTable};
