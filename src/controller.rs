//! Resumable iteration over every recording unit of one dataset.
//!
//! Per subject:
//!
//! ```text
//! PENDING ──(manifest: done)──────────────────────────▶ DONE (skipped)
//!    │
//!    └─▶ ATTEMPTING ×≤max_retries ──ok──────────────────▶ DONE
//!              │  transient error: sleep backoff, retry
//!              └─ permanent error / attempts exhausted ─▶ ABANDONED
//! ```
//!
//! Inside an attempt, sessions and runs already complete in the manifest are
//! skipped. Run-level failures are logged and recorded; they never abort the
//! session and never trigger a retry.
use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::ExtractionError;
use crate::extract;
use crate::manifest::{self, Manifest, ManifestEntry};
use crate::output;
use crate::recording::{RawRecording, RecordingSource, RecordingUnit};
use crate::registry::DatasetSpec;

/// Blocking pause between attempts.
pub trait Sleeper {
    fn sleep(&self, d: Duration);
}

/// [`Sleeper`] backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Counters for one dataset run, logged as the end-of-run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub subjects_done: usize,
    pub subjects_skipped: usize,
    pub subjects_abandoned: usize,
    pub sessions_skipped: usize,
    pub runs_written: usize,
    pub runs_empty: usize,
    pub runs_failed: usize,
    pub runs_skipped: usize,
    pub attempts: usize,
    pub backoff_sleeps: usize,
}

impl DatasetReport {
    /// True when every subject either finished or was already finished.
    pub fn is_complete(&self) -> bool {
        self.subjects_abandoned == 0 && self.runs_failed == 0
    }
}

/// Drives one dataset through fetch → extract → write.
pub struct Controller<'a> {
    spec: &'a DatasetSpec,
    cfg: &'a PipelineConfig,
    source: &'a dyn RecordingSource,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Controller<'a> {
    pub fn new(
        spec: &'a DatasetSpec,
        cfg: &'a PipelineConfig,
        source: &'a dyn RecordingSource,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self { spec, cfg, source, sleeper }
    }

    /// Process every subject of the dataset.
    ///
    /// Only a failure to prepare the output directory or read the manifest is
    /// returned as an error; everything below that is logged and counted.
    pub fn run(&self) -> Result<DatasetReport> {
        let dir = self.cfg.dataset_dir(self.spec);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let mut manifest = Manifest::load(&dir)?;
        let mut report = DatasetReport::default();

        for subject in self.spec.subject_ids() {
            self.process_subject(subject, &mut manifest, &mut report);
        }
        Ok(report)
    }

    fn process_subject(&self, subject: u32, manifest: &mut Manifest, report: &mut DatasetReport) {
        let name = self.spec.name;
        let sid = manifest::subject_id(subject);
        if manifest.is_complete(&sid) {
            info!("{name} subject {subject} already processed, skipping");
            report.subjects_skipped += 1;
            return;
        }

        let attempts = self.cfg.attempts();
        for attempt in 1..=attempts {
            info!("Processing {name} subject {subject} (attempt {attempt}/{attempts})");
            report.attempts += 1;

            let outcome = self
                .attempt_subject(subject, manifest, report)
                .and_then(|()| manifest.record(&sid, ManifestEntry::done()).map_err(io_failure));
            match outcome {
                Ok(()) => {
                    report.subjects_done += 1;
                    return;
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!("{name} subject {subject} (attempt {attempt}/{attempts}): {e}");
                    info!("Waiting {:?} before retrying", self.cfg.retry_backoff);
                    report.backoff_sleeps += 1;
                    self.sleeper.sleep(self.cfg.retry_backoff);
                }
                Err(e) => {
                    error!("Failed to process {name} subject {subject} after {attempt} attempt(s): {e}");
                    if let Err(me) = manifest.record(&sid, ManifestEntry::failed(e.to_string())) {
                        error!("could not record failure of subject {subject}: {me:#}");
                    }
                    report.subjects_abandoned += 1;
                    return;
                }
            }
        }
    }

    fn attempt_subject(
        &self,
        subject: u32,
        manifest: &mut Manifest,
        report: &mut DatasetReport,
    ) -> Result<(), ExtractionError> {
        let sessions = self.source.fetch_subject(self.spec, subject)?;

        for session in sessions {
            let sess_id = manifest::session_id(subject, &session.id);
            if manifest.is_complete(&sess_id) {
                info!("Session {} of subject {subject} already processed, skipping", session.id);
                report.sessions_skipped += 1;
                continue;
            }
            for run in session.runs {
                let unit = RecordingUnit::new(subject, session.id.clone(), run.id);
                if manifest.is_complete(&manifest::run_id(&unit)) {
                    info!("{unit} already processed, skipping");
                    report.runs_skipped += 1;
                    continue;
                }
                self.process_run(&unit, run.recording, manifest, report)?;
            }
            manifest.record(&sess_id, ManifestEntry::done()).map_err(io_failure)?;
        }
        Ok(())
    }

    /// Extract and write one run. Only manifest failures propagate.
    fn process_run(
        &self,
        unit: &RecordingUnit,
        raw: RawRecording,
        manifest: &mut Manifest,
        report: &mut DatasetReport,
    ) -> Result<(), ExtractionError> {
        let id = manifest::run_id(unit);
        let entry = match extract::extract(self.spec, unit, raw, self.cfg) {
            Ok(table) => {
                let path = output::table_path(&self.cfg.dataset_dir(self.spec), self.spec, unit, table.is_test);
                match output::write_table(&table, &path) {
                    Ok(()) => {
                        info!("Saved {} trials for {unit} → {}", table.n_trials(), path.display());
                        report.runs_written += 1;
                        let file = path.file_name().map(|f| f.to_string_lossy().into_owned());
                        ManifestEntry::written(file.unwrap_or_default())
                    }
                    Err(e) => {
                        error!("Error writing {unit}: {e:#}");
                        report.runs_failed += 1;
                        ManifestEntry::failed(format!("io_failure: {e:#}"))
                    }
                }
            }
            Err(ExtractionError::NoEvents(msg)) => {
                info!("No events for {unit}, skipping ({msg})");
                report.runs_empty += 1;
                ManifestEntry::empty(msg)
            }
            Err(e) => {
                error!("Error processing {unit}: {e}");
                report.runs_failed += 1;
                ManifestEntry::failed(format!("{}: {e}", e.kind()))
            }
        };
        manifest.record(&id, entry).map_err(io_failure)
    }
}

fn io_failure(e: anyhow::Error) -> ExtractionError {
    ExtractionError::IoFailure(format!("{e:#}"))
}

/// Run one dataset with the thread-backed sleeper and log its summary.
pub fn run_dataset(spec: &DatasetSpec, cfg: &PipelineConfig, source: &dyn RecordingSource) -> Result<DatasetReport> {
    let report = Controller::new(spec, cfg, source, &ThreadSleeper).run()?;
    info!(
        "{}: {} subjects done, {} skipped, {} abandoned; {} runs written, {} empty, {} failed",
        spec.name,
        report.subjects_done,
        report.subjects_skipped,
        report.subjects_abandoned,
        report.runs_written,
        report.runs_empty,
        report.runs_failed,
    );
    Ok(report)
}
