//! Completion manifest: the explicit record of which units are finished.
//!
//! One `manifest.json` per dataset output directory maps unit ids
//! (`subject_3`, `subject_3/session_0`, `subject_3/session_0/run_4`) to a
//! status. An entry is written only after the unit's files were renamed into
//! place, so a crash mid-write leaves the unit pending rather than "done".
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::output::write_atomic;
use crate::recording::RecordingUnit;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Output written (or, for subjects/sessions, every child visited).
    Done,
    /// Deterministically empty: no usable events. Not revisited.
    Empty,
    /// Failed; the detail says why.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub status: UnitStatus,
    /// Output file name, for written runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ManifestEntry {
    pub fn done() -> Self {
        Self { status: UnitStatus::Done, output: None, detail: None }
    }

    pub fn written(output: impl Into<String>) -> Self {
        Self { status: UnitStatus::Done, output: Some(output.into()), detail: None }
    }

    pub fn empty(detail: impl Into<String>) -> Self {
        Self { status: UnitStatus::Empty, output: None, detail: Some(detail.into()) }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self { status: UnitStatus::Failed, output: None, detail: Some(detail.into()) }
    }
}

/// Per-dataset unit id → status store, persisted on every update.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(skip)]
    path: PathBuf,
    units: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Load the manifest of `dataset_dir`; a missing file is an empty manifest.
    pub fn load(dataset_dir: &Path) -> Result<Self> {
        let path = dataset_dir.join(MANIFEST_FILE);
        let mut manifest = if path.exists() {
            let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_slice::<Manifest>(&bytes)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Manifest::default()
        };
        manifest.path = path;
        Ok(manifest)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.units.get(id)
    }

    pub fn status(&self, id: &str) -> Option<UnitStatus> {
        self.units.get(id).map(|e| e.status)
    }

    /// Done or deterministically empty: nothing left to do for `id`.
    pub fn is_complete(&self, id: &str) -> bool {
        matches!(self.status(id), Some(UnitStatus::Done | UnitStatus::Empty))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Record `entry` for `id` and persist the manifest atomically.
    pub fn record(&mut self, id: &str, entry: ManifestEntry) -> Result<()> {
        if self.units.get(id) == Some(&entry) {
            return Ok(());
        }
        self.units.insert(id.to_string(), entry);
        self.save()
    }

    fn save(&self) -> Result<()> {
        write_atomic(&self.path, |w| {
            serde_json::to_writer_pretty(&mut *w, self)?;
            Ok(())
        })
    }
}

pub fn subject_id(subject: u32) -> String {
    format!("subject_{subject}")
}

pub fn session_id(subject: u32, session: &str) -> String {
    format!("subject_{subject}/session_{session}")
}

pub fn run_id(unit: &RecordingUnit) -> String {
    format!("subject_{}/session_{}/run_{}", unit.subject, unit.session, unit.run.key())
}
