//! Output naming and atomic writing.
//!
//! File names follow
//! `subject_{id}_[session_{s}_][run_{r}_][split_]data.csv`; the metadata
//! sidecar shares the stem with a `.json` extension.
//!
//! Both files are written to a hidden temporary in the destination directory
//! and renamed into place, sidecar first. A CSV under its final name is
//! therefore always complete and always has its sidecar.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::recording::RecordingUnit;
use crate::registry::DatasetSpec;
use crate::table::TrialTable;

/// File stem (without extension) of a unit's table.
pub fn file_stem(spec: &DatasetSpec, unit: &RecordingUnit, is_test: Option<bool>) -> String {
    let mut stem = format!("subject_{}_", unit.subject);
    if spec.include_session {
        stem.push_str(&format!("session_{}_", unit.session));
    }
    stem.push_str(&format!("run_{}_", unit.run.label()));
    if let Some(is_test) = is_test {
        stem.push_str(if is_test { "test_" } else { "train_" });
    }
    stem.push_str("data");
    stem
}

/// Full CSV path of a unit's table inside `dataset_dir`.
pub fn table_path(dataset_dir: &Path, spec: &DatasetSpec, unit: &RecordingUnit, is_test: Option<bool>) -> PathBuf {
    dataset_dir.join(format!("{}.csv", file_stem(spec, unit, is_test)))
}

/// Sidecar path belonging to a CSV path.
pub fn sidecar_path(csv_path: &Path) -> PathBuf {
    csv_path.with_extension("json")
}

/// Write `table` to `csv_path` plus its JSON sidecar, atomically.
pub fn write_table(table: &TrialTable, csv_path: &Path) -> Result<()> {
    let sidecar = sidecar_path(csv_path);
    write_atomic(&sidecar, |w| {
        serde_json::to_writer_pretty(&mut *w, &table.meta)?;
        w.write_all(b"\n")?;
        Ok(())
    })?;
    write_atomic(csv_path, |w| table.write_csv(w))
}

/// Write through a temporary sibling file, then rename over `path`.
pub(crate) fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let dir = path.parent().unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("no file name in {}", path.display()))?
        .to_string_lossy();
    let tmp = dir.join(format!(".{name}.tmp"));

    let result = (|| -> Result<()> {
        let file = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let mut w = BufWriter::new(file);
        fill(&mut w)?;
        w.flush()?;
        w.get_ref().sync_all()?;
        Ok(())
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} → {}", tmp.display(), path.display()))
}
