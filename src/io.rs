//! Safetensors I/O for the local recording cache.
//!
//! Layout: `{cache_dir}/{dataset}/subject_{id}/{session}/{run}.safetensors`.
//!
//! Each file holds one run:
//!
//! ```text
//!   data          [C, T]  F32  samples in volts
//!   sfreq         [1]     F32  sampling rate (Hz)
//!   ch_names      [n]     U8   newline-separated channel names
//!   ch_types      [n]     U8   newline-separated MNE channel types (optional, default eeg)
//!   ann_onset     [A]     F32  annotation onsets in seconds (optional)
//!   ann_duration  [A]     F32  annotation durations in seconds (optional)
//!   ann_desc      [n]     U8   newline-separated annotation descriptions (optional)
//!   __metadata__  {"description": "..."}                                (optional)
//! ```
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use log::debug;
use ndarray::Array2;

use crate::config::PipelineConfig;
use crate::error::ExtractionError;
use crate::recording::{
    Annotation, ChannelKind, RawRecording, RecordingSource, Run, RunId, Session, SubjectRecordings,
};
use crate::registry::DatasetSpec;

const EXTENSION: &str = "safetensors";

// ── Low-level safetensors parser (raw bytes → ndarray / strings) ─────────────

struct StFile {
    bytes: Vec<u8>,
    header: HashMap<String, serde_json::Value>,
    data_start: usize,
}

impl StFile {
    fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        ensure!(bytes.len() >= 8, "safetensors file too small");
        let n = usize::try_from(u64::from_le_bytes(bytes[..8].try_into()?))
            .context("corrupt safetensors header length")?;
        let data_start = 8usize
            .checked_add(n)
            .filter(|&end| end <= bytes.len())
            .context("truncated safetensors header")?;
        let header: HashMap<String, serde_json::Value> = serde_json::from_slice(&bytes[8..data_start])
            .context("failed to parse safetensors header")?;
        Ok(Self { bytes, header, data_start })
    }

    fn raw(&self, key: &str, dtype: &str) -> Result<Option<(&[u8], Vec<usize>)>> {
        let Some(entry) = self.header.get(key) else { return Ok(None) };
        let found = entry["dtype"].as_str().unwrap_or("");
        ensure!(found == dtype, "'{key}': expected {dtype}, found {found}");
        let offsets = entry["data_offsets"]
            .as_array()
            .with_context(|| format!("'{key}': missing data_offsets"))?;
        let bound = |i: usize| -> Result<usize> {
            offsets
                .get(i)
                .and_then(|v| v.as_u64())
                .and_then(|v| usize::try_from(v).ok())
                .and_then(|v| self.data_start.checked_add(v))
                .with_context(|| format!("'{key}': corrupt data_offsets"))
        };
        let (s, e) = (bound(0)?, bound(1)?);
        ensure!(s <= e && e <= self.bytes.len(), "'{key}': data out of bounds");
        let shape = entry["shape"]
            .as_array()
            .with_context(|| format!("'{key}': missing shape"))?
            .iter()
            .map(|v| v.as_u64().map(|v| v as usize))
            .collect::<Option<Vec<_>>>()
            .with_context(|| format!("'{key}': bad shape"))?;
        Ok(Some((&self.bytes[s..e], shape)))
    }

    fn f32s(&self, key: &str) -> Result<Option<(Vec<f32>, Vec<usize>)>> {
        Ok(self.raw(key, "F32")?.map(|(raw, shape)| {
            let v = raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            (v, shape)
        }))
    }

    fn lines(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some((raw, _)) = self.raw(key, "U8")? else { return Ok(None) };
        let text = std::str::from_utf8(raw).with_context(|| format!("'{key}': not UTF-8"))?;
        Ok(Some(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect()))
    }

    fn metadata(&self, key: &str) -> Option<String> {
        self.header
            .get("__metadata__")
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
            .map(String::from)
    }
}

/// Read one cached run.
pub fn read_recording(path: &Path) -> Result<RawRecording> {
    let st = StFile::open(path)?;

    let (data_vec, shape) = st.f32s("data")?.context("missing 'data' key")?;
    ensure!(shape.len() == 2, "'data' must be 2-D, got shape {shape:?}");
    let data = Array2::from_shape_vec((shape[0], shape[1]), data_vec)?;

    let (sfreq, _) = st.f32s("sfreq")?.context("missing 'sfreq' key")?;
    let sfreq = *sfreq.first().context("empty 'sfreq'")?;

    let ch_names = st.lines("ch_names")?.context("missing 'ch_names' key")?;
    ensure!(
        ch_names.len() == data.nrows(),
        "{} channel names for {} channels",
        ch_names.len(),
        data.nrows()
    );
    let ch_kinds = match st.lines("ch_types")? {
        Some(types) => {
            ensure!(types.len() == ch_names.len(), "ch_types/ch_names length mismatch");
            types.iter().map(|t| ChannelKind::parse(t)).collect()
        }
        None => vec![ChannelKind::Eeg; ch_names.len()],
    };

    let annotations = match (st.f32s("ann_onset")?, st.lines("ann_desc")?) {
        (Some((onsets, _)), Some(descs)) => {
            ensure!(onsets.len() == descs.len(), "ann_onset/ann_desc length mismatch");
            let durations = st.f32s("ann_duration")?.map(|(d, _)| d).unwrap_or_default();
            onsets
                .iter()
                .zip(descs)
                .enumerate()
                .map(|(i, (&onset, description))| Annotation {
                    onset: onset as f64,
                    duration: durations.get(i).copied().unwrap_or(0.0) as f64,
                    description,
                })
                .collect()
        }
        (None, None) => Vec::new(),
        _ => bail!("ann_onset and ann_desc must be stored together"),
    };

    Ok(RawRecording {
        data,
        sfreq,
        ch_names,
        ch_kinds,
        annotations,
        description: st.metadata("description"),
    })
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer for F32 and U8 tensors plus string metadata.
///
/// Usage:
/// ```rust,no_run
/// use mi_prep::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_lines("names", &["a", "b"]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f32_arr2(&mut self, name: &str, arr: &Array2<f32>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    /// Newline-joined UTF-8 strings as a U8 tensor.
    pub fn add_lines<S: AsRef<str>>(&mut self, name: &str, lines: &[S]) {
        let text: Vec<&str> = lines.iter().map(|s| s.as_ref()).collect();
        let bytes = text.join("\n").into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), serde_json::Value::Object(self.metadata.clone()));
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes
            .into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

/// Write one run in the cache layout read by [`read_recording`].
pub fn write_recording(raw: &RawRecording, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f32_arr2("data", &raw.data);
    w.add_f32("sfreq", &[raw.sfreq], &[1]);
    w.add_lines("ch_names", &raw.ch_names);
    let types: Vec<&str> = raw.ch_kinds.iter().map(|k| k.as_str()).collect();
    w.add_lines("ch_types", &types);
    if !raw.annotations.is_empty() {
        let onsets: Vec<f32> = raw.annotations.iter().map(|a| a.onset as f32).collect();
        let durations: Vec<f32> = raw.annotations.iter().map(|a| a.duration as f32).collect();
        let descs: Vec<&str> = raw.annotations.iter().map(|a| a.description.as_str()).collect();
        w.add_f32("ann_onset", &onsets, &[onsets.len()]);
        w.add_f32("ann_duration", &durations, &[durations.len()]);
        w.add_lines("ann_desc", &descs);
    }
    if let Some(desc) = &raw.description {
        w.add_metadata("description", desc);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    w.write(path)
}

// ── Cache-backed recording source ────────────────────────────────────────────

/// [`RecordingSource`] over a local cache directory.
///
/// A subject directory without sessions, or a session without runs, is
/// reported as a fetch failure: it is what an interrupted download leaves.
#[derive(Debug, Clone)]
pub struct SafetensorsCache {
    root: PathBuf,
}

impl SafetensorsCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache rooted at [`PipelineConfig::cache_dir`].
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self::new(&cfg.cache_dir)
    }

    /// Directory holding one dataset, e.g. `./data/BNCI2014_001`.
    pub fn dataset_dir(&self, spec: &DatasetSpec) -> PathBuf {
        self.root.join(spec.name)
    }

    /// Directory holding one subject's sessions.
    pub fn subject_dir(&self, spec: &DatasetSpec, subject: u32) -> PathBuf {
        self.dataset_dir(spec).join(format!("subject_{subject}"))
    }

    /// Path of one cached run.
    pub fn run_path(&self, spec: &DatasetSpec, subject: u32, session: &str, run: &str) -> PathBuf {
        self.subject_dir(spec, subject)
            .join(session)
            .join(format!("{run}.{EXTENSION}"))
    }

    fn load_subject(&self, spec: &DatasetSpec, subject: u32) -> Result<SubjectRecordings> {
        let dir = self.subject_dir(spec, subject);
        if !dir.is_dir() {
            bail!("{} not in cache ({})", spec.name, dir.display());
        }

        let mut session_dirs: Vec<(String, PathBuf)> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
            .collect();
        session_dirs.sort_by_key(|(name, _)| source_order(name));
        ensure!(!session_dirs.is_empty(), "no cached sessions in {}", dir.display());

        let mut sessions = Vec::with_capacity(session_dirs.len());
        for (id, path) in session_dirs {
            let mut run_files: Vec<(String, PathBuf)> = fs::read_dir(&path)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|x| x == EXTENSION))
                .filter_map(|p| Some((p.file_stem()?.to_string_lossy().into_owned(), p)))
                .collect();
            run_files.sort_by_key(|(name, _)| source_order(name));
            ensure!(!run_files.is_empty(), "no cached runs in {} (incomplete download?)", path.display());

            let mut runs = Vec::with_capacity(run_files.len());
            for (key, file) in run_files {
                let recording = read_recording(&file).with_context(|| format!("loading {}", file.display()))?;
                debug!("loaded {} ({} ch × {} samples)", file.display(), recording.n_chan(), recording.n_times());
                runs.push(Run { id: RunId::new(key), recording });
            }
            sessions.push(Session { id, runs });
        }
        Ok(sessions)
    }
}

impl RecordingSource for SafetensorsCache {
    fn fetch_subject(&self, spec: &DatasetSpec, subject: u32) -> Result<SubjectRecordings, ExtractionError> {
        self.load_subject(spec, subject)
            .map_err(|e| ExtractionError::FetchFailure(format!("{e:#}")))
    }
}

/// Sort key putting `run_2` before `run_10`.
fn source_order(name: &str) -> (Option<u64>, String) {
    (RunId::new(name).label().parse().ok(), name.to_string())
}
