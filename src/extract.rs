//! Trial extraction: one raw recording in, one labeled [`TrialTable`] out.
//!
//! ```text
//! RawRecording
//!   │
//!   ├─ pick            channel selection (EEG only, named subset, …)
//!   ├─ filter          zero-phase FIR bandpass (8–30 Hz by default)
//!   ├─ events          annotations → (sample, raw code)
//!   ├─ effective set   vocabulary ∩ codes present (relabeled per run class)
//!   ├─ windows         event-relative or whole-run
//!   └─ table           label = vocabulary[condition], is_test, metadata
//! ```
//!
//! Any failing step aborts only this unit.
use std::collections::BTreeMap;

use log::{debug, warn};
use ndarray::s;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::epoch;
use crate::error::ExtractionError;
use crate::recording::{Event, RawRecording, RecordingUnit};
use crate::registry::{self, DatasetSpec, WindowRule};
use crate::table::{TableMetadata, TrialTable};

/// Event name → raw code pairs actually usable in one unit.
pub type EffectiveEvents = Vec<(&'static str, i32)>;

/// The subset of the dataset's events present in `events`.
///
/// For datasets with a relabel rule the run number selects the run class,
/// whose code table decides the names; a run outside every class has no
/// effective events.
pub fn effective_events(spec: &DatasetSpec, run_number: Option<u32>, events: &[Event]) -> EffectiveEvents {
    let present = |code: i32| events.iter().any(|e| e.code == code);
    match spec.relabel {
        Some(rule) => run_number
            .and_then(|r| rule.classify(r))
            .map(|class| {
                class
                    .codes
                    .iter()
                    .filter(|&&(code, _)| present(code))
                    .map(|&(code, name)| (name, code))
                    .collect()
            })
            .unwrap_or_default(),
        None => spec
            .event_vocabulary
            .iter()
            .filter(|&&(_, code)| present(code))
            .copied()
            .collect(),
    }
}

/// Run the full extraction procedure on one unit.
pub fn extract(
    spec: &DatasetSpec,
    unit: &RecordingUnit,
    mut raw: RawRecording,
    cfg: &PipelineConfig,
) -> Result<TrialTable, ExtractionError> {
    raw.pick(&spec.channels)?;
    raw.filter(cfg.l_freq, cfg.h_freq)?;

    let events = raw.events(|d| spec.annotation_code(d));
    let run_number = unit.run.number();

    // Effective set joined with label codes: (name, raw code, label).
    let usable: Vec<(&'static str, i32, i32)> = effective_events(spec, run_number, &events)
        .into_iter()
        .filter_map(|(name, code)| match spec.label_of(name) {
            Some(label) => Some((name, code, label)),
            None => {
                warn!("{}: event '{name}' has no label in the vocabulary", spec.name);
                None
            }
        })
        .collect();
    debug!("{unit}: {} events decoded, effective {:?}", events.len(), usable);
    if usable.is_empty() {
        return Err(ExtractionError::NoEvents(format!(
            "{unit}: no {} event present",
            spec.name
        )));
    }
    let lookup = |code: i32| usable.iter().find(|u| u.1 == code).map(|&(n, _, l)| (n, l));

    let is_test = spec.split.map(|split| split.is_test(run_number));
    let meta = metadata(spec, unit, &raw, run_number, is_test, &usable);
    let mut table = TrialTable::new(raw.ch_names.clone(), is_test, meta);

    let scales: Vec<f32> = raw
        .ch_kinds
        .iter()
        .map(|k| if k.is_data() { cfg.value_scale } else { 1.0 })
        .collect();
    let sf = raw.sfreq as f64;

    match spec.window {
        WindowRule::EventRelative { tmin, tmax } => {
            let kept: Vec<Event> = events.iter().copied().filter(|e| lookup(e.code).is_some()).collect();
            let windows = epoch::event_windows(&kept, raw.n_times(), raw.sfreq, tmin, tmax);
            for (i, w) in windows.iter().enumerate() {
                let Some((name, label)) = lookup(w.event.code) else { continue };
                let times = (0..w.samples.len()).map(|k| w.t0 + k as f64 / sf);
                let data = raw.data.slice(s![.., w.samples.clone()]);
                table.push_trial(i, times, data, &scales, name, label);
            }
        }
        WindowRule::WholeRun { .. } => {
            let (_, secs) = spec.window.bounds(run_number);
            let segments = epoch::run_segments(&events, raw.n_times(), raw.sfreq, secs);
            let mut i = 0;
            for seg in &segments {
                let Some((name, label)) = lookup(seg.code) else { continue };
                let times = seg.samples.clone().map(|k| k as f64 / sf);
                let data = raw.data.slice(s![.., seg.samples.clone()]);
                table.push_trial(i, times, data, &scales, name, label);
                i += 1;
            }
        }
    }

    if table.n_rows() == 0 {
        return Err(ExtractionError::NoEvents(format!(
            "{unit}: no trial window fits inside the recording"
        )));
    }
    table.meta.n_trials = table.n_trials();
    table.meta.columns = table.columns();
    Ok(table)
}

/// Sidecar metadata: measured values, unit identity, dataset attributes,
/// then static tags (static tags win on collisions).
fn metadata(
    spec: &DatasetSpec,
    unit: &RecordingUnit,
    raw: &RawRecording,
    run_number: Option<u32>,
    is_test: Option<bool>,
    usable: &[(&'static str, i32, i32)],
) -> TableMetadata {
    let mut attrs: BTreeMap<String, Value> = BTreeMap::new();

    if let (Some(rule), Some(run)) = (spec.relabel, run_number) {
        if let Some(class) = rule.classify(run) {
            attrs.insert("run_type".into(), class.name.into());
        }
        attrs.insert("task_type".into(), rule.task_type(run).into());
    }
    if let WindowRule::WholeRun { baseline_runs, .. } = spec.window {
        let baseline = run_number.is_some_and(|r| baseline_runs.contains(&r));
        attrs.insert("is_baseline".into(), baseline.into());
        // Clamped to the recording, as the emitted samples are.
        let (tmin, tmax) = spec.window.bounds(run_number);
        let tmax = tmax.min(raw.duration_secs());
        attrs.insert("trial_duration".into(), registry::describe_span(tmin, tmax).into());
    }
    if let Some(is_test) = is_test {
        attrs.insert("split".into(), if is_test { "test" } else { "train" }.into());
    }

    let mut reference = raw.description.clone().unwrap_or_else(|| "unknown".to_string());
    for &(key, value) in spec.tags {
        if key == "reference" {
            reference = value.to_string();
        } else {
            attrs.insert(key.to_string(), value.into());
        }
    }

    TableMetadata {
        dataset: spec.name.to_string(),
        subject: unit.subject,
        session: unit.session.clone(),
        run: unit.run.label().to_string(),
        sampling_rate: raw.sfreq,
        electrodes: raw.ch_names.clone(),
        reference,
        n_trials: 0,
        labels: usable.iter().map(|&(name, _, label)| (name.to_string(), label)).collect(),
        columns: Vec::new(),
        attrs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{BNCI2014_002, PHYSIONET_MI};

    fn ev(sample: usize, code: i32) -> Event {
        Event { sample, code }
    }

    #[test]
    fn hand_run_relabels_codes() {
        let events = [ev(0, 1), ev(10, 2), ev(20, 3)];
        let eff = effective_events(&PHYSIONET_MI, Some(4), &events);
        assert_eq!(eff, vec![("left_hand", 2), ("right_hand", 3)]);
    }

    #[test]
    fn feet_run_relabels_codes() {
        let events = [ev(10, 2), ev(20, 3), ev(30, 1)];
        let eff = effective_events(&PHYSIONET_MI, Some(6), &events);
        assert_eq!(eff, vec![("hands", 2), ("feet", 3)]);
    }

    #[test]
    fn unclassified_run_has_no_effective_events() {
        assert!(effective_events(&PHYSIONET_MI, Some(20), &[ev(0, 2)]).is_empty());
        assert!(effective_events(&PHYSIONET_MI, None, &[ev(0, 2)]).is_empty());
    }

    #[test]
    fn plain_vocabulary_intersection() {
        let eff = effective_events(&BNCI2014_002, None, &[ev(5, 2), ev(9, 7)]);
        assert_eq!(eff, vec![("feet", 2)]);
    }
}
