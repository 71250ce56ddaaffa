mod common;
use std::collections::BTreeSet;

use common::recording;
use mi_prep::registry::{BNCI2014_001, BNCI2014_002, PHYSIONET_MI, SCHIRRMEISTER2017};
use mi_prep::{extract, ExtractionError, PipelineConfig, RecordingUnit, RunId, TrialTable};

const MOTOR: &[&str] = &["C3", "Cz", "C4"];

fn unit(subject: u32, session: &str, run: &str) -> RecordingUnit {
    RecordingUnit::new(subject, session, RunId::new(run))
}

fn conditions(table: &TrialTable) -> BTreeSet<&'static str> {
    table.condition.iter().copied().collect()
}

/// Alternating T1/T2 cues every 4.2 s with T0 rest in between.
fn physionet_markers() -> Vec<(f64, String)> {
    let mut markers = Vec::new();
    for i in 0..10 {
        let t = i as f64 * 8.4;
        markers.push((t, "T0".to_string()));
        markers.push((t + 4.2, if i % 2 == 0 { "T1" } else { "T2" }.to_string()));
    }
    markers
}

fn physionet_run(secs: f32) -> mi_prep::RawRecording {
    let owned = physionet_markers();
    let markers: Vec<(f64, &str)> = owned.iter().map(|(t, d)| (*t, d.as_str())).collect();
    recording(MOTOR, 160.0, secs, &markers)
}

#[test]
fn every_label_matches_vocabulary() {
    let raw = recording(
        MOTOR,
        250.0,
        40.0,
        &[(1.0, "left_hand"), (9.0, "right_hand"), (17.0, "feet"), (25.0, "tongue")],
    );
    let table = extract(&BNCI2014_001, &unit(1, "0train", "run_0"), raw, &PipelineConfig::default()).unwrap();

    assert_eq!(table.n_trials(), 4);
    assert_eq!(table.n_rows(), 4 * 1001);
    for (cond, label) in table.condition.iter().zip(&table.label) {
        assert_eq!(BNCI2014_001.label_of(cond), Some(*label), "{cond}");
    }
    let c = table.meta.columns.iter().position(|c| c == "condition").unwrap();
    assert_eq!(table.meta.columns[c + 1], "label");
    assert_eq!(&table.meta.columns[..2], &["time", "epoch"]);
}

#[test]
fn times_relative_to_onset_and_values_in_microvolts() {
    let raw = recording(MOTOR, 250.0, 20.0, &[(1.0, "feet")]);
    let table = extract(&BNCI2014_002, &unit(3, "0", "run_2"), raw, &PipelineConfig::default()).unwrap();

    // BNCI2014_002 cuts 3–8 s.
    approx::assert_abs_diff_eq!(table.time[0], 3.0, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(*table.time.last().unwrap(), 8.0, epsilon = 1e-9);
    // 12 Hz passes the 8–30 Hz band with ~unit gain; source amplitude is 1 µV.
    let peak = table.values.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
    assert!((0.9..1.1).contains(&peak), "peak {peak}");
    assert_eq!(conditions(&table), BTreeSet::from(["feet"]));
    assert!(table.label.iter().all(|&l| l == 2));
}

#[test]
fn hand_run_relabeled() {
    let table = extract(&PHYSIONET_MI, &unit(1, "0", "run_4"), physionet_run(125.0), &PipelineConfig::default()).unwrap();
    assert_eq!(conditions(&table), BTreeSet::from(["left_hand", "right_hand"]));
    let labels: BTreeSet<i32> = table.label.iter().copied().collect();
    assert_eq!(labels, BTreeSet::from([2, 3]));
    assert_eq!(table.meta.attrs["run_type"], "hand");
    assert_eq!(table.meta.attrs["task_type"], "imagined");
    assert_eq!(table.meta.attrs["is_baseline"], false);
}

#[test]
fn feet_run_relabeled() {
    let table = extract(&PHYSIONET_MI, &unit(1, "0", "run_6"), physionet_run(125.0), &PipelineConfig::default()).unwrap();
    assert_eq!(conditions(&table), BTreeSet::from(["feet", "hands"]));
    let labels: BTreeSet<i32> = table.label.iter().copied().collect();
    assert_eq!(labels, BTreeSet::from([4, 5]));
    assert_eq!(table.meta.labels.get("hands"), Some(&4));
    assert!(!table.meta.labels.contains_key("rest"));
}

#[test]
fn executed_hand_run_task_type() {
    let table = extract(&PHYSIONET_MI, &unit(2, "0", "run_3"), physionet_run(125.0), &PipelineConfig::default()).unwrap();
    assert_eq!(table.meta.attrs["task_type"], "executed");
    assert_eq!(table.meta.attrs["trial_duration"], "120 seconds (0s-120s)");
}

#[test]
fn baseline_run_is_rest_over_sixty_seconds() {
    let raw = recording(MOTOR, 160.0, 61.0, &[(0.0, "T0")]);
    let table = extract(&PHYSIONET_MI, &unit(1, "0", "run_1"), raw, &PipelineConfig::default()).unwrap();
    assert_eq!(conditions(&table), BTreeSet::from(["rest"]));
    assert_eq!(table.n_rows(), 60 * 160);
    assert_eq!(table.meta.attrs["is_baseline"], true);
}

#[test]
fn whole_run_clamped_to_short_recording() {
    // 120 s window over a 90 s run: only 90 s of samples are available.
    let table = extract(&PHYSIONET_MI, &unit(1, "0", "run_8"), physionet_run(90.0), &PipelineConfig::default()).unwrap();
    assert!(table.n_rows() <= 90 * 160);
    assert!(table.time.iter().all(|&t| t < 90.0));
    assert_eq!(table.meta.attrs["trial_duration"], "90 seconds (0s-90s)");
}

#[test]
fn no_vocabulary_event_is_no_events() {
    let raw = recording(MOTOR, 250.0, 20.0, &[(1.0, "boundary"), (5.0, "tongue")]);
    let err = extract(&BNCI2014_002, &unit(1, "0", "run_0"), raw, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, ExtractionError::NoEvents(_)), "{err:?}");
    assert!(!err.is_transient());
}

#[test]
fn every_window_out_of_bounds_is_no_events() {
    let raw = recording(MOTOR, 250.0, 5.0, &[(1.0, "feet")]);
    let err = extract(&BNCI2014_002, &unit(1, "0", "run_0"), raw, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, ExtractionError::NoEvents(_)));
}

#[test]
fn missing_named_channel_is_filter_failure() {
    use mi_prep::ChannelSelection;
    let mut spec = BNCI2014_002;
    spec.channels = ChannelSelection::Named(&["C3", "FCz"]);
    let raw = recording(MOTOR, 250.0, 20.0, &[(1.0, "feet")]);
    let err = extract(&spec, &unit(1, "0", "run_0"), raw, &PipelineConfig::default()).unwrap_err();
    assert_eq!(err.kind(), "filter_failure");
}

#[test]
fn schirrmeister_split_by_run() {
    let markers = [(1.0, "right_hand"), (6.0, "rest"), (11.0, "feet")];
    let cfg = PipelineConfig::default();

    let test = extract(&SCHIRRMEISTER2017, &unit(1, "0", "12"), recording(MOTOR, 250.0, 20.0, &markers), &cfg).unwrap();
    assert_eq!(test.is_test, Some(true));
    assert_eq!(test.meta.columns.last().unwrap(), "is_test");
    assert_eq!(test.meta.attrs["split"], "test");

    let train = extract(&SCHIRRMEISTER2017, &unit(1, "0", "5"), recording(MOTOR, 250.0, 20.0, &markers), &cfg).unwrap();
    assert_eq!(train.is_test, Some(false));
    assert_eq!(train.meta.attrs["split"], "train");
}

#[test]
fn metadata_reports_measured_values_and_tags() {
    let raw = recording(MOTOR, 512.0, 20.0, &[(1.0, "right_hand"), (10.0, "feet")]);
    let table = extract(&BNCI2014_002, &unit(7, "1", "run_3"), raw, &PipelineConfig::default()).unwrap();
    let meta = &table.meta;
    assert_eq!(meta.dataset, "BNCI2014_002");
    assert_eq!((meta.subject, meta.session.as_str(), meta.run.as_str()), (7, "1", "3"));
    assert_eq!(meta.sampling_rate, 512.0);
    assert_eq!(meta.electrodes, vec!["C3", "Cz", "C4"]);
    assert_eq!(meta.reference, "left mastoid");
    assert_eq!(meta.n_trials, 2);
    assert_eq!(meta.attrs["ground"], "right mastoid");

    let raw = recording(MOTOR, 250.0, 20.0, &[(1.0, "tongue")]);
    let table = extract(&BNCI2014_001, &unit(1, "0train", "run_0"), raw, &PipelineConfig::default()).unwrap();
    assert_eq!(table.meta.reference, "unknown");
}
