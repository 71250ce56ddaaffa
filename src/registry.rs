//! Dataset registry: the static parameter table of every supported dataset.
//!
//! Each dataset is one immutable [`DatasetSpec`]. All per-dataset behaviour
//! (windows, relabeling, naming, splits, tags) is expressed here as data; the
//! extraction and iteration code never branches on a dataset name.
use std::ops::RangeInclusive;

use crate::error::ConfigurationError;

/// Which channels survive before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSelection {
    /// Keep every channel the source delivers.
    All,
    /// Keep EEG channels only (drops stim, EOG, EMG and misc sensors).
    EegOnly,
    /// Keep exactly these channels, in this order.
    Named(&'static [&'static str]),
}

/// How trial windows are cut from a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowRule {
    /// `[tmin, tmax]` seconds around every effective event onset.
    EventRelative { tmin: f64, tmax: f64 },
    /// One window from the start of the run; runs listed in `baseline_runs`
    /// get `baseline_secs`, every other run gets `task_secs`.
    WholeRun {
        baseline_runs: &'static [u32],
        baseline_secs: f64,
        task_secs: f64,
    },
}

impl WindowRule {
    /// `(tmin, tmax)` in seconds for a run.
    pub fn bounds(&self, run_number: Option<u32>) -> (f64, f64) {
        match *self {
            WindowRule::EventRelative { tmin, tmax } => (tmin, tmax),
            WindowRule::WholeRun { baseline_runs, baseline_secs, task_secs } => {
                let baseline = run_number.is_some_and(|r| baseline_runs.contains(&r));
                (0.0, if baseline { baseline_secs } else { task_secs })
            }
        }
    }

    /// Human-readable window length, e.g. `"4 seconds (2s-6s)"`.
    pub fn describe(&self, run_number: Option<u32>) -> String {
        let (tmin, tmax) = self.bounds(run_number);
        describe_span(tmin, tmax)
    }
}

/// `"{len} seconds ({tmin}s-{tmax}s)"`.
pub fn describe_span(tmin: f64, tmax: f64) -> String {
    format!("{} seconds ({}s-{}s)", tmax - tmin, tmin, tmax)
}

/// One class of runs sharing a raw-code → event-name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClass {
    pub name: &'static str,
    pub runs: &'static [u32],
    /// Raw event code → event name valid in this class of runs.
    pub codes: &'static [(i32, &'static str)],
}

/// Context-dependent relabeling: the same raw code means different things
/// depending on which class the run number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelabelRule {
    pub classes: &'static [RunClass],
    /// Runs in which the movement was imagined rather than executed.
    pub imagined_runs: &'static [u32],
}

impl RelabelRule {
    /// Run class of `run_number`, if any.
    pub fn classify(&self, run_number: u32) -> Option<&'static RunClass> {
        self.classes.iter().find(|c| c.runs.contains(&run_number))
    }

    /// `"imagined"` or `"executed"`.
    pub fn task_type(&self, run_number: u32) -> &'static str {
        if self.imagined_runs.contains(&run_number) {
            "imagined"
        } else {
            "executed"
        }
    }
}

/// Fixed train/test split by run number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRule {
    /// Runs numbered at or above this are test runs.
    pub test_from_run: u32,
}

impl SplitRule {
    pub fn is_test(&self, run_number: Option<u32>) -> bool {
        run_number.is_some_and(|r| r >= self.test_from_run)
    }
}

/// Static, immutable description of one dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetSpec {
    /// Canonical dataset name, also the cache sub-directory.
    pub name: &'static str,
    /// Output directory name under the output root.
    pub output_dir: &'static str,
    /// Inclusive `(first, last)` subject ids.
    pub subjects: (u32, u32),
    /// Event name → label code. Codes are unique within a spec.
    pub event_vocabulary: &'static [(&'static str, i32)],
    /// Annotation description → raw event code.
    pub annotation_codes: &'static [(&'static str, i32)],
    pub relabel: Option<RelabelRule>,
    pub window: WindowRule,
    pub channels: ChannelSelection,
    /// Whether output names carry a `session_{s}_` component.
    pub include_session: bool,
    pub split: Option<SplitRule>,
    /// Free-form descriptive metadata copied into every sidecar.
    pub tags: &'static [(&'static str, &'static str)],
}

impl DatasetSpec {
    pub fn subject_ids(&self) -> RangeInclusive<u32> {
        self.subjects.0..=self.subjects.1
    }

    /// Label code of an event name.
    pub fn label_of(&self, name: &str) -> Option<i32> {
        self.event_vocabulary
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, code)| code)
    }

    /// Raw code of an annotation description.
    pub fn annotation_code(&self, description: &str) -> Option<i32> {
        self.annotation_codes
            .iter()
            .find(|(d, _)| *d == description)
            .map(|&(_, code)| code)
    }
}

// ── Parameter tables ──────────────────────────────────────────────────────

const BNCI2014_001_EVENTS: &[(&str, i32)] =
    &[("left_hand", 1), ("right_hand", 2), ("feet", 3), ("tongue", 4)];

pub static BNCI2014_001: DatasetSpec = DatasetSpec {
    name: "BNCI2014_001",
    output_dir: "data_bnci2014_001",
    subjects: (1, 9),
    event_vocabulary: BNCI2014_001_EVENTS,
    annotation_codes: BNCI2014_001_EVENTS,
    relabel: None,
    window: WindowRule::EventRelative { tmin: 2.0, tmax: 6.0 },
    channels: ChannelSelection::EegOnly,
    include_session: true,
    split: None,
    tags: &[
        ("trial_duration", "4 seconds (2-6s)"),
        ("rest_period", "2-3 seconds"),
    ],
};

const BNCI2014_002_EVENTS: &[(&str, i32)] = &[("right_hand", 1), ("feet", 2)];

pub static BNCI2014_002: DatasetSpec = DatasetSpec {
    name: "BNCI2014_002",
    output_dir: "data_bnci2014_002",
    subjects: (1, 14),
    event_vocabulary: BNCI2014_002_EVENTS,
    annotation_codes: BNCI2014_002_EVENTS,
    relabel: None,
    window: WindowRule::EventRelative { tmin: 3.0, tmax: 8.0 },
    channels: ChannelSelection::EegOnly,
    include_session: true,
    split: None,
    tags: &[
        ("nominal_sampling_rate", "512 Hz"),
        ("electrode_layout", "15 electrodes (3 Laplacian derivations at C3, Cz, C4)"),
        ("reference", "left mastoid"),
        ("ground", "right mastoid"),
        ("trial_duration", "5 seconds (3s-8s)"),
        ("rest_period", "2-3 seconds"),
    ],
};

const LEE2019_MI_EVENTS: &[(&str, i32)] = &[("left_hand", 1), ("right_hand", 2)];

pub static LEE2019_MI: DatasetSpec = DatasetSpec {
    name: "Lee2019_MI",
    output_dir: "data_lee2019_mi",
    subjects: (1, 54),
    event_vocabulary: LEE2019_MI_EVENTS,
    annotation_codes: LEE2019_MI_EVENTS,
    relabel: None,
    window: WindowRule::EventRelative { tmin: 3.0, tmax: 7.0 },
    channels: ChannelSelection::All,
    include_session: true,
    split: None,
    tags: &[
        ("nominal_sampling_rate", "1000 Hz"),
        ("electrode_layout", "62 Ag/AgCl electrodes"),
        ("reference", "nasion"),
        ("ground", "AFz"),
        ("trial_duration", "4 seconds (3s-7s)"),
        ("rest_period", "6 seconds (±1.5s)"),
    ],
};

pub static PHYSIONET_MI: DatasetSpec = DatasetSpec {
    name: "PhysionetMI",
    output_dir: "data_physionet_mi",
    subjects: (1, 109),
    event_vocabulary: &[
        ("rest", 1),
        ("left_hand", 2),
        ("right_hand", 3),
        ("hands", 4),
        ("feet", 5),
    ],
    annotation_codes: &[("T0", 1), ("T1", 2), ("T2", 3)],
    relabel: Some(RelabelRule {
        classes: &[
            RunClass { name: "baseline", runs: &[1, 2], codes: &[(1, "rest")] },
            RunClass {
                name: "hand",
                runs: &[3, 4, 7, 8, 11, 12],
                codes: &[(2, "left_hand"), (3, "right_hand")],
            },
            RunClass {
                name: "feet",
                runs: &[5, 6, 9, 10, 13, 14],
                codes: &[(2, "hands"), (3, "feet")],
            },
        ],
        imagined_runs: &[4, 6, 8, 10, 12, 14],
    }),
    window: WindowRule::WholeRun {
        baseline_runs: &[1, 2],
        baseline_secs: 60.0,
        task_secs: 120.0,
    },
    channels: ChannelSelection::EegOnly,
    include_session: true,
    split: None,
    tags: &[("rest_period", "3-4 seconds")],
};

const SCHIRRMEISTER2017_EVENTS: &[(&str, i32)] =
    &[("right_hand", 1), ("left_hand", 2), ("rest", 3), ("feet", 4)];

pub static SCHIRRMEISTER2017: DatasetSpec = DatasetSpec {
    name: "Schirrmeister2017",
    output_dir: "data_high_gamma",
    subjects: (1, 14),
    event_vocabulary: SCHIRRMEISTER2017_EVENTS,
    annotation_codes: SCHIRRMEISTER2017_EVENTS,
    relabel: None,
    window: WindowRule::EventRelative { tmin: 0.0, tmax: 4.0 },
    channels: ChannelSelection::EegOnly,
    include_session: false,
    split: Some(SplitRule { test_from_run: 12 }),
    tags: &[
        ("trial_duration", "4 seconds (0s-4s)"),
        ("rest_period", "3-4 seconds"),
    ],
};

static ALL: [&DatasetSpec; 5] = [
    &BNCI2014_001,
    &BNCI2014_002,
    &LEE2019_MI,
    &PHYSIONET_MI,
    &SCHIRRMEISTER2017,
];

/// Every registered dataset, in the order the driver processes them.
pub fn all() -> &'static [&'static DatasetSpec] {
    &ALL
}

/// Look a dataset up by name (case-insensitive).
pub fn lookup(name: &str) -> Result<&'static DatasetSpec, ConfigurationError> {
    ALL.iter()
        .copied()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigurationError::UnknownDataset {
            name: name.to_string(),
            known: ALL.iter().map(|s| s.name).collect::<Vec<_>>().join(", "),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("physionetmi").unwrap().name, "PhysionetMI");
        assert_eq!(lookup("BNCI2014_002").unwrap().subjects, (1, 14));
    }

    #[test]
    fn unknown_dataset_is_configuration_error() {
        let err = lookup("Cho2017").unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownDataset { ref name, .. } if name == "Cho2017"));
        assert!(err.to_string().contains("Schirrmeister2017"));
    }

    #[test]
    fn vocabulary_codes_are_unique() {
        for spec in all() {
            let codes: HashSet<i32> = spec.event_vocabulary.iter().map(|&(_, c)| c).collect();
            assert_eq!(codes.len(), spec.event_vocabulary.len(), "{}", spec.name);
        }
    }

    #[test]
    fn relabeled_names_are_in_vocabulary() {
        let rule = PHYSIONET_MI.relabel.unwrap();
        for class in rule.classes {
            for &(_, name) in class.codes {
                assert!(PHYSIONET_MI.label_of(name).is_some(), "{name}");
            }
        }
    }

    #[test]
    fn physionet_run_classes() {
        let rule = PHYSIONET_MI.relabel.unwrap();
        assert_eq!(rule.classify(4).unwrap().name, "hand");
        assert_eq!(rule.classify(6).unwrap().name, "feet");
        assert_eq!(rule.classify(1).unwrap().name, "baseline");
        assert!(rule.classify(15).is_none());
        assert_eq!(rule.task_type(4), "imagined");
        assert_eq!(rule.task_type(3), "executed");
    }

    #[test]
    fn whole_run_window_keyed_by_run() {
        assert_eq!(PHYSIONET_MI.window.bounds(Some(1)), (0.0, 60.0));
        assert_eq!(PHYSIONET_MI.window.bounds(Some(4)), (0.0, 120.0));
        assert_eq!(PHYSIONET_MI.window.describe(Some(2)), "60 seconds (0s-60s)");
        assert_eq!(BNCI2014_001.window.describe(None), "4 seconds (2s-6s)");
    }

    #[test]
    fn split_cutoff() {
        let split = SCHIRRMEISTER2017.split.unwrap();
        assert!(split.is_test(Some(12)));
        assert!(split.is_test(Some(13)));
        assert!(!split.is_test(Some(5)));
        assert!(!split.is_test(None));
    }
}
