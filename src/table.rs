//! The per-unit output table and its metadata side channel.
//!
//! Column layout: `time, epoch, <channels…>, condition, label[, is_test]`.
//! `label` always follows `condition` directly.
use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{ensure, Result};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Metadata persisted next to each table (JSON sidecar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub dataset: String,
    pub subject: u32,
    pub session: String,
    pub run: String,
    /// Measured sampling rate (Hz).
    pub sampling_rate: f32,
    /// Measured channel names, in column order.
    pub electrodes: Vec<String>,
    pub reference: String,
    pub n_trials: usize,
    /// Event name → label code actually used in this table.
    pub labels: BTreeMap<String, i32>,
    pub columns: Vec<String>,
    /// Dataset-specific attributes and static tags.
    #[serde(flatten)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

/// Long-format trial table: one row per (trial, sample).
#[derive(Debug, Clone)]
pub struct TrialTable {
    pub channels: Vec<String>,
    pub time: Vec<f64>,
    pub epoch: Vec<usize>,
    /// Row-major `[rows, channels]`.
    pub values: Vec<f32>,
    pub condition: Vec<&'static str>,
    pub label: Vec<i32>,
    /// Train/test flag; `None` for datasets without a fixed split.
    pub is_test: Option<bool>,
    pub meta: TableMetadata,
}

impl TrialTable {
    pub fn new(channels: Vec<String>, is_test: Option<bool>, meta: TableMetadata) -> Self {
        Self {
            channels,
            time: Vec::new(),
            epoch: Vec::new(),
            values: Vec::new(),
            condition: Vec::new(),
            label: Vec::new(),
            is_test,
            meta,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.time.len()
    }

    /// Number of distinct trials.
    pub fn n_trials(&self) -> usize {
        self.epoch.last().map_or(0, |&e| e + 1)
    }

    /// Append one trial.
    ///
    /// `data` is `[C, L]`; `times[i]` is the time of column `i`; every value
    /// is multiplied by `scales[c]` of its channel.
    pub fn push_trial(
        &mut self,
        epoch: usize,
        times: impl IntoIterator<Item = f64>,
        data: ArrayView2<f32>,
        scales: &[f32],
        condition: &'static str,
        label: i32,
    ) {
        for (col, t) in data.columns().into_iter().zip(times) {
            self.time.push(t);
            self.epoch.push(epoch);
            self.values.extend(col.iter().zip(scales).map(|(&v, &s)| v * s));
            self.condition.push(condition);
            self.label.push(label);
        }
    }

    /// Header row.
    pub fn columns(&self) -> Vec<String> {
        let mut cols = Vec::with_capacity(self.channels.len() + 5);
        cols.push("time".to_string());
        cols.push("epoch".to_string());
        cols.extend(self.channels.iter().cloned());
        cols.push("condition".to_string());
        cols.push("label".to_string());
        if self.is_test.is_some() {
            cols.push("is_test".to_string());
        }
        cols
    }

    /// Serialize as CSV.
    pub fn write_csv<W: Write>(&self, w: W) -> Result<()> {
        let n_ch = self.channels.len();
        ensure!(self.values.len() == self.n_rows() * n_ch, "ragged trial table");

        let mut writer = csv::Writer::from_writer(w);
        writer.write_record(self.columns())?;

        let mut record: Vec<String> = Vec::with_capacity(n_ch + 5);
        for row in 0..self.n_rows() {
            record.clear();
            record.push(self.time[row].to_string());
            record.push(self.epoch[row].to_string());
            record.extend(self.values[row * n_ch..(row + 1) * n_ch].iter().map(f32::to_string));
            record.push(self.condition[row].to_string());
            record.push(self.label[row].to_string());
            if let Some(is_test) = self.is_test {
                record.push(if is_test { "True" } else { "False" }.to_string());
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}
