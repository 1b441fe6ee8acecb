//! Versioned estimation result record.
//!
//! The record is immutable once built and carries everything needed to
//! interpret a finished run: fitted kernels in both fit space and original
//! units, per-signal fit statistics, and the full parameter echo. Loading
//! probes the format version first and fails with
//! [`RecordError::VersionMismatch`](crate::errors::RecordError) before any
//! field of an incompatible record is interpreted.

use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BoostConfig;
use crate::errors::{EbResult, RecordError};

/// Current record format version.
pub const RECORD_VERSION: u32 = 1;

/// Result of one boosting estimation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostRecord {
    /// Record format version, checked on load.
    pub version: u32,
    pub id: Uuid,
    pub created_at: DateTime<Utc>,

    /// Fitted kernels in fit space, one (predictor × lag) matrix per
    /// response signal.
    pub kernels: Vec<Array2<f64>>,

    /// Kernels rescaled to original signal units. Equal to `kernels` when
    /// the run did not scale its data.
    pub kernels_scaled: Vec<Array2<f64>>,

    /// Pearson correlation between observed and predicted response.
    pub pearson_r: Array1<f64>,

    /// Spearman rank correlation between observed and predicted response.
    pub spearman_r: Array1<f64>,

    /// Error-norm value between observed and predicted response.
    pub fit_error: Array1<f64>,

    /// Signals whose search never beat the zero kernel, or whose fit
    /// statistics were non-finite and reported as zero.
    pub degenerate: Vec<bool>,

    /// Wall-clock duration of the run in seconds.
    pub run_time_seconds: f64,

    // echoed run parameters
    pub tstart: f64,
    pub tstop: f64,
    pub tstep: f64,
    pub config: BoostConfig,

    // scaling statistics from the run
    pub y_mean: Array1<f64>,
    pub y_scale: Array1<f64>,
    pub x_mean: Array1<f64>,
    pub x_scale: Array1<f64>,
}

#[derive(Deserialize)]
struct RecordVersionProbe {
    version: u32,
}

impl BoostRecord {
    pub fn n_signals(&self) -> usize {
        self.kernels.len()
    }

    /// Writes the record as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> EbResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads a record, failing on an incompatible format version.
    pub fn load<P: AsRef<Path>>(path: P) -> EbResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let probe: RecordVersionProbe = serde_json::from_str(&json)?;
        if probe.version != RECORD_VERSION {
            return Err(RecordError::VersionMismatch {
                found: probe.version,
                supported: RECORD_VERSION,
            }
            .into());
        }
        let record = serde_json::from_str(&json)?;
        Ok(record)
    }
}

/// Maps a fit-space kernel back to original signal units.
///
/// Each row j is multiplied by `y_scale / x_scale[j]`, undoing the row-wise
/// normalization applied before fitting.
pub fn rescale_kernel(kernel: &Array2<f64>, y_scale: f64, x_scale: &Array1<f64>) -> Array2<f64> {
    let mut scaled = kernel.clone();
    for (j, mut row) in scaled.outer_iter_mut().enumerate() {
        let factor = y_scale / x_scale[j];
        row.mapv_inplace(|v| v * factor);
    }
    scaled
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_record() -> BoostRecord {
        let kernel = array![[0.0, 0.5, 0.0], [0.25, 0.0, -0.25]];
        BoostRecord {
            version: RECORD_VERSION,
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            kernels: vec![kernel.clone()],
            kernels_scaled: vec![kernel],
            pearson_r: array![0.9],
            spearman_r: array![0.85],
            fit_error: array![12.5],
            degenerate: vec![false],
            run_time_seconds: 1.5,
            tstart: 0.0,
            tstop: 0.03,
            tstep: 0.01,
            config: BoostConfig::default(),
            y_mean: array![0.1],
            y_scale: array![2.0],
            x_mean: array![0.0, 0.0],
            x_scale: array![1.0, 4.0],
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");

        let record = sample_record();
        record.save(&path).unwrap();
        let loaded = BoostRecord::load(&path).unwrap();

        assert_eq!(loaded.version, RECORD_VERSION);
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.kernels, record.kernels);
        assert_eq!(loaded.pearson_r, record.pearson_r);
        assert_eq!(loaded.config, record.config);
    }

    #[test]
    fn test_load_rejects_unsupported_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");

        let record = sample_record();
        let mut value = serde_json::to_value(&record).unwrap();
        value["version"] = serde_json::json!(99);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let err = BoostRecord::load(&path).unwrap_err();
        match err {
            crate::errors::EbError::Record(RecordError::VersionMismatch { found, supported }) => {
                assert_eq!(found, 99);
                assert_eq!(supported, RECORD_VERSION);
            }
            other => panic!("Expected version mismatch, got {other}"),
        }
    }

    #[test]
    fn test_rescale_kernel_applies_row_factors() {
        let kernel = array![[1.0, 2.0], [3.0, 4.0]];
        let scaled = rescale_kernel(&kernel, 2.0, &array![1.0, 4.0]);

        assert_eq!(scaled, array![[2.0, 4.0], [1.5, 2.0]]);
    }
}
