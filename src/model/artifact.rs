//! Fitted scaler and linear regressor stored as JSON next to the binary.
//!
//! Scaler: `{"mean": [..], "scale": [..]}`.
//! Model: `{"coefficients": [..], "intercept": 0.0, "output_scale": 10.0}`.

use super::{FeatureScaler, ForecastModel, KpRegressor, DEFAULT_OUTPUT_SCALE};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn validate(&self) -> Result<()> {
        if self.mean.is_empty() {
            return Err(anyhow!("Scaler has no features"));
        }
        if self.mean.len() != self.scale.len() {
            return Err(anyhow!("Scaler mean/scale length mismatch: {} vs {}", self.mean.len(), self.scale.len()));
        }
        Ok(())
    }
}

impl FeatureScaler for StandardScaler {
    fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| {
                // constant features were fitted with zero variance
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / s
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearRegressor {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub output_scale: Option<f64>,
}

impl KpRegressor for LinearRegressor {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.coefficients.len() {
                    return Err(anyhow!("Expected {} inputs, got {}", self.coefficients.len(), row.len()));
                }
                let dot: f64 = row.iter().zip(&self.coefficients).map(|(x, w)| x * w).sum();
                Ok(dot + self.intercept)
            })
            .collect()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))
}

/// Load both artifacts and check they agree on the input width.
pub fn load_model(model_path: &Path, scaler_path: &Path) -> Result<ForecastModel> {
    let scaler: StandardScaler = read_json(scaler_path)?;
    scaler.validate()?;

    let regressor: LinearRegressor = read_json(model_path)?;
    if regressor.coefficients.len() != scaler.n_features_in() {
        return Err(anyhow!(
            "Model expects {} inputs but scaler produces {}",
            regressor.coefficients.len(),
            scaler.n_features_in()
        ));
    }

    let output_scale = regressor.output_scale.unwrap_or(DEFAULT_OUTPUT_SCALE);
    if !output_scale.is_finite() || output_scale == 0.0 {
        return Err(anyhow!("Invalid output_scale {}", output_scale));
    }

    info!(
        "Loaded forecasting model ({} inputs, output scale {}) from {}",
        scaler.n_features_in(),
        output_scale,
        model_path.display()
    );

    Ok(ForecastModel::new(Arc::new(scaler), Arc::new(regressor)).with_output_scale(output_scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn write_tmp(name: &str, value: serde_json::Value) -> PathBuf {
        let path = std::env::temp_dir().join(format!("kp_artifact_{}_{}.json", std::process::id(), name));
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_scaler_standardises_and_guards_zero_scale() {
        let scaler: StandardScaler = serde_json::from_value(json!({ "mean": [1.0, 2.0], "scale": [2.0, 0.0] })).unwrap();
        assert_eq!(scaler.n_features_in(), 2);
        assert_eq!(scaler.transform(&[5.0, 7.0]), vec![2.0, 5.0]);
    }

    #[test]
    fn test_linear_regressor_predicts_per_row() {
        let model: LinearRegressor = serde_json::from_value(json!({ "coefficients": [1.0, -1.0], "intercept": 3.0 })).unwrap();
        assert_eq!(model.output_scale, None);
        assert_eq!(model.predict(&[vec![4.0, 1.0], vec![0.0, 0.0]]).unwrap(), vec![6.0, 3.0]);
        assert!(model.predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_load_model_from_disk() {
        let scaler = write_tmp("scaler_ok", json!({ "mean": [0.0, 0.0, 0.0], "scale": [1.0, 1.0, 1.0] }));
        let model = write_tmp("model_ok", json!({ "coefficients": [0.5, 0.5, 0.5], "intercept": 1.0, "output_scale": 2.0 }));

        let loaded = load_model(&model, &scaler).unwrap();
        assert_eq!(loaded.scaler.n_features_in(), 3);
        assert_eq!(loaded.output_scale, 2.0);
    }

    #[test]
    fn test_load_model_rejects_width_disagreement() {
        let scaler = write_tmp("scaler_wide", json!({ "mean": [0.0, 0.0], "scale": [1.0, 1.0] }));
        let model = write_tmp("model_narrow", json!({ "coefficients": [1.0], "intercept": 0.0 }));

        let err = load_model(&model, &scaler).unwrap_err();
        assert!(err.to_string().contains("expects 1 inputs"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let missing = std::env::temp_dir().join("kp_artifact_does_not_exist.json");
        assert!(load_model(&missing, &missing).is_err());
    }
}
