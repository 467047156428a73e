pub mod artifact;

use crate::analysis::scale::clamp_kp;
use crate::core::features::{FeatureTable, MODEL_FEATURE_COLUMNS};
use crate::error::PipelineError;
use std::sync::Arc;
use tracing::debug;

/// Divisor applied to the raw regressor output when the artifact does not say otherwise.
pub const DEFAULT_OUTPUT_SCALE: f64 = 10.0;

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Fitted feature scaler. Read-only after load.
pub trait FeatureScaler: Send + Sync {
    /// Width of the flattened input vector the scaler was fitted on.
    fn n_features_in(&self) -> usize;
    fn transform(&self, row: &[f64]) -> Vec<f64>;
}

/// Fitted regressor producing one raw Kp estimate per input row.
pub trait KpRegressor: Send + Sync {
    fn predict(&self, rows: &[Vec<f64>]) -> anyhow::Result<Vec<f64>>;
}

// ============================================================================
// PREDICTION ADAPTER
// ============================================================================

#[derive(Clone)]
pub struct ForecastModel {
    pub scaler: Arc<dyn FeatureScaler>,
    pub regressor: Arc<dyn KpRegressor>,
    pub output_scale: f64,
}

impl std::fmt::Debug for ForecastModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastModel")
            .field("n_features_in", &self.scaler.n_features_in())
            .field("output_scale", &self.output_scale)
            .finish()
    }
}

impl ForecastModel {
    pub fn new(scaler: Arc<dyn FeatureScaler>, regressor: Arc<dyn KpRegressor>) -> Self {
        Self { scaler, regressor, output_scale: DEFAULT_OUTPUT_SCALE }
    }

    pub fn with_output_scale(mut self, output_scale: f64) -> Self {
        self.output_scale = output_scale;
        self
    }

    /// Point estimate of the next Kp from the last `look_back` feature rows.
    pub fn predict_kp(&self, features: &FeatureTable, look_back: usize) -> Result<f64, PipelineError> {
        let input = prepare_prediction_input(features, look_back, self.scaler.as_ref())?;

        let output = self.regressor
            .predict(&[input])
            .map_err(|e| PipelineError::Model(e.to_string()))?;

        let raw = output.first()
            .copied()
            .ok_or_else(|| PipelineError::Model("regressor returned no prediction".to_string()))?;
        if !raw.is_finite() {
            return Err(PipelineError::Model(format!("regressor returned non-finite value {}", raw)));
        }

        let kp = clamp_kp(raw / self.output_scale);
        debug!("Raw model output {:.4} -> Kp {:.3}", raw, kp);
        Ok(kp)
    }
}

/// Flatten the last `look_back` rows of the model columns and scale them.
/// The width must match the scaler exactly; nothing is padded or truncated.
pub fn prepare_prediction_input(
    features: &FeatureTable,
    look_back: usize,
    scaler: &dyn FeatureScaler,
) -> Result<Vec<f64>, PipelineError> {
    // 1. Enough history?
    if features.len() < look_back {
        return Err(PipelineError::InsufficientHistory { required: look_back, actual: features.len() });
    }

    // 2. Flatten row-major
    let flat = features.flatten_tail(&MODEL_FEATURE_COLUMNS, look_back);

    // 3. Width check before anything touches the scaler
    let expected = scaler.n_features_in();
    if flat.len() != expected {
        return Err(PipelineError::FeatureShapeMismatch { expected, actual: flat.len() });
    }

    // 4. Scale
    Ok(scaler.transform(&flat))
}
