//! Probability model collaborator.
//!
//! The service only depends on [`Scorer`]. [`LogisticScorer`] evaluates a standardised logistic
//! regression exported to JSON, optionally followed by an isotonic calibration curve.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::domain::{ClinicalFeatures, FeatureName, UnknownFeature};

pub const DEFAULT_MODEL_NAME: &str = "best_calibrated";

/// Identity and decision threshold of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub version: String,
    pub threshold: f64,
}

impl ModelDescriptor {
    pub fn label(&self, probability: f64) -> bool {
        probability >= self.threshold
    }
}

/// Produces a positive-class probability for a complete measurement set.
pub trait Scorer: Send + Sync {
    fn score(&self, features: &ClinicalFeatures) -> Result<f64, ScoringError>;
    fn descriptor(&self) -> &ModelDescriptor;
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("model artifact unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("model artifact is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
    #[error(transparent)]
    UnknownFeature(#[from] UnknownFeature),
    #[error("model artifact inconsistent: {0}")]
    Inconsistent(String),
    #[error("model produced a non-finite score")]
    NonFinite,
}

/// On-disk shape of the exported model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    pub feature_order: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub scaler_mean: Vec<f64>,
    pub scaler_std: Vec<f64>,
    #[serde(default)]
    pub calibration: Option<CalibrationCurve>,
}

/// Monotone breakpoints mapping raw probability to calibrated probability.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalibrationCurve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl CalibrationCurve {
    fn validate(&self) -> Result<(), ScoringError> {
        if self.x.len() != self.y.len() || self.x.len() < 2 {
            return Err(ScoringError::Inconsistent(
                "calibration needs at least two matching x/y breakpoints".to_string(),
            ));
        }
        if self.x.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(ScoringError::Inconsistent(
                "calibration breakpoints must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    /// Piecewise-linear interpolation, flat beyond the outer breakpoints.
    fn apply(&self, raw: f64) -> f64 {
        let last = self.x.len() - 1;
        if raw <= self.x[0] {
            return self.y[0];
        }
        if raw >= self.x[last] {
            return self.y[last];
        }
        let upper = self.x.partition_point(|&x| x < raw);
        let (x0, x1) = (self.x[upper - 1], self.x[upper]);
        let (y0, y1) = (self.y[upper - 1], self.y[upper]);
        y0 + (raw - x0) * (y1 - y0) / (x1 - x0)
    }
}

#[derive(Debug, Clone)]
struct Term {
    feature: FeatureName,
    mean: f64,
    std: f64,
    coefficient: f64,
}

/// Standardised logistic regression with optional calibration.
#[derive(Debug, Clone)]
pub struct LogisticScorer {
    descriptor: ModelDescriptor,
    intercept: f64,
    terms: Vec<Term>,
    calibration: Option<CalibrationCurve>,
}

impl LogisticScorer {
    pub fn from_path(
        path: impl AsRef<Path>,
        version: &str,
        default_threshold: f64,
    ) -> Result<Self, ScoringError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), version, default_threshold)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        version: &str,
        default_threshold: f64,
    ) -> Result<Self, ScoringError> {
        let artifact: ModelArtifact = serde_json::from_reader(reader)?;
        Self::from_artifact(artifact, version, default_threshold)
    }

    pub fn from_artifact(
        artifact: ModelArtifact,
        version: &str,
        default_threshold: f64,
    ) -> Result<Self, ScoringError> {
        let width = artifact.feature_order.len();
        if artifact.coefficients.len() != width
            || artifact.scaler_mean.len() != width
            || artifact.scaler_std.len() != width
        {
            return Err(ScoringError::Inconsistent(format!(
                "expected {width} coefficients and scaler entries"
            )));
        }

        let mut terms = Vec::with_capacity(width);
        for (index, name) in artifact.feature_order.iter().enumerate() {
            let feature: FeatureName = name.parse()?;
            let std = artifact.scaler_std[index];
            if !std.is_finite() || std <= 0.0 {
                return Err(ScoringError::Inconsistent(format!(
                    "scaler std for '{feature}' must be positive"
                )));
            }
            terms.push(Term {
                feature,
                mean: artifact.scaler_mean[index],
                std,
                coefficient: artifact.coefficients[index],
            });
        }

        if let Some(curve) = &artifact.calibration {
            curve.validate()?;
        }

        let descriptor = ModelDescriptor {
            name: artifact
                .model_name
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            version: version.to_string(),
            threshold: artifact.threshold.unwrap_or(default_threshold),
        };

        Ok(Self {
            descriptor,
            intercept: artifact.intercept,
            terms,
            calibration: artifact.calibration,
        })
    }
}

impl Scorer for LogisticScorer {
    fn score(&self, features: &ClinicalFeatures) -> Result<f64, ScoringError> {
        let logit = self.terms.iter().fold(self.intercept, |acc, term| {
            let standardised = (features.value(term.feature) - term.mean) / term.std;
            acc + term.coefficient * standardised
        });

        let raw = sigmoid(logit);
        let probability = match &self.calibration {
            Some(curve) => curve.apply(raw),
            None => raw,
        };

        if probability.is_finite() {
            Ok(probability.clamp(0.0, 1.0))
        } else {
            Err(ScoringError::NonFinite)
        }
    }

    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }
}

fn sigmoid(logit: f64) -> f64 {
    1.0 / (1.0 + (-logit).exp())
}
