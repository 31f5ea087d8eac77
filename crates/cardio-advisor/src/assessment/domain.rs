use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::advice::RiskTier;

/// The 13 measurements of the Cleveland heart-disease feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureName {
    Age,
    Sex,
    Cp,
    Trestbps,
    Chol,
    Fbs,
    Restecg,
    Thalach,
    Exang,
    Oldpeak,
    Slope,
    Ca,
    Thal,
}

impl FeatureName {
    pub const ALL: [FeatureName; 13] = [
        FeatureName::Age,
        FeatureName::Sex,
        FeatureName::Cp,
        FeatureName::Trestbps,
        FeatureName::Chol,
        FeatureName::Fbs,
        FeatureName::Restecg,
        FeatureName::Thalach,
        FeatureName::Exang,
        FeatureName::Oldpeak,
        FeatureName::Slope,
        FeatureName::Ca,
        FeatureName::Thal,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            FeatureName::Age => "age",
            FeatureName::Sex => "sex",
            FeatureName::Cp => "cp",
            FeatureName::Trestbps => "trestbps",
            FeatureName::Chol => "chol",
            FeatureName::Fbs => "fbs",
            FeatureName::Restecg => "restecg",
            FeatureName::Thalach => "thalach",
            FeatureName::Exang => "exang",
            FeatureName::Oldpeak => "oldpeak",
            FeatureName::Slope => "slope",
            FeatureName::Ca => "ca",
            FeatureName::Thal => "thal",
        }
    }

    /// Inclusive bounds accepted at the request boundary.
    const fn bounds(self) -> (f64, f64) {
        match self {
            FeatureName::Age => (1.0, 120.0),
            FeatureName::Sex | FeatureName::Fbs | FeatureName::Exang => (0.0, 1.0),
            FeatureName::Cp | FeatureName::Ca => (0.0, 3.0),
            FeatureName::Trestbps => (60.0, 300.0),
            FeatureName::Chol => (50.0, 800.0),
            FeatureName::Restecg | FeatureName::Slope => (0.0, 2.0),
            FeatureName::Thalach => (50.0, 250.0),
            FeatureName::Oldpeak => (0.0, 10.0),
            FeatureName::Thal => (0.0, 7.0),
        }
    }

    const fn is_integral(self) -> bool {
        !matches!(self, FeatureName::Oldpeak)
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature name '{0}'")]
pub struct UnknownFeature(pub String);

impl FromStr for FeatureName {
    type Err = UnknownFeature;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim();
        FeatureName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownFeature(value.to_string()))
    }
}

/// Measurements consumed by the recommendation rules.
///
/// Every field may be absent. A rule whose field is missing simply does not fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub age: Option<f64>,
    pub sex: Option<f64>,
    pub cp: Option<f64>,
    pub trestbps: Option<f64>,
    pub chol: Option<f64>,
    pub fbs: Option<f64>,
    pub restecg: Option<f64>,
    pub thalach: Option<f64>,
    pub exang: Option<f64>,
    pub oldpeak: Option<f64>,
    pub slope: Option<f64>,
    pub ca: Option<f64>,
    pub thal: Option<f64>,
}

impl FeatureVector {
    pub fn get(&self, name: FeatureName) -> Option<f64> {
        match name {
            FeatureName::Age => self.age,
            FeatureName::Sex => self.sex,
            FeatureName::Cp => self.cp,
            FeatureName::Trestbps => self.trestbps,
            FeatureName::Chol => self.chol,
            FeatureName::Fbs => self.fbs,
            FeatureName::Restecg => self.restecg,
            FeatureName::Thalach => self.thalach,
            FeatureName::Exang => self.exang,
            FeatureName::Oldpeak => self.oldpeak,
            FeatureName::Slope => self.slope,
            FeatureName::Ca => self.ca,
            FeatureName::Thal => self.thal,
        }
    }

    pub fn set(&mut self, name: FeatureName, value: Option<f64>) {
        let slot = match name {
            FeatureName::Age => &mut self.age,
            FeatureName::Sex => &mut self.sex,
            FeatureName::Cp => &mut self.cp,
            FeatureName::Trestbps => &mut self.trestbps,
            FeatureName::Chol => &mut self.chol,
            FeatureName::Fbs => &mut self.fbs,
            FeatureName::Restecg => &mut self.restecg,
            FeatureName::Thalach => &mut self.thalach,
            FeatureName::Exang => &mut self.exang,
            FeatureName::Oldpeak => &mut self.oldpeak,
            FeatureName::Slope => &mut self.slope,
            FeatureName::Ca => &mut self.ca,
            FeatureName::Thal => &mut self.thal,
        };
        *slot = value;
    }

    pub fn with(mut self, name: FeatureName, value: f64) -> Self {
        self.set(name, Some(value));
        self
    }

    /// Returns the complete measurement set when every field is present.
    pub fn complete(&self) -> Option<ClinicalFeatures> {
        Some(ClinicalFeatures {
            age: self.age?,
            sex: self.sex?,
            cp: self.cp?,
            trestbps: self.trestbps?,
            chol: self.chol?,
            fbs: self.fbs?,
            restecg: self.restecg?,
            thalach: self.thalach?,
            exang: self.exang?,
            oldpeak: self.oldpeak?,
            slope: self.slope?,
            ca: self.ca?,
            thal: self.thal?,
        })
    }
}

/// Complete measurement set accepted by the scoring endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClinicalFeatures {
    pub age: f64,
    pub sex: f64,
    pub cp: f64,
    pub trestbps: f64,
    pub chol: f64,
    pub fbs: f64,
    pub restecg: f64,
    pub thalach: f64,
    pub exang: f64,
    pub oldpeak: f64,
    pub slope: f64,
    pub ca: f64,
    pub thal: f64,
}

impl ClinicalFeatures {
    pub fn value(&self, name: FeatureName) -> f64 {
        match name {
            FeatureName::Age => self.age,
            FeatureName::Sex => self.sex,
            FeatureName::Cp => self.cp,
            FeatureName::Trestbps => self.trestbps,
            FeatureName::Chol => self.chol,
            FeatureName::Fbs => self.fbs,
            FeatureName::Restecg => self.restecg,
            FeatureName::Thalach => self.thalach,
            FeatureName::Exang => self.exang,
            FeatureName::Oldpeak => self.oldpeak,
            FeatureName::Slope => self.slope,
            FeatureName::Ca => self.ca,
            FeatureName::Thal => self.thal,
        }
    }

    pub fn to_feature_vector(&self) -> FeatureVector {
        FeatureName::ALL
            .into_iter()
            .fold(FeatureVector::default(), |vector, name| {
                vector.with(name, self.value(name))
            })
    }

    /// Checks every field against its accepted range, collecting all violations.
    pub fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let violations: Vec<FieldViolation> = FeatureName::ALL
            .into_iter()
            .filter_map(|name| check_field(name, self.value(name)))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn check_field(name: FeatureName, value: f64) -> Option<FieldViolation> {
    let (min, max) = name.bounds();
    if !value.is_finite() || value < min || value > max {
        return Some(FieldViolation {
            field: name,
            message: format!("{value} outside accepted range [{min}, {max}]"),
        });
    }
    if name.is_integral() && value.fract() != 0.0 {
        return Some(FieldViolation {
            field: name,
            message: format!("{value} must be a whole number"),
        });
    }
    None
}

/// A single failed range check on the request schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    pub field: FeatureName,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(pub Uuid);

impl HistoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HistoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registered account. The password is only ever held as an Argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Auditable record of one scoring request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub model_name: String,
    pub model_version: String,
    pub probability: f64,
    pub label: bool,
    pub risk_tier: RiskTier,
    pub features: ClinicalFeatures,
    pub top_features: Vec<String>,
    pub recommendations: Vec<String>,
}
