//! CSV intake for offline assessment of many patients.
//!
//! Column headers use the feature names (`age`, `sex`, `cp`, ...). Extra columns such as the
//! dataset's `target` are ignored and empty cells count as absent.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::FeatureVector;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("unable to open batch file: {0}")]
    Io(#[from] std::io::Error),
    #[error("batch row {row} is invalid: {source}")]
    Row {
        row: usize,
        #[source]
        source: csv::Error,
    },
}

/// One parsed CSV line together with its 1-based data row number.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    pub row: usize,
    pub features: FeatureVector,
}

pub fn read_path(path: impl AsRef<Path>) -> Result<Vec<BatchRow>, BatchError> {
    let file = File::open(path)?;
    read_rows(file)
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<BatchRow>, BatchError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for (index, record) in csv_reader.deserialize::<CsvFeatures>().enumerate() {
        let row = index + 1;
        let parsed = record.map_err(|source| BatchError::Row { row, source })?;
        rows.push(BatchRow {
            row,
            features: parsed.into(),
        });
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct CsvFeatures {
    #[serde(default, deserialize_with = "empty_as_none")]
    age: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    sex: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    cp: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    trestbps: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    chol: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    fbs: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    restecg: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    thalach: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    exang: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    oldpeak: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    slope: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    ca: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    thal: Option<f64>,
}

impl From<CsvFeatures> for FeatureVector {
    fn from(row: CsvFeatures) -> Self {
        FeatureVector {
            age: row.age,
            sex: row.sex,
            cp: row.cp,
            trestbps: row.trestbps,
            chol: row.chol,
            fbs: row.fbs,
            restecg: row.restecg,
            thalach: row.thalach,
            exang: row.exang,
            oldpeak: row.oldpeak,
            slope: row.slope,
            ca: row.ca,
            thal: row.thal,
        }
    }
}

// The Cleveland export marks unknown values with `?`, treated like an empty cell.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("?") => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
