use serde::Serialize;

use super::advice::RiskTier;
use super::domain::{ClinicalFeatures, HistoryId, HistoryRecord, UserAccount, UserId};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Account storage so the service can be exercised without a database.
pub trait UserRepository: Send + Sync {
    fn insert(&self, account: UserAccount) -> Result<UserAccount, RepositoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError>;
    fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError>;
}

/// Append-only store of scoring interactions.
pub trait HistoryRepository: Send + Sync {
    fn append(&self, record: HistoryRecord) -> Result<HistoryRecord, RepositoryError>;
    /// Most recent first, at most `limit` records.
    fn for_user(&self, user_id: &UserId, limit: usize)
        -> Result<Vec<HistoryRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Public projection of a history record returned by the history endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntryView {
    pub id: HistoryId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub model_name: String,
    pub model_version: String,
    pub probability: f64,
    pub label: bool,
    pub risk_tier: RiskTier,
    pub features: ClinicalFeatures,
    pub top_features: Vec<String>,
    pub recommendations: Vec<String>,
}

impl From<HistoryRecord> for HistoryEntryView {
    fn from(record: HistoryRecord) -> Self {
        Self {
            id: record.id,
            timestamp: record.timestamp,
            model_name: record.model_name,
            model_version: record.model_version,
            probability: record.probability,
            label: record.label,
            risk_tier: record.risk_tier,
            features: record.features,
            top_features: record.top_features,
            recommendations: record.recommendations,
        }
    }
}
