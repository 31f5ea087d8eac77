//! Heart-disease risk assessment: the recommendation engine and the service around it.
//!
//! [`advice`] is pure and usable on its own. [`service::AssessmentService`] composes it with
//! account storage, a [`scoring::Scorer`], and the history log, and [`router`] exposes the
//! service over HTTP.

pub mod advice;
pub mod auth;
pub mod batch;
pub mod domain;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use advice::{derive_recommendations, matched_advice, Advice, AdviceGroup, RiskTier};
pub use auth::{AccessToken, AuthError, TokenIssuer};
pub use batch::{BatchError, BatchRow};
pub use domain::{
    ClinicalFeatures, FeatureName, FeatureVector, FieldViolation, HistoryId, HistoryRecord,
    UserAccount, UserId,
};
pub use repository::{
    HistoryEntryView, HistoryRepository, RepositoryError, UserRepository, DEFAULT_HISTORY_LIMIT,
};
pub use router::assessment_router;
pub use scoring::{LogisticScorer, ModelDescriptor, Scorer, ScoringError};
pub use service::{
    preview_recommendations, AssessmentOutcome, AssessmentService, AssessmentServiceError,
    PredictRequest, RecommendationOutcome, RecommendationRequest,
};
pub use sqlite::SqliteStore;
