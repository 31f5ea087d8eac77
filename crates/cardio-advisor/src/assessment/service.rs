use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::advice::{derive_recommendations, RiskTier};
use super::auth::{
    decoy_hash, hash_password, normalize_email, password_length_ok, verify_password, AccessToken,
    AuthError, TokenIssuer,
};
use super::domain::{
    ClinicalFeatures, FeatureVector, FieldViolation, HistoryId, HistoryRecord, UserAccount, UserId,
};
use super::repository::{
    HistoryEntryView, HistoryRepository, RepositoryError, UserRepository, DEFAULT_HISTORY_LIMIT,
};
use super::scoring::{ModelDescriptor, Scorer, ScoringError};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: ClinicalFeatures,
    #[serde(default)]
    pub top_features: Vec<String>,
}

/// Stateless preview: any subset of features, with or without a probability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub features: FeatureVector,
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub top_features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_tier: Option<RiskTier>,
    pub recommendations: Vec<String>,
}

/// Result of a scored and persisted assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    pub history_id: HistoryId,
    pub probability: f64,
    pub risk_tier: RiskTier,
    pub label: bool,
    pub recommendations: Vec<String>,
    pub model_name: String,
    pub model_version: String,
}

pub fn preview_recommendations(request: &RecommendationRequest) -> RecommendationOutcome {
    let top = (!request.top_features.is_empty()).then_some(request.top_features.as_slice());
    RecommendationOutcome {
        risk_tier: request.probability.map(RiskTier::from_probability),
        recommendations: derive_recommendations(&request.features, request.probability, top),
    }
}

/// Service composing accounts, the scoring model, the recommendation rules, and history.
pub struct AssessmentService<U, H> {
    users: Arc<U>,
    history: Arc<H>,
    scorer: Arc<dyn Scorer>,
    tokens: TokenIssuer,
}

impl<U, H> AssessmentService<U, H>
where
    U: UserRepository + 'static,
    H: HistoryRepository + 'static,
{
    pub fn new(
        users: Arc<U>,
        history: Arc<H>,
        scorer: Arc<dyn Scorer>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            users,
            history,
            scorer,
            tokens,
        }
    }

    pub fn model(&self) -> &ModelDescriptor {
        self.scorer.descriptor()
    }

    /// Create an account and return an access token for it.
    pub fn register(
        &self,
        request: RegisterRequest,
    ) -> Result<AccessToken, AssessmentServiceError> {
        let email = normalize_email(&request.email).ok_or(
            AssessmentServiceError::InvalidRegistration("email address is not valid"),
        )?;
        if !password_length_ok(&request.password) {
            return Err(AssessmentServiceError::InvalidRegistration(
                "password must be between 6 and 256 characters",
            ));
        }
        if self.users.find_by_email(&email)?.is_some() {
            return Err(AssessmentServiceError::EmailTaken);
        }

        let account = UserAccount {
            id: UserId::new(),
            email,
            password_hash: hash_password(&request.password)?,
            name: request
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            created_at: Utc::now(),
        };

        let stored = self.users.insert(account).map_err(|err| match err {
            RepositoryError::Conflict => AssessmentServiceError::EmailTaken,
            other => other.into(),
        })?;
        info!(user_id = %stored.id, "account registered");

        Ok(self.tokens.issue(stored.id, Utc::now())?)
    }

    pub fn login(&self, request: LoginRequest) -> Result<AccessToken, AssessmentServiceError> {
        let account = normalize_email(&request.email)
            .map(|email| self.users.find_by_email(&email))
            .transpose()?
            .flatten();

        let stored_hash = account
            .as_ref()
            .map_or(decoy_hash(), |account| account.password_hash.as_str());
        let verified = verify_password(&request.password, stored_hash);

        match account {
            Some(account) if verified => Ok(self.tokens.issue(account.id, Utc::now())?),
            _ => {
                warn!("rejected login attempt");
                Err(AssessmentServiceError::InvalidCredentials)
            }
        }
    }

    /// Resolve a bearer token to a registered account.
    pub fn authenticate(&self, token: &str) -> Result<UserAccount, AssessmentServiceError> {
        let user_id = self
            .tokens
            .verify(token, Utc::now())
            .map_err(|err| AssessmentServiceError::Unauthenticated(err.to_string()))?;

        self.users
            .find_by_id(&user_id)?
            .ok_or_else(|| AssessmentServiceError::Unauthenticated("user not found".to_string()))
    }

    /// Score the features, derive recommendations, and append the interaction to history.
    pub fn assess(
        &self,
        user: &UserAccount,
        request: PredictRequest,
    ) -> Result<AssessmentOutcome, AssessmentServiceError> {
        let PredictRequest {
            features,
            top_features,
        } = request;
        features
            .validate()
            .map_err(AssessmentServiceError::InvalidFeatures)?;

        let probability = self.scorer.score(&features)?;
        let descriptor = self.scorer.descriptor();
        let label = descriptor.label(probability);
        let risk_tier = RiskTier::from_probability(probability);
        let top = (!top_features.is_empty()).then_some(top_features.as_slice());
        let recommendations =
            derive_recommendations(&features.to_feature_vector(), Some(probability), top);

        let record = HistoryRecord {
            id: HistoryId::new(),
            user_id: user.id,
            timestamp: Utc::now(),
            model_name: descriptor.name.clone(),
            model_version: descriptor.version.clone(),
            probability,
            label,
            risk_tier,
            features,
            top_features,
            recommendations,
        };
        let stored = self.history.append(record)?;

        info!(
            user_id = %user.id,
            history_id = %stored.id,
            risk_tier = %risk_tier,
            "assessment recorded"
        );

        Ok(AssessmentOutcome {
            history_id: stored.id,
            probability,
            risk_tier,
            label,
            recommendations: stored.recommendations,
            model_name: stored.model_name,
            model_version: stored.model_version,
        })
    }

    pub fn history(
        &self,
        user: &UserAccount,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntryView>, AssessmentServiceError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let records = self.history.for_user(&user.id, limit)?;
        Ok(records.into_iter().map(HistoryEntryView::from).collect())
    }
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error("invalid registration: {0}")]
    InvalidRegistration(&'static str),
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("authentication failed: {0}")]
    Unauthenticated(String),
    #[error("invalid features: {}", join_violations(.0))]
    InvalidFeatures(Vec<FieldViolation>),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("assessment worker failed: {0}")]
    Worker(String),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
