use std::sync::{Arc, Mutex};

use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::Value;

use crate::assessment::auth::TokenIssuer;
use crate::assessment::domain::{
    ClinicalFeatures, FeatureVector, HistoryRecord, UserAccount, UserId,
};
use crate::assessment::repository::{HistoryRepository, RepositoryError, UserRepository};
use crate::assessment::scoring::{ModelDescriptor, Scorer, ScoringError};
use crate::assessment::service::{AssessmentService, RegisterRequest};

pub(super) const TEST_SECRET: &str = "unit-test-secret";
pub(super) const PASSWORD: &str = "correct horse";

/// Measurements that trip every rule in the table.
pub(super) fn full_trigger_features() -> FeatureVector {
    FeatureVector {
        age: Some(58.0),
        sex: Some(1.0),
        cp: Some(1.0),
        trestbps: Some(148.0),
        chol: Some(252.0),
        fbs: Some(1.0),
        restecg: Some(1.0),
        thalach: Some(112.0),
        exang: Some(1.0),
        oldpeak: Some(2.3),
        slope: Some(2.0),
        ca: Some(1.0),
        thal: Some(7.0),
    }
}

pub(super) fn at_risk_patient() -> ClinicalFeatures {
    full_trigger_features()
        .complete()
        .expect("full trigger features are complete")
}

/// Measurements that trip no rule at all.
pub(super) fn healthy_patient() -> ClinicalFeatures {
    ClinicalFeatures {
        age: 40.0,
        sex: 0.0,
        cp: 2.0,
        trestbps: 118.0,
        chol: 180.0,
        fbs: 0.0,
        restecg: 0.0,
        thalach: 172.0,
        exang: 0.0,
        oldpeak: 0.0,
        slope: 1.0,
        ca: 0.0,
        thal: 3.0,
    }
}

pub(super) fn token_issuer() -> TokenIssuer {
    TokenIssuer::new(TEST_SECRET, chrono::Duration::minutes(60))
}

pub(super) fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        name: Some("Test Patient".to_string()),
    }
}

/// Scorer returning a fixed probability regardless of input.
pub(super) struct StubScorer {
    probability: f64,
    descriptor: ModelDescriptor,
}

impl StubScorer {
    pub(super) fn new(probability: f64) -> Self {
        Self {
            probability,
            descriptor: ModelDescriptor {
                name: "stub_model".to_string(),
                version: "v-test".to_string(),
                threshold: 0.5,
            },
        }
    }
}

impl Scorer for StubScorer {
    fn score(&self, _features: &ClinicalFeatures) -> Result<f64, ScoringError> {
        Ok(self.probability)
    }

    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }
}

pub(super) struct FailingScorer(ModelDescriptor);

impl FailingScorer {
    pub(super) fn new() -> Self {
        Self(ModelDescriptor {
            name: "broken".to_string(),
            version: "v0".to_string(),
            threshold: 0.5,
        })
    }
}

impl Scorer for FailingScorer {
    fn score(&self, _features: &ClinicalFeatures) -> Result<f64, ScoringError> {
        Err(ScoringError::NonFinite)
    }

    fn descriptor(&self) -> &ModelDescriptor {
        &self.0
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryUsers {
    accounts: Arc<Mutex<Vec<UserAccount>>>,
}

impl MemoryUsers {
    pub(super) fn accounts(&self) -> Vec<UserAccount> {
        self.accounts.lock().expect("user mutex poisoned").clone()
    }
}

impl UserRepository for MemoryUsers {
    fn insert(&self, account: UserAccount) -> Result<UserAccount, RepositoryError> {
        let mut guard = self.accounts.lock().expect("user mutex poisoned");
        if guard.iter().any(|existing| existing.email == account.email) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(account.clone());
        Ok(account)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        let guard = self.accounts.lock().expect("user mutex poisoned");
        Ok(guard.iter().find(|account| account.email == email).cloned())
    }

    fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let guard = self.accounts.lock().expect("user mutex poisoned");
        Ok(guard.iter().find(|account| &account.id == id).cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryHistory {
    records: Arc<Mutex<Vec<HistoryRecord>>>,
}

impl MemoryHistory {
    pub(super) fn records(&self) -> Vec<HistoryRecord> {
        self.records.lock().expect("history mutex poisoned").clone()
    }
}

impl HistoryRepository for MemoryHistory {
    fn append(&self, record: HistoryRecord) -> Result<HistoryRecord, RepositoryError> {
        self.records
            .lock()
            .expect("history mutex poisoned")
            .push(record.clone());
        Ok(record)
    }

    fn for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, RepositoryError> {
        let guard = self.records.lock().expect("history mutex poisoned");
        let mut records: Vec<HistoryRecord> = guard
            .iter()
            .rev()
            .filter(|record| &record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }
}

pub(super) struct UnavailableHistory;

impl HistoryRepository for UnavailableHistory {
    fn append(&self, _record: HistoryRecord) -> Result<HistoryRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_user(
        &self,
        _user_id: &UserId,
        _limit: usize,
    ) -> Result<Vec<HistoryRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn build_service(
    probability: f64,
) -> (
    AssessmentService<MemoryUsers, MemoryHistory>,
    Arc<MemoryUsers>,
    Arc<MemoryHistory>,
) {
    let users = Arc::new(MemoryUsers::default());
    let history = Arc::new(MemoryHistory::default());
    let service = AssessmentService::new(
        users.clone(),
        history.clone(),
        Arc::new(StubScorer::new(probability)),
        token_issuer(),
    );
    (service, users, history)
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: &Value,
) -> Request<axum::body::Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(axum::body::Body::from(
            serde_json::to_vec(body).expect("serialize body"),
        ))
        .expect("request builds")
}

pub(super) fn assert_unauthorized(response: &Response) {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
