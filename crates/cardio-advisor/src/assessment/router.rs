use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::UserAccount;
use super::repository::{HistoryRepository, UserRepository};
use super::service::{
    preview_recommendations, AssessmentService, AssessmentServiceError, LoginRequest,
    PredictRequest, RecommendationRequest, RegisterRequest,
};

type SharedService<U, H> = Arc<AssessmentService<U, H>>;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistoryQuery {
    pub(crate) limit: Option<usize>,
}

/// Router builder exposing account, prediction, history, and recommendation endpoints.
pub fn assessment_router<U, H>(service: SharedService<U, H>) -> Router
where
    U: UserRepository + 'static,
    H: HistoryRepository + 'static,
{
    Router::new()
        .route("/auth/register", post(register_handler::<U, H>))
        .route("/auth/login", post(login_handler::<U, H>))
        .route("/predict", post(predict_handler::<U, H>))
        .route("/history", get(history_handler::<U, H>))
        .route("/recommendations", post(recommendations_handler))
        .with_state(service)
}

pub(crate) async fn register_handler<U, H>(
    State(service): State<SharedService<U, H>>,
    axum::Json(request): axum::Json<RegisterRequest>,
) -> Response
where
    U: UserRepository + 'static,
    H: HistoryRepository + 'static,
{
    match run_blocking(service, move |service| service.register(request)).await {
        Ok(token) => (StatusCode::OK, axum::Json(token)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn login_handler<U, H>(
    State(service): State<SharedService<U, H>>,
    axum::Json(request): axum::Json<LoginRequest>,
) -> Response
where
    U: UserRepository + 'static,
    H: HistoryRepository + 'static,
{
    match run_blocking(service, move |service| service.login(request)).await {
        Ok(token) => (StatusCode::OK, axum::Json(token)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn predict_handler<U, H>(
    State(service): State<SharedService<U, H>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<PredictRequest>,
) -> Response
where
    U: UserRepository + 'static,
    H: HistoryRepository + 'static,
{
    let token = bearer_token(&headers).map(str::to_owned);
    let outcome = run_blocking(service, move |service| {
        let user = authenticated_user(service, token.as_deref())?;
        service.assess(&user, request)
    })
    .await;

    match outcome {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn history_handler<U, H>(
    State(service): State<SharedService<U, H>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    U: UserRepository + 'static,
    H: HistoryRepository + 'static,
{
    let token = bearer_token(&headers).map(str::to_owned);
    let entries = run_blocking(service, move |service| {
        let user = authenticated_user(service, token.as_deref())?;
        service.history(&user, query.limit)
    })
    .await;

    match entries {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recommendations_handler(
    axum::Json(request): axum::Json<RecommendationRequest>,
) -> Response {
    let outcome = preview_recommendations(&request);
    (StatusCode::OK, axum::Json(outcome)).into_response()
}

/// Password hashing and storage I/O block, so service calls run on the blocking pool.
async fn run_blocking<U, H, T, F>(
    service: SharedService<U, H>,
    call: F,
) -> Result<T, AssessmentServiceError>
where
    U: UserRepository + 'static,
    H: HistoryRepository + 'static,
    T: Send + 'static,
    F: FnOnce(&AssessmentService<U, H>) -> Result<T, AssessmentServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(service.as_ref()))
        .await
        .map_err(|err| AssessmentServiceError::Worker(err.to_string()))?
}

fn authenticated_user<U, H>(
    service: &AssessmentService<U, H>,
    token: Option<&str>,
) -> Result<UserAccount, AssessmentServiceError>
where
    U: UserRepository + 'static,
    H: HistoryRepository + 'static,
{
    let token = token.ok_or_else(|| {
        AssessmentServiceError::Unauthenticated("missing bearer token".to_string())
    })?;
    service.authenticate(token)
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn error_response(err: AssessmentServiceError) -> Response {
    match err {
        AssessmentServiceError::InvalidRegistration(_) | AssessmentServiceError::EmailTaken => {
            let payload = json!({
                "error": err.to_string(),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        AssessmentServiceError::InvalidCredentials | AssessmentServiceError::Unauthenticated(_) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
        }
        AssessmentServiceError::InvalidFeatures(violations) => {
            let payload = json!({
                "error": "invalid features",
                "violations": violations,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        other => {
            error!(error = %other, "assessment request failed");
            let payload = json!({
                "error": "internal server error",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
