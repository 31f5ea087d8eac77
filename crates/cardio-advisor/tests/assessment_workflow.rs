//! End-to-end scenarios for the assessment service.
//!
//! Requests go through the public router backed by the bundled model artifact and an in-memory
//! SQLite store, covering account creation, scoring, and the history log.

mod common {
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::response::Response;
    use serde_json::Value;

    use cardio_advisor::assessment::{
        assessment_router, AssessmentService, ClinicalFeatures, LogisticScorer, SqliteStore,
        TokenIssuer,
    };

    pub(super) fn model_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models/heart_risk_model.json")
    }

    pub(super) fn router() -> axum::Router {
        let store = Arc::new(SqliteStore::in_memory().expect("sqlite opens"));
        let scorer =
            LogisticScorer::from_path(model_path(), "v1.0", 0.5).expect("bundled model loads");
        let service = AssessmentService::new(
            store.clone(),
            store,
            Arc::new(scorer),
            TokenIssuer::new("integration-secret", chrono::Duration::minutes(60)),
        );
        assessment_router(Arc::new(service))
    }

    pub(super) fn high_risk_patient() -> ClinicalFeatures {
        ClinicalFeatures {
            age: 58.0,
            sex: 1.0,
            cp: 1.0,
            trestbps: 148.0,
            chol: 252.0,
            fbs: 1.0,
            restecg: 1.0,
            thalach: 112.0,
            exang: 1.0,
            oldpeak: 2.3,
            slope: 2.0,
            ca: 1.0,
            thal: 7.0,
        }
    }

    pub(super) fn low_risk_patient() -> ClinicalFeatures {
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

    pub(super) fn post(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
            .expect("request builds")
    }

    pub(super) fn get(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request builds")
    }

    pub(super) async fn read_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }
}

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use cardio_advisor::assessment::RiskTier;
use common::*;

#[tokio::test]
async fn register_login_predict_and_review_history() {
    let router = router();
    let credentials = json!({ "email": "walker@example.org", "password": "brisk-walks" });

    let response = router
        .clone()
        .oneshot(post("/auth/register", None, &credentials))
        .await
        .expect("register executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(post("/auth/login", None, &credentials))
        .await
        .expect("login executes");
    assert_eq!(response.status(), StatusCode::OK);
    let login = read_json(response).await;
    let token = login["access_token"].as_str().expect("token").to_string();

    let response = router
        .clone()
        .oneshot(post(
            "/predict",
            Some(&token),
            &json!({ "features": low_risk_patient() }),
        ))
        .await
        .expect("predict executes");
    assert_eq!(response.status(), StatusCode::OK);
    let first = read_json(response).await;
    assert_eq!(first["risk_tier"], "low");
    assert_eq!(first["label"], false);
    assert_eq!(first["model_name"], "best_calibrated");
    assert_eq!(first["model_version"], "v1.0");
    assert_eq!(first["recommendations"], json!([RiskTier::Low.headline()]));

    let response = router
        .clone()
        .oneshot(post(
            "/predict",
            Some(&token),
            &json!({
                "features": high_risk_patient(),
                "top_features": ["thal", "ca", "oldpeak", "thalach"],
            }),
        ))
        .await
        .expect("predict executes");
    assert_eq!(response.status(), StatusCode::OK);
    let second = read_json(response).await;
    assert_eq!(second["risk_tier"], "high");
    assert_eq!(second["label"], true);
    let recommendations = second["recommendations"]
        .as_array()
        .expect("recommendation list");
    assert_eq!(recommendations.len(), 15);
    assert_eq!(recommendations[0], RiskTier::High.headline());
    assert_eq!(
        recommendations[14],
        "Most influential factors: thal, ca, oldpeak."
    );

    let response = router
        .clone()
        .oneshot(get("/history", &token))
        .await
        .expect("history executes");
    assert_eq!(response.status(), StatusCode::OK);
    let history = read_json(response).await;
    let entries = history.as_array().expect("history list");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["id"], second["history_id"]);
    assert_eq!(entries[1]["id"], first["history_id"]);
    assert_eq!(entries[0]["risk_tier"], "high");
    assert_eq!(entries[0]["recommendations"], second["recommendations"]);

    let response = router
        .oneshot(get("/history?limit=1", &token))
        .await
        .expect("history executes");
    let limited = read_json(response).await;
    assert_eq!(limited.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn protected_routes_reject_anonymous_callers() {
    let router = router();

    let response = router
        .clone()
        .oneshot(post(
            "/predict",
            None,
            &json!({ "features": low_risk_patient() }),
        ))
        .await
        .expect("predict executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(get("/history", "not-a-token"))
        .await
        .expect("history executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn recommendation_preview_needs_no_account() {
    let router = router();

    let response = router
        .oneshot(post(
            "/recommendations",
            None,
            &json!({
                "features": { "sex": 1, "age": 47, "trestbps": 135 },
                "probability": 0.4,
                "top_features": ["age"],
            }),
        ))
        .await
        .expect("preview executes");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = read_json(response).await;
    assert_eq!(payload["risk_tier"], "moderate");
    let lines: Vec<&str> = payload["recommendations"]
        .as_array()
        .expect("recommendation list")
        .iter()
        .filter_map(|line| line.as_str())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], RiskTier::Moderate.headline());
    assert!(lines[1].starts_with("Mildly elevated blood pressure"));
    assert!(lines[2].starts_with("Male aged 45 or over"));
    assert_eq!(lines[3], "Most influential factors: age.");
}
