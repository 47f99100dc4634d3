// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{TokenCredentials, VerifiedIdentity},
    error::ErrorBody,
    state::AppState,
};

pub mod health;
pub mod token;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/auth/token",
            get(token::login_query).post(token::login_json),
        )
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::readiness))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::readiness,
        token::login_query,
        token::login_json
    ),
    components(
        schemas(
            TokenCredentials,
            VerifiedIdentity,
            token::TokenLoginResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::ReadyChecks,
            ErrorBody
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Encrypted token verification")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{Key, Keystore};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_is_always_ok() {
        let response = router(AppState::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn openapi_documents_all_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/health", "/ready", "/v1/auth/token"] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        let token = &doc.paths.paths["/v1/auth/token"];
        assert!(token.get.is_some());
        assert!(token.post.is_some());
    }

    #[tokio::test]
    async fn serves_openapi_json() {
        let response = router(AppState::default())
            .oneshot(Request::get("/api-doc/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_reports_key_count() {
        let state = AppState::default();
        let response = router(state.clone())
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state
            .keystore
            .add_key(Key::from_string("svc1", "0123456789abcdef").unwrap());
        let response = router(state)
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["checks"]["keys"], 1);
    }
}
