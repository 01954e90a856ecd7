//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들을 모아둔 모듈입니다.
//! Axum에서 핸들러는 HTTP 요청을 받아 응답을 반환하는 async 함수입니다.
//!
//! 각 하위 모듈:
//! - `auth`: 인증 관련 (회원가입, 로그인, 토큰 갱신, 로그아웃)
//! - `extract`: 추출 실패를 JSON 에러로 바꾸는 `AppPath`/`AppJson`
//! - `health`: 서버 상태 확인 (헬스체크)
//! - `masters`: 마스터 이력서 버전 핸들러
//! - `variants`: 이력서 변형 생성/조회/컴파일/삭제 핸들러

pub mod auth;
pub mod extract;
pub mod health;
pub mod masters;
pub mod variants;

pub use health::*;
pub use masters::*;
pub use variants::*;

use crate::services::lifecycle::VariantLifecycle;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::path::PathBuf;

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// Axum의 State Extractor는 내부적으로 AppState를 clone하므로 `Clone`이 필수입니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀 (내부적으로 Arc로 공유)
    pub pool: SqlitePool,
    /// JWT 토큰 서명용 비밀키
    pub jwt_secret: String,
    /// 사용자 마스터가 없을 때 쓰는 기본 LaTeX 문서
    pub default_master_path: PathBuf,
    /// 변형 수명 주기 오케스트레이터 (내부 필드가 모두 Arc/풀이라 clone이 가벼움)
    pub lifecycle: VariantLifecycle,
}

/// `/api/v1` 아래의 모든 API 라우트를 구성합니다.
///
/// CORS와 요청 로깅 레이어는 `main`에서 씌웁니다.
pub fn api_router(state: AppState) -> Router {
    // 인증 관련 라우트 (회원가입, 로그인, 토큰 갱신, 로그아웃, 내 정보)
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me));

    let api_routes = Router::new()
        .merge(auth_routes)
        // 마스터 이력서 버전
        .route("/masters", get(list_masters).post(upload_master))
        .route("/masters/active", get(get_active_master))
        .route("/masters/{id}", get(get_master))
        .route("/masters/{id}/activate", post(activate_master))
        // 이력서 변형
        .route("/variants", get(list_variants).post(create_variant))
        .route("/variants/{id}", get(get_variant).delete(delete_variant))
        .route("/variants/{id}/compile", post(compile_variant))
        .route("/variants/{id}/pdf", get(download_pdf))
        .route("/variants/{id}/job-description", get(get_job_description))
        .route("/variants/{id}/markup", get(get_markup))
        .route("/variants/{id}/log", get(get_compile_log))
        .route("/health", get(health_check))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiProvider;
    use crate::db::testing::test_pool;
    use crate::services::artifacts::ArtifactStore;
    use crate::services::compiler::ProcessCompiler;
    use crate::services::rewriter::LlmRewriter;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app() -> (Router, TempDir) {
        let (pool, dir) = test_pool().await;
        let rewriter = LlmRewriter::new(AiProvider::OpenAi, "gpt-4-turbo", None).unwrap();
        let compiler = ProcessCompiler::new(vec!["false".to_string()], Duration::from_secs(5));
        let default_master = dir.path().join("master.tex");

        let lifecycle = VariantLifecycle::new(
            pool.clone(),
            ArtifactStore::new(dir.path().join("variants")),
            Arc::new(rewriter),
            Arc::new(compiler),
            default_master.clone(),
            "",
        );
        let state = AppState {
            pool,
            jwt_secret: "test-secret".to_string(),
            default_master_path: default_master,
            lifecycle,
        };
        (api_router(state), dir)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, email: &str) -> Value {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": email, "password": "secret1", "confirm_password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    fn access(body: &Value) -> String {
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _dir) = app().await;
        let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let (app, _dir) = app().await;
        let (status, body) = send(&app, "GET", "/api/v1/variants", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "missing_token");

        let (status, _) = send(&app, "GET", "/api/v1/variants", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn registration_errors_map_to_status_codes() {
        let (app, _dir) = app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "a@example.com", "password": "abc", "confirm_password": "abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");

        register(&app, "a@example.com").await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "a@example.com", "password": "secret1", "confirm_password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "conflict");
    }

    #[tokio::test]
    async fn login_and_refresh_rotation() {
        let (app, _dir) = app().await;
        register(&app, "a@example.com").await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "a@example.com", "password": "wrong12" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, login) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "a@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let old_refresh = login["refresh_token"].clone();

        let (status, refreshed) = send(
            &app,
            "POST",
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": old_refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(refreshed["refresh_token"], old_refresh);

        // 한 번 쓴 refresh 토큰은 다시 쓸 수 없음
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": old_refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // refresh 토큰을 access 토큰처럼 쓸 수 없음
        let refresh_as_bearer = refreshed["refresh_token"].as_str().unwrap();
        let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(refresh_as_bearer), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, me) = send(&app, "GET", "/api/v1/auth/me", Some(&access(&refreshed)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "a@example.com");
    }

    #[tokio::test]
    async fn concurrent_refreshes_with_one_token_succeed_once() {
        let (app, _dir) = app().await;
        let registered = register(&app, "a@example.com").await;
        let body = json!({ "refresh_token": registered["refresh_token"] });

        let (first, second) = tokio::join!(
            send(&app, "POST", "/api/v1/auth/refresh", None, Some(body.clone())),
            send(&app, "POST", "/api/v1/auth/refresh", None, Some(body.clone())),
        );

        let ok = [first.0, second.0]
            .iter()
            .filter(|status| **status == StatusCode::OK)
            .count();
        assert_eq!(ok, 1);
        assert!([first.0, second.0].contains(&StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn malformed_ids_and_bodies_get_the_json_error_shape() {
        let (app, _dir) = app().await;
        let token = access(&register(&app, "a@example.com").await);

        for uri in ["/api/v1/variants/abc", "/api/v1/masters/1.5", "/api/v1/variants/abc/pdf"] {
            let (status, body) = send(&app, "GET", uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"]["code"], "validation_error", "{uri}");
            assert!(body["error"]["message"].is_string());
        }

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/variants",
            Some(&token),
            Some(json!({ "company": "Acme" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");

        // Content-Type 없는 본문도 같은 형식
        let (status, body) = send(&app, "POST", "/api/v1/auth/login", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn variant_flow_without_ai_credentials() {
        let (app, _dir) = app().await;
        let token = access(&register(&app, "a@example.com").await);

        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/variants",
            Some(&token),
            Some(json!({ "company": "Acme Corp", "role": "Senior SWE", "job_description": "Rust!" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["stage"], "rewrite_skipped");
        assert_eq!(created["variant"]["folder_name"], "acme-corp-senior-swe");
        assert_eq!(created["variant"]["has_tex"], false);
        let id = created["variant"]["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/variants",
            Some(&token),
            Some(json!({ "company": "acme corp", "role": "senior swe", "job_description": "again" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, listed) = send(&app, "GET", "/api/v1/variants", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["variants"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/variants/{id}/compile"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("main.tex"));

        let (status, _) = send(&app, "GET", &format!("/api/v1/variants/{id}/pdf"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/variants/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/api/v1/variants/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn foreign_and_missing_variants_look_identical() {
        let (app, _dir) = app().await;
        let alice = access(&register(&app, "alice@example.com").await);
        let bob = access(&register(&app, "bob@example.com").await);

        let (_, created) = send(
            &app,
            "POST",
            "/api/v1/variants",
            Some(&alice),
            Some(json!({ "company": "Acme", "role": "SWE", "job_description": "jd", "auto_optimize": false })),
        )
        .await;
        let id = created["variant"]["id"].as_i64().unwrap();

        let foreign = send(&app, "GET", &format!("/api/v1/variants/{id}"), Some(&bob), None).await;
        let missing = send(&app, "GET", "/api/v1/variants/99999", Some(&bob), None).await;
        assert_eq!(foreign.0, StatusCode::NOT_FOUND);
        assert_eq!(foreign, missing);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/variants/{id}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", &format!("/api/v1/variants/{id}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn master_upload_and_activation() {
        let (app, _dir) = app().await;
        let token = access(&register(&app, "a@example.com").await);

        let (status, _) = send(&app, "GET", "/api/v1/masters/active", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, first) = send(
            &app,
            "POST",
            "/api/v1/masters",
            Some(&token),
            Some(json!({ "content": "\\documentclass{v1}", "filename": "cv.tex" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["version"], 1);

        send(
            &app,
            "POST",
            "/api/v1/masters",
            Some(&token),
            Some(json!({ "content": "\\documentclass{v2}" })),
        )
        .await;

        let first_id = first["id"].as_i64().unwrap();
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/masters/{first_id}/activate"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, active) = send(&app, "GET", "/api/v1/masters/active", Some(&token), None).await;
        assert_eq!(active["content"], "\\documentclass{v1}");
        assert_eq!(active["is_default"], false);

        let (_, listed) = send(&app, "GET", "/api/v1/masters", Some(&token), None).await;
        assert_eq!(listed["versions"].as_array().unwrap().len(), 2);
    }
}
