//! # 이력서 변형(Variant) 핸들러
//!
//! 모든 엔드포인트는 로그인이 필요하고, 다른 사용자의 변형은 404로 보입니다.
//!
//! - `GET /variants`, `POST /variants`
//! - `GET /variants/{id}`, `DELETE /variants/{id}`
//! - `POST /variants/{id}/compile`: 저장된 main.tex 재컴파일
//! - `GET /variants/{id}/pdf`: PDF 다운로드 (`{folder}-cv.pdf`)
//! - `GET /variants/{id}/job-description`, `/markup`, `/log`: 산출물 원문

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{CompileReport, CreateVariantOutcome, CreateVariantRequest, Variant},
    routes::{
        extract::{AppJson, AppPath},
        AppState,
    },
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

pub async fn list_variants(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let variants = state.lifecycle.list(auth_user.user_id).await?;

    Ok(Json(json!({ "variants": variants })))
}

/// AI 재작성이나 컴파일이 실패해도 변형 자체가 만들어졌으면 201입니다.
/// 어디까지 진행됐는지는 `stage`와 `message`로 알려줍니다.
pub async fn create_variant(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppJson(req): AppJson<CreateVariantRequest>,
) -> Result<(StatusCode, Json<CreateVariantOutcome>), AppError> {
    let outcome = state.lifecycle.create(auth_user.user_id, &req).await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn get_variant(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Variant>, AppError> {
    Ok(Json(state.lifecycle.get(auth_user.user_id, id).await?))
}

pub async fn delete_variant(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    state.lifecycle.delete(auth_user.user_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn compile_variant(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<CompileReport>, AppError> {
    Ok(Json(state.lifecycle.compile(auth_user.user_id, id).await?))
}

pub async fn download_pdf(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Response, AppError> {
    let (filename, pdf) = state.lifecycle.download_pdf(auth_user.user_id, id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        pdf,
    )
        .into_response())
}

pub async fn get_job_description(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Response, AppError> {
    let text = state.lifecycle.job_description(auth_user.user_id, id).await?;

    Ok(([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], text).into_response())
}

pub async fn get_markup(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Response, AppError> {
    let text = state.lifecycle.markup(auth_user.user_id, id).await?;

    Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], text).into_response())
}

pub async fn get_compile_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Response, AppError> {
    let text = state.lifecycle.compile_log(auth_user.user_id, id).await?;

    Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], text).into_response())
}
