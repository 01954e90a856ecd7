//! # 마스터 이력서 핸들러
//!
//! 모든 엔드포인트는 로그인이 필요합니다 (`AuthUser`).
//!
//! - `GET /masters`: 버전 목록 (본문 제외, 최신 버전부터)
//! - `POST /masters`: 새 버전 업로드 → 자동으로 활성화
//! - `GET /masters/active`: 현재 활성 마스터 (없으면 기본 문서)
//! - `GET /masters/{id}`: 특정 버전
//! - `POST /masters/{id}/activate`: 이전 버전을 다시 활성화

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{ActiveMaster, MasterDocument, UploadMasterRequest},
    routes::{
        extract::{AppJson, AppPath},
        AppState,
    },
    services::masters,
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

pub async fn list_masters(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let versions = masters::list_versions(&state.pool, auth_user.user_id).await?;

    Ok(Json(json!({ "versions": versions })))
}

pub async fn upload_master(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppJson(req): AppJson<UploadMasterRequest>,
) -> Result<(StatusCode, Json<MasterDocument>), AppError> {
    let master = masters::upload(
        &state.pool,
        auth_user.user_id,
        &req.content,
        req.filename.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(master)))
}

pub async fn get_active_master(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ActiveMaster>, AppError> {
    let active = masters::get_active(&state.pool, auth_user.user_id, &state.default_master_path)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(active))
}

pub async fn get_master(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<MasterDocument>, AppError> {
    Ok(Json(masters::get(&state.pool, auth_user.user_id, id).await?))
}

pub async fn activate_master(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<MasterDocument>, AppError> {
    Ok(Json(masters::activate(&state.pool, auth_user.user_id, id).await?))
}
