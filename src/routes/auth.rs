//! # 인증 핸들러
//!
//! - `POST /auth/register`: 회원가입 후 바로 토큰 발급
//! - `POST /auth/login`: 이메일 + 비밀번호로 로그인
//! - `POST /auth/refresh`: refresh 토큰 교체 (이전 토큰은 폐기)
//! - `POST /auth/logout`: 사용자의 모든 refresh 토큰 폐기
//! - `GET /auth/me`: 현재 사용자 정보

use crate::{
    db::users as db_users,
    error::AppError,
    middleware::auth::{
        create_access_token, create_refresh_token, hash_token, verify_token, AuthUser,
        REFRESH_TOKEN_DAYS,
    },
    models::user::*,
    routes::{extract::AppJson, AppState},
    services::accounts,
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

const EXPIRES_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user =
        accounts::register(&state.pool, &req.email, &req.password, &req.confirm_password).await?;

    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user).await?)))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = accounts::authenticate(&state.pool, &req.email, &req.password).await?;

    Ok(Json(issue_tokens(&state, user).await?))
}

pub async fn refresh(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    // Verify the refresh token JWT
    verify_token(&req.refresh_token, &state.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    // Check if refresh token hash exists in DB
    let token_hash = hash_token(&req.refresh_token);
    let (_token_id, user_id, expires_at) = db_users::find_refresh_token(&state.pool, &token_hash)
        .await?
        .ok_or(AppError::Unauthorized("Refresh token not found or revoked".to_string()))?;

    let expires = chrono::NaiveDateTime::parse_from_str(&expires_at, EXPIRES_AT_FORMAT)
        .map_err(|e| AppError::Internal(format!("Date parse error: {}", e)))?;
    if expires.and_utc() < Utc::now() {
        db_users::delete_refresh_token(&state.pool, &token_hash).await?;
        return Err(AppError::Unauthorized("Refresh token expired".to_string()));
    }

    let user = db_users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::Unauthorized("User not found".to_string()))?;

    // 한 번 쓴 refresh 토큰은 폐기. 이미 다른 요청이 폐기했다면 거부
    if !db_users::delete_refresh_token(&state.pool, &token_hash).await? {
        return Err(AppError::Unauthorized(
            "Refresh token not found or revoked".to_string(),
        ));
    }

    Ok(Json(issue_tokens(&state, user).await?))
}

pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Value>, AppError> {
    db_users::delete_user_refresh_tokens(&state.pool, auth_user.user_id).await?;

    Ok(Json(json!({ "message": "Logged out successfully" })))
}

pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = accounts::get(&state.pool, auth_user.user_id).await?;

    Ok(Json(user.into()))
}

/// access/refresh 토큰을 새로 발급하고 refresh 토큰 해시를 저장합니다.
async fn issue_tokens(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let access_token = create_access_token(user.id, &state.jwt_secret)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;
    let refresh_token = create_refresh_token(user.id, &state.jwt_secret)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

    let expires_at = (Utc::now() + Duration::days(REFRESH_TOKEN_DAYS))
        .format(EXPIRES_AT_FORMAT)
        .to_string();
    db_users::store_refresh_token(&state.pool, user.id, &hash_token(&refresh_token), &expires_at)
        .await?;

    Ok(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
    })
}
