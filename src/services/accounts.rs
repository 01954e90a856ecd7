//! # 계정 서비스
//!
//! 회원가입 검증, Argon2id 비밀번호 해싱, 로그인 확인을 담당합니다.
//! 비밀번호 원문은 어디에도 저장하지 않습니다.
//! 가져온 werkzeug 해시는 첫 로그인 성공 시 Argon2id로 바뀝니다.

use crate::db::users as db_users;
use crate::error::AppError;
use crate::models::User;
use crate::services::legacy;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::SqlitePool;

pub const MIN_PASSWORD_LEN: usize = 6;

/// 이메일 존재 여부를 드러내지 않도록 로그인 실패 메시지는 하나로 통일합니다.
const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub async fn register(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<User, AppError> {
    let email = email.trim();

    if email.is_empty() || password.is_empty() || confirm_password.is_empty() {
        return Err(AppError::Validation("Please fill in all fields".to_string()));
    }
    if password != confirm_password {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    if db_users::find_by_email(pool, email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(password)?;
    // 동시 가입 경쟁은 UNIQUE 제약조건이 Conflict로 바꿔줌
    let user = db_users::create_user(pool, email, &password_hash).await?;

    tracing::info!(user_id = user.id, "Registered new account");
    Ok(user)
}

pub async fn authenticate(pool: &SqlitePool, email: &str, password: &str) -> Result<User, AppError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Please enter both email and password".to_string(),
        ));
    }

    let user = db_users::find_by_email(pool, email)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if verify_password(password, &user.password_hash) {
        return Ok(user);
    }

    // 파일 기반 버전에서 가져온 계정: 확인되면 Argon2id로 교체
    if legacy::is_werkzeug_hash(&user.password_hash)
        && legacy::verify_werkzeug_hash(password, &user.password_hash)
    {
        let upgraded = hash_password(password)?;
        db_users::update_password_hash(pool, user.id, &upgraded).await?;
        tracing::info!(user_id = user.id, "Upgraded legacy password hash");
        return Ok(User {
            password_hash: upgraded,
            ..user
        });
    }

    tracing::debug!(user_id = user.id, "Password mismatch");
    Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))
}

pub async fn get(pool: &SqlitePool, user_id: i64) -> Result<User, AppError> {
    db_users::find_by_id(pool, user_id)
        .await?
        .ok_or(AppError::NotFound)
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// 저장된 해시가 깨져 있어도 "불일치"로 취급합니다.
fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
