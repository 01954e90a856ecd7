//! # 이력서 변형(Variant) 레지스트리 쿼리
//!
//! `cv_variants` 테이블의 CRUD 함수들입니다.
//! (user_id, folder_name) 쌍은 UNIQUE 제약조건으로 보장되며,
//! 동시 생성 경쟁에서 발생한 제약조건 위반은 `AppError::Conflict`로 변환됩니다.

use crate::error::AppError;
use crate::models::{Variant, VariantStatusUpdate};
use sqlx::SqlitePool;

/// ID로 단일 변형을 조회합니다. 소유권 검사는 호출자(서비스 계층)의 몫입니다.
pub async fn get_variant(pool: &SqlitePool, id: i64) -> Result<Option<Variant>, AppError> {
    let variant = sqlx::query_as::<_, Variant>(
        r#"
        SELECT id, user_id, folder_name, company, role, job_description,
               match_score, has_tex, has_pdf, created_at
        FROM cv_variants
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(variant)
}

/// 사용자의 변형 목록을 최신순으로 조회합니다.
///
/// created_at이 같으면(같은 밀리초) id가 큰 쪽이 먼저 옵니다.
pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Variant>, AppError> {
    let variants = sqlx::query_as::<_, Variant>(
        r#"
        SELECT id, user_id, folder_name, company, role, job_description,
               match_score, has_tex, has_pdf, created_at
        FROM cv_variants
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(variants)
}

pub async fn folder_exists(
    pool: &SqlitePool,
    user_id: i64,
    folder_name: &str,
) -> Result<bool, AppError> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM cv_variants WHERE user_id = ? AND folder_name = ?")
            .bind(user_id)
            .bind(folder_name)
            .fetch_optional(pool)
            .await?;

    Ok(found.is_some())
}

/// 새 변형 레코드를 삽입합니다. 상태 플래그는 모두 false로 시작합니다.
pub async fn create_variant(
    pool: &SqlitePool,
    user_id: i64,
    folder_name: &str,
    company: &str,
    role: &str,
    job_description: &str,
) -> Result<Variant, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO cv_variants (user_id, folder_name, company, role, job_description)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(folder_name)
    .bind(company)
    .bind(role)
    .bind(job_description)
    .execute(pool)
    .await
    .map_err(|e| {
        if super::is_unique_violation(&e) {
            AppError::Conflict(format!("Variant \"{}\" already exists", folder_name))
        } else {
            AppError::Database(e)
        }
    })?;

    get_variant(pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::Internal("Failed to retrieve created variant".to_string()))
}

/// 상태를 부분 업데이트합니다 (PATCH 방식).
///
/// `COALESCE(?, column)`: 바인딩 값이 NULL(None)이면 기존 값을 유지합니다.
pub async fn update_status(
    pool: &SqlitePool,
    id: i64,
    update: VariantStatusUpdate,
) -> Result<Option<Variant>, AppError> {
    let score = update.match_score.map(|s| i64::from(s.min(100)));

    let result = sqlx::query(
        r#"
        UPDATE cv_variants
        SET match_score = COALESCE(?, match_score),
            has_tex = COALESCE(?, has_tex),
            has_pdf = COALESCE(?, has_pdf)
        WHERE id = ?
        "#,
    )
    .bind(score)
    .bind(update.has_tex)
    .bind(update.has_pdf)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get_variant(pool, id).await
}

/// 레코드만 삭제합니다. 산출물 폴더는 호출자가 먼저 지워야 합니다.
pub async fn delete_variant(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM cv_variants WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
