//! # 마스터 이력서 서비스
//!
//! 사용자별 마스터 버전 관리 위에 두 가지를 더합니다.
//! - 소유권 검사 (`get`, `activate`)
//! - 사용자 버전이 하나도 없을 때 배포 기본 문서로 대체 (`get_active`)

use crate::db::masters as db_masters;
use crate::error::AppError;
use crate::models::{ActiveMaster, MasterDocument, MasterDocumentSummary};
use crate::services::ownership::authorize;
use sqlx::SqlitePool;
use std::io::ErrorKind;
use std::path::Path;

/// 활성 마스터를 돌려줍니다.
///
/// 사용자 버전이 없으면 `default_path`의 문서를, 그것도 없으면 `None`.
pub async fn get_active(
    pool: &SqlitePool,
    user_id: i64,
    default_path: &Path,
) -> Result<Option<ActiveMaster>, AppError> {
    if let Some(master) = db_masters::get_active(pool, user_id).await? {
        return Ok(Some(ActiveMaster {
            content: master.latex_content,
            master_id: Some(master.id),
            is_default: false,
        }));
    }

    match tokio::fs::read_to_string(default_path).await {
        Ok(content) => Ok(Some(ActiveMaster {
            content,
            master_id: None,
            is_default: true,
        })),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn upload(
    pool: &SqlitePool,
    user_id: i64,
    content: &str,
    filename: Option<&str>,
) -> Result<MasterDocument, AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("Master CV content is empty".to_string()));
    }

    let filename = filename.map(str::trim).filter(|f| !f.is_empty());
    let master = db_masters::upload_new_version(pool, user_id, content, filename).await?;

    tracing::info!(user_id, version = master.version, "Uploaded master CV");
    Ok(master)
}

pub async fn list_versions(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<MasterDocumentSummary>, AppError> {
    db_masters::list_versions(pool, user_id).await
}

pub async fn get(pool: &SqlitePool, user_id: i64, master_id: i64) -> Result<MasterDocument, AppError> {
    authorize(db_masters::get_master(pool, master_id).await?, user_id)
}

pub async fn activate(
    pool: &SqlitePool,
    user_id: i64,
    master_id: i64,
) -> Result<MasterDocument, AppError> {
    get(pool, user_id, master_id).await?;

    let master = db_masters::activate(pool, user_id, master_id)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(user_id, version = master.version, "Activated master CV version");
    Ok(master)
}
