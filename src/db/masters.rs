//! # 마스터 이력서 버전 쿼리
//!
//! 새 버전 추가와 활성 버전 전환은 항상 하나의 트랜잭션에서 처리합니다.
//! 트랜잭션의 첫 문장이 쓰기(UPDATE)이므로 같은 사용자의 동시 업로드는
//! SQLite 쓰기 잠금에서 직렬화되고, 활성 버전이 0개나 2개가 되는 순간이 없습니다.

use crate::error::AppError;
use crate::models::{MasterDocument, MasterDocumentSummary};
use sqlx::SqlitePool;

pub async fn get_master(pool: &SqlitePool, id: i64) -> Result<Option<MasterDocument>, AppError> {
    let master = sqlx::query_as::<_, MasterDocument>(
        r#"
        SELECT id, user_id, latex_content, original_filename, version, uploaded_at, is_active
        FROM cv_masters
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(master)
}

pub async fn get_active(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<MasterDocument>, AppError> {
    let master = sqlx::query_as::<_, MasterDocument>(
        r#"
        SELECT id, user_id, latex_content, original_filename, version, uploaded_at, is_active
        FROM cv_masters
        WHERE user_id = ? AND is_active = 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(master)
}

pub async fn list_versions(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<MasterDocumentSummary>, AppError> {
    let versions = sqlx::query_as::<_, MasterDocumentSummary>(
        r#"
        SELECT id, user_id, original_filename, version, uploaded_at, is_active
        FROM cv_masters
        WHERE user_id = ?
        ORDER BY version DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(versions)
}

/// 새 버전을 활성 상태로 추가하고 이전 활성 버전을 비활성화합니다.
///
/// version = 기존 버전 수 + 1
pub async fn upload_new_version(
    pool: &SqlitePool,
    user_id: i64,
    latex_content: &str,
    original_filename: Option<&str>,
) -> Result<MasterDocument, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE cv_masters SET is_active = 0 WHERE user_id = ? AND is_active = 1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let version: i64 = sqlx::query_scalar("SELECT COUNT(*) + 1 FROM cv_masters WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    let result = sqlx::query(
        r#"
        INSERT INTO cv_masters (user_id, latex_content, original_filename, version, is_active)
        VALUES (?, ?, ?, ?, 1)
        "#,
    )
    .bind(user_id)
    .bind(latex_content)
    .bind(original_filename)
    .bind(version)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    get_master(pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::Internal("Failed to retrieve uploaded master".to_string()))
}

/// 기존 버전을 다시 활성화합니다. 해당 사용자의 버전이 아니면 `Ok(None)`.
pub async fn activate(
    pool: &SqlitePool,
    user_id: i64,
    master_id: i64,
) -> Result<Option<MasterDocument>, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE cv_masters SET is_active = 0 WHERE user_id = ? AND is_active = 1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("UPDATE cv_masters SET is_active = 1 WHERE id = ? AND user_id = ?")
        .bind(master_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    tx.commit().await?;
    get_master(pool, master_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{insert_user, test_pool};

    async fn active_count(pool: &SqlitePool, user_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM cv_masters WHERE user_id = ? AND is_active = 1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn each_upload_becomes_the_only_active_version() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "m@example.com").await;

        let first = upload_new_version(&pool, user, "v1", Some("cv.tex")).await.unwrap();
        assert_eq!(first.version, 1);
        assert!(first.is_active);

        let second = upload_new_version(&pool, user, "v2", None).await.unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(active_count(&pool, user).await, 1);

        let active = get_active(&pool, user).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(active.latex_content, "v2");

        let first = get_master(&pool, first.id).await.unwrap().unwrap();
        assert!(!first.is_active);
    }

    #[tokio::test]
    async fn versions_are_counted_per_user() {
        let (pool, _dir) = test_pool().await;
        let alice = insert_user(&pool, "alice@example.com").await;
        let bob = insert_user(&pool, "bob@example.com").await;

        upload_new_version(&pool, alice, "a1", None).await.unwrap();
        upload_new_version(&pool, alice, "a2", None).await.unwrap();
        let b1 = upload_new_version(&pool, bob, "b1", None).await.unwrap();

        assert_eq!(b1.version, 1);
        assert_eq!(active_count(&pool, alice).await, 1);
        assert_eq!(active_count(&pool, bob).await, 1);

        let listed = list_versions(&pool, alice).await.unwrap();
        let numbers: Vec<i64> = listed.iter().map(|m| m.version).collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[tokio::test]
    async fn concurrent_uploads_keep_a_single_active_version() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "race@example.com").await;

        let uploads = (0..5).map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move {
                upload_new_version(&pool, user, &format!("v{i}"), None).await
            })
        });
        for handle in uploads.collect::<Vec<_>>() {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(active_count(&pool, user).await, 1);
        let mut numbers: Vec<i64> = list_versions(&pool, user)
            .await
            .unwrap()
            .iter()
            .map(|m| m.version)
            .collect();
        numbers.sort();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn activate_switches_the_active_version() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "switch@example.com").await;
        let first = upload_new_version(&pool, user, "v1", None).await.unwrap();
        upload_new_version(&pool, user, "v2", None).await.unwrap();

        let activated = activate(&pool, user, first.id).await.unwrap().unwrap();
        assert!(activated.is_active);
        assert_eq!(get_active(&pool, user).await.unwrap().unwrap().id, first.id);
        assert_eq!(active_count(&pool, user).await, 1);
    }

    #[tokio::test]
    async fn activating_someone_elses_version_changes_nothing() {
        let (pool, _dir) = test_pool().await;
        let alice = insert_user(&pool, "alice@example.com").await;
        let bob = insert_user(&pool, "bob@example.com").await;
        let bobs = upload_new_version(&pool, bob, "b1", None).await.unwrap();
        let alices = upload_new_version(&pool, alice, "a1", None).await.unwrap();

        assert!(activate(&pool, alice, bobs.id).await.unwrap().is_none());
        // 롤백되었으므로 alice의 활성 버전은 그대로
        assert_eq!(get_active(&pool, alice).await.unwrap().unwrap().id, alices.id);
    }
}
