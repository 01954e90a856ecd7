//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 서비스 계층(services/)과 라우트 핸들러(routes/)에서 이 모듈의 함수를 호출합니다.
//!
//! 각 하위 모듈:
//! - `masters`: 마스터 이력서 버전 쿼리 (활성 버전 전환은 트랜잭션)
//! - `users`: 사용자 계정과 refresh 토큰 쿼리
//! - `variants`: 이력서 변형 레지스트리 쿼리

pub mod masters;
pub mod users;
pub mod variants;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// SQLite 연결 풀을 만들고 마이그레이션을 실행합니다.
///
/// 외래키(`ON DELETE CASCADE`)가 동작하도록 foreign_keys를 명시적으로 켭니다.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// UNIQUE 제약조건 위반인지 확인합니다.
/// 동시 요청이 같은 이메일/폴더를 만들 때 409로 바꾸는 데 씁니다.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
