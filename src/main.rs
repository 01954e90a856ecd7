//! # cvtailor 웹 서버 진입점
//!
//! 이 파일은 cvtailor 애플리케이션의 **시작점(entry point)**입니다.
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. 설정 로딩
//! 4. SQLite 연결 풀 생성 + 마이그레이션 실행
//! 5. 변형 산출물 디렉토리 생성 (`import-legacy`면 가져오기 후 종료)
//! 6. AI 재작성 클라이언트와 LaTeX 컴파일러 준비
//! 7. API 라우터 설정
//! 8. HTTP 서버 시작

// ── 모듈 선언 ──
// Rust에서는 파일 시스템 구조가 곧 모듈 구조입니다.
mod cli;
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;

use anyhow::Result; // anyhow::Result: 어떤 에러 타입이든 담을 수 있는 범용 Result 타입
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use routes::AppState;
use services::{
    artifacts::ArtifactStore, compiler::ProcessCompiler, lifecycle::VariantLifecycle,
    rewriter::LlmRewriter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer}, // CORS(Cross-Origin Resource Sharing) 설정
    trace::TraceLayer,      // HTTP 요청/응답 로깅 미들웨어
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1단계: 환경변수 로딩 ──
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅(tracing) 초기화 ──
    // RUST_LOG가 없으면 cvtailor, tower_http, axum 모듈을 debug 레벨로 설정
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cvtailor=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 3단계: 설정 로딩 ──
    let config = Config::from_env()?;

    // ── 4단계: SQLite 연결 풀 생성 + 마이그레이션 ──
    let pool = db::connect(&config.database_url).await?;

    // ── 5단계: 변형 산출물 디렉토리 생성 ──
    // create_dir_all: 중간 디렉토리까지 모두 생성 (mkdir -p와 같음)
    tokio::fs::create_dir_all(&config.variants_path).await?;
    tracing::info!("Variant artifacts stored under {}", config.variants_path);

    if let Some(Commands::ImportLegacy { users, variants }) = &cli.command {
        let artifacts = ArtifactStore::new(&config.variants_path);
        let report = services::legacy::import_legacy(&pool, &artifacts, users, variants).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    tracing::info!("Starting cvtailor server on {}:{}", config.host, config.port);

    // ── 6단계: AI 재작성 클라이언트와 컴파일러 준비 ──
    // 지시문 템플릿이 없으면 빈 지시문으로 동작합니다.
    let instructions = match tokio::fs::read_to_string(&config.prompt_template_path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                "Prompt template {} not readable ({}); using built-in instructions only",
                config.prompt_template_path,
                e
            );
            String::new()
        }
    };

    let rewriter = LlmRewriter::from_config(&config)?;
    if config.ai_api_key().is_none() {
        tracing::warn!(
            provider = ?config.ai_provider,
            "No AI API key configured; variants will be created without AI optimization"
        );
    }
    let compiler = ProcessCompiler::new(config.compiler_command.clone(), config.compile_timeout);

    let default_master_path = PathBuf::from(&config.default_master_path);
    let lifecycle = VariantLifecycle::new(
        pool.clone(),
        ArtifactStore::new(&config.variants_path),
        Arc::new(rewriter),
        Arc::new(compiler),
        default_master_path.clone(),
        instructions,
    );

    // ── 7단계: 애플리케이션 상태(State)와 라우터 ──
    // SqlitePool과 VariantLifecycle은 내부적으로 Arc를 사용하므로
    // clone해도 같은 자원을 가리킵니다.
    let state = AppState {
        pool,
        jwt_secret: config.jwt_secret.clone(),
        default_master_path,
        lifecycle,
    };

    // 개발 환경 기준으로 모든 출처를 허용합니다.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // ── 8단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
