//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (필수)
//! - `JWT_SECRET`: JWT 토큰 서명에 사용할 비밀키 (필수)
//! - `VARIANTS_PATH`: 변형별 산출물 폴더의 루트 디렉토리
//! - `DEFAULT_MASTER_PATH`: 사용자 마스터가 없을 때 쓰는 기본 LaTeX 문서
//! - `PROMPT_TEMPLATE_PATH`: AI 지시문 템플릿 파일
//! - `AI_PROVIDER` / `AI_MODEL` / `OPENAI_API_KEY` / `ANTHROPIC_API_KEY`: AI 재작성 설정
//! - `COMPILER_COMMAND`: LaTeX 컴파일 명령줄 (`{dir}`은 임시 작업 디렉토리, `{timeout}`은 제한 초로 치환)
//! - `COMPILE_TIMEOUT_SECS`: 컴파일 제한 시간 (기본 60초)
//! - `HOST` / `PORT`: 서버 바인딩 주소

use std::env;
use std::time::Duration;

/// 기본 컴파일 명령: texlive 컨테이너 안에서 latexmk 실행
/// 컨테이너 안에서도 `timeout`으로 제한해야 시간 초과 후 컨테이너가 남지 않습니다.
pub const DEFAULT_COMPILER_COMMAND: &str = "docker run --rm -v {dir}:/workspace -w /workspace \
     texlive/texlive:latest timeout {timeout} latexmk -pdf -interaction=nonstopmode main.tex";

/// AI 재작성에 사용할 서비스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    OpenAi,
    Anthropic,
}

impl AiProvider {
    /// 알 수 없는 값은 OpenAI로 처리합니다.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => AiProvider::Anthropic,
            _ => AiProvider::OpenAi,
        }
    }
}

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후,
/// 애플리케이션 전체에서 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/cvtailor.db?mode=rwc")
    pub database_url: String,
    /// JWT 토큰 서명/검증에 사용하는 비밀키
    pub jwt_secret: String,
    /// 변형 폴더 루트 (`<root>/<user_id>/<folder>/`)
    pub variants_path: String,
    pub default_master_path: String,
    pub prompt_template_path: String,
    pub ai_provider: AiProvider,
    pub ai_model: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// 공백으로 나눈 컴파일 명령 (첫 항목이 실행 파일)
    pub compiler_command: Vec<String>,
    pub compile_timeout: Duration,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있어 환경변수가 없어도 동작합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            variants_path: env::var("VARIANTS_PATH")
                .unwrap_or_else(|_| "data/variants".to_string()),
            default_master_path: env::var("DEFAULT_MASTER_PATH")
                .unwrap_or_else(|_| "data/master.tex".to_string()),
            prompt_template_path: env::var("PROMPT_TEMPLATE_PATH")
                .unwrap_or_else(|_| "prompts/job_desc_match.md".to_string()),
            ai_provider: AiProvider::parse(
                &env::var("AI_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
            ),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4-turbo".to_string()),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            compiler_command: split_command(
                &env::var("COMPILER_COMMAND")
                    .unwrap_or_else(|_| DEFAULT_COMPILER_COMMAND.to_string()),
            ),
            compile_timeout: Duration::from_secs(
                env::var("COMPILE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            // 파싱 실패 시 기본값 3000
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        })
    }

    /// 선택된 AI 서비스의 API 키. 없으면 AI 재작성은 건너뜁니다.
    pub fn ai_api_key(&self) -> Option<String> {
        match self.ai_provider {
            AiProvider::OpenAi => self.openai_api_key.clone(),
            AiProvider::Anthropic => self.anthropic_api_key.clone(),
        }
    }
}

/// 빈 문자열 환경변수는 설정되지 않은 것으로 봅니다.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_command(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
