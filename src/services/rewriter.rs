//! # AI 재작성 클라이언트
//!
//! 마스터 이력서(LaTeX)와 채용 공고를 AI 서비스에 보내고,
//! 돌아온 응답을 `Rewrite { markup, match_score }`로 정리합니다.
//!
//! AI 호출은 항상 "선택 사항"입니다. 키가 없거나 호출이 실패하면
//! `None`을 돌려주고, 호출자는 재작성 없이 다음 단계로 넘어갑니다.
//! 재시도는 하지 않습니다.

use crate::config::{AiProvider, Config};
use crate::services::latex;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// "claude"로 시작하지 않는 모델명을 Anthropic에 보낼 때 대신 쓰는 모델
const ANTHROPIC_FALLBACK_MODEL: &str = "claude-3-sonnet-20240229";
const MAX_TOKENS: u32 = 4000;
const TEMPERATURE: f32 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// 재작성 결과. `markup`은 펜스 제거와 특수문자 이스케이프를 마친 LaTeX 소스입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub markup: String,
    pub match_score: Option<u8>,
}

pub struct RewriteRequest<'a> {
    pub master: &'a str,
    pub job_description: &'a str,
    /// 운영자가 관리하는 지시문 템플릿 (없으면 빈 문자열)
    pub instructions: &'a str,
}

/// 재작성 기능의 경계. 테스트에서는 가짜 구현으로 바꿔 끼웁니다.
#[async_trait]
pub trait Rewriter: Send + Sync {
    /// 자격 증명이 설정되어 있는지
    fn is_configured(&self) -> bool;

    /// 응답을 받지 못하면 `None`. 에러를 호출자에게 올리지 않습니다.
    async fn rewrite(&self, request: RewriteRequest<'_>) -> Option<Rewrite>;
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("AI service returned empty content")]
    EmptyContent,
}

/// 모델의 원문 응답을 `Rewrite`로 정리합니다.
///
/// 1. 맨 앞 `MATCH_SCORE: NN%` 줄을 떼어냄
/// 2. 코드 펜스를 벗겨냄 (펜스 안에 마커가 있으면 그것도 떼어냄)
/// 3. 본문 특수문자 이스케이프
pub fn parse_response(raw: &str) -> Rewrite {
    let (mut match_score, body) = match latex::split_score_marker(raw) {
        Some((score, rest)) => (score, rest),
        None => (None, raw),
    };

    let mut body = latex::strip_code_fences(body);
    if let Some((score, rest)) = latex::split_score_marker(body) {
        match_score = match_score.or(score);
        body = rest;
    }

    Rewrite {
        markup: latex::escape_specials(body.trim()),
        match_score,
    }
}

pub fn build_system_prompt(instructions: &str) -> String {
    format!(
        r#"You are an expert CV optimization assistant. You will:
1. Read the master CV (LaTeX format)
2. Read the job description
3. Tailor the CV to the job requirements
4. Estimate how well the candidate fits the job

{instructions}

Reply format:
- First line: {marker} NN% (an integer from 0 to 100)
- Then a blank line
- Then ONLY the complete LaTeX document, starting with \documentclass. No explanations, no markdown code blocks."#,
        instructions = instructions.trim(),
        marker = latex::SCORE_MARKER,
    )
}

pub fn build_user_prompt(master: &str, job_description: &str) -> String {
    format!(
        r#"Please tailor this CV for the following job:

JOB DESCRIPTION:
{job_description}

MASTER CV (LaTeX):
{master}

Focus on:
- Rewriting the summary to match the job requirements
- Reordering experience so the most relevant roles come first
- Using keywords from the job description
- Emphasizing relevant skills and technologies
- Keeping the ENTIRE preamble intact, including every package and \newcommand definition"#
    )
}

// --- OpenAI chat completions ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

// --- Anthropic messages ---

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

/// 설정된 AI 서비스(OpenAI 또는 Anthropic)를 호출하는 실제 구현
#[derive(Clone)]
pub struct LlmRewriter {
    client: Client,
    provider: AiProvider,
    model: String,
    api_key: Option<String>,
}

impl LlmRewriter {
    pub fn new(
        provider: AiProvider,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            provider,
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(config.ai_provider, config.ai_model.clone(), config.ai_api_key())
    }

    async fn complete(&self, api_key: &str, system: &str, user: &str) -> Result<String, RewriteError> {
        let text = match self.provider {
            AiProvider::OpenAi => self.call_openai(api_key, system, user).await?,
            AiProvider::Anthropic => self.call_anthropic(api_key, system, user).await?,
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(RewriteError::EmptyContent);
        }
        Ok(text.to_string())
    }

    async fn call_openai(&self, api_key: &str, system: &str, user: &str) -> Result<String, RewriteError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(RewriteError::EmptyContent)
    }

    async fn call_anthropic(&self, api_key: &str, system: &str, user: &str) -> Result<String, RewriteError> {
        let model = if self.model.starts_with("claude") {
            self.model.as_str()
        } else {
            ANTHROPIC_FALLBACK_MODEL
        };
        let body = AnthropicRequest {
            model,
            max_tokens: MAX_TOKENS,
            system,
            messages: [ChatMessage { role: "user", content: user }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let parsed: AnthropicResponse = response.json().await?;
        parsed
            .content
            .into_iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text)
            .ok_or(RewriteError::EmptyContent)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RewriteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(RewriteError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Rewriter for LlmRewriter {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn rewrite(&self, request: RewriteRequest<'_>) -> Option<Rewrite> {
        let api_key = self.api_key.as_deref()?;

        let system = build_system_prompt(request.instructions);
        let user = build_user_prompt(request.master, request.job_description);

        match self.complete(api_key, &system, &user).await {
            Ok(raw) => {
                debug!(provider = ?self.provider, chars = raw.len(), "AI rewrite received");
                Some(parse_response(&raw))
            }
            Err(e) => {
                warn!(provider = ?self.provider, "AI rewrite failed: {}", e);
                None
            }
        }
    }
}
