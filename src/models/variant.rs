//! # 이력서 변형(Variant) 모델
//!
//! 채용 공고 하나에 맞춰 재작성된 이력서 한 건을 나타냅니다.
//!
//! ## 상태 흐름
//! ```text
//! created → (rewritten | rewrite-skipped) → (compiled | compile-failed)
//! ```

use serde::{Deserialize, Serialize};

/// `cv_variants` 테이블 한 행
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Variant {
    pub id: i64,
    pub user_id: i64,
    /// 회사명 + 직무명에서 만든 폴더 식별자 (사용자별로 유일)
    pub folder_name: String,
    pub company: String,
    pub role: String,
    pub job_description: String,
    /// AI가 추정한 적합도 (0~100), 없을 수 있음
    pub match_score: Option<i64>,
    pub has_tex: bool,
    pub has_pdf: bool,
    pub created_at: String,
}

/// `POST /variants` 요청 본문
#[derive(Debug, Deserialize)]
pub struct CreateVariantRequest {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub job_description: String,
    /// 기본값 true: false면 폴더와 공고 파일만 만듭니다.
    pub auto_optimize: Option<bool>,
}

/// 부분 업데이트. None인 필드는 그대로 둡니다.
#[derive(Debug, Default, Clone, Copy)]
pub struct VariantStatusUpdate {
    pub match_score: Option<u8>,
    pub has_tex: Option<bool>,
    pub has_pdf: Option<bool>,
}

/// 생성 파이프라인이 도달한 마지막 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStage {
    Created,
    Rewritten,
    RewriteSkipped,
    Compiled,
    CompileFailed,
}

#[derive(Debug, Serialize)]
pub struct CreateVariantOutcome {
    pub variant: Variant,
    pub stage: VariantStage,
    /// 단계별 결과를 " | "로 이어 붙인 사용자용 메시지
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CompileReport {
    pub variant: Variant,
    pub message: String,
}
