//! # 변형 생성/관리 오케스트레이터
//!
//! 변형 하나의 수명 주기 전체를 조율합니다.
//!
//! ```text
//! 검증 → 폴더 이름 결정 → 레코드 + job_desc.md 생성   (여기까지 실패하면 에러)
//!      → AI 재작성 → main.tex 저장                    (실패해도 계속)
//!      → 컴파일 → main.pdf 저장 / compile.log 저장    (실패해도 계속)
//! ```
//!
//! 생성 이후 단계의 실패는 에러가 아니라 결과 메시지로 보고됩니다.
//! 이미 저장된 레코드와 파일은 뒤 단계가 실패해도 지우지 않습니다.
//!
//! 모든 조회/변경은 먼저 소유권 검사를 통과해야 합니다.

use crate::db::variants as db_variants;
use crate::error::AppError;
use crate::models::{
    CompileReport, CreateVariantOutcome, CreateVariantRequest, Variant, VariantStage,
    VariantStatusUpdate,
};
use crate::services::artifacts::{derive_folder_name, ArtifactStore};
use crate::services::compiler::{CompileOutcome, DocumentCompiler};
use crate::services::masters;
use crate::services::ownership::authorize;
use crate::services::rewriter::{Rewrite, RewriteRequest, Rewriter};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// 실패 로그 중 사용자 메시지에 붙일 마지막 줄 수
const LOG_TAIL_LINES: usize = 20;

#[derive(Clone)]
pub struct VariantLifecycle {
    pool: SqlitePool,
    artifacts: ArtifactStore,
    rewriter: Arc<dyn Rewriter>,
    compiler: Arc<dyn DocumentCompiler>,
    default_master: PathBuf,
    instructions: Arc<str>,
}

enum CompileStep {
    Compiled(Variant),
    Failed(String),
}

impl VariantLifecycle {
    pub fn new(
        pool: SqlitePool,
        artifacts: ArtifactStore,
        rewriter: Arc<dyn Rewriter>,
        compiler: Arc<dyn DocumentCompiler>,
        default_master: impl Into<PathBuf>,
        instructions: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            pool,
            artifacts,
            rewriter,
            compiler,
            default_master: default_master.into(),
            instructions: instructions.into(),
        }
    }

    pub async fn create(
        &self,
        user_id: i64,
        request: &CreateVariantRequest,
    ) -> Result<CreateVariantOutcome, AppError> {
        let company = request.company.trim();
        let role = request.role.trim();
        let job_description = request.job_description.trim();

        if company.is_empty() || role.is_empty() || job_description.is_empty() {
            return Err(AppError::Validation(
                "Company, role and job description are required".to_string(),
            ));
        }

        let folder = derive_folder_name(company, role);
        if folder.is_empty() {
            return Err(AppError::Validation(
                "Company and role must contain at least one letter or digit".to_string(),
            ));
        }

        if db_variants::folder_exists(&self.pool, user_id, &folder).await? {
            return Err(AppError::Conflict(format!("Variant \"{}\" already exists", folder)));
        }

        let mut variant =
            db_variants::create_variant(&self.pool, user_id, &folder, company, role, job_description)
                .await?;

        // 레코드가 생긴 뒤에야 폴더를 비웁니다. 레코드 없이 남은 이전 파일은
        // 새 변형의 산출물로 보이면 안 됩니다.
        let prepared = match self.artifacts.remove_folder(user_id, &folder).await {
            Ok(()) => {
                self.artifacts
                    .write_job_description(user_id, &folder, company, role, job_description)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = prepared {
            // 공고 파일 없는 반쪽짜리 변형은 남기지 않음
            warn!(user_id, folder = %folder, "Failed to prepare variant folder: {}", e);
            if let Err(cleanup) = self.artifacts.remove_folder(user_id, &folder).await {
                warn!(user_id, folder = %folder, "Failed to clean up variant folder: {}", cleanup);
            }
            db_variants::delete_variant(&self.pool, variant.id).await?;
            return Err(e);
        }

        info!(user_id, variant_id = variant.id, folder = %folder, "Created variant");

        let mut message = format!("Created variant folder: {}", folder);

        if !request.auto_optimize.unwrap_or(true) {
            return Ok(CreateVariantOutcome {
                variant,
                stage: VariantStage::Created,
                message,
            });
        }

        let rewrite = match self.rewrite_step(&variant).await {
            Ok(rewrite) => rewrite,
            Err(reason) => {
                message.push_str(&format!(" | AI optimization skipped ({})", reason));
                return Ok(CreateVariantOutcome {
                    variant,
                    stage: VariantStage::RewriteSkipped,
                    message,
                });
            }
        };

        if let Err(e) = self
            .artifacts
            .write_markup(user_id, &folder, &rewrite.markup)
            .await
        {
            warn!(variant_id = variant.id, "Failed to save rewritten markup: {}", e);
            message.push_str(" | AI optimization failed: could not save main.tex");
            return Ok(CreateVariantOutcome {
                variant,
                stage: VariantStage::RewriteSkipped,
                message,
            });
        }

        variant = db_variants::update_status(
            &self.pool,
            variant.id,
            VariantStatusUpdate {
                match_score: rewrite.match_score,
                has_tex: Some(true),
                has_pdf: None,
            },
        )
        .await?
        .ok_or(AppError::NotFound)?;

        message.push_str(" | AI optimized successfully");
        if let Some(score) = rewrite.match_score {
            message.push_str(&format!(" (match score {}%)", score));
        }

        let stage = match self.compile_step(&variant, &rewrite.markup).await {
            Ok(CompileStep::Compiled(updated)) => {
                variant = updated;
                message.push_str(" | PDF compiled successfully");
                VariantStage::Compiled
            }
            Ok(CompileStep::Failed(_)) => {
                message.push_str(" | PDF compilation failed");
                VariantStage::CompileFailed
            }
            Err(e) => {
                // 재작성 결과는 저장되었지만 컴파일 결과를 반영하지 못함
                warn!(variant_id = variant.id, "Failed to store compile result: {}", e);
                message.push_str(" | PDF compilation failed: could not store the result");
                VariantStage::Rewritten
            }
        };

        Ok(CreateVariantOutcome { variant, stage, message })
    }

    /// 재작성에 필요한 입력을 모으고 AI를 호출합니다.
    /// 건너뛴 이유는 `Err`의 문자열로 돌려줍니다.
    async fn rewrite_step(&self, variant: &Variant) -> Result<Rewrite, String> {
        if !self.rewriter.is_configured() {
            return Err("no API credentials configured".to_string());
        }

        let master = masters::get_active(&self.pool, variant.user_id, &self.default_master)
            .await
            .map_err(|e| {
                warn!(user_id = variant.user_id, "Could not load master CV: {}", e);
                "could not load master CV".to_string()
            })?
            .ok_or_else(|| "no master CV available".to_string())?;

        let rewrite = self
            .rewriter
            .rewrite(RewriteRequest {
                master: &master.content,
                job_description: &variant.job_description,
                instructions: &self.instructions,
            })
            .await
            .ok_or_else(|| "no API response".to_string())?;

        if rewrite.markup.trim().is_empty() {
            return Err("empty AI response".to_string());
        }
        Ok(rewrite)
    }

    /// 컴파일 결과를 반영합니다.
    /// 성공하면 PDF를 원자적으로 교체하고, 실패하면 기존 PDF는 두고 로그만 남깁니다.
    async fn compile_step(&self, variant: &Variant, markup: &str) -> Result<CompileStep, AppError> {
        match self.compiler.compile(markup).await {
            CompileOutcome::Compiled { pdf } => {
                self.artifacts
                    .store_pdf(variant.user_id, &variant.folder_name, &pdf)
                    .await?;
                let updated = db_variants::update_status(
                    &self.pool,
                    variant.id,
                    VariantStatusUpdate {
                        has_pdf: Some(true),
                        ..Default::default()
                    },
                )
                .await?
                .ok_or(AppError::NotFound)?;

                info!(variant_id = variant.id, bytes = pdf.len(), "Compiled variant");
                Ok(CompileStep::Compiled(updated))
            }
            CompileOutcome::Failed { log } => {
                warn!(variant_id = variant.id, "Compilation failed");
                self.artifacts
                    .write_log(variant.user_id, &variant.folder_name, &log)
                    .await?;
                Ok(CompileStep::Failed(log))
            }
        }
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Variant>, AppError> {
        db_variants::list_for_user(&self.pool, user_id).await
    }

    pub async fn get(&self, user_id: i64, variant_id: i64) -> Result<Variant, AppError> {
        authorize(db_variants::get_variant(&self.pool, variant_id).await?, user_id)
    }

    /// 저장된 `main.tex`를 다시 컴파일합니다.
    pub async fn compile(&self, user_id: i64, variant_id: i64) -> Result<CompileReport, AppError> {
        let variant = self.get(user_id, variant_id).await?;

        let markup = self
            .artifacts
            .read_markup(user_id, &variant.folder_name)
            .await?
            .ok_or_else(|| {
                AppError::Validation("main.tex not found. Please optimize CV first.".to_string())
            })?;

        match self.compile_step(&variant, &markup).await? {
            CompileStep::Compiled(variant) => Ok(CompileReport {
                variant,
                message: "CV compiled successfully".to_string(),
            }),
            CompileStep::Failed(log) => Err(AppError::Upstream(format!(
                "Compilation failed:\n{}",
                log_tail(&log)
            ))),
        }
    }

    /// 다운로드 파일 이름과 PDF 바이트를 돌려줍니다.
    pub async fn download_pdf(
        &self,
        user_id: i64,
        variant_id: i64,
    ) -> Result<(String, Vec<u8>), AppError> {
        let variant = self.get(user_id, variant_id).await?;
        if !variant.has_pdf {
            return Err(AppError::NotFound);
        }
        let pdf = self
            .artifacts
            .read_pdf(user_id, &variant.folder_name)
            .await?
            .ok_or(AppError::NotFound)?;

        Ok((format!("{}-cv.pdf", variant.folder_name), pdf))
    }

    pub async fn job_description(&self, user_id: i64, variant_id: i64) -> Result<String, AppError> {
        let variant = self.get(user_id, variant_id).await?;
        self.artifacts
            .read_job_description(user_id, &variant.folder_name)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn markup(&self, user_id: i64, variant_id: i64) -> Result<String, AppError> {
        let variant = self.get(user_id, variant_id).await?;
        if !variant.has_tex {
            return Err(AppError::NotFound);
        }
        self.artifacts
            .read_markup(user_id, &variant.folder_name)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn compile_log(&self, user_id: i64, variant_id: i64) -> Result<String, AppError> {
        let variant = self.get(user_id, variant_id).await?;
        self.artifacts
            .read_log(user_id, &variant.folder_name)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// 산출물 폴더를 먼저 지우고 레코드를 지웁니다.
    /// 폴더 삭제가 실패하면 레코드는 남아 있으므로 다시 시도할 수 있습니다.
    pub async fn delete(&self, user_id: i64, variant_id: i64) -> Result<(), AppError> {
        let variant = self.get(user_id, variant_id).await?;

        self.artifacts
            .remove_folder(user_id, &variant.folder_name)
            .await?;
        db_variants::delete_variant(&self.pool, variant.id).await?;

        info!(user_id, variant_id, folder = %variant.folder_name, "Deleted variant");
        Ok(())
    }
}

fn log_tail(log: &str) -> String {
    let lines: Vec<&str> = log.lines().collect();
    let start = lines.len().saturating_sub(LOG_TAIL_LINES);
    lines[start..].join("\n")
}
