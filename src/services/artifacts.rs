//! # 변형 산출물 파일 I/O 서비스
//!
//! 변형마다 `<root>/<user_id>/<folder>/` 폴더 하나를 두고 다음 파일을 관리합니다.
//! - `job_desc.md`: 채용 공고 원문
//! - `main.tex`: AI가 재작성한 LaTeX 소스
//! - `main.pdf`: 컴파일 결과 (성공했을 때만)
//! - `compile.log`: 마지막 컴파일 실패 로그
//!
//! 폴더 이름은 사용자별로만 유일하므로 경로에 user_id를 포함합니다.
//! 소유권의 기준은 DB의 `cv_variants.user_id`이며, 파일에는 소유자 정보를 두지 않습니다.

use crate::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const JOB_DESC_FILE: &str = "job_desc.md";
pub const MARKUP_FILE: &str = "main.tex";
pub const PDF_FILE: &str = "main.pdf";
pub const LOG_FILE: &str = "compile.log";

/// 회사명과 직무명으로 폴더 식별자를 만듭니다.
///
/// 소문자화하고, 영숫자가 아닌 문자 묶음은 하이픈 하나로 바꾸고, 양끝 하이픈은 제거합니다.
///
/// ```text
/// derive_folder_name("Acme Corp", "Senior SWE") → "acme-corp-senior-swe"
/// derive_folder_name("Acme!! Corp", "SWE")      → "acme-corp-swe"
/// ```
pub fn derive_folder_name(company: &str, role: &str) -> String {
    slug::slugify(format!("{}-{}", company, role))
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn folder(&self, user_id: i64, folder_name: &str) -> PathBuf {
        self.root.join(user_id.to_string()).join(folder_name)
    }

    pub async fn write_job_description(
        &self,
        user_id: i64,
        folder_name: &str,
        company: &str,
        role: &str,
        job_description: &str,
    ) -> Result<(), AppError> {
        let content = format!(
            "# {}\n**Role:** {}\n\n---\n\n{}",
            company, role, job_description
        );
        self.write(user_id, folder_name, JOB_DESC_FILE, content.as_bytes())
            .await
    }

    pub async fn read_job_description(
        &self,
        user_id: i64,
        folder_name: &str,
    ) -> Result<Option<String>, AppError> {
        self.read_text(user_id, folder_name, JOB_DESC_FILE).await
    }

    pub async fn write_markup(
        &self,
        user_id: i64,
        folder_name: &str,
        markup: &str,
    ) -> Result<(), AppError> {
        self.write(user_id, folder_name, MARKUP_FILE, markup.as_bytes())
            .await
    }

    pub async fn read_markup(
        &self,
        user_id: i64,
        folder_name: &str,
    ) -> Result<Option<String>, AppError> {
        self.read_text(user_id, folder_name, MARKUP_FILE).await
    }

    /// PDF를 임시 파일에 쓴 뒤 rename으로 교체합니다.
    /// 같은 디렉토리 안의 rename은 원자적이므로 기존 `main.pdf`가 반쯤 덮이는 일이 없습니다.
    pub async fn store_pdf(
        &self,
        user_id: i64,
        folder_name: &str,
        pdf: &[u8],
    ) -> Result<(), AppError> {
        let dir = self.folder(user_id, folder_name);
        fs::create_dir_all(&dir).await?;

        let staging = dir.join(format!("{}.partial", PDF_FILE));
        fs::write(&staging, pdf).await?;
        if let Err(e) = fs::rename(&staging, dir.join(PDF_FILE)).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn read_pdf(
        &self,
        user_id: i64,
        folder_name: &str,
    ) -> Result<Option<Vec<u8>>, AppError> {
        read_optional(&self.folder(user_id, folder_name).join(PDF_FILE)).await
    }

    pub async fn write_log(
        &self,
        user_id: i64,
        folder_name: &str,
        log: &str,
    ) -> Result<(), AppError> {
        self.write(user_id, folder_name, LOG_FILE, log.as_bytes()).await
    }

    pub async fn read_log(
        &self,
        user_id: i64,
        folder_name: &str,
    ) -> Result<Option<String>, AppError> {
        self.read_text(user_id, folder_name, LOG_FILE).await
    }

    /// 외부 파일을 변형 폴더의 `file`로 복사합니다. 원본이 없으면 `Ok(false)`.
    pub async fn adopt_file(
        &self,
        user_id: i64,
        folder_name: &str,
        file: &str,
        source: &Path,
    ) -> Result<bool, AppError> {
        if !fs::try_exists(source).await? {
            return Ok(false);
        }
        let dir = self.folder(user_id, folder_name);
        fs::create_dir_all(&dir).await?;
        fs::copy(source, dir.join(file)).await?;
        Ok(true)
    }

    /// 폴더 전체를 삭제합니다. 이미 없으면 성공으로 봅니다.
    pub async fn remove_folder(&self, user_id: i64, folder_name: &str) -> Result<(), AppError> {
        match fs::remove_dir_all(self.folder(user_id, folder_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(
        &self,
        user_id: i64,
        folder_name: &str,
        file: &str,
        content: &[u8],
    ) -> Result<(), AppError> {
        let dir = self.folder(user_id, folder_name);
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(file), content).await?;
        Ok(())
    }

    async fn read_text(
        &self,
        user_id: i64,
        folder_name: &str,
        file: &str,
    ) -> Result<Option<String>, AppError> {
        let bytes = read_optional(&self.folder(user_id, folder_name).join(file)).await?;
        Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, AppError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
