//! # 파일 기반 저장소 가져오기
//!
//! DB를 쓰기 전 버전은 모든 데이터를 파일로 관리했습니다.
//!
//! ```text
//! users.json                         { "<옛 ID>": { "email": ..., "password_hash": ... } }
//! <variants_dir>/<folder>/.owner     소유자의 옛 ID
//! <variants_dir>/<folder>/job_desc.md, main.tex, main.pdf, compile.log
//! <variants_dir>/user_<옛 ID>_master.tex
//! ```
//!
//! 여러 번 실행해도 안전합니다.
//! - 이미 있는 이메일은 새로 만들지 않고 기존 계정에 연결
//! - 이미 등록된 (사용자, 폴더) 변형은 건너뜀
//! - 활성 마스터가 이미 있는 사용자의 마스터 파일은 건너뜀
//!
//! 비밀번호 해시는 werkzeug 형식 그대로 옮깁니다.
//! 로그인할 때 `verify_werkzeug_hash`로 확인하고 Argon2id로 교체합니다.

use crate::db::{masters as db_masters, users as db_users, variants as db_variants};
use crate::error::AppError;
use crate::models::VariantStatusUpdate;
use crate::services::artifacts::{ArtifactStore, JOB_DESC_FILE, LOG_FILE, MARKUP_FILE, PDF_FILE};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

const OWNER_FILE: &str = ".owner";
const IGNORED_DIRS: [&str; 3] = [".git", "__pycache__", "canva"];
const ROLE_PREFIX: &str = "**Role:**";
/// 변형 폴더에서 가져오는 파일. `.owner`는 DB의 user_id로 대체되므로 복사하지 않습니다.
const ARTIFACT_FILES: [&str; 4] = [JOB_DESC_FILE, MARKUP_FILE, PDF_FILE, LOG_FILE];

#[derive(Debug, Deserialize)]
struct LegacyUser {
    email: String,
    password_hash: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub users_created: usize,
    pub users_existing: usize,
    pub variants_imported: usize,
    pub variants_skipped: usize,
    pub masters_imported: usize,
}

/// `job_desc.md` 헤더에서 복원한 공고 정보
#[derive(Debug, PartialEq, Eq)]
struct JobPosting {
    company: Option<String>,
    role: Option<String>,
    description: String,
}

pub async fn import_legacy(
    pool: &SqlitePool,
    artifacts: &ArtifactStore,
    users_file: &Path,
    variants_dir: &Path,
) -> Result<ImportReport, AppError> {
    let mut report = ImportReport::default();

    let users = import_users(pool, users_file, &mut report).await?;
    if users.is_empty() {
        warn!("No legacy users imported; skipping variants and masters");
        return Ok(report);
    }

    if fs::try_exists(variants_dir).await? {
        import_variants(pool, artifacts, variants_dir, &users, &mut report).await?;
        import_masters(pool, variants_dir, &users, &mut report).await?;
    } else {
        warn!("Legacy variants directory {} not found", variants_dir.display());
    }

    info!(?report, "Legacy import finished");
    Ok(report)
}

/// 옛 ID → 새 user_id 대응표를 돌려줍니다.
async fn import_users(
    pool: &SqlitePool,
    users_file: &Path,
    report: &mut ImportReport,
) -> Result<BTreeMap<String, i64>, AppError> {
    let raw = match fs::read_to_string(users_file).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Legacy users file {} not found", users_file.display());
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    let legacy: BTreeMap<String, LegacyUser> = serde_json::from_str(&raw).map_err(|e| {
        AppError::Validation(format!("Invalid users file {}: {}", users_file.display(), e))
    })?;

    let mut mapping = BTreeMap::new();
    for (old_id, user) in legacy {
        let email = user.email.trim();
        if email.is_empty() {
            warn!(old_id = %old_id, "Legacy user without email, skipping");
            continue;
        }

        let user_id = match db_users::find_by_email(pool, email).await? {
            Some(existing) => {
                report.users_existing += 1;
                existing.id
            }
            None => {
                let created = db_users::create_user(pool, email, &user.password_hash).await?;
                report.users_created += 1;
                info!(old_id = %old_id, user_id = created.id, "Imported legacy user");
                created.id
            }
        };
        mapping.insert(old_id, user_id);
    }

    Ok(mapping)
}

async fn import_variants(
    pool: &SqlitePool,
    artifacts: &ArtifactStore,
    variants_dir: &Path,
    users: &BTreeMap<String, i64>,
    report: &mut ImportReport,
) -> Result<(), AppError> {
    let mut folders = Vec::new();
    let mut entries = fs::read_dir(variants_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) if !name.starts_with('.') && !IGNORED_DIRS.contains(&name.as_str()) => {
                folders.push(name)
            }
            Ok(_) => {}
            Err(name) => warn!("Skipping non UTF-8 folder {:?}", name),
        }
    }
    folders.sort();

    for folder in folders {
        let source = variants_dir.join(&folder);

        let Some(owner) = read_text(&source.join(OWNER_FILE)).await? else {
            warn!(folder = %folder, "No owner marker, skipping");
            report.variants_skipped += 1;
            continue;
        };
        let Some(&user_id) = users.get(owner.trim()) else {
            warn!(folder = %folder, owner = owner.trim(), "Unknown legacy owner, skipping");
            report.variants_skipped += 1;
            continue;
        };
        if db_variants::folder_exists(pool, user_id, &folder).await? {
            debug!(user_id, folder = %folder, "Variant already imported");
            report.variants_skipped += 1;
            continue;
        }

        let posting = read_text(&source.join(JOB_DESC_FILE))
            .await?
            .map(|content| parse_job_description(&content))
            .unwrap_or(JobPosting {
                company: None,
                role: None,
                description: String::new(),
            });

        let variant = db_variants::create_variant(
            pool,
            user_id,
            &folder,
            posting.company.as_deref().unwrap_or(&folder),
            posting.role.as_deref().unwrap_or_default(),
            &posting.description,
        )
        .await?;

        if let Err(e) = adopt_folder(pool, artifacts, &source, user_id, &folder, variant.id).await {
            warn!(user_id, folder = %folder, "Failed to import variant files: {}", e);
            if let Err(cleanup) = artifacts.remove_folder(user_id, &folder).await {
                warn!(user_id, folder = %folder, "Failed to clean up variant folder: {}", cleanup);
            }
            db_variants::delete_variant(pool, variant.id).await?;
            return Err(e);
        }

        report.variants_imported += 1;
        info!(user_id, variant_id = variant.id, folder = %folder, "Imported legacy variant");
    }

    Ok(())
}

/// 산출물을 복사하고, 실제로 복사된 파일에 맞춰 `has_tex`/`has_pdf`를 기록합니다.
async fn adopt_folder(
    pool: &SqlitePool,
    artifacts: &ArtifactStore,
    source: &Path,
    user_id: i64,
    folder: &str,
    variant_id: i64,
) -> Result<(), AppError> {
    artifacts.remove_folder(user_id, folder).await?;

    let mut update = VariantStatusUpdate::default();
    for file in ARTIFACT_FILES {
        let copied = artifacts
            .adopt_file(user_id, folder, file, &source.join(file))
            .await?;
        match file {
            MARKUP_FILE => update.has_tex = Some(copied),
            PDF_FILE => update.has_pdf = Some(copied),
            _ => {}
        }
    }

    db_variants::update_status(pool, variant_id, update)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(())
}

async fn import_masters(
    pool: &SqlitePool,
    variants_dir: &Path,
    users: &BTreeMap<String, i64>,
    report: &mut ImportReport,
) -> Result<(), AppError> {
    for (old_id, &user_id) in users {
        let filename = format!("user_{}_master.tex", old_id);
        let Some(content) = read_text(&variants_dir.join(&filename)).await? else {
            continue;
        };
        if db_masters::get_active(pool, user_id).await?.is_some() {
            debug!(user_id, "Master CV already present");
            continue;
        }

        db_masters::upload_new_version(pool, user_id, &content, Some(&filename)).await?;
        report.masters_imported += 1;
        info!(user_id, file = %filename, "Imported legacy master CV");
    }

    Ok(())
}

async fn read_text(path: &Path) -> Result<Option<String>, AppError> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// `# 회사\n**Role:** 직무\n\n---\n\n본문` 형식의 헤더를 분리합니다.
/// 헤더가 없으면 파일 전체가 본문입니다.
fn parse_job_description(content: &str) -> JobPosting {
    let (first, rest) = content.split_once('\n').unwrap_or((content, ""));
    let Some(company) = first.strip_prefix('#') else {
        return JobPosting {
            company: None,
            role: None,
            description: content.trim().to_string(),
        };
    };

    let (second, after_role) = rest.split_once('\n').unwrap_or((rest, ""));
    let (role, body) = match second.trim().strip_prefix(ROLE_PREFIX) {
        Some(role) => (non_empty(role), after_role),
        None => (None, rest),
    };

    let body = body.trim_start();
    let body = body.strip_prefix("---").map(str::trim_start).unwrap_or(body);

    JobPosting {
        company: non_empty(company.trim_start_matches('#')),
        role,
        description: body.trim_end().to_string(),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// werkzeug `generate_password_hash` 형식인지 확인합니다.
pub fn is_werkzeug_hash(stored: &str) -> bool {
    stored.starts_with("pbkdf2:") || stored.starts_with("scrypt:")
}

/// `pbkdf2:sha256:<반복>$<salt>$<hex>` 또는 `scrypt:<n>:<r>:<p>$<salt>$<hex>`를 검증합니다.
/// 형식이 깨져 있으면 불일치로 봅니다.
pub fn verify_werkzeug_hash(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(method), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let params: Vec<&str> = method.split(':').collect();
    let derived = match params.as_slice() {
        ["pbkdf2", "sha256", rounds] => {
            let Ok(rounds) = rounds.parse::<u32>() else {
                return false;
            };
            let mut out = [0u8; 32];
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut out);
            out.to_vec()
        }
        ["scrypt", n, r, p] => {
            let (Ok(n), Ok(r), Ok(p)) = (n.parse::<u64>(), r.parse::<u32>(), p.parse::<u32>())
            else {
                return false;
            };
            if !n.is_power_of_two() {
                return false;
            }
            let Ok(params) = scrypt::Params::new(n.trailing_zeros() as u8, r, p, 64) else {
                return false;
            };
            let mut out = [0u8; 64];
            if scrypt::scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut out).is_err() {
                return false;
            }
            out.to_vec()
        }
        _ => return false,
    };

    let hex: String = derived.iter().map(|b| format!("{:02x}", b)).collect();
    hex.eq_ignore_ascii_case(expected)
}
