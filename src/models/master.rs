use serde::{Deserialize, Serialize};

/// 마스터 이력서 한 버전: `cv_masters` 테이블 한 행에 대응합니다.
///
/// 한 번 저장된 버전은 수정되지 않고, 새 업로드는 항상 새 버전으로 추가됩니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MasterDocument {
    pub id: i64,
    pub user_id: i64,
    pub latex_content: String,
    pub original_filename: Option<String>,
    pub version: i64,
    pub uploaded_at: String,
    pub is_active: bool,
}

/// 버전 목록용 요약 (본문 제외)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MasterDocumentSummary {
    pub id: i64,
    pub user_id: i64,
    pub original_filename: Option<String>,
    pub version: i64,
    pub uploaded_at: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UploadMasterRequest {
    #[serde(default)]
    pub content: String,
    pub filename: Option<String>,
}

/// 활성 마스터 조회 결과. 사용자 버전이 없으면 배포 기본 문서가 쓰입니다.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveMaster {
    pub content: String,
    /// 사용자 소유 버전이면 Some, 기본 문서면 None
    pub master_id: Option<i64>,
    pub is_default: bool,
}
