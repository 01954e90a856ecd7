//! # 소유권 검사 (Ownership Guard)
//!
//! 변형(Variant)과 마스터 이력서는 정확히 한 사용자에게 속합니다.
//! 읽기/쓰기/삭제 전에 항상 `authorize()`를 거쳐야 합니다.
//!
//! ID는 저장소 경계에서 모두 `i64`로 통일되어 있으므로 비교도 정수끼리만 합니다.

use crate::error::AppError;
use crate::models::{MasterDocument, Variant};

/// 소유자 사용자 ID를 가진 리소스
pub trait Owned {
    fn owner_id(&self) -> i64;
}

impl Owned for Variant {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

impl Owned for MasterDocument {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

pub fn owns<R: Owned>(resource: &R, user_id: i64) -> bool {
    resource.owner_id() == user_id
}

/// 조회 결과에 소유권 검사를 적용합니다.
///
/// - 없음 → `AppError::NotFound`
/// - 다른 사용자 소유 → `AppError::Forbidden` (응답은 404와 동일하게 렌더링됨)
pub fn authorize<R: Owned>(resource: Option<R>, user_id: i64) -> Result<R, AppError> {
    match resource {
        None => Err(AppError::NotFound),
        Some(r) if owns(&r, user_id) => Ok(r),
        Some(r) => {
            tracing::warn!(
                owner = r.owner_id(),
                requester = user_id,
                "Denied access to a resource owned by another user"
            );
            Err(AppError::Forbidden)
        }
    }
}
