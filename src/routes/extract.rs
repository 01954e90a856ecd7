//! # 커스텀 추출기(Extractor)
//!
//! axum의 `Path`/`Json`을 감싸서, 추출 실패(rejection)를 `AppError`로 바꿉니다.
//! 덕분에 `/variants/abc` 같은 잘못된 요청도 `{"error":{"code","message"}}` 형식으로 응답합니다.
//!
//! ```ignore
//! pub async fn get_variant(AppPath(id): AppPath<i64>) -> ... { }
//! ```

use crate::error::AppError;
use axum::extract::{FromRequest, FromRequestParts};

/// 경로 파라미터. 해석에 실패하면 400 `validation_error`
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// JSON 요청 본문. 형식이 틀리거나 Content-Type이 없으면 400 `validation_error`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
