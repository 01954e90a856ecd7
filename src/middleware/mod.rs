//! # 미들웨어 / 추출기(Extractor)
//!
//! - `auth`: JWT 토큰 발급·검증과 `AuthUser` 추출기

pub mod auth;
