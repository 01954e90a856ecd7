//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! - `master`: 마스터 이력서 버전
//! - `user`: 사용자 계정과 인증 요청/응답
//! - `variant`: 채용 공고별 이력서 변형과 생성 결과
//!
//! `pub use X::*;`로 재공개하므로 `crate::models::Variant`처럼 바로 접근할 수 있습니다.

pub mod master;
pub mod user;
pub mod variant;

pub use master::*;
pub use user::*;
pub use variant::*;
