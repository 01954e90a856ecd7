//! # 서비스 계층 (Business Logic)
//!
//! 라우트 핸들러와 DB 계층 사이에서 도메인 규칙을 담당합니다.
//!
//! 각 하위 모듈:
//! - `accounts`: 회원가입/로그인 (Argon2id)
//! - `artifacts`: 변형 폴더의 파일 입출력
//! - `compiler`: LaTeX → PDF 외부 컴파일
//! - `legacy`: 파일 기반 이전 버전의 데이터 가져오기
//! - `latex`: AI 응답 후처리 (점수 마커, 코드 펜스, 특수문자 이스케이프)
//! - `lifecycle`: 변형 생성·재컴파일·삭제 오케스트레이션
//! - `masters`: 마스터 이력서 버전 관리와 기본 문서 대체
//! - `ownership`: 소유권 검사
//! - `rewriter`: AI 재작성 클라이언트

pub mod accounts;
pub mod artifacts;
pub mod compiler;
pub mod latex;
pub mod legacy;
pub mod lifecycle;
pub mod masters;
pub mod ownership;
pub mod rewriter;
