//! REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API
//! - 토큰 인증 및 정수 권한 범위 기반 접근 제어
//! - 모든 실패를 균일한 에러 응답으로 바꾸는 에러 매퍼
//! - 헬스 체크 엔드포인트
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 토큰 서비스, 인증 게이트, 비밀번호 해싱
//! - [`error`]: API 에러 및 에러 매퍼
//! - [`middleware`]: HTTP 미들웨어
//! - [`validation`]: 요청 검증 추출기

pub mod auth;
pub mod cache;
pub mod error;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;

pub use auth::{authorize, AuthGate, Authenticated, TokenError, TokenService};
pub use error::{ApiError, ApiResult, ErrorBody, ErrorMapper, Success};
pub use middleware::map_errors;
pub use routes::{build_app, create_api_router};
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
