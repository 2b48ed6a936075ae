//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/token` - 토큰 발급/검증
//! - `/user` - 사용자 가입/프로필
//! - `/relation` - 사용자 관계 (USER 이상)

pub mod health;
pub mod relation;
pub mod token;
pub mod user;

pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse, ReadinessResponse};
pub use relation::{
    relation_router, CreateRelationRequest, DeleteRelationRequest, IsExistResponse, RelationType,
};
pub use token::{token_router, LoginType, TokenRequest, TokenResponse, VerifyRequest, VerifyResponse};
pub use user::{user_router, NameRepeatResponse, NicknameRequest, RegisterRequest};

use axum::{middleware::from_fn_with_state, Router};
use pledge_core::AppError;
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::map_errors;
use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router(state: &AppState) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/token", token_router())
        .nest("/user", user_router(state))
        .nest("/relation", relation_router(state))
}

/// 에러 매퍼까지 적용된 애플리케이션 생성.
///
/// 일치하는 라우트가 없거나 경로는 맞지만 메서드가 다르면 `NotFound`로 응답합니다.
pub fn build_app(state: Arc<AppState>) -> Router {
    let mapper = state.error_mapper();

    create_api_router(&state)
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(state)
        .layer(from_fn_with_state(mapper, map_errors))
}

async fn not_found() -> ApiError {
    AppError::not_found("resource not found").into()
}
