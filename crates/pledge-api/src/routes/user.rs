//! 사용자 endpoint.
//!
//! # 엔드포인트
//!
//! - `POST /user/register` - 이메일 가입
//! - `POST /user/complete` - 닉네임 설정 (USER 이상)
//! - `GET /user/isNameRepeat` - 닉네임 중복 확인
//! - `GET /user/{id}` - 사용자 조회 (ADMIN 이상)

use axum::{
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use pledge_core::{scope, AppError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::auth::{authorize, hash_password, validate_password_charset, Authenticated};
use crate::error::{ApiError, ApiResult, Success};
use crate::repository::{is_unique_violation, UserRecord};
use crate::state::AppState;
use crate::validation::{FieldOrder, ValidatedJson, ValidatedQuery};

/// 가입 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    #[validate(custom(function = "validate_password_charset"))]
    pub password: String,
    pub password2: String,
    #[validate(length(min = 6, max = 12, message = "nickname must be 6 to 12 characters"))]
    pub nickname: String,
}

impl FieldOrder for RegisterRequest {
    const FIELDS: &'static [&'static str] = &["email", "password", "password2", "nickname"];
}

/// 닉네임 요청 (본문 또는 쿼리).
#[derive(Debug, Deserialize, Validate)]
pub struct NicknameRequest {
    #[validate(length(min = 6, max = 12, message = "nickname must be 6 to 12 characters"))]
    pub nickname: String,
}

impl FieldOrder for NicknameRequest {}

#[derive(Debug, Serialize, Deserialize)]
pub struct NameRepeatResponse {
    pub is_repeat: bool,
}

/// 이메일 가입.
///
/// POST /user/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<Success> {
    if request.password != request.password2 {
        return Err(AppError::parameter_invalid("passwords do not match").into());
    }

    let hash = hash_password(&request.password)?;
    let id = state
        .users
        .create_with_email(&request.email, &hash, &request.nickname)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::parameter_invalid("email already registered").into()
            } else {
                ApiError::from(e)
            }
        })?;

    info!(user_id = id, "User registered");
    Ok(Success)
}

/// 호출자의 닉네임 설정.
///
/// POST /user/complete
pub async fn complete_profile(
    State(state): State<Arc<AppState>>,
    Authenticated(identity): Authenticated,
    ValidatedJson(request): ValidatedJson<NicknameRequest>,
) -> ApiResult<Success> {
    let user_id = parse_user_id(&identity.subject_id)?;

    if !state.users.update_nickname(user_id, &request.nickname).await? {
        return Err(AppError::not_found("user not found").into());
    }

    Ok(Success)
}

/// 닉네임 중복 확인.
///
/// GET /user/isNameRepeat?nickname=
pub async fn is_name_repeat(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(request): ValidatedQuery<NicknameRequest>,
) -> ApiResult<Json<NameRepeatResponse>> {
    let is_repeat = state.users.nickname_exists(&request.nickname).await?;
    Ok(Json(NameRepeatResponse { is_repeat }))
}

/// 사용자 조회.
///
/// GET /user/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserRecord>> {
    let user_id = parse_user_id(&id)?;

    state
        .users
        .find_by_id(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("user not found").into())
}

pub(crate) fn parse_user_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found("user not found"))
}

/// 사용자 라우터 생성.
pub fn user_router(state: &AppState) -> Router<Arc<AppState>> {
    let member = Router::new()
        .route("/complete", post(complete_profile))
        .route_layer(from_fn_with_state(state.gate(scope::USER), authorize));

    let admin = Router::new()
        .route("/{id}", get(get_user))
        .route_layer(from_fn_with_state(state.gate(scope::ADMIN), authorize));

    Router::new()
        .route("/register", post(register))
        .route("/isNameRepeat", get(is_name_repeat))
        .merge(member)
        .merge(admin)
}
