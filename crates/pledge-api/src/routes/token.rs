//! 토큰 발급/검증 endpoint.
//!
//! # 엔드포인트
//!
//! - `POST /token/get` - 로그인 후 토큰 발급 (이메일 또는 위챗 미니프로그램)
//! - `POST /token/verify` - 토큰 유효성 확인

use axum::{extract::State, routing::post, Json, Router};
use pledge_core::{scope, AppError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{verify_password, PasswordError};
use crate::cache::openid_key;
use crate::error::ApiResult;
use crate::repository::{is_unique_violation, UserStore};
use crate::state::AppState;
use crate::validation::{deserialize_type_code, FieldOrder, ValidatedJson};

/// 로그인 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginType {
    /// 위챗 미니프로그램 로그인 코드
    MiniProgram,
    /// 이메일 + 비밀번호
    Email,
}

impl LoginType {
    pub fn code(&self) -> u32 {
        match self {
            LoginType::MiniProgram => 100,
            LoginType::Email => 101,
        }
    }
}

impl From<LoginType> for u32 {
    fn from(login_type: LoginType) -> Self {
        login_type.code()
    }
}

impl TryFrom<u32> for LoginType {
    type Error = AppError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            100 => Ok(LoginType::MiniProgram),
            101 => Ok(LoginType::Email),
            _ => Err(AppError::parameter_invalid("unsupported login type")),
        }
    }
}

/// 토큰 발급 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    /// 이메일 또는 위챗 로그인 코드
    #[validate(length(min = 4, max = 32, message = "account must be 4 to 32 characters"))]
    pub account: String,
    /// 비밀번호 (이메일 로그인 시)
    #[serde(default)]
    #[validate(length(min = 6, max = 128, message = "secret must be 6 to 128 characters"))]
    pub secret: Option<String>,
    /// 로그인 방식 코드 (숫자 또는 숫자 문자열)
    #[serde(rename = "type", deserialize_with = "deserialize_type_code")]
    pub login_type: u32,
}

impl FieldOrder for TokenRequest {
    const FIELDS: &'static [&'static str] = &["account", "secret"];
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// 토큰 검증 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
}

impl FieldOrder for VerifyRequest {}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub is_valid: bool,
}

/// 토큰 발급.
///
/// POST /token/get
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user_id = match LoginType::try_from(request.login_type)? {
        LoginType::Email => {
            let secret = request
                .secret
                .as_deref()
                .ok_or_else(|| AppError::parameter_invalid("secret is required for email login"))?;
            verify_email_login(state.users.as_ref(), &request.account, secret).await?
        }
        LoginType::MiniProgram => mini_program_login(&state, &request.account).await?,
    };

    let token = state
        .tokens
        .issue_default(&user_id.to_string(), scope::USER)?;

    info!(user_id = user_id, login_type = request.login_type, "Token issued");
    Ok(Json(TokenResponse { token }))
}

/// 토큰 유효성 확인. 잘못된 토큰에도 에러를 반환하지 않습니다.
///
/// POST /token/verify
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<VerifyRequest>,
) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        is_valid: state.tokens.verify(&request.token).is_ok(),
    })
}

/// 이메일 로그인 검증. 성공 시 사용자 ID 반환.
pub async fn verify_email_login(
    users: &dyn UserStore,
    email: &str,
    password: &str,
) -> ApiResult<i64> {
    let user = users
        .find_by_email(email)
        .await?
        .ok_or_else(|| AppError::authentication_failed("user not found"))?;

    let hash = user
        .password
        .as_deref()
        .ok_or_else(|| AppError::authentication_failed("user not found"))?;

    match verify_password(password, hash) {
        Ok(()) => Ok(user.id),
        Err(PasswordError::VerificationFailed) => {
            Err(AppError::authentication_failed("wrong password").into())
        }
        Err(e) => Err(e.into()),
    }
}

/// 위챗 로그인 코드로 사용자를 찾거나 등록합니다.
async fn mini_program_login(state: &AppState, code: &str) -> ApiResult<i64> {
    let wx = state
        .wx
        .as_ref()
        .ok_or_else(|| AppError::operation_failed("wechat login is not configured"))?;

    let openid = wx.code_to_openid(code).await?;
    let key = openid_key(&openid);

    // 캐시는 보조 수단이므로 실패해도 DB 조회로 진행
    if let Some(cache) = &state.cache {
        match cache.get::<i64>(&key).await {
            Ok(Some(user_id)) => return Ok(user_id),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "openid cache lookup failed"),
        }
    }

    let user_id = find_or_register_openid(state.users.as_ref(), &openid).await?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&key, &user_id).await {
            warn!(error = %e, "openid cache write failed");
        }
    }

    Ok(user_id)
}

/// openid 사용자를 찾고, 없으면 등록합니다.
///
/// 동시 요청이 먼저 등록했다면 유니크 제약 위반 후 다시 조회합니다.
pub async fn find_or_register_openid(users: &dyn UserStore, openid: &str) -> ApiResult<i64> {
    if let Some(user) = users.find_by_openid(openid).await? {
        return Ok(user.id);
    }

    match users.create_with_openid(openid).await {
        Ok(id) => {
            info!(user_id = id, "Registered WeChat user");
            Ok(id)
        }
        Err(e) if is_unique_violation(&e) => users
            .find_by_openid(openid)
            .await?
            .map(|user| user.id)
            .ok_or_else(|| e.into()),
        Err(e) => Err(e.into()),
    }
}

/// 토큰 라우터 생성.
pub fn token_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/get", post(get_token))
        .route("/verify", post(verify_token))
}
