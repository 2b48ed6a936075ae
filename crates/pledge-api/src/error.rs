//! API 에러 경계.
//!
//! 핸들러와 인증 게이트에서 발생한 모든 실패는 [`ApiError`]로 표현되며
//! [`ErrorMapper`]에서 정확히 한 번 HTTP 응답으로 변환됩니다.
//!
//! # 에러 응답 형식
//!
//! ```json
//! {
//!   "errMsg": "insufficient scope",
//!   "errCode": 10004,
//!   "requestUrl": "GET /user/42"
//! }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pledge_core::{AppError, Environment, ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::auth::{PasswordError, TokenError};

/// 파이프라인을 통과하는 실패.
///
/// `App`만 분류된 에러이며, 나머지는 경계에서 `Internal`로 분류됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 분류된 애플리케이션 에러
    #[error(transparent)]
    App(#[from] AppError),
    /// 요청 처리 제한 시간 초과
    #[error("request deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),
    /// 핸들러 패닉
    #[error("handler panicked: {0}")]
    Panicked(String),
    /// 분류되지 않은 에러
    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl ApiError {
    /// 알려진 에러 종류를 가진 실패인지 확인.
    pub fn is_classified(&self) -> bool {
        matches!(self, ApiError::App(_))
    }

    /// 에러 분류 체계로 분류합니다.
    ///
    /// 분류된 에러는 그대로 통과하고 나머지는 기본 메시지의 `Internal`이 됩니다.
    /// 원본 에러는 서버 로그에만 남습니다.
    pub fn classify(&self) -> AppError {
        match self {
            ApiError::App(err) => err.clone(),
            ApiError::DeadlineExceeded(_) | ApiError::Panicked(_) | ApiError::Unclassified(_) => {
                AppError::new(ErrorKind::Internal)
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Unclassified(anyhow::Error::new(err).context("database query failed"))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Unclassified(anyhow::Error::new(err).context("upstream request failed"))
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::App(err.into())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Unclassified(anyhow::Error::new(err))
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

/// 응답에 실려 에러 매퍼까지 전달되는 실패.
///
/// 응답 extension은 `Clone`이어야 하므로 한 번만 꺼낼 수 있는 슬롯으로 감쌉니다.
#[derive(Clone)]
pub struct PendingFailure(Arc<Mutex<Option<ApiError>>>);

impl PendingFailure {
    fn new(err: ApiError) -> Self {
        Self(Arc::new(Mutex::new(Some(err))))
    }

    /// 실패를 꺼냅니다. 두 번째 호출부터는 `None`.
    pub fn take(&self) -> Option<ApiError> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 본문은 에러 매퍼가 채움
        let status = StatusCode::from_u16(self.classify().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = status.into_response();
        response.extensions_mut().insert(PendingFailure::new(self));
        response
    }
}

/// 응답에서 대기 중인 실패를 꺼냅니다.
pub fn take_failure(response: &mut Response) -> Option<ApiError> {
    response
        .extensions_mut()
        .remove::<PendingFailure>()
        .and_then(|pending| pending.take())
}

/// 에러 응답 본문.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// 에러 메시지 (목록이면 첫 번째 항목)
    pub err_msg: String,
    /// 에러 코드
    pub err_code: u32,
    /// "<METHOD> <path>"
    pub request_url: String,
}

/// 작업 성공 응답 (201).
#[derive(Debug, Clone, Copy, Default)]
pub struct Success;

impl IntoResponse for Success {
    fn into_response(self) -> Response {
        (
            StatusCode::CREATED,
            Json(serde_json::json!({ "errMsg": "ok", "errCode": 0 })),
        )
            .into_response()
    }
}

/// 실패를 균일한 에러 응답으로 변환하는 경계.
#[derive(Debug, Clone)]
pub struct ErrorMapper {
    environment: Environment,
    deadline: Option<Duration>,
}

impl ErrorMapper {
    pub fn new(environment: Environment, deadline: Option<Duration>) -> Self {
        Self {
            environment,
            deadline,
        }
    }

    pub fn from_config(config: &pledge_core::AppConfig) -> Self {
        Self::new(config.environment, config.server.request_timeout())
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// 실패를 응답으로 변환합니다.
    ///
    /// 개발 환경에서 분류되지 않은 실패는 수정 없이 `Err`로 되돌려줍니다.
    pub fn map(&self, failure: ApiError, request_url: &str) -> Result<Response, ApiError> {
        if self.environment.is_development() && !failure.is_classified() {
            return Err(failure);
        }

        let classified = failure.classify();
        match classified.kind() {
            ErrorKind::Internal => {
                error!(request = %request_url, error = ?failure, "Request failed");
            }
            kind => {
                warn!(request = %request_url, kind = %kind, error = %classified, "Request rejected");
            }
        }

        Ok(self.render(&classified, request_url))
    }

    /// 분류된 에러를 응답으로 작성합니다.
    ///
    /// 운영 환경에서 마스킹 대상 종류는 종류의 기본 메시지로 대체됩니다.
    pub fn render(&self, err: &AppError, request_url: &str) -> Response {
        let kind = err.kind();
        let err_msg = if !self.environment.is_development() && kind.is_masked_in_production() {
            kind.default_message().to_string()
        } else {
            err.message().first().to_string()
        };

        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            err_msg,
            err_code: err.code(),
            request_url: request_url.to_string(),
        };

        (status, Json(body)).into_response()
    }

    /// 다시 던져진 원본 에러를 그대로 노출합니다.
    ///
    /// 호스트 프레임워크의 기본 에러 처리에 해당하며 분류된 에러 본문을 쓰지 않습니다.
    pub fn escalate(&self, raw: ApiError, request_url: &str) -> Response {
        error!(request = %request_url, error = ?raw, "Unclassified failure surfaced");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{:?}", raw),
        )
            .into_response()
    }

    /// 실패 하나에 대해 정확히 하나의 응답을 만듭니다.
    pub fn finish(&self, failure: ApiError, request_url: &str) -> Response {
        match self.map(failure, request_url) {
            Ok(response) => response,
            Err(raw) => self.escalate(raw, request_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn production() -> ErrorMapper {
        ErrorMapper::new(Environment::Production, None)
    }

    fn development() -> ErrorMapper {
        ErrorMapper::new(Environment::Development, None)
    }

    #[test]
    fn test_classify_passes_known_kind_through() {
        let failure = ApiError::from(AppError::forbidden("insufficient scope"));
        assert!(failure.is_classified());
        assert_eq!(failure.classify(), AppError::forbidden("insufficient scope"));
    }

    #[test]
    fn test_classify_wraps_raw_failure_as_internal() {
        let failure = ApiError::from(anyhow::anyhow!("db down"));
        assert!(!failure.is_classified());

        let classified = failure.classify();
        assert_eq!(classified.kind(), ErrorKind::Internal);
        assert_eq!(classified.message().first(), "internal error");
        assert_eq!(classified.code(), 9999);
    }

    #[test]
    fn test_deadline_and_panic_are_internal() {
        assert_eq!(
            ApiError::DeadlineExceeded(Duration::from_secs(1)).classify().kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            ApiError::Panicked("boom".into()).classify().kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_pending_failure_is_taken_once() {
        let mut response = ApiError::from(AppError::not_found("missing")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let failure = take_failure(&mut response).unwrap();
        assert_eq!(failure.classify().kind(), ErrorKind::NotFound);
        assert!(take_failure(&mut response).is_none());
    }

    #[tokio::test]
    async fn test_render_error_body() {
        let response = production()
            .map(AppError::forbidden("insufficient scope").into(), "GET /user/42")
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["errMsg"], "insufficient scope");
        assert_eq!(body["errCode"], 10004);
        assert_eq!(body["requestUrl"], "GET /user/42");
    }

    #[tokio::test]
    async fn test_message_list_reduced_to_first() {
        let err = AppError::validation(vec!["email invalid".into(), "nickname too short".into()]);
        let response = production().map(err.into(), "POST /user/register").unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["errMsg"], "email invalid");
        assert_eq!(body["errCode"], 10001);
    }

    #[tokio::test]
    async fn test_production_masks_raw_failure() {
        let response = production()
            .map(anyhow::anyhow!("db down").into(), "GET /user/1")
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["errMsg"], "internal error");
        assert_eq!(body["errCode"], 9999);
    }

    #[tokio::test]
    async fn test_production_masks_authentication_detail() {
        let expired = production()
            .map(TokenError::Expired.into(), "GET /user/1")
            .unwrap();
        let tampered = production()
            .map(TokenError::SignatureInvalid.into(), "GET /user/1")
            .unwrap();

        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(expired).await, body_json(tampered).await);
    }

    #[tokio::test]
    async fn test_development_reraises_raw_failure() {
        let raw = development()
            .map(anyhow::anyhow!("db down").into(), "GET /user/1")
            .unwrap_err();
        assert!(matches!(raw, ApiError::Unclassified(_)));
        assert_eq!(raw.to_string(), "db down");
    }

    #[tokio::test]
    async fn test_development_renders_classified_detail() {
        let response = development()
            .map(TokenError::Expired.into(), "GET /user/1")
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["errMsg"], "expired");
    }

    #[tokio::test]
    async fn test_escalate_surfaces_raw_error() {
        let response = development().finish(anyhow::anyhow!("db down").into(), "GET /user/1");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("db down"));
        assert!(!text.contains("errCode"));
    }

    #[tokio::test]
    async fn test_success_body() {
        let response = Success.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["errMsg"], "ok");
        assert_eq!(body["errCode"], 0);
    }
}
