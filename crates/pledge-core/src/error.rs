//! 애플리케이션 에러 분류 체계.
//!
//! 클라이언트에 노출 가능한 에러는 모두 [`AppError`]로 표현됩니다.
//! 각 에러는 닫힌 집합인 [`ErrorKind`] 중 하나에 속하며, 종류별로
//! 기본 HTTP 상태 코드, 에러 코드, 메시지를 가집니다.
//!
//! | Kind | 상태 | 코드 |
//! |---|---|---|
//! | `ParameterInvalid` | 400 | 10001 |
//! | `AuthenticationFailed` | 401 | 10004 |
//! | `Forbidden` | 403 | 10004 |
//! | `NotFound` | 404 | 10005 |
//! | `OperationFailed` | 404 | 10006 |
//! | `Internal` | 500 | 9999 |

use serde::Serialize;
use thiserror::Error;

/// 에러 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 요청 파라미터 오류
    ParameterInvalid,
    /// 토큰 검증 실패 (서명 불일치, 만료, 로그인 실패)
    AuthenticationFailed,
    /// 자격증명 누락 또는 권한 부족
    Forbidden,
    /// 리소스 없음
    NotFound,
    /// 요청은 올바르지만 작업을 수행할 수 없음
    OperationFailed,
    /// 서버 내부 에러
    Internal,
}

impl ErrorKind {
    /// 모든 에러 종류.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::ParameterInvalid,
        ErrorKind::AuthenticationFailed,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::OperationFailed,
        ErrorKind::Internal,
    ];

    /// 기본 HTTP 상태 코드.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::ParameterInvalid => 400,
            ErrorKind::AuthenticationFailed => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound | ErrorKind::OperationFailed => 404,
            ErrorKind::Internal => 500,
        }
    }

    /// 기본 에러 코드 (클라이언트용).
    pub fn default_code(&self) -> u32 {
        match self {
            ErrorKind::ParameterInvalid => 10001,
            ErrorKind::AuthenticationFailed | ErrorKind::Forbidden => 10004,
            ErrorKind::NotFound => 10005,
            ErrorKind::OperationFailed => 10006,
            ErrorKind::Internal => 9999,
        }
    }

    /// 기본 메시지.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::ParameterInvalid => "invalid parameter",
            ErrorKind::AuthenticationFailed => "authentication failed",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not found",
            ErrorKind::OperationFailed => "operation failed",
            ErrorKind::Internal => "internal error",
        }
    }

    /// 운영 환경에서 상세 메시지를 숨겨야 하는 종류인지 확인.
    ///
    /// 내부 에러의 원문과 토큰 검증 실패 사유(서명/만료)는
    /// 클라이언트에 노출하지 않습니다.
    pub fn is_masked_in_production(&self) -> bool {
        matches!(self, ErrorKind::Internal | ErrorKind::AuthenticationFailed)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ParameterInvalid => "parameter_invalid",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::OperationFailed => "operation_failed",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// 에러 메시지.
///
/// 필드 검증 실패는 여러 메시지를 가질 수 있으며,
/// 응답에는 첫 번째 메시지만 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorMessage {
    Single(String),
    List(Vec<String>),
}

impl ErrorMessage {
    /// 응답에 사용할 메시지. 목록이면 첫 번째 원소.
    pub fn first(&self) -> &str {
        match self {
            ErrorMessage::Single(message) => message,
            ErrorMessage::List(messages) => messages.first().map(String::as_str).unwrap_or(""),
        }
    }
}

impl std::fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorMessage::Single(message) => write!(f, "{}", message),
            ErrorMessage::List(messages) => write!(f, "{}", messages.join("; ")),
        }
    }
}

impl From<String> for ErrorMessage {
    fn from(message: String) -> Self {
        ErrorMessage::Single(message)
    }
}

impl From<&str> for ErrorMessage {
    fn from(message: &str) -> Self {
        ErrorMessage::Single(message.to_string())
    }
}

impl From<Vec<String>> for ErrorMessage {
    fn from(messages: Vec<String>) -> Self {
        ErrorMessage::List(messages)
    }
}

/// 분류된 애플리케이션 에러.
///
/// 실패 지점에서 생성되어 에러 매퍼에서 정확히 한 번 응답으로 변환됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    kind: ErrorKind,
    message: ErrorMessage,
    code: u32,
}

impl AppError {
    /// 종류의 기본 메시지와 코드로 생성.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: ErrorMessage::Single(kind.default_message().to_string()),
            code: kind.default_code(),
        }
    }

    /// 메시지를 덮어씁니다.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<ErrorMessage>) -> Self {
        self.message = message.into();
        self
    }

    /// 에러 코드를 덮어씁니다.
    #[must_use]
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = code;
        self
    }

    pub fn parameter_invalid(message: impl Into<ErrorMessage>) -> Self {
        Self::new(ErrorKind::ParameterInvalid).with_message(message)
    }

    pub fn authentication_failed(message: impl Into<ErrorMessage>) -> Self {
        Self::new(ErrorKind::AuthenticationFailed).with_message(message)
    }

    pub fn forbidden(message: impl Into<ErrorMessage>) -> Self {
        Self::new(ErrorKind::Forbidden).with_message(message)
    }

    pub fn not_found(message: impl Into<ErrorMessage>) -> Self {
        Self::new(ErrorKind::NotFound).with_message(message)
    }

    pub fn operation_failed(message: impl Into<ErrorMessage>) -> Self {
        Self::new(ErrorKind::OperationFailed).with_message(message)
    }

    pub fn internal(message: impl Into<ErrorMessage>) -> Self {
        Self::new(ErrorKind::Internal).with_message(message)
    }

    /// 필드 검증 실패 목록으로 생성.
    pub fn validation(messages: Vec<String>) -> Self {
        Self::new(ErrorKind::ParameterInvalid).with_message(messages)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &ErrorMessage {
        &self.message
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    /// HTTP 상태 코드. 종류에 의해 결정됩니다.
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl From<ErrorKind> for AppError {
    fn from(kind: ErrorKind) -> Self {
        AppError::new(kind)
    }
}

/// 애플리케이션 작업을 위한 Result 타입.
pub type AppResult<T> = Result<T, AppError>;
