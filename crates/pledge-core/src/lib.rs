//! # Pledge Core
//!
//! pledge 백엔드 전반에서 공유하는 핵심 타입을 제공합니다.
//!
//! - 에러 분류 체계 ([`AppError`], [`ErrorKind`])
//! - 인증 주체와 권한 정책 ([`Identity`], [`AuthPolicy`], [`scope`])
//! - 설정 관리 ([`AppConfig`])
//! - 로깅 초기화

pub mod config;
pub mod error;
pub mod identity;
pub mod logging;

pub use config::*;
pub use error::*;
pub use identity::*;
pub use logging::*;
