//! 인증 및 권한 부여.
//!
//! 서명된 만료 토큰 기반 인증과 정수 권한 범위 기반 접근 제어를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`TokenService`]: 토큰 발급/검증
//! - [`AuthGate`]: 라우트별 인증 게이트 ([`authorize`] 미들웨어)
//! - [`Authenticated`]: 인증된 호출자 추출기
//! - 비밀번호 해싱 함수
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(
//!     Authenticated(identity): Authenticated,
//! ) -> impl IntoResponse {
//!     format!("Hello, {}!", identity.subject_id)
//! }
//! ```

mod credential;
mod gate;
mod password;
mod token;

pub use credential::extract_credential;
pub use gate::{authorize, AuthGate, Authenticated};
pub use password::{hash_password, validate_password_charset, verify_password, PasswordError};
pub use token::{Claims, TokenError, TokenService};
