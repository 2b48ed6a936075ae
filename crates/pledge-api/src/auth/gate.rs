//! 라우트별 인증 게이트.
//!
//! 요청 단계: 자격증명 추출 → 토큰 검증 → 권한 범위 확인 → 주체 부착.
//! 어느 단계에서든 실패하면 핸들러를 호출하지 않고 거부합니다.
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/user/complete", post(complete))
//!     .route_layer(from_fn_with_state(
//!         AuthGate::new(state.tokens.clone(), scope::USER),
//!         authorize,
//!     ))
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use pledge_core::{AppError, AuthPolicy, Identity};
use tracing::debug;

use super::{extract_credential, TokenService};
use crate::error::ApiError;

/// 인증 게이트.
#[derive(Debug, Clone)]
pub struct AuthGate {
    tokens: Arc<TokenService>,
    policy: AuthPolicy,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenService>, minimum_scope: u32) -> Self {
        Self {
            tokens,
            policy: AuthPolicy::new(minimum_scope),
        }
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    /// 요청 헤더로 호출자를 인증하고 권한 범위를 확인합니다.
    ///
    /// 토큰 검증 실패는 그대로 전파됩니다.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AppError> {
        let token =
            extract_credential(headers).ok_or_else(|| AppError::forbidden("credential missing"))?;

        let identity = self.tokens.verify(&token)?;

        if !self.policy.permits(&identity) {
            return Err(AppError::forbidden("insufficient scope"));
        }

        Ok(identity)
    }
}

/// 인증 게이트 미들웨어.
///
/// 인증된 [`Identity`]를 요청 extension에 넣고 다음 단계를 호출합니다.
pub async fn authorize(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = gate.authenticate(request.headers())?;

    debug!(
        subject = %identity.subject_id,
        scope = identity.scope,
        minimum_scope = gate.policy.minimum_scope,
        "Request authorized"
    );

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// 인증된 호출자 추출기.
///
/// [`authorize`] 미들웨어가 부착한 주체를 꺼냅니다.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(|| AppError::forbidden("credential missing").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::take_failure;
    use axum::{
        body::Body,
        http::{header::AUTHORIZATION, Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use pledge_core::{scope, ErrorKind};
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn tokens() -> Arc<TokenService> {
        let secret = SecretString::new("gate-test-secret-key-minimum-32-characters".into());
        Arc::new(TokenService::new(Some(&secret), 3600))
    }

    fn app(tokens: Arc<TokenService>, minimum_scope: u32, calls: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/protected",
                get(move |Authenticated(identity): Authenticated| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        format!("{}:{}", identity.subject_id, identity.scope)
                    }
                }),
            )
            .route_layer(from_fn_with_state(
                AuthGate::new(tokens, minimum_scope),
                authorize,
            ))
    }

    fn request(authorization: Option<String>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/protected");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_authenticate_scenario() {
        let tokens = tokens();
        let token = tokens.issue_default("u1", scope::USER).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());

        let admin_gate = AuthGate::new(tokens.clone(), scope::ADMIN);
        let err = admin_gate.authenticate(&headers).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(err.message().first(), "insufficient scope");

        let user_gate = AuthGate::new(tokens, scope::USER);
        assert_eq!(
            user_gate.authenticate(&headers).unwrap(),
            Identity::new("u1", scope::USER)
        );
    }

    #[test]
    fn test_authenticate_missing_credential() {
        let gate = AuthGate::new(tokens(), scope::USER);
        let err = gate.authenticate(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(err.message().first(), "credential missing");
    }

    #[test]
    fn test_authenticate_propagates_verification_failure() {
        let gate = AuthGate::new(tokens(), scope::USER);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer not.a.token".parse().unwrap());

        let err = gate.authenticate(&headers).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(err.message().first(), "signature invalid");
    }

    #[tokio::test]
    async fn test_authorized_request_reaches_handler() {
        let tokens = tokens();
        let token = tokens.issue_default("u1", scope::USER).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(tokens, scope::USER, calls.clone())
            .oneshot(request(Some(format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"u1:8");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_basic_credential_reaches_handler() {
        let tokens = tokens();
        let token = tokens.issue_default("u1", scope::ADMIN).unwrap();
        let encoded = STANDARD.encode(format!("{}:", token));
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(tokens, scope::ADMIN, calls.clone())
            .oneshot(request(Some(format!("Basic {}", encoded))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_never_invokes_handler() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut response = app(tokens(), scope::USER, calls.clone())
            .oneshot(request(None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let failure = take_failure(&mut response).unwrap();
        assert_eq!(failure.classify().message().first(), "credential missing");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_insufficient_scope_never_invokes_handler() {
        let tokens = tokens();
        let token = tokens.issue_default("u1", scope::USER).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(tokens, scope::ADMIN, calls.clone())
            .oneshot(request(Some(format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let tokens = tokens();
        let issued_at = chrono::Utc::now() - chrono::Duration::hours(2);
        let token = tokens
            .issue_at("u1", scope::SUPER_ADMIN, chrono::Duration::hours(1), issued_at)
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(tokens, scope::USER, calls.clone())
            .oneshot(request(Some(format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
