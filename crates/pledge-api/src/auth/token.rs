//! 토큰 발급 및 검증.
//!
//! HS256 서명 JWT에 주체 ID, 권한 범위, 만료 시각을 담습니다.
//! 발급된 토큰은 저장하지 않으며 검증은 비밀 키만으로 수행합니다.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pledge_core::{AppError, Identity, SecurityConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// 토큰 페이로드.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 ID
    pub sub: String,
    /// 권한 범위
    pub scope: u32,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// 토큰 처리 에러.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("secret key unavailable")]
    KeyUnavailable,
    #[error("token encoding failed: {0}")]
    Encoding(String),
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("expired")]
    Expired,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::KeyUnavailable | TokenError::Encoding(_) => {
                AppError::internal(err.to_string())
            }
            TokenError::SignatureInvalid | TokenError::Expired => {
                AppError::authentication_failed(err.to_string())
            }
        }
    }
}

/// `chrono::Duration`이 표현할 수 있는 최대 초.
const MAX_TTL_SECS: i64 = i64::MAX / 1000;

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// 토큰 서비스.
///
/// 비밀 키는 생성 시 한 번 주입되며 이후 읽기 전용입니다.
/// 락 없이 여러 요청에서 동시에 사용할 수 있습니다.
pub struct TokenService {
    keys: Option<SigningKeys>,
    default_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("has_key", &self.keys.is_some())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl TokenService {
    /// 새 토큰 서비스 생성.
    ///
    /// # Arguments
    ///
    /// * `secret` - 서명 비밀 키 (없으면 발급/검증 시 `KeyUnavailable`)
    /// * `default_ttl_secs` - 기본 유효 기간 (초)
    pub fn new(secret: Option<&SecretString>, default_ttl_secs: u64) -> Self {
        let keys = secret.map(|secret| {
            let bytes = secret.expose_secret().as_bytes();
            SigningKeys {
                encoding: EncodingKey::from_secret(bytes),
                decoding: DecodingKey::from_secret(bytes),
            }
        });

        Self {
            keys,
            default_ttl: Duration::seconds(
                i64::try_from(default_ttl_secs)
                    .unwrap_or(i64::MAX)
                    .min(MAX_TTL_SECS),
            ),
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.secret_key.as_ref(), config.token_ttl_secs)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 기본 유효 기간으로 토큰 발급.
    pub fn issue_default(&self, subject_id: &str, scope: u32) -> Result<String, TokenError> {
        self.issue(subject_id, scope, self.default_ttl)
    }

    /// 토큰 발급.
    pub fn issue(&self, subject_id: &str, scope: u32, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(subject_id, scope, ttl, Utc::now())
    }

    /// 주어진 시각 기준으로 토큰 발급.
    pub fn issue_at(
        &self,
        subject_id: &str,
        scope: u32,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let keys = self.keys.as_ref().ok_or(TokenError::KeyUnavailable)?;

        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Encoding("expiry out of range".to_string()))?;

        let claims = Claims {
            sub: subject_id.to_string(),
            scope,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// 토큰 검증.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// 주어진 시각 기준으로 토큰 검증.
    ///
    /// 서명이 유효하고 `exp > now`인 경우에만 [`Identity`]를 반환합니다.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, TokenError> {
        let keys = self.keys.as_ref().ok_or(TokenError::KeyUnavailable)?;

        // 만료는 아래에서 주입된 시각으로 직접 검사 (leeway 없음)
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token.trim(), &keys.decoding, &validation)
            .map_err(|_| TokenError::SignatureInvalid)?;

        if data.claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(Identity::new(data.claims.sub, data.claims.scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledge_core::{scope, ErrorKind};
    use proptest::prelude::*;

    const TEST_SECRET: &str = "test-secret-key-for-token-testing-minimum-32-chars";

    fn service() -> TokenService {
        let secret = SecretString::new(TEST_SECRET.to_string().into_boxed_str());
        TokenService::new(Some(&secret), 3600)
    }

    fn tamper_signature(token: &str) -> String {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        format!("{}.{}", head, chars.into_iter().collect::<String>())
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service();
        let token = tokens.issue("u1", scope::USER, Duration::seconds(3600)).unwrap();

        let identity = tokens.verify(&token).unwrap();
        assert_eq!(identity, Identity::new("u1", 8));
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let issued_at = Utc::now() - Duration::hours(2);
        let token = tokens
            .issue_at("u1", scope::USER, Duration::hours(1), issued_at)
            .unwrap();

        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let tokens = service();
        let now = Utc::now();
        let token = tokens.issue_at("u1", 8, Duration::seconds(60), now).unwrap();

        assert!(tokens.verify_at(&token, now + Duration::seconds(59)).is_ok());
        assert_eq!(
            tokens.verify_at(&token, now + Duration::seconds(60)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_tampered_signature() {
        let tokens = service();
        let token = tokens.issue_default("u1", scope::ADMIN).unwrap();

        assert_eq!(
            tokens.verify(&tamper_signature(&token)),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn test_malformed_and_foreign_tokens() {
        let tokens = service();
        assert_eq!(tokens.verify("invalid.token.here"), Err(TokenError::SignatureInvalid));
        assert_eq!(tokens.verify(""), Err(TokenError::SignatureInvalid));

        let other_secret = SecretString::new("another-secret-key-minimum-32-characters".into());
        let other = TokenService::new(Some(&other_secret), 3600);
        let token = other.issue_default("u1", 8).unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_missing_key_is_internal() {
        let tokens = TokenService::new(None, 3600);
        let err = tokens.issue_default("u1", 8).unwrap_err();
        assert_eq!(err, TokenError::KeyUnavailable);
        assert_eq!(AppError::from(err).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_errors_classify_as_authentication_failed() {
        let expired = AppError::from(TokenError::Expired);
        let tampered = AppError::from(TokenError::SignatureInvalid);

        assert_eq!(expired.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(tampered.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(expired.message().first(), "expired");
        assert_eq!(tampered.message().first(), "signature invalid");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_issue_then_verify_roundtrips(
            subject in "[a-zA-Z0-9_-]{1,24}",
            scope in any::<u32>(),
            ttl in 1i64..10_000_000,
        ) {
            let tokens = service();
            let token = tokens.issue(&subject, scope, Duration::seconds(ttl)).unwrap();
            let identity = tokens.verify(&token).unwrap();
            prop_assert_eq!(identity.subject_id, subject);
            prop_assert_eq!(identity.scope, scope);
        }

        #[test]
        fn prop_tampered_signature_never_verifies(scope in any::<u32>()) {
            let tokens = service();
            let token = tokens.issue_default("subject", scope).unwrap();
            prop_assert_eq!(
                tokens.verify(&tamper_signature(&token)),
                Err(TokenError::SignatureInvalid)
            );
        }
    }
}
