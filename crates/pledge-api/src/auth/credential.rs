//! Authorization 헤더에서 자격증명 추출.
//!
//! 요청당 하나의 불투명 토큰을 다음 두 형식 중 하나로 받습니다.
//!
//! - `Authorization: Bearer <token>`
//! - `Authorization: Basic base64(<token>:<anything>)` (사용자 이름 필드가 토큰)

use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// 헤더에서 토큰을 추출합니다.
///
/// 헤더가 없거나 형식이 잘못되었거나 토큰이 비어 있으면 `None`.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, rest) = value.split_once(' ')?;
    let rest = rest.trim();

    let token = if scheme.eq_ignore_ascii_case("Bearer") {
        rest.to_string()
    } else if scheme.eq_ignore_ascii_case("Basic") {
        let decoded = STANDARD.decode(rest).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (name, _) = decoded.split_once(':')?;
        name.to_string()
    } else {
        return None;
    };

    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer() {
        assert_eq!(
            extract_credential(&headers("Bearer abc.def.ghi")),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(
            extract_credential(&headers("bearer abc.def.ghi")),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn test_basic_uses_user_name_field() {
        let encoded = STANDARD.encode("abc.def.ghi:");
        assert_eq!(
            extract_credential(&headers(&format!("Basic {}", encoded))),
            Some("abc.def.ghi".to_string())
        );

        let encoded = STANDARD.encode("abc.def.ghi:ignored");
        assert_eq!(
            extract_credential(&headers(&format!("Basic {}", encoded))),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn test_missing_or_malformed() {
        assert_eq!(extract_credential(&HeaderMap::new()), None);
        assert_eq!(extract_credential(&headers("Bearer")), None);
        assert_eq!(extract_credential(&headers("Bearer   ")), None);
        assert_eq!(extract_credential(&headers("Token abc")), None);
        assert_eq!(extract_credential(&headers("Basic !!!not-base64")), None);

        // 구분자 없음
        let encoded = STANDARD.encode("abc.def.ghi");
        assert_eq!(extract_credential(&headers(&format!("Basic {}", encoded))), None);

        // 빈 사용자 이름
        let encoded = STANDARD.encode(":secret");
        assert_eq!(extract_credential(&headers(&format!("Basic {}", encoded))), None);
    }
}
