//! 요청 파라미터 검증 추출기.
//!
//! 필드별 규칙은 `validator` derive로 선언하며 모든 필드를 한 번에 평가합니다.
//! 필드마다 첫 번째 실패 메시지만 남기고 [`FieldOrder::FIELDS`]에 선언된 순서로
//! 정렬해 `ParameterInvalid` 메시지 목록을 만듭니다.

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use pledge_core::AppError;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use validator::{Validate, ValidationErrors};

use crate::error::ApiError;

/// 검증 실패를 보고할 필드 순서.
///
/// 요청 구조체의 필드 선언 순서를 그대로 적습니다.
/// 목록에 없는 필드는 이름순으로 뒤에 붙습니다.
pub trait FieldOrder {
    const FIELDS: &'static [&'static str] = &[];
}

/// 검증된 JSON 본문.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + FieldOrder,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::parameter_invalid(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| validation_error(errors, T::FIELDS))?;
        Ok(ValidatedJson(value))
    }
}

/// 검증된 쿼리 문자열.
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate + FieldOrder,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::parameter_invalid(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| validation_error(errors, T::FIELDS))?;
        Ok(ValidatedQuery(value))
    }
}

/// 검증 실패를 `ParameterInvalid`로 변환합니다.
pub fn validation_error(errors: ValidationErrors, order: &[&str]) -> AppError {
    let rank = |field: &str| order.iter().position(|f| *f == field).unwrap_or(order.len());

    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|(a, _), (b, _)| (rank(&**a), a).cmp(&(rank(&**b), b)));

    let messages = fields
        .into_iter()
        .filter_map(|(field, errors)| {
            errors.first().map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: invalid value", field))
            })
        })
        .collect();

    AppError::validation(messages)
}

/// 숫자 또는 숫자 문자열로 전달된 유형 코드를 읽습니다.
///
/// `"type": 101`과 `"type": "101"`을 모두 받습니다.
pub fn deserialize_type_code<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TypeCode {
        Number(u32),
        Text(String),
    }

    match TypeCode::deserialize(deserializer)? {
        TypeCode::Number(code) => Ok(code),
        TypeCode::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid type code: {}", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledge_core::{ErrorKind, ErrorMessage};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(length(min = 8, message = "password too short"))]
        password: String,
        #[validate(email(message = "email invalid"))]
        email: String,
        #[validate(length(min = 6, message = "nickname too short"))]
        nickname: String,
        #[serde(default)]
        #[validate(length(max = 4))]
        tag: String,
    }

    impl FieldOrder for Sample {
        const FIELDS: &'static [&'static str] = &["password", "email", "nickname"];
    }

    #[derive(Debug, Deserialize)]
    struct Coded {
        #[serde(rename = "type", deserialize_with = "deserialize_type_code")]
        code: u32,
    }

    #[test]
    fn test_all_fields_evaluated_in_declared_order() {
        let sample = Sample {
            password: "short".into(),
            email: "not-an-email".into(),
            nickname: "abc".into(),
            tag: String::new(),
        };

        let err = validation_error(sample.validate().unwrap_err(), Sample::FIELDS);
        assert_eq!(err.kind(), ErrorKind::ParameterInvalid);
        assert_eq!(
            err.message(),
            &ErrorMessage::List(vec![
                "password too short".into(),
                "email invalid".into(),
                "nickname too short".into(),
            ])
        );
        assert_eq!(err.message().first(), "password too short");
    }

    #[test]
    fn test_undeclared_fields_sorted_by_name() {
        let sample = Sample {
            password: "short".into(),
            email: "not-an-email".into(),
            nickname: "abc".into(),
            tag: String::new(),
        };

        let err = validation_error(sample.validate().unwrap_err(), &["nickname"]);
        assert_eq!(
            err.message(),
            &ErrorMessage::List(vec![
                "nickname too short".into(),
                "email invalid".into(),
                "password too short".into(),
            ])
        );
    }

    #[test]
    fn test_type_code_accepts_number_or_numeric_string() {
        let number: Coded = serde_json::from_str(r#"{"type": 101}"#).unwrap();
        let text: Coded = serde_json::from_str(r#"{"type": "101"}"#).unwrap();
        assert_eq!(number.code, 101);
        assert_eq!(text.code, 101);

        assert!(serde_json::from_str::<Coded>(r#"{"type": "email"}"#).is_err());
        assert!(serde_json::from_str::<Coded>(r#"{"type": -1}"#).is_err());
    }

    #[test]
    fn test_missing_message_falls_back_to_field_name() {
        let sample = Sample {
            password: "long-enough".into(),
            email: "user@example.com".into(),
            nickname: "nickname".into(),
            tag: "too-long".into(),
        };

        let err = validation_error(sample.validate().unwrap_err(), Sample::FIELDS);
        assert_eq!(err.message().first(), "tag: invalid value");
    }

    #[tokio::test]
    async fn test_validated_json_rejects_bad_body() {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(r#"{"password":"long-enough","email":"bad","nickname":"abcdefg"}"#))
            .unwrap();

        let err = ValidatedJson::<Sample>::from_request(request, &())
            .await
            .unwrap_err();
        let classified = err.classify();
        assert_eq!(classified.kind(), ErrorKind::ParameterInvalid);
        assert_eq!(classified.message().first(), "email invalid");
    }

    #[tokio::test]
    async fn test_validated_json_rejects_malformed_json() {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();

        let err = ValidatedJson::<Sample>::from_request(request, &())
            .await
            .unwrap_err();
        assert_eq!(err.classify().kind(), ErrorKind::ParameterInvalid);
    }
}
