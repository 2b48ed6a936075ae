//! 에러 매핑 미들웨어.
//!
//! 파이프라인의 나머지 전체를 감싸며, 요청마다 정확히 하나의 응답을 만듭니다.
//! 핸들러 실패, 패닉, 제한 시간 초과 모두 [`ErrorMapper`]를 거칩니다.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;

use crate::error::{take_failure, ApiError, ErrorMapper};

/// 에러 매핑 미들웨어.
///
/// 라우터의 가장 바깥 레이어로 등록합니다.
pub async fn map_errors(State(mapper): State<ErrorMapper>, request: Request, next: Next) -> Response {
    let request_url = format!("{} {}", request.method(), request.uri().path());

    let downstream = AssertUnwindSafe(next.run(request)).catch_unwind();
    let outcome = match mapper.deadline() {
        Some(limit) => match tokio::time::timeout(limit, downstream).await {
            Ok(outcome) => outcome,
            Err(_) => return mapper.finish(ApiError::DeadlineExceeded(limit), &request_url),
        },
        None => downstream.await,
    };

    let mut response = match outcome {
        Ok(response) => response,
        Err(payload) => {
            return mapper.finish(ApiError::Panicked(panic_message(payload.as_ref())), &request_url)
        }
    };

    match take_failure(&mut response) {
        Some(failure) => mapper.finish(failure, &request_url),
        None => response,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
