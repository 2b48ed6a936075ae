//! 사용자 관계 endpoint.
//!
//! 모든 엔드포인트는 USER 이상의 권한 범위가 필요합니다.
//! 상대방은 닉네임으로 지정합니다.
//!
//! # 엔드포인트
//!
//! - `POST /relation/create` - 관계 생성
//! - `GET /relation/isExist?nickname=` - 관계 존재 여부
//! - `GET /relation/list` - 호출자의 관계 목록
//! - `POST /relation/delete` - 관계 삭제

use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use pledge_core::{scope, AppError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::user::{parse_user_id, NicknameRequest};
use crate::auth::{authorize, Authenticated};
use crate::error::{ApiError, ApiResult, Success};
use crate::repository::{is_unique_violation, RelationRecord};
use crate::state::AppState;
use crate::validation::{deserialize_type_code, FieldOrder, ValidatedJson, ValidatedQuery};

/// 관계 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationType {
    Friend,
    Family,
    Partner,
}

impl RelationType {
    /// 클라이언트가 보내는 숫자 코드.
    pub fn code(&self) -> u32 {
        match self {
            RelationType::Friend => 200,
            RelationType::Family => 201,
            RelationType::Partner => 202,
        }
    }

    /// 저장되는 관계 이름.
    pub fn name(&self) -> &'static str {
        match self {
            RelationType::Friend => "friend",
            RelationType::Family => "family",
            RelationType::Partner => "partner",
        }
    }
}

impl TryFrom<u32> for RelationType {
    type Error = AppError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(RelationType::Friend),
            201 => Ok(RelationType::Family),
            202 => Ok(RelationType::Partner),
            _ => Err(AppError::parameter_invalid("invalid relation type")),
        }
    }
}

/// 관계 생성 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRelationRequest {
    #[validate(length(min = 6, max = 12, message = "nickname must be 6 to 12 characters"))]
    pub nickname: String,
    #[serde(rename = "type", deserialize_with = "deserialize_type_code")]
    pub relation_type: u32,
}

impl FieldOrder for CreateRelationRequest {
    const FIELDS: &'static [&'static str] = &["nickname"];
}

/// 관계 삭제 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct DeleteRelationRequest {
    #[validate(range(min = 1, message = "id is required"))]
    pub id: i64,
}

impl FieldOrder for DeleteRelationRequest {}

#[derive(Debug, Serialize, Deserialize)]
pub struct IsExistResponse {
    pub is_exist: bool,
}

/// 닉네임으로 상대방을 찾습니다. 자기 자신은 거부합니다.
async fn resolve_counterpart(state: &AppState, uid: i64, nickname: &str) -> ApiResult<i64> {
    let cid = state
        .users
        .find_by_nickname(nickname)
        .await?
        .map(|user| user.id)
        .ok_or_else(|| AppError::not_found("no such friend"))?;

    if cid == uid {
        return Err(AppError::forbidden("cannot relate to self").into());
    }

    Ok(cid)
}

/// 관계 생성.
///
/// POST /relation/create
pub async fn create_relation(
    State(state): State<Arc<AppState>>,
    Authenticated(identity): Authenticated,
    ValidatedJson(request): ValidatedJson<CreateRelationRequest>,
) -> ApiResult<Success> {
    let relation = RelationType::try_from(request.relation_type)?;
    let uid = parse_user_id(&identity.subject_id)?;
    let cid = resolve_counterpart(&state, uid, &request.nickname).await?;

    let id = state
        .relations
        .create(uid, cid, relation.name())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::operation_failed("relation already exists").into()
            } else {
                ApiError::from(e)
            }
        })?;

    info!(relation_id = id, uid, cid, rname = relation.name(), "Relation created");
    Ok(Success)
}

/// 관계 존재 여부.
///
/// GET /relation/isExist?nickname=
pub async fn is_exist(
    State(state): State<Arc<AppState>>,
    Authenticated(identity): Authenticated,
    ValidatedQuery(request): ValidatedQuery<NicknameRequest>,
) -> ApiResult<Json<IsExistResponse>> {
    let uid = parse_user_id(&identity.subject_id)?;
    let cid = resolve_counterpart(&state, uid, &request.nickname).await?;

    let is_exist = state.relations.exists(uid, cid).await?;
    Ok(Json(IsExistResponse { is_exist }))
}

/// 호출자의 관계 목록.
///
/// GET /relation/list
pub async fn list_relations(
    State(state): State<Arc<AppState>>,
    Authenticated(identity): Authenticated,
) -> ApiResult<Json<Vec<RelationRecord>>> {
    let uid = parse_user_id(&identity.subject_id)?;
    Ok(Json(state.relations.list(uid).await?))
}

/// 관계 삭제. 호출자 소유의 관계만 삭제됩니다.
///
/// POST /relation/delete
pub async fn delete_relation(
    State(state): State<Arc<AppState>>,
    Authenticated(identity): Authenticated,
    ValidatedJson(request): ValidatedJson<DeleteRelationRequest>,
) -> ApiResult<Success> {
    let uid = parse_user_id(&identity.subject_id)?;

    if !state.relations.delete(request.id, uid).await? {
        return Err(AppError::not_found("relation not found").into());
    }

    info!(relation_id = request.id, uid, "Relation deleted");
    Ok(Success)
}

/// 관계 라우터 생성.
pub fn relation_router(state: &AppState) -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(create_relation))
        .route("/isExist", get(is_exist))
        .route("/list", get(list_relations))
        .route("/delete", post(delete_relation))
        .route_layer(from_fn_with_state(state.gate(scope::USER), authorize))
}
