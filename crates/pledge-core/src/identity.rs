//! 인증된 주체와 라우트 권한 정책.
//!
//! 권한 범위(scope)는 정수이며 클수록 넓은 권한을 의미합니다.
//! 비트마스크가 아니라 단일 부등식으로 비교합니다.

use serde::{Deserialize, Serialize};

/// 관찰된 시스템에서 사용하는 권한 수준.
///
/// 게이트 자체는 임의의 정수 임계값을 받으며, 이 상수들은 라우트 구성에서만 사용합니다.
pub mod scope {
    /// 일반 사용자
    pub const USER: u32 = 8;
    /// 관리자
    pub const ADMIN: u32 = 16;
    /// 최고 관리자
    pub const SUPER_ADMIN: u32 = 32;
}

/// 검증된 토큰에서 얻은 호출자 정보.
///
/// 요청 하나의 수명 동안만 유지됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// 주체 ID (사용자 ID)
    pub subject_id: String,
    /// 권한 범위
    pub scope: u32,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>, scope: u32) -> Self {
        Self {
            subject_id: subject_id.into(),
            scope,
        }
    }
}

/// 라우트별 권한 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPolicy {
    /// 요구되는 최소 권한 범위
    pub minimum_scope: u32,
}

impl AuthPolicy {
    pub fn new(minimum_scope: u32) -> Self {
        Self { minimum_scope }
    }

    /// 주체가 정책을 만족하는지 확인.
    pub fn permits(&self, identity: &Identity) -> bool {
        identity.scope >= self.minimum_scope
    }
}
