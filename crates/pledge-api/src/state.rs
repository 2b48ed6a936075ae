//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! 시작 시 한 번 구성되며 이후 읽기 전용입니다.
//! Arc로 래핑되어 여러 요청 간에 공유됩니다.

use std::sync::Arc;

use pledge_core::AppConfig;

use crate::auth::{AuthGate, TokenService};
use crate::cache::JsonCache;
use crate::error::ErrorMapper;
use crate::repository::{RelationStore, UserStore};
use crate::services::WxClient;

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 애플리케이션 설정
    pub config: Arc<AppConfig>,

    /// 토큰 발급/검증
    pub tokens: Arc<TokenService>,

    /// 사용자 저장소
    pub users: Arc<dyn UserStore>,

    /// 사용자 관계 저장소
    pub relations: Arc<dyn RelationStore>,

    /// 위챗 코드 교환 클라이언트 (미설정 시 None)
    pub wx: Option<Arc<WxClient>>,

    /// Redis 캐시 (미설정 시 None)
    pub cache: Option<JsonCache>,

    /// 데이터베이스 연결 풀 (readiness 확인용)
    pub db_pool: Option<sqlx::PgPool>,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    pub fn new(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        relations: Arc<dyn RelationStore>,
    ) -> Self {
        let tokens = Arc::new(TokenService::from_config(&config.security));

        Self {
            config,
            tokens,
            users,
            relations,
            wx: None,
            cache: None,
            db_pool: None,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_wx(mut self, wx: Option<WxClient>) -> Self {
        self.wx = wx.map(Arc::new);
        self
    }

    pub fn with_cache(mut self, cache: Option<JsonCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// 최소 권한 범위를 요구하는 인증 게이트.
    pub fn gate(&self, minimum_scope: u32) -> AuthGate {
        AuthGate::new(self.tokens.clone(), minimum_scope)
    }

    pub fn error_mapper(&self) -> ErrorMapper {
        ErrorMapper::from_config(&self.config)
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
            None => false,
        }
    }

    /// Redis 연결 상태 확인.
    pub async fn is_redis_healthy(&self) -> bool {
        match &self.cache {
            Some(cache) => cache.health_check().await.unwrap_or(false),
            None => false,
        }
    }
}

/// 테스트용 AppState 생성.
///
/// 비밀 키가 설정된 운영 모드 설정과 메모리 사용자 저장소를 사용합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    let config = AppConfig::from_toml_str(TEST_CONFIG).expect("Failed to parse test config");
    create_test_state_with(config, Arc::new(crate::repository::MemoryUserStore::new()))
}

/// 주어진 설정과 저장소로 테스트용 AppState 생성.
///
/// 관계 저장소는 같은 사용자 저장소를 공유하는 메모리 저장소입니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state_with(
    config: AppConfig,
    users: Arc<crate::repository::MemoryUserStore>,
) -> AppState {
    let relations = Arc::new(crate::repository::MemoryRelationStore::new(users.clone()));
    AppState::new(Arc::new(config), users, relations)
}

/// 테스트 설정 (운영 모드, 제한 시간 없음).
#[cfg(any(test, feature = "test-utils"))]
pub const TEST_CONFIG: &str = r#"
environment = "production"

[server]
request_timeout_secs = 0

[security]
secret_key = "test-secret-key-for-api-testing-minimum-32-chars"
token_ttl_secs = 3600
"#;
