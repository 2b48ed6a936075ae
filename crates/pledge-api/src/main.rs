//! pledge API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 토큰 발급, 사용자 가입/프로필, 사용자 관계, 헬스 체크 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use pledge_api::cache::JsonCache;
use pledge_api::repository::{PgRelationStore, PgUserStore, RelationStore, UserStore};
use pledge_api::routes::build_app;
use pledge_api::services::WxClient;
use pledge_api::state::AppState;
use pledge_core::{init_logging, AppConfig};

/// CORS 레이어 생성.
///
/// `CORS_ORIGINS` 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
}

/// 데이터베이스 연결 및 마이그레이션.
async fn connect_database(config: &AppConfig) -> Result<sqlx::PgPool, Box<dyn std::error::Error>> {
    let url = config
        .database
        .url
        .as_deref()
        .ok_or("database.url is not configured (PLEDGE__DATABASE__URL)")?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Database connected and migrations applied");

    Ok(pool)
}

/// 애플리케이션 상태 생성.
async fn create_app_state(config: AppConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    let pool = connect_database(&config).await?;
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let relations: Arc<dyn RelationStore> = Arc::new(PgRelationStore::new(pool.clone()));

    let cache = match JsonCache::connect(&config.redis).await {
        Ok(cache) => cache,
        Err(e) => {
            warn!(error = %e, "Redis unavailable, continuing without cache");
            None
        }
    };

    let wx = WxClient::from_config(&config.wechat)?;
    if wx.is_none() {
        warn!("WeChat app credentials not set, mini-program login disabled");
    }

    if config.security.secret_key.is_none() {
        warn!("security.secret_key not set, token issuance will fail");
    }

    Ok(AppState::new(Arc::new(config), users, relations)
        .with_db_pool(pool)
        .with_cache(cache)
        .with_wx(wx))
}

fn create_router(state: Arc<AppState>) -> Router {
    build_app(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default()?;
    init_logging(&config.logging)?;

    info!(environment = ?config.environment, "Starting pledge API server...");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            error!(
                host = %config.server.host,
                port = config.server.port,
                error = %e,
                "Invalid socket address, check PLEDGE__SERVER__HOST and PLEDGE__SERVER__PORT"
            );
            e
        })?;

    let state = Arc::new(create_app_state(config).await?);
    info!(
        version = %state.version,
        has_cache = state.cache.is_some(),
        has_wechat = state.wx.is_some(),
        request_timeout = ?state.error_mapper().deadline(),
        "Application state initialized"
    );

    let app = create_router(state);

    info!(%addr, "API server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 반환합니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
