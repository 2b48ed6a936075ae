//! 설정 관리.
//!
//! 시작 시 한 번 생성되어 토큰 서비스, 인증 게이트, 에러 매퍼에 참조로 전달됩니다.
//! 전역 상태로 보관하지 않습니다.
//!
//! 로드 순서: 기본값 → 설정 파일(선택) → `PLEDGE__` 접두사 환경 변수.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

use crate::logging::LogFormat;

/// 애플리케이션 설정.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 실행 환경
    #[serde(default)]
    pub environment: Environment,
    /// 토큰 서명 설정
    #[serde(default)]
    pub security: SecurityConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Redis 설정
    #[serde(default)]
    pub redis: RedisConfig,
    /// 위챗 미니프로그램 로그인 설정
    #[serde(default)]
    pub wechat: WechatConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 실행 환경.
///
/// 개발 환경에서는 분류되지 않은 에러가 에러 매퍼를 그대로 통과해 운영자에게 노출됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[serde(alias = "dev")]
    Development,
    #[default]
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    #[serde(default = "default_host")]
    pub host: String,
    /// 리스닝할 포트
    #[serde(default = "default_port")]
    pub port: u16,
    /// 요청 처리 제한 시간 (초, 0이면 비활성화)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// 요청 제한 시간.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// 토큰 서명 설정.
#[derive(Debug, Deserialize)]
pub struct SecurityConfig {
    /// 토큰 서명 비밀 키. 비어 있으면 미설정으로 취급합니다.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub secret_key: Option<SecretString>,
    /// 토큰 유효 기간 (초)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_token_ttl() -> u64 {
    60 * 60 * 24 * 30
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 연결 URL (postgres://...)
    #[serde(default)]
    pub url: Option<String>,
    /// 최대 연결 수
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}
fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Redis 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis URL (redis://host:port/db). 없으면 캐시를 사용하지 않습니다.
    #[serde(default)]
    pub url: Option<String>,
    /// 캐시 항목 기본 TTL (초)
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
}

fn default_cache_ttl() -> u64 {
    60 * 60 * 2
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            default_ttl_secs: default_cache_ttl(),
        }
    }
}

/// 위챗 미니프로그램 로그인 설정.
#[derive(Debug, Deserialize)]
pub struct WechatConfig {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub app_secret: Option<SecretString>,
    /// code → openid 교환 엔드포인트
    #[serde(default = "default_wechat_login_url")]
    pub login_url: String,
}

fn default_wechat_login_url() -> String {
    "https://api.weixin.qq.com/sns/jscode2session".to_string()
}

impl Default for WechatConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_secret: None,
            login_url: default_wechat_login_url(),
        }
    }
}

impl WechatConfig {
    pub fn is_configured(&self) -> bool {
        self.app_id.is_some() && self.app_secret.is_some()
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨 필터 (`RUST_LOG`가 우선)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 출력 형식
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "pledge_api=info,tower_http=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|value| !value.trim().is_empty())
        .map(|value| SecretString::new(value.into_boxed_str())))
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다. 파일은 없어도 됩니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("PLEDGE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// TOML 문자열에서 설정을 생성합니다.
    pub fn from_toml_str(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
