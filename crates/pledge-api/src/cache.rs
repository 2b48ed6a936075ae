//! Redis JSON cache.
//!
//! 값은 JSON 문자열로 직렬화되어 TTL과 함께 저장됩니다.
//! 위챗 openid → 사용자 ID 조회 결과를 기억하는 데 사용합니다.

use pledge_core::RedisConfig;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

/// Cache 에러.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Redis JSON cache.
#[derive(Clone)]
pub struct JsonCache {
    connection: MultiplexedConnection,
    default_ttl_secs: u64,
}

impl std::fmt::Debug for JsonCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCache")
            .field("default_ttl_secs", &self.default_ttl_secs)
            .finish()
    }
}

impl JsonCache {
    /// Redis에 연결합니다. URL이 설정되지 않았으면 `None`.
    pub async fn connect(config: &RedisConfig) -> Result<Option<Self>, CacheError> {
        let Some(url) = config.url.as_deref() else {
            return Ok(None);
        };

        info!("Connecting to Redis...");
        let client = Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        info!("Redis connection established");

        Ok(Some(Self {
            connection,
            default_ttl_secs: config.default_ttl_secs,
        }))
    }

    /// Redis 상태를 확인합니다.
    pub async fn health_check(&self) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        let result: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(result == "PONG")
    }

    /// cache에서 값을 가져옵니다.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        value.map(|json| decode(&json)).transpose()
    }

    /// 기본 TTL로 값을 설정합니다.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.set_with_ttl(key, value, self.default_ttl_secs).await
    }

    /// 사용자 정의 TTL로 값을 설정합니다.
    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), CacheError> {
        let json = encode(value)?;
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, json, ttl_secs).await?;
        Ok(())
    }
}

/// openid 조회용 cache 키.
pub fn openid_key(openid: &str) -> String {
    format!("openid:{}", openid)
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CacheError> {
    Ok(serde_json::to_string(value)?)
}

fn decode<T: DeserializeOwned>(json: &str) -> Result<T, CacheError> {
    Ok(serde_json::from_str(json)?)
}
