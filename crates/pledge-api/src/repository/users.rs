//! User Repository
//!
//! 사용자 계정 관련 데이터베이스 연산을 담당합니다.
//! 이메일 가입 계정과 위챗 openid 계정이 같은 테이블을 공유합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

// ================================================================================================
// Types
// ================================================================================================

/// 사용자 레코드
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserRecord {
    pub id: i64,
    #[sqlx(default)]
    pub email: Option<String>,
    /// Argon2 PHC 해시
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub password: Option<String>,
    #[sqlx(default)]
    pub nickname: Option<String>,
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub openid: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 사용자 저장소.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 이메일 계정 생성. 새 사용자 ID 반환.
    ///
    /// 이미 등록된 이메일이면 유니크 제약 위반 에러.
    async fn create_with_email(
        &self,
        email: &str,
        password_hash: &str,
        nickname: &str,
    ) -> Result<i64, sqlx::Error>;

    /// 위챗 openid 계정 생성. 새 사용자 ID 반환.
    async fn create_with_openid(&self, openid: &str) -> Result<i64, sqlx::Error>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, sqlx::Error>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error>;

    async fn find_by_openid(&self, openid: &str) -> Result<Option<UserRecord>, sqlx::Error>;

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<UserRecord>, sqlx::Error>;

    /// 닉네임 변경. 대상이 없으면 `false`.
    async fn update_nickname(&self, id: i64, nickname: &str) -> Result<bool, sqlx::Error>;

    async fn nickname_exists(&self, nickname: &str) -> Result<bool, sqlx::Error>;
}

// ================================================================================================
// PostgreSQL
// ================================================================================================

/// PostgreSQL 사용자 저장소
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_with_email(
        &self,
        email: &str,
        password_hash: &str,
        nickname: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (email, password, nickname)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(nickname)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_with_openid(&self, openid: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (openid)
            VALUES ($1)
            RETURNING id
            "#,
        )
        .bind(openid)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, password, nickname, openid, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, password, nickname, openid, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_openid(&self, openid: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, password, nickname, openid, created_at
            FROM users
            WHERE openid = $1
            "#,
        )
        .bind(openid)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, password, nickname, openid, created_at
            FROM users
            WHERE nickname = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(nickname)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_nickname(&self, id: i64, nickname: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET nickname = $1 WHERE id = $2")
            .bind(nickname)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn nickname_exists(&self, nickname: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE nickname = $1)")
            .bind(nickname)
            .fetch_one(&self.pool)
            .await
    }
}

// ================================================================================================
// In-memory (테스트용)
// ================================================================================================

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryUserStore;

#[cfg(any(test, feature = "test-utils"))]
mod memory {
    use super::*;
    use crate::repository::unique_violation;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::RwLock;

    /// 메모리 사용자 저장소.
    #[derive(Debug, Default)]
    pub struct MemoryUserStore {
        users: RwLock<Vec<UserRecord>>,
        unavailable: AtomicBool,
    }

    impl MemoryUserStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// 이후 모든 연산을 연결 실패로 만듭니다.
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), sqlx::Error> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(sqlx::Error::Protocol("db down".to_string()));
            }
            Ok(())
        }

        /// 이메일과 openid 유니크 제약을 검사한 뒤 삽입합니다.
        async fn insert(&self, mut record: UserRecord) -> Result<i64, sqlx::Error> {
            let mut users = self.users.write().await;

            let taken = |a: &Option<String>, b: &Option<String>| a.is_some() && a == b;
            if users.iter().any(|u| taken(&record.email, &u.email)) {
                return Err(unique_violation("users_email_key"));
            }
            if users.iter().any(|u| taken(&record.openid, &u.openid)) {
                return Err(unique_violation("users_openid_key"));
            }

            record.id = users.len() as i64 + 1;
            let id = record.id;
            users.push(record);
            Ok(id)
        }

        async fn find<F>(&self, predicate: F) -> Option<UserRecord>
        where
            F: Fn(&UserRecord) -> bool,
        {
            self.users.read().await.iter().find(|u| predicate(u)).cloned()
        }
    }

    fn blank_record() -> UserRecord {
        UserRecord {
            id: 0,
            email: None,
            password: None,
            nickname: None,
            openid: None,
            created_at: Utc::now(),
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn create_with_email(
            &self,
            email: &str,
            password_hash: &str,
            nickname: &str,
        ) -> Result<i64, sqlx::Error> {
            self.check()?;
            let record = UserRecord {
                email: Some(email.to_string()),
                password: Some(password_hash.to_string()),
                nickname: Some(nickname.to_string()),
                ..blank_record()
            };
            self.insert(record).await
        }

        async fn create_with_openid(&self, openid: &str) -> Result<i64, sqlx::Error> {
            self.check()?;
            let record = UserRecord {
                openid: Some(openid.to_string()),
                ..blank_record()
            };
            self.insert(record).await
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
            self.check()?;
            Ok(self.find(|u| u.id == id).await)
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
            self.check()?;
            Ok(self.find(|u| u.email.as_deref() == Some(email)).await)
        }

        async fn find_by_openid(&self, openid: &str) -> Result<Option<UserRecord>, sqlx::Error> {
            self.check()?;
            Ok(self.find(|u| u.openid.as_deref() == Some(openid)).await)
        }

        async fn find_by_nickname(&self, nickname: &str) -> Result<Option<UserRecord>, sqlx::Error> {
            self.check()?;
            Ok(self.find(|u| u.nickname.as_deref() == Some(nickname)).await)
        }

        async fn update_nickname(&self, id: i64, nickname: &str) -> Result<bool, sqlx::Error> {
            self.check()?;
            let mut users = self.users.write().await;
            match users.iter_mut().find(|u| u.id == id) {
                Some(user) => {
                    user.nickname = Some(nickname.to_string());
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn nickname_exists(&self, nickname: &str) -> Result<bool, sqlx::Error> {
            self.check()?;
            Ok(self
                .find(|u| u.nickname.as_deref() == Some(nickname))
                .await
                .is_some())
        }
    }
}
