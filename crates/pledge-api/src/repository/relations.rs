//! Relation Repository
//!
//! 사용자 간 관계(친구, 가족 등)를 저장합니다.
//! 관계는 방향이 있으며 `(uid, cid)` 쌍마다 하나만 존재합니다.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// 관계 목록 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct RelationRecord {
    pub id: i64,
    /// 상대방 닉네임
    #[sqlx(default)]
    pub cname: Option<String>,
    /// 관계 이름
    pub rname: String,
}

/// 관계 저장소.
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// `uid`가 `cid`와 이미 관계를 맺었는지 확인.
    async fn exists(&self, uid: i64, cid: i64) -> Result<bool, sqlx::Error>;

    /// 관계 생성. 이미 있으면 유니크 제약 위반 에러.
    async fn create(&self, uid: i64, cid: i64, rname: &str) -> Result<i64, sqlx::Error>;

    /// `uid`가 맺은 모든 관계.
    async fn list(&self, uid: i64) -> Result<Vec<RelationRecord>, sqlx::Error>;

    /// `uid` 소유의 관계 삭제. 대상이 없으면 `false`.
    async fn delete(&self, id: i64, uid: i64) -> Result<bool, sqlx::Error>;
}

/// PostgreSQL 관계 저장소
#[derive(Debug, Clone)]
pub struct PgRelationStore {
    pool: PgPool,
}

impl PgRelationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationStore for PgRelationStore {
    async fn exists(&self, uid: i64, cid: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM relations WHERE uid = $1 AND cid = $2)",
        )
        .bind(uid)
        .bind(cid)
        .fetch_one(&self.pool)
        .await
    }

    async fn create(&self, uid: i64, cid: i64, rname: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO relations (uid, cid, rname)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(uid)
        .bind(cid)
        .bind(rname)
        .fetch_one(&self.pool)
        .await
    }

    async fn list(&self, uid: i64) -> Result<Vec<RelationRecord>, sqlx::Error> {
        sqlx::query_as::<_, RelationRecord>(
            r#"
            SELECT r.id, u.nickname AS cname, r.rname
            FROM relations r
            LEFT JOIN users u ON u.id = r.cid
            WHERE r.uid = $1
            ORDER BY r.id
            "#,
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await
    }

    async fn delete(&self, id: i64, uid: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM relations WHERE id = $1 AND uid = $2")
            .bind(id)
            .bind(uid)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryRelationStore;

#[cfg(any(test, feature = "test-utils"))]
mod memory {
    use super::*;
    use crate::repository::{unique_violation, MemoryUserStore, UserStore};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Clone)]
    struct StoredRelation {
        id: i64,
        uid: i64,
        cid: i64,
        rname: String,
    }

    /// 메모리 관계 저장소. 닉네임은 함께 주어진 사용자 저장소에서 조회합니다.
    #[derive(Debug)]
    pub struct MemoryRelationStore {
        users: Arc<MemoryUserStore>,
        relations: RwLock<Vec<StoredRelation>>,
        next_id: RwLock<i64>,
    }

    impl MemoryRelationStore {
        pub fn new(users: Arc<MemoryUserStore>) -> Self {
            Self {
                users,
                relations: RwLock::new(Vec::new()),
                next_id: RwLock::new(1),
            }
        }
    }

    #[async_trait]
    impl RelationStore for MemoryRelationStore {
        async fn exists(&self, uid: i64, cid: i64) -> Result<bool, sqlx::Error> {
            Ok(self
                .relations
                .read()
                .await
                .iter()
                .any(|r| r.uid == uid && r.cid == cid))
        }

        async fn create(&self, uid: i64, cid: i64, rname: &str) -> Result<i64, sqlx::Error> {
            let mut relations = self.relations.write().await;
            if relations.iter().any(|r| r.uid == uid && r.cid == cid) {
                return Err(unique_violation("relations_uid_cid_key"));
            }

            let mut next_id = self.next_id.write().await;
            let id = *next_id;
            *next_id += 1;

            relations.push(StoredRelation {
                id,
                uid,
                cid,
                rname: rname.to_string(),
            });
            Ok(id)
        }

        async fn list(&self, uid: i64) -> Result<Vec<RelationRecord>, sqlx::Error> {
            let owned: Vec<StoredRelation> = self
                .relations
                .read()
                .await
                .iter()
                .filter(|r| r.uid == uid)
                .cloned()
                .collect();

            let mut records = Vec::with_capacity(owned.len());
            for relation in owned {
                let cname = self
                    .users
                    .find_by_id(relation.cid)
                    .await?
                    .and_then(|user| user.nickname);
                records.push(RelationRecord {
                    id: relation.id,
                    cname,
                    rname: relation.rname,
                });
            }
            Ok(records)
        }

        async fn delete(&self, id: i64, uid: i64) -> Result<bool, sqlx::Error> {
            let mut relations = self.relations.write().await;
            let before = relations.len();
            relations.retain(|r| !(r.id == id && r.uid == uid));
            Ok(relations.len() < before)
        }
    }
}
