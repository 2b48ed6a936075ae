//! Repository pattern for database operations.
//!
//! 데이터베이스 접근 로직을 라우트 핸들러에서 분리하여 관리합니다.

pub mod relations;
pub mod users;

pub use relations::{PgRelationStore, RelationRecord, RelationStore};
pub use users::{PgUserStore, UserRecord, UserStore};

#[cfg(any(test, feature = "test-utils"))]
pub use relations::MemoryRelationStore;
#[cfg(any(test, feature = "test-utils"))]
pub use users::MemoryUserStore;

/// 유니크 제약 위반 에러인지 확인합니다.
///
/// 동시 요청이 같은 키로 삽입을 시도하면 나중 요청이 이 에러를 받습니다.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

#[cfg(any(test, feature = "test-utils"))]
pub(crate) use memory_error::unique_violation;

#[cfg(any(test, feature = "test-utils"))]
mod memory_error {
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    /// 메모리 저장소에서 PostgreSQL 유니크 제약 위반을 흉내냅니다.
    #[derive(Debug)]
    struct UniqueViolation {
        constraint: &'static str,
    }

    impl fmt::Display for UniqueViolation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "duplicate key value violates unique constraint \"{}\"",
                self.constraint
            )
        }
    }

    impl StdError for UniqueViolation {}

    impl DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23505"))
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    pub(crate) fn unique_violation(constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(UniqueViolation { constraint }))
    }
}
