// src/store/mod.rs

//! Persistence boundary. Handlers talk to a `QuizStore` trait object so the
//! same routes run against Postgres in production and memory in tests.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    attempt::{AttemptFilter, QuizAttempt},
    quiz::{Quiz, QuizFilter},
    school::{Class, ClassFilter, School},
    user::{User, UserFilter},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A conditional write lost: duplicate key, or an attempt already open.
    #[error("{0}")]
    Conflict(String),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("record"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait QuizStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    async fn create_school(&self, school: School) -> StoreResult<School>;
    async fn find_school(&self, id: Uuid) -> StoreResult<Option<School>>;
    async fn update_school(&self, school: &School) -> StoreResult<()>;
    async fn list_schools(&self) -> StoreResult<Vec<School>>;

    async fn create_class(&self, class: Class) -> StoreResult<Class>;
    /// Active classes of a school, by year group then name.
    async fn list_classes(&self, school_id: Uuid, filter: &ClassFilter) -> StoreResult<Vec<Class>>;

    async fn create_quiz(&self, quiz: Quiz) -> StoreResult<Quiz>;
    /// `NotFound` when absent.
    async fn load_quiz(&self, id: Uuid) -> StoreResult<Quiz>;
    async fn update_quiz(&self, quiz: &Quiz) -> StoreResult<()>;
    /// Active quizzes matching `filter`, newest first.
    async fn list_quizzes(&self, filter: &QuizFilter) -> StoreResult<Vec<Quiz>>;

    /// Inserts only if the student has no in-progress attempt on the quiz;
    /// otherwise `Conflict`.
    async fn create_attempt(&self, attempt: QuizAttempt) -> StoreResult<QuizAttempt>;
    async fn load_attempt(&self, id: Uuid) -> StoreResult<QuizAttempt>;
    /// Overwrites an in-progress attempt. A completed attempt is never
    /// rewritten; the call fails with `Conflict`.
    async fn save_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()>;
    /// Newest first.
    async fn list_attempts(&self, filter: &AttemptFilter) -> StoreResult<Vec<QuizAttempt>>;
}

pub type DynStore = Arc<dyn QuizStore>;
