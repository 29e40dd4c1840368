// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{QuizStore, StoreError, StoreResult};
use crate::models::{
    attempt::{AttemptFilter, QuizAttempt},
    quiz::{Quiz, QuizFilter},
    school::{Class, ClassFilter, School},
    user::{User, UserFilter},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    schools: HashMap<Uuid, School>,
    classes: HashMap<Uuid, Class>,
    quizzes: HashMap<Uuid, Quiz>,
    attempts: HashMap<Uuid, QuizAttempt>,
}

/// Process-local store. Each write runs under one lock, so the conditional
/// attempt insert is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Conflict(format!("email '{}' already registered", user.email)));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let slot = tables.users.get_mut(&user.id).ok_or(StoreError::NotFound("user"))?;
        *slot = user.clone();
        Ok(())
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().filter(|u| filter.matches(u)).cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn create_school(&self, school: School) -> StoreResult<School> {
        self.tables.write().await.schools.insert(school.id, school.clone());
        Ok(school)
    }

    async fn find_school(&self, id: Uuid) -> StoreResult<Option<School>> {
        Ok(self.tables.read().await.schools.get(&id).cloned())
    }

    async fn update_school(&self, school: &School) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let slot = tables.schools.get_mut(&school.id).ok_or(StoreError::NotFound("school"))?;
        *slot = school.clone();
        Ok(())
    }

    async fn list_schools(&self) -> StoreResult<Vec<School>> {
        let tables = self.tables.read().await;
        let mut schools: Vec<School> = tables.schools.values().cloned().collect();
        schools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schools)
    }

    async fn create_class(&self, class: Class) -> StoreResult<Class> {
        self.tables.write().await.classes.insert(class.id, class.clone());
        Ok(class)
    }

    async fn list_classes(&self, school_id: Uuid, filter: &ClassFilter) -> StoreResult<Vec<Class>> {
        let tables = self.tables.read().await;
        let mut classes: Vec<Class> = tables
            .classes
            .values()
            .filter(|c| c.school_id == school_id && filter.matches(c))
            .cloned()
            .collect();
        classes.sort_by(|a, b| a.year_group.cmp(&b.year_group).then_with(|| a.name.cmp(&b.name)));
        Ok(classes)
    }

    async fn create_quiz(&self, quiz: Quiz) -> StoreResult<Quiz> {
        self.tables.write().await.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }

    async fn load_quiz(&self, id: Uuid) -> StoreResult<Quiz> {
        self.tables
            .read()
            .await
            .quizzes
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("quiz"))
    }

    async fn update_quiz(&self, quiz: &Quiz) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let slot = tables.quizzes.get_mut(&quiz.id).ok_or(StoreError::NotFound("quiz"))?;
        *slot = quiz.clone();
        Ok(())
    }

    async fn list_quizzes(&self, filter: &QuizFilter) -> StoreResult<Vec<Quiz>> {
        let tables = self.tables.read().await;
        let mut quizzes: Vec<Quiz> = tables.quizzes.values().filter(|q| filter.matches(q)).cloned().collect();
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quizzes)
    }

    async fn create_attempt(&self, attempt: QuizAttempt) -> StoreResult<QuizAttempt> {
        let mut tables = self.tables.write().await;
        let open = tables.attempts.values().any(|a| {
            a.quiz_id == attempt.quiz_id && a.student_id == attempt.student_id && a.is_in_progress()
        });
        if open {
            return Err(StoreError::Conflict(
                "an attempt is already in progress for this quiz".to_string(),
            ));
        }
        tables.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn load_attempt(&self, id: Uuid) -> StoreResult<QuizAttempt> {
        self.tables
            .read()
            .await
            .attempts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("attempt"))
    }

    async fn save_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let slot = tables.attempts.get_mut(&attempt.id).ok_or(StoreError::NotFound("attempt"))?;
        if slot.is_completed() {
            return Err(StoreError::Conflict("attempt is already completed".to_string()));
        }
        *slot = attempt.clone();
        Ok(())
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> StoreResult<Vec<QuizAttempt>> {
        let tables = self.tables.read().await;
        let mut attempts: Vec<QuizAttempt> =
            tables.attempts.values().filter(|a| filter.matches(a)).cloned().collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(attempts)
    }
}
