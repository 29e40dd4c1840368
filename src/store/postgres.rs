// src/store/postgres.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use super::{QuizStore, StoreError, StoreResult};
use crate::models::{
    attempt::{AttemptFilter, QuestionResult, QuizAttempt},
    quiz::{AnswerValue, Question, Quiz, QuizFilter},
    school::{Class, ClassFilter, School},
    user::{User, UserFilter},
};

const USER_COLUMNS: &str =
    "id, email, name, password, role, school_id, class_ids, avatar, created_at, updated_at";
const SCHOOL_COLUMNS: &str =
    "id, name, address, subscription_plan, max_students, max_teachers, is_active, created_at";
const CLASS_COLUMNS: &str = "id, name, teacher_id, school_id, year_group, subject, student_ids, description, is_active, created_at";
const QUIZ_COLUMNS: &str = "id, title, description, subject, key_stage, difficulty, questions, created_by, creator_role, is_public, school_id, class_ids, estimated_time, total_marks, passing_score, is_active, is_published, created_at, updated_at";
const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, answers, status, score, total_marks, percentage, passed, results, time_spent, started_at, completed_at";

/// Postgres-backed store. Enum columns are TEXT; nested documents are JSONB.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse<T: std::str::FromStr<Err = String>>(value: &str) -> StoreResult<T> {
    value.parse().map_err(StoreError::Backend)
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    password: String,
    role: String,
    school_id: Option<Uuid>,
    class_ids: Vec<Uuid>,
    avatar: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            password: row.password,
            role: parse(&row.role)?,
            school_id: row.school_id,
            class_ids: row.class_ids,
            avatar: row.avatar,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SchoolRow {
    id: Uuid,
    name: String,
    address: String,
    subscription_plan: String,
    max_students: i32,
    max_teachers: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<SchoolRow> for School {
    type Error = StoreError;

    fn try_from(row: SchoolRow) -> StoreResult<Self> {
        Ok(School {
            id: row.id,
            name: row.name,
            address: row.address,
            subscription_plan: parse(&row.subscription_plan)?,
            max_students: row.max_students,
            max_teachers: row.max_teachers,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ClassRow {
    id: Uuid,
    name: String,
    teacher_id: Uuid,
    school_id: Uuid,
    year_group: i32,
    subject: String,
    student_ids: Vec<Uuid>,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ClassRow> for Class {
    fn from(row: ClassRow) -> Self {
        Class {
            id: row.id,
            name: row.name,
            teacher_id: row.teacher_id,
            school_id: row.school_id,
            year_group: row.year_group,
            subject: row.subject,
            student_ids: row.student_ids,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuizRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    subject: String,
    key_stage: String,
    difficulty: String,
    questions: Json<Vec<Question>>,
    created_by: Uuid,
    creator_role: String,
    is_public: bool,
    school_id: Option<Uuid>,
    class_ids: Vec<Uuid>,
    estimated_time: i32,
    total_marks: i32,
    passing_score: i32,
    is_active: bool,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuizRow> for Quiz {
    type Error = StoreError;

    fn try_from(row: QuizRow) -> StoreResult<Self> {
        Ok(Quiz {
            id: row.id,
            title: row.title,
            description: row.description,
            subject: row.subject,
            key_stage: parse(&row.key_stage)?,
            difficulty: parse(&row.difficulty)?,
            questions: row.questions.0,
            created_by: row.created_by,
            creator_role: parse(&row.creator_role)?,
            is_public: row.is_public,
            school_id: row.school_id,
            class_ids: row.class_ids,
            estimated_time: to_u32(row.estimated_time),
            total_marks: to_u32(row.total_marks),
            passing_score: to_u32(row.passing_score),
            is_active: row.is_active,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    quiz_id: Uuid,
    student_id: Uuid,
    answers: Json<BTreeMap<Uuid, AnswerValue>>,
    status: String,
    score: i32,
    total_marks: i32,
    percentage: i32,
    passed: bool,
    results: Json<Vec<QuestionResult>>,
    time_spent: i32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AttemptRow> for QuizAttempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> StoreResult<Self> {
        Ok(QuizAttempt {
            id: row.id,
            quiz_id: row.quiz_id,
            student_id: row.student_id,
            answers: row.answers.0,
            status: parse(&row.status)?,
            score: to_u32(row.score),
            total_marks: to_u32(row.total_marks),
            percentage: to_u32(row.percentage),
            passed: row.passed,
            results: row.results.0,
            time_spent: to_u32(row.time_spent),
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl QuizStore for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users
            (id, email, name, password, role, school_id, class_ids, avatar, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.role.as_str())
        .bind(user.school_id)
        .bind(&user.class_ids)
        .bind(&user.avatar)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => {
                StoreError::Conflict(format!("email '{}' already registered", user.email))
            }
            other => other,
        })?;

        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, password = $3, role = $4, school_id = $5, class_ids = $6,
                avatar = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.role.as_str())
        .bind(user.school_id)
        .bind(&user.class_ids)
        .bind(&user.avatar)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM users WHERE TRUE", USER_COLUMNS));

        if let Some(school_id) = filter.school_id {
            builder.push(" AND school_id = ").push_bind(school_id);
        }
        if let Some(role) = filter.role {
            builder.push(" AND role = ").push_bind(role.as_str());
        }
        builder.push(" ORDER BY created_at DESC");

        let rows: Vec<UserRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        convert_all(rows)
    }

    async fn create_school(&self, school: School) -> StoreResult<School> {
        sqlx::query(
            r#"
            INSERT INTO schools
            (id, name, address, subscription_plan, max_students, max_teachers, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(school.id)
        .bind(&school.name)
        .bind(&school.address)
        .bind(school.subscription_plan.as_str())
        .bind(school.max_students)
        .bind(school.max_teachers)
        .bind(school.is_active)
        .bind(school.created_at)
        .execute(&self.pool)
        .await?;

        Ok(school)
    }

    async fn find_school(&self, id: Uuid) -> StoreResult<Option<School>> {
        let row: Option<SchoolRow> =
            sqlx::query_as(&format!("SELECT {} FROM schools WHERE id = $1", SCHOOL_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(School::try_from).transpose()
    }

    async fn update_school(&self, school: &School) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE schools
            SET name = $2, address = $3, subscription_plan = $4,
                max_students = $5, max_teachers = $6, is_active = $7
            WHERE id = $1
            "#,
        )
        .bind(school.id)
        .bind(&school.name)
        .bind(&school.address)
        .bind(school.subscription_plan.as_str())
        .bind(school.max_students)
        .bind(school.max_teachers)
        .bind(school.is_active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("school"));
        }
        Ok(())
    }

    async fn list_schools(&self) -> StoreResult<Vec<School>> {
        let rows: Vec<SchoolRow> =
            sqlx::query_as(&format!("SELECT {} FROM schools ORDER BY name", SCHOOL_COLUMNS))
                .fetch_all(&self.pool)
                .await?;
        convert_all(rows)
    }

    async fn create_class(&self, class: Class) -> StoreResult<Class> {
        sqlx::query(
            r#"
            INSERT INTO classes
            (id, name, teacher_id, school_id, year_group, subject, student_ids, description, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(class.id)
        .bind(&class.name)
        .bind(class.teacher_id)
        .bind(class.school_id)
        .bind(class.year_group)
        .bind(&class.subject)
        .bind(&class.student_ids)
        .bind(&class.description)
        .bind(class.is_active)
        .bind(class.created_at)
        .execute(&self.pool)
        .await?;

        Ok(class)
    }

    async fn list_classes(&self, school_id: Uuid, filter: &ClassFilter) -> StoreResult<Vec<Class>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM classes WHERE is_active AND school_id = ",
            CLASS_COLUMNS
        ));
        builder.push_bind(school_id);

        if let Some(teacher_id) = filter.teacher_id {
            builder.push(" AND teacher_id = ").push_bind(teacher_id);
        }
        builder.push(" ORDER BY year_group, name");

        let rows: Vec<ClassRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Class::from).collect())
    }

    async fn create_quiz(&self, quiz: Quiz) -> StoreResult<Quiz> {
        sqlx::query(
            r#"
            INSERT INTO quizzes
            (id, title, description, subject, key_stage, difficulty, questions, created_by,
             creator_role, is_public, school_id, class_ids, estimated_time, total_marks,
             passing_score, is_active, is_published, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.subject)
        .bind(quiz.key_stage.as_str())
        .bind(quiz.difficulty.as_str())
        .bind(Json(&quiz.questions))
        .bind(quiz.created_by)
        .bind(quiz.creator_role.as_str())
        .bind(quiz.is_public)
        .bind(quiz.school_id)
        .bind(&quiz.class_ids)
        .bind(to_i32(quiz.estimated_time))
        .bind(to_i32(quiz.total_marks))
        .bind(to_i32(quiz.passing_score))
        .bind(quiz.is_active)
        .bind(quiz.is_published)
        .bind(quiz.created_at)
        .bind(quiz.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(quiz)
    }

    async fn load_quiz(&self, id: Uuid) -> StoreResult<Quiz> {
        let row: Option<QuizRow> =
            sqlx::query_as(&format!("SELECT {} FROM quizzes WHERE id = $1", QUIZ_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.ok_or(StoreError::NotFound("quiz"))?.try_into()
    }

    async fn update_quiz(&self, quiz: &Quiz) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE quizzes
            SET title = $2, description = $3, subject = $4, key_stage = $5, difficulty = $6,
                questions = $7, is_public = $8, school_id = $9, class_ids = $10,
                estimated_time = $11, total_marks = $12, passing_score = $13,
                is_active = $14, is_published = $15, updated_at = $16
            WHERE id = $1
            "#,
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.subject)
        .bind(quiz.key_stage.as_str())
        .bind(quiz.difficulty.as_str())
        .bind(Json(&quiz.questions))
        .bind(quiz.is_public)
        .bind(quiz.school_id)
        .bind(&quiz.class_ids)
        .bind(to_i32(quiz.estimated_time))
        .bind(to_i32(quiz.total_marks))
        .bind(to_i32(quiz.passing_score))
        .bind(quiz.is_active)
        .bind(quiz.is_published)
        .bind(quiz.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("quiz"));
        }
        Ok(())
    }

    async fn list_quizzes(&self, filter: &QuizFilter) -> StoreResult<Vec<Quiz>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM quizzes WHERE is_active", QUIZ_COLUMNS));

        if let Some(key_stage) = filter.key_stage {
            builder.push(" AND key_stage = ").push_bind(key_stage.as_str());
        }
        if let Some(subject) = &filter.subject {
            builder.push(" AND subject = ").push_bind(subject.clone());
        }
        if let Some(created_by) = filter.created_by {
            builder.push(" AND created_by = ").push_bind(created_by);
        }
        builder.push(" ORDER BY created_at DESC");

        let rows: Vec<QuizRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        convert_all(rows)
    }

    async fn create_attempt(&self, attempt: QuizAttempt) -> StoreResult<QuizAttempt> {
        // The partial unique index on (quiz_id, student_id) WHERE status = 'in_progress'
        // turns a second open attempt into a unique violation.
        sqlx::query(
            r#"
            INSERT INTO quiz_attempts
            (id, quiz_id, student_id, answers, status, score, total_marks, percentage,
             passed, results, time_spent, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.quiz_id)
        .bind(attempt.student_id)
        .bind(Json(&attempt.answers))
        .bind(attempt.status.as_str())
        .bind(to_i32(attempt.score))
        .bind(to_i32(attempt.total_marks))
        .bind(to_i32(attempt.percentage))
        .bind(attempt.passed)
        .bind(Json(&attempt.results))
        .bind(to_i32(attempt.time_spent))
        .bind(attempt.started_at)
        .bind(attempt.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => StoreError::Conflict(
                "an attempt is already in progress for this quiz".to_string(),
            ),
            other => other,
        })?;

        Ok(attempt)
    }

    async fn load_attempt(&self, id: Uuid) -> StoreResult<QuizAttempt> {
        let row: Option<AttemptRow> =
            sqlx::query_as(&format!("SELECT {} FROM quiz_attempts WHERE id = $1", ATTEMPT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.ok_or(StoreError::NotFound("attempt"))?.try_into()
    }

    async fn save_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET answers = $2, status = $3, score = $4, total_marks = $5, percentage = $6,
                passed = $7, results = $8, time_spent = $9, completed_at = $10
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(attempt.id)
        .bind(Json(&attempt.answers))
        .bind(attempt.status.as_str())
        .bind(to_i32(attempt.score))
        .bind(to_i32(attempt.total_marks))
        .bind(to_i32(attempt.percentage))
        .bind(attempt.passed)
        .bind(Json(&attempt.results))
        .bind(to_i32(attempt.time_spent))
        .bind(attempt.completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from one that is already closed.
            let exists = sqlx::query("SELECT id FROM quiz_attempts WHERE id = $1")
                .bind(attempt.id)
                .fetch_optional(&self.pool)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::Conflict("attempt is already completed".to_string()),
                None => StoreError::NotFound("attempt"),
            });
        }
        Ok(())
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> StoreResult<Vec<QuizAttempt>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM quiz_attempts WHERE TRUE", ATTEMPT_COLUMNS));

        if let Some(quiz_id) = filter.quiz_id {
            builder.push(" AND quiz_id = ").push_bind(quiz_id);
        }
        if let Some(student_id) = filter.student_id {
            builder.push(" AND student_id = ").push_bind(student_id);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY started_at DESC");

        let rows: Vec<AttemptRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        convert_all(rows)
    }
}
