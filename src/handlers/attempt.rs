// src/handlers/attempt.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    handlers::quiz::{load_managed, load_visible},
    models::{
        attempt::{
            AttemptFilter, AttemptResponse, AttemptStatus, QuizAttempt, RecordAnswerRequest,
            SubmitAttemptRequest,
        },
        user::UserRole,
    },
    quiz::lifecycle,
    store::{DynStore, StoreError},
    utils::jwt::Claims,
};

/// Loads an attempt the caller owns. Other students' attempts read as missing.
async fn load_own(store: &DynStore, id: Uuid, claims: &Claims) -> Result<QuizAttempt, AppError> {
    let attempt = store.load_attempt(id).await?;
    if attempt.student_id != claims.user_id() {
        return Err(AppError::NotFound("Attempt not found".to_string()));
    }
    Ok(attempt)
}

/// Starts an attempt on a quiz for the calling student.
///
/// * 409 if the student already has one in progress; the message names it so
///   the client can resume instead.
pub async fn start_attempt(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if claims.role != UserRole::Student {
        return Err(AppError::Forbidden("Only students can take quizzes".to_string()));
    }

    let student_id = claims.user_id();
    let quiz = load_visible(&store, quiz_id, &claims.viewer()).await?;

    let open = store
        .list_attempts(&AttemptFilter {
            quiz_id: Some(quiz_id),
            student_id: Some(student_id),
            status: Some(AttemptStatus::InProgress),
        })
        .await?;

    let attempt = lifecycle::start(&quiz, student_id, &open)?;

    // Lost a race with a concurrent start: the store's conditional insert decides.
    let attempt = store.create_attempt(attempt).await.map_err(|e| match e {
        StoreError::Conflict(msg) => {
            tracing::warn!(%quiz_id, %student_id, "duplicate attempt start rejected by store");
            AppError::Conflict(msg)
        }
        other => AppError::from(other),
    })?;

    tracing::info!(attempt_id = %attempt.id, %quiz_id, %student_id, "attempt started");
    Ok((StatusCode::CREATED, Json(AttemptResponse::from(attempt))))
}

/// Records (or replaces) the answer to one question.
pub async fn record_answer(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<RecordAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = load_own(&store, id, &claims).await?;
    let quiz = store.load_quiz(attempt.quiz_id).await?;

    if quiz.question(req.question_id).is_none() {
        return Err(AppError::BadRequest("Question does not belong to this quiz".to_string()));
    }

    let attempt = lifecycle::record_answer(&attempt, req.question_id, req.value)?;
    store.save_attempt(&attempt).await?;

    Ok(Json(AttemptResponse::from(attempt)))
}

/// Grades and closes an attempt. Submitting twice is a 409.
pub async fn submit_attempt(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = load_own(&store, id, &claims).await?;
    let quiz = store.load_quiz(attempt.quiz_id).await?;

    let completed = lifecycle::submit(&attempt, &quiz, req.elapsed_seconds, &config.short_answer)?;

    let ungraded = completed.unsupported_questions();
    if !ungraded.is_empty() {
        tracing::warn!(
            attempt_id = %completed.id,
            questions = ?ungraded,
            "attempt contains questions without a scoring rule; needs manual review"
        );
    }

    store.save_attempt(&completed).await.map_err(|e| {
        tracing::error!("Failed to save completed attempt {}: {:?}", completed.id, e);
        AppError::from(e)
    })?;

    tracing::info!(
        attempt_id = %completed.id,
        score = completed.score,
        percentage = completed.percentage,
        "attempt submitted"
    );
    Ok(Json(AttemptResponse::from(completed)))
}

/// Reads one attempt. Students see their own; staff see attempts on quizzes
/// they manage.
pub async fn get_attempt(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = if claims.role.is_staff() {
        let attempt = store.load_attempt(id).await?;
        load_managed(&store, attempt.quiz_id, &claims.viewer()).await?;
        attempt
    } else {
        load_own(&store, id, &claims).await?
    };

    Ok(Json(AttemptResponse::from(attempt)))
}

/// Lists attempts, newest first.
///
/// Students are always limited to their own. Teachers only get attempts on
/// quizzes they manage; admins see everything.
pub async fn list_attempts(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Query(mut filter): Query<AttemptFilter>,
) -> Result<impl IntoResponse, AppError> {
    if claims.role == UserRole::Student {
        filter.student_id = Some(claims.user_id());
    }

    let mut attempts = store.list_attempts(&filter).await?;

    if claims.role == UserRole::Teacher {
        let viewer = claims.viewer();
        let mut managed: HashMap<Uuid, bool> = HashMap::new();
        for attempt in &attempts {
            if !managed.contains_key(&attempt.quiz_id) {
                let allowed = match store.load_quiz(attempt.quiz_id).await {
                    Ok(quiz) => quiz.can_manage(&viewer),
                    Err(StoreError::NotFound(_)) => false,
                    Err(e) => return Err(e.into()),
                };
                managed.insert(attempt.quiz_id, allowed);
            }
        }
        attempts.retain(|a| managed.get(&a.quiz_id).copied().unwrap_or(false));
    }

    let attempts: Vec<AttemptResponse> = attempts.into_iter().map(AttemptResponse::from).collect();
    Ok(Json(attempts))
}
