// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::AttemptFilter,
        quiz::{PublicQuiz, Question, Quiz, QuizFilter, QuizRequest, Viewer},
        user::UserRole,
    },
    quiz::{stats, validate},
    store::DynStore,
    utils::{
        html::{clean_html, clean_optional},
        jwt::Claims,
    },
};

/// Loads a quiz the viewer is allowed to see. Hidden quizzes read as missing.
pub(crate) async fn load_visible(store: &DynStore, id: Uuid, viewer: &Viewer) -> Result<Quiz, AppError> {
    let quiz = store.load_quiz(id).await?;
    if !quiz.is_visible_to(viewer) {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }
    Ok(quiz)
}

/// Loads a quiz the viewer may change or report on.
pub(crate) async fn load_managed(store: &DynStore, id: Uuid, viewer: &Viewer) -> Result<Quiz, AppError> {
    let quiz = load_visible(store, id, viewer).await?;
    if !quiz.can_manage(viewer) {
        return Err(AppError::Forbidden("Only the quiz author can change this quiz".to_string()));
    }
    Ok(quiz)
}

/// Staff see full definitions; learners get questions without answers.
fn render(quiz: &Quiz, viewer: &Viewer) -> Response {
    if viewer.role.is_staff() {
        Json(quiz).into_response()
    } else {
        Json(PublicQuiz::from(quiz)).into_response()
    }
}

fn sanitize_questions(questions: Vec<Question>) -> Vec<Question> {
    questions
        .into_iter()
        .map(|mut q| {
            q.prompt = clean_html(&q.prompt);
            q.explanation = clean_optional(q.explanation);
            q
        })
        .collect()
}

/// Teachers may only scope quizzes to their own school.
fn check_scope(payload: &QuizRequest, claims: &Claims) -> Result<(), AppError> {
    match payload.school_id {
        Some(school_id) if claims.role != UserRole::Admin && claims.school_id != Some(school_id) => {
            Err(AppError::Forbidden("Cannot assign a quiz to another school".to_string()))
        }
        _ => Ok(()),
    }
}

/// Lists active quizzes visible to the caller, newest first.
pub async fn list_quizzes(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<QuizFilter>,
) -> Result<Response, AppError> {
    let viewer = claims.viewer();
    let quizzes: Vec<Quiz> = store
        .list_quizzes(&filter)
        .await?
        .into_iter()
        .filter(|q| q.is_visible_to(&viewer))
        .collect();

    if viewer.role.is_staff() {
        Ok(Json(quizzes).into_response())
    } else {
        let public: Vec<PublicQuiz> = quizzes.iter().map(PublicQuiz::from).collect();
        Ok(Json(public).into_response())
    }
}

/// Creates a draft quiz. Total marks are derived from the questions.
/// Teacher or admin.
pub async fn create_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    check_scope(&payload, &claims)?;

    let now = Utc::now();
    let mut quiz = Quiz {
        id: Uuid::new_v4(),
        title: payload.title.trim().to_string(),
        description: clean_optional(payload.description),
        subject: payload.subject.trim().to_string(),
        key_stage: payload.key_stage,
        difficulty: payload.difficulty,
        questions: sanitize_questions(payload.questions),
        created_by: claims.user_id(),
        creator_role: claims.role,
        is_public: payload.is_public,
        school_id: payload.school_id,
        class_ids: payload.class_ids,
        estimated_time: payload.estimated_time,
        total_marks: 0,
        passing_score: payload.passing_score,
        is_active: true,
        is_published: false,
        created_at: now,
        updated_at: now,
    };
    quiz.total_marks = quiz.computed_total_marks();

    let quiz = store.create_quiz(quiz).await?;
    tracing::info!(quiz_id = %quiz.id, author = %quiz.created_by, "created draft quiz");

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Fetches one quiz.
pub async fn get_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let viewer = claims.viewer();
    let quiz = load_visible(&store, id, &viewer).await?;
    Ok(render(&quiz, &viewer))
}

/// Replaces a draft quiz's content. Published quizzes are immutable.
/// Author or admin.
pub async fn update_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    check_scope(&payload, &claims)?;

    let mut quiz = load_managed(&store, id, &claims.viewer()).await?;
    if quiz.is_published {
        return Err(AppError::Conflict("Published quizzes cannot be edited".to_string()));
    }

    quiz.title = payload.title.trim().to_string();
    quiz.description = clean_optional(payload.description);
    quiz.subject = payload.subject.trim().to_string();
    quiz.key_stage = payload.key_stage;
    quiz.difficulty = payload.difficulty;
    quiz.questions = sanitize_questions(payload.questions);
    quiz.is_public = payload.is_public;
    quiz.school_id = payload.school_id;
    quiz.class_ids = payload.class_ids;
    quiz.estimated_time = payload.estimated_time;
    quiz.passing_score = payload.passing_score;
    quiz.total_marks = quiz.computed_total_marks();
    quiz.updated_at = Utc::now();

    store.update_quiz(&quiz).await?;
    Ok(Json(quiz))
}

/// Validates a draft and makes it available to learners.
///
/// Returns 422 with every violation when the definition is not publishable;
/// nothing is written in that case.
pub async fn publish_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_managed(&store, id, &claims.viewer()).await?;
    if quiz.is_published {
        return Ok(Json(quiz));
    }

    let mut quiz = validate(&quiz)
        .inspect_err(|errors| {
            tracing::debug!(quiz_id = %id, problems = errors.0.len(), "quiz failed validation");
        })?
        .into_inner();
    quiz.is_published = true;
    quiz.updated_at = Utc::now();

    store.update_quiz(&quiz).await?;
    tracing::info!(quiz_id = %quiz.id, total_marks = quiz.total_marks, "published quiz");

    Ok(Json(quiz))
}

/// Soft-deletes a quiz. Attempts already taken are kept.
/// Author or admin.
pub async fn delete_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut quiz = load_managed(&store, id, &claims.viewer()).await?;

    quiz.is_active = false;
    quiz.updated_at = Utc::now();
    store.update_quiz(&quiz).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Attempt count, average and pass rate for a quiz.
/// Author or admin.
pub async fn quiz_stats(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_managed(&store, id, &claims.viewer()).await?;

    let attempts = store
        .list_attempts(&AttemptFilter { quiz_id: Some(id), ..Default::default() })
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch attempts for stats: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(stats::summarize(&quiz, &attempts)))
}
