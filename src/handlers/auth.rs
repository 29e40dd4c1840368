// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, User, UserRole},
    store::DynStore,
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

/// Registers a new student.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(store): State<DynStore>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if let Some(school_id) = payload.school_id {
        store
            .find_school(school_id)
            .await?
            .ok_or(AppError::BadRequest("Unknown school".to_string()))?;
    }

    let now = Utc::now();
    let user = store
        .create_user(User {
            id: Uuid::new_v4(),
            email: payload.email.trim().to_lowercase(),
            name: payload.name.trim().to_string(),
            password: hash_password(&payload.password)?,
            role: UserRole::Student,
            school_id: payload.school_id,
            class_ids: Vec::new(),
            avatar: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!(user_id = %user.id, "registered student");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = store
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    let token = sign_jwt(&user, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role,
        "expires_in": config.jwt_expiration,
    })))
}

/// Returns the user behind the current token.
pub async fn me(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = store
        .find_user(claims.user_id())
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}
