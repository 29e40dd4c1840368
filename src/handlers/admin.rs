// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{AdminCreateUserRequest, AdminUpdateUserRequest, User, UserFilter},
    store::DynStore,
    utils::hash::hash_password,
};

/// Lists users, optionally by school and role.
/// Admin only.
pub async fn list_users(
    State(store): State<DynStore>,
    Query(filter): Query<UserFilter>,
) -> Result<impl IntoResponse, AppError> {
    let users = store.list_users(&filter).await.map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// Creates a user with a specific role (teachers and admins are created this way).
/// Admin only.
pub async fn create_user(
    State(store): State<DynStore>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let now = Utc::now();
    let user = store
        .create_user(User {
            id: Uuid::new_v4(),
            email: payload.email.trim().to_lowercase(),
            name: payload.name.trim().to_string(),
            password: hash_password(&payload.password)?,
            role: payload.role,
            school_id: payload.school_id,
            class_ids: payload.class_ids,
            avatar: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "admin created user");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(store): State<DynStore>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut user = store
        .find_user(id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if let Some(name) = payload.name {
        user.name = name;
    }
    if let Some(role) = payload.role {
        user.role = role;
    }
    if let Some(school_id) = payload.school_id {
        user.school_id = school_id;
    }
    if let Some(class_ids) = payload.class_ids {
        user.class_ids = class_ids;
    }
    if let Some(password) = payload.password {
        user.password = hash_password(&password)?;
    }
    user.updated_at = Utc::now();

    store.update_user(&user).await?;
    Ok(Json(user))
}
