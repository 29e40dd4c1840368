// src/handlers/school.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        school::{Class, ClassFilter, CreateClassRequest, CreateSchoolRequest, School, UpdateSchoolRequest},
        user::UserRole,
    },
    store::DynStore,
    utils::{html::clean_optional, jwt::Claims},
};

/// Lists all schools.
/// Admin only.
pub async fn list_schools(State(store): State<DynStore>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_schools().await?))
}

/// Creates a school.
/// Admin only.
pub async fn create_school(
    State(store): State<DynStore>,
    Json(payload): Json<CreateSchoolRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let school = store
        .create_school(School {
            id: Uuid::new_v4(),
            name: payload.name,
            address: payload.address,
            subscription_plan: payload.subscription_plan,
            max_students: payload.max_students,
            max_teachers: payload.max_teachers,
            is_active: true,
            created_at: Utc::now(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(school)))
}

/// Updates a school by ID.
/// Admin only.
pub async fn update_school(
    State(store): State<DynStore>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSchoolRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut school = store
        .find_school(id)
        .await?
        .ok_or(AppError::NotFound("School not found".to_string()))?;

    if let Some(name) = payload.name {
        school.name = name;
    }
    if let Some(address) = payload.address {
        school.address = address;
    }
    if let Some(plan) = payload.subscription_plan {
        school.subscription_plan = plan;
    }
    if let Some(max_students) = payload.max_students {
        school.max_students = max_students;
    }
    if let Some(max_teachers) = payload.max_teachers {
        school.max_teachers = max_teachers;
    }
    if let Some(is_active) = payload.is_active {
        school.is_active = is_active;
    }

    store.update_school(&school).await?;
    Ok(Json(school))
}

/// Lists the active classes of a school, optionally only one teacher's.
/// Teachers only see their own school.
pub async fn list_classes(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(school_id): Path<Uuid>,
    Query(filter): Query<ClassFilter>,
) -> Result<impl IntoResponse, AppError> {
    ensure_school_access(&claims, school_id)?;
    Ok(Json(store.list_classes(school_id, &filter).await?))
}

/// Creates a class in a school.
/// Teacher or admin.
pub async fn create_class(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateClassRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_school_access(&claims, payload.school_id)?;

    let school = store
        .find_school(payload.school_id)
        .await?
        .ok_or(AppError::NotFound("School not found".to_string()))?;
    if !school.is_active {
        return Err(AppError::BadRequest("School is not active".to_string()));
    }

    let class = store
        .create_class(Class {
            id: Uuid::new_v4(),
            name: payload.name,
            teacher_id: payload.teacher_id.unwrap_or(claims.user_id()),
            school_id: payload.school_id,
            year_group: payload.year_group,
            subject: payload.subject,
            student_ids: payload.student_ids,
            description: clean_optional(payload.description),
            is_active: true,
            created_at: Utc::now(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(class)))
}

fn ensure_school_access(claims: &Claims, school_id: Uuid) -> Result<(), AppError> {
    if claims.role == UserRole::Admin || claims.school_id == Some(school_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not a member of this school".to_string()))
    }
}
