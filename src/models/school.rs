// src/models/school.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Basic,
    Pro,
    Enterprise,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Pro => "pro",
            SubscriptionPlan::Enterprise => "enterprise",
        }
    }
}

impl FromStr for SubscriptionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(SubscriptionPlan::Basic),
            "pro" => Ok(SubscriptionPlan::Pro),
            "enterprise" => Ok(SubscriptionPlan::Enterprise),
            other => Err(format!("unknown subscription plan '{}'", other)),
        }
    }
}

/// Represents the 'schools' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub subscription_plan: SubscriptionPlan,
    pub max_students: i32,
    pub max_teachers: i32,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a school.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSchoolRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    pub subscription_plan: SubscriptionPlan,
    #[validate(range(min = 1))]
    pub max_students: i32,
    #[validate(range(min = 1))]
    pub max_teachers: i32,
}

/// DTO for updating a school. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSchoolRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub address: Option<String>,
    pub subscription_plan: Option<SubscriptionPlan>,
    #[validate(range(min = 1))]
    pub max_students: Option<i32>,
    #[validate(range(min = 1))]
    pub max_teachers: Option<i32>,
    pub is_active: Option<bool>,
}

/// Represents the 'classes' table. A teaching group within one school.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub teacher_id: Uuid,
    pub school_id: Uuid,
    pub year_group: i32,
    pub subject: String,
    pub student_ids: Vec<Uuid>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Query parameters for listing a school's classes.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClassFilter {
    pub teacher_id: Option<Uuid>,
}

impl ClassFilter {
    pub fn matches(&self, class: &Class) -> bool {
        class.is_active && self.teacher_id.is_none_or(|id| class.teacher_id == id)
    }
}

/// DTO for creating a class.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub school_id: Uuid,
    /// Defaults to the caller when omitted.
    pub teacher_id: Option<Uuid>,
    #[validate(range(min = 1, max = 13))]
    pub year_group: i32,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[serde(default)]
    pub student_ids: Vec<Uuid>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}
