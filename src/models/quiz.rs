// src/models/quiz.rs

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::config::TRUE_FALSE_OPTIONS;
use crate::models::user::UserRole;

/// UK curriculum stage a quiz targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStage {
    #[serde(rename = "KS1")]
    Ks1,
    #[serde(rename = "KS2")]
    Ks2,
    #[serde(rename = "KS3")]
    Ks3,
    #[serde(rename = "KS4")]
    Ks4,
}

impl KeyStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStage::Ks1 => "KS1",
            KeyStage::Ks2 => "KS2",
            KeyStage::Ks3 => "KS3",
            KeyStage::Ks4 => "KS4",
        }
    }
}

impl FromStr for KeyStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KS1" => Ok(KeyStage::Ks1),
            "KS2" => Ok(KeyStage::Ks2),
            "KS3" => Ok(KeyStage::Ks3),
            "KS4" => Ok(KeyStage::Ks4),
            other => Err(format!("unknown key stage '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    DragDrop,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::TrueFalse => "true-false",
            QuestionType::ShortAnswer => "short-answer",
            QuestionType::DragDrop => "drag-drop",
        };
        f.write_str(s)
    }
}

/// A submitted or expected answer: an option index or a free-text value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(i64),
    Text(String),
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Number(n) => write!(f, "{}", n),
            AnswerValue::Text(s) => f.write_str(s),
        }
    }
}

/// A single question. Owned exclusively by one quiz and stored inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// The text shown to the learner.
    pub prompt: String,

    /// Fixed choices. Empty for short-answer questions; implicit for true/false.
    #[serde(default)]
    pub options: Vec<String>,

    pub correct_answer: AnswerValue,

    pub explanation: Option<String>,

    pub marks: u32,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub curriculum_codes: Vec<String>,
}

impl Question {
    /// Choice labels a learner picks from.
    pub fn choices(&self) -> Vec<&str> {
        match self.question_type {
            QuestionType::TrueFalse if self.options.is_empty() => TRUE_FALSE_OPTIONS.to_vec(),
            _ => self.options.iter().map(String::as_str).collect(),
        }
    }
}

/// DTO for sending a question to a learner (excludes answer and explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: String,
    pub options: Vec<String>,
    pub marks: u32,
    pub tags: BTreeSet<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_type: q.question_type,
            prompt: q.prompt.clone(),
            options: q.choices().into_iter().map(str::to_owned).collect(),
            marks: q.marks,
            tags: q.tags.clone(),
        }
    }
}

/// Represents the 'quizzes' table. Questions live in a JSONB column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub key_stage: KeyStage,
    pub difficulty: Difficulty,
    pub questions: Vec<Question>,
    pub created_by: Uuid,
    pub creator_role: UserRole,
    pub is_public: bool,
    pub school_id: Option<Uuid>,
    pub class_ids: Vec<Uuid>,
    /// Minutes.
    pub estimated_time: u32,
    pub total_marks: u32,
    /// Percentage needed to pass.
    pub passing_score: u32,
    pub is_active: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    /// Sum of question marks. Saturates rather than wrapping on drafts that
    /// have not been through validation yet.
    pub fn computed_total_marks(&self) -> u32 {
        self.questions.iter().fold(0u32, |total, q| total.saturating_add(q.marks))
    }

    pub fn question(&self, id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Open for new attempts.
    pub fn is_available(&self) -> bool {
        self.is_published && self.is_active
    }

    pub fn is_visible_to(&self, viewer: &Viewer) -> bool {
        if viewer.role == UserRole::Admin || self.created_by == viewer.user_id {
            return true;
        }
        if !self.is_available() {
            return false;
        }
        if self.is_public {
            return true;
        }
        match (self.school_id, viewer.school_id) {
            (Some(quiz_school), Some(viewer_school)) => quiz_school == viewer_school,
            _ => false,
        }
    }

    /// Creator or admin.
    pub fn can_manage(&self, viewer: &Viewer) -> bool {
        viewer.role == UserRole::Admin || self.created_by == viewer.user_id
    }
}

/// Who is looking at a quiz. Built from the caller's token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Uuid,
    pub role: UserRole,
    pub school_id: Option<Uuid>,
}

/// Quiz as shown to a learner: questions without answers.
#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub key_stage: KeyStage,
    pub difficulty: Difficulty,
    pub questions: Vec<PublicQuestion>,
    pub estimated_time: u32,
    pub total_marks: u32,
    pub passing_score: u32,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        PublicQuiz {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            subject: quiz.subject.clone(),
            key_stage: quiz.key_stage,
            difficulty: quiz.difficulty,
            questions: quiz.questions.iter().map(PublicQuestion::from).collect(),
            estimated_time: quiz.estimated_time,
            total_marks: quiz.total_marks,
            passing_score: quiz.passing_score,
        }
    }
}

/// DTO for creating or replacing a draft quiz.
///
/// Structural rules (question shapes, marks) are checked at publish time by
/// the quiz validator; here only payload size is bounded.
#[derive(Debug, Deserialize, Validate)]
pub struct QuizRequest {
    #[validate(length(max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub subject: String,
    pub key_stage: KeyStage,
    pub difficulty: Difficulty,
    #[validate(length(max = 200))]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub is_public: bool,
    pub school_id: Option<Uuid>,
    #[serde(default)]
    pub class_ids: Vec<Uuid>,
    pub estimated_time: u32,
    #[serde(default = "default_passing_score")]
    pub passing_score: u32,
}

fn default_passing_score() -> u32 {
    50
}

/// Query parameters for listing quizzes.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QuizFilter {
    pub key_stage: Option<KeyStage>,
    pub subject: Option<String>,
    pub created_by: Option<Uuid>,
}

impl QuizFilter {
    pub fn matches(&self, quiz: &Quiz) -> bool {
        quiz.is_active
            && self.key_stage.is_none_or(|ks| quiz.key_stage == ks)
            && self.subject.as_deref().is_none_or(|s| quiz.subject == s)
            && self.created_by.is_none_or(|id| quiz.created_by == id)
    }
}
