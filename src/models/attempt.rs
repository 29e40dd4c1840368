// src/models/attempt.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::quiz::AnswerValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "completed" => Ok(AttemptStatus::Completed),
            other => Err(format!("unknown attempt status '{}'", other)),
        }
    }
}

/// How a single question was graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeStatus {
    Correct,
    Incorrect,
    Unanswered,
    /// No scoring rule exists for this question type.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: Uuid,
    pub correct: bool,
    pub marks_awarded: u32,
    pub status: GradeStatus,
}

/// Output of grading one set of answers against one quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u32,
    pub total_marks: u32,
    pub percentage: u32,
    pub per_question: Vec<QuestionResult>,
}

impl ScoreResult {
    /// Questions that could not be graded automatically.
    pub fn unsupported(&self) -> Vec<Uuid> {
        unsupported_ids(&self.per_question)
    }
}

fn unsupported_ids(results: &[QuestionResult]) -> Vec<Uuid> {
    results
        .iter()
        .filter(|r| r.status == GradeStatus::Unsupported)
        .map(|r| r.question_id)
        .collect()
}

/// Represents the 'quiz_attempts' table. One learner's take of one quiz.
///
/// Completed attempts carry their own score, total marks and per-question
/// results so later edits to the quiz never rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub student_id: Uuid,
    pub answers: BTreeMap<Uuid, AnswerValue>,
    pub status: AttemptStatus,
    pub score: u32,
    pub total_marks: u32,
    pub percentage: u32,
    pub passed: bool,
    pub results: Vec<QuestionResult>,
    /// Seconds.
    pub time_spent: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizAttempt {
    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    /// Graded questions that still need a human to mark them.
    pub fn unsupported_questions(&self) -> Vec<Uuid> {
        unsupported_ids(&self.results)
    }
}

/// Response shape for an attempt, with the derived completion flag.
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub is_completed: bool,
}

impl From<QuizAttempt> for AttemptResponse {
    fn from(attempt: QuizAttempt) -> Self {
        let is_completed = attempt.is_completed();
        AttemptResponse { attempt, is_completed }
    }
}

/// Query parameters for listing attempts.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AttemptFilter {
    pub quiz_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub status: Option<AttemptStatus>,
}

impl AttemptFilter {
    pub fn matches(&self, attempt: &QuizAttempt) -> bool {
        self.quiz_id.is_none_or(|id| attempt.quiz_id == id)
            && self.student_id.is_none_or(|id| attempt.student_id == id)
            && self.status.is_none_or(|s| attempt.status == s)
    }
}

/// DTO for recording one answer.
#[derive(Debug, Deserialize)]
pub struct RecordAnswerRequest {
    pub question_id: Uuid,
    pub value: AnswerValue,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// Seconds the learner spent, as measured by the client.
    #[serde(default)]
    pub elapsed_seconds: i64,
}

/// Aggregated dashboard figures for one quiz.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizStats {
    pub quiz_id: Uuid,
    pub attempts: usize,
    pub students: usize,
    pub average_percentage: f64,
    pub highest_percentage: u32,
    pub pass_rate: f64,
}
