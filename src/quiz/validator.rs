// src/quiz/validator.rs

//! Structural checks a quiz must pass before it can be published.

use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;

use serde::Serialize;

use crate::config::{
    ESTIMATED_TIME_RANGE, MAX_PASSING_SCORE, MAX_QUESTION_MARKS, MIN_PROMPT_LENGTH, MIN_TITLE_LENGTH,
};
use crate::models::quiz::{AnswerValue, Question, QuestionType, Quiz};

/// One violated rule, addressed by a field path such as `questions[2].options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every violation found in a quiz definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("quiz definition has {} problem(s)", .0.len())]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

/// A quiz that passed validation, with `total_marks` recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidQuiz(Quiz);

impl ValidQuiz {
    pub fn into_inner(self) -> Quiz {
        self.0
    }
}

impl Deref for ValidQuiz {
    type Target = Quiz;

    fn deref(&self) -> &Quiz {
        &self.0
    }
}

/// Checks every rule and reports all violations together.
pub fn validate(quiz: &Quiz) -> Result<ValidQuiz, ValidationErrors> {
    let mut errors = Vec::new();

    if quiz.title.trim().chars().count() < MIN_TITLE_LENGTH {
        errors.push(ValidationError::new(
            "title",
            format!("must be at least {} characters", MIN_TITLE_LENGTH),
        ));
    }

    if quiz.subject.trim().is_empty() {
        errors.push(ValidationError::new("subject", "is required"));
    }

    if !ESTIMATED_TIME_RANGE.contains(&quiz.estimated_time) {
        errors.push(ValidationError::new(
            "estimated_time",
            format!(
                "must be between {} and {} minutes",
                ESTIMATED_TIME_RANGE.start(),
                ESTIMATED_TIME_RANGE.end()
            ),
        ));
    }

    if quiz.passing_score > MAX_PASSING_SCORE {
        errors.push(ValidationError::new(
            "passing_score",
            format!("must be between 0 and {}", MAX_PASSING_SCORE),
        ));
    }

    if quiz.is_public && quiz.school_id.is_some() {
        errors.push(ValidationError::new(
            "is_public",
            "a quiz cannot be both public and scoped to a school",
        ));
    }

    if quiz.questions.is_empty() {
        errors.push(ValidationError::new("questions", "at least one question is required"));
    }

    let mut seen = HashSet::new();
    for (index, question) in quiz.questions.iter().enumerate() {
        if !seen.insert(question.id) {
            errors.push(ValidationError::new(
                format!("questions[{}].id", index),
                "duplicate question id",
            ));
        }
        check_question(index, question, &mut errors);
    }

    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }

    let mut quiz = quiz.clone();
    quiz.total_marks = quiz.computed_total_marks();
    Ok(ValidQuiz(quiz))
}

fn check_question(index: usize, question: &Question, errors: &mut Vec<ValidationError>) {
    let path = |field: &str| format!("questions[{}].{}", index, field);

    if question.prompt.trim().chars().count() < MIN_PROMPT_LENGTH {
        errors.push(ValidationError::new(
            path("prompt"),
            format!("must be at least {} characters", MIN_PROMPT_LENGTH),
        ));
    }

    if question.marks < 1 {
        errors.push(ValidationError::new(path("marks"), "must be at least 1"));
    } else if question.marks > MAX_QUESTION_MARKS {
        errors.push(ValidationError::new(
            path("marks"),
            format!("must be at most {}", MAX_QUESTION_MARKS),
        ));
    }

    match question.question_type {
        QuestionType::MultipleChoice => {
            if question.options.len() < 2 {
                errors.push(ValidationError::new(
                    path("options"),
                    "multiple-choice questions need at least 2 options",
                ));
            }
            if question.options.iter().any(|o| o.trim().is_empty()) {
                errors.push(ValidationError::new(path("options"), "options cannot be blank"));
            }
            check_index(&question.correct_answer, question.options.len(), path("correct_answer"), errors);
        }
        QuestionType::TrueFalse => {
            if !question.options.is_empty() && question.options.len() != 2 {
                errors.push(ValidationError::new(
                    path("options"),
                    "true-false questions have exactly 2 options",
                ));
            }
            check_index(&question.correct_answer, 2, path("correct_answer"), errors);
        }
        QuestionType::ShortAnswer => {
            if !question.options.is_empty() {
                errors.push(ValidationError::new(
                    path("options"),
                    "short-answer questions take no options",
                ));
            }
            match &question.correct_answer {
                AnswerValue::Text(s) if s.trim().is_empty() => errors.push(ValidationError::new(
                    path("correct_answer"),
                    "cannot be blank",
                )),
                AnswerValue::Text(_) => {}
                AnswerValue::Number(_) => errors.push(ValidationError::new(
                    path("correct_answer"),
                    "short-answer questions expect a text answer",
                )),
            }
        }
        QuestionType::DragDrop => {
            if question.options.is_empty() {
                errors.push(ValidationError::new(
                    path("options"),
                    "drag-drop questions need at least 1 item",
                ));
            }
        }
    }
}

fn check_index(answer: &AnswerValue, len: usize, field: String, errors: &mut Vec<ValidationError>) {
    match answer {
        AnswerValue::Number(n) if *n >= 0 && (*n as usize) < len => {}
        AnswerValue::Number(n) => errors.push(ValidationError::new(
            field,
            format!("option index {} is out of range", n),
        )),
        AnswerValue::Text(_) => errors.push(ValidationError::new(field, "must be an option index")),
    }
}
