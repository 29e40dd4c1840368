// src/quiz/evaluator.rs

//! Grades a learner's answers against a quiz definition.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::models::attempt::{GradeStatus, QuestionResult, ScoreResult};
use crate::models::quiz::{AnswerValue, Question, QuestionType, Quiz};

/// How free-text answers are normalized before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortAnswerPolicy {
    pub case_sensitive: bool,
    pub trim_whitespace: bool,
}

impl Default for ShortAnswerPolicy {
    fn default() -> Self {
        Self { case_sensitive: false, trim_whitespace: true }
    }
}

impl ShortAnswerPolicy {
    pub fn matches(&self, submitted: &str, expected: &str) -> bool {
        let (submitted, expected) = if self.trim_whitespace {
            (submitted.trim(), expected.trim())
        } else {
            (submitted, expected)
        };

        if self.case_sensitive {
            submitted == expected
        } else {
            submitted.to_lowercase() == expected.to_lowercase()
        }
    }
}

/// Scores `answers` question by question, in quiz order.
///
/// A missing answer is graded `Unanswered` with no marks. Drag-drop questions
/// are graded `Unsupported` and never award marks.
pub fn evaluate(
    quiz: &Quiz,
    answers: &BTreeMap<Uuid, AnswerValue>,
    policy: &ShortAnswerPolicy,
) -> ScoreResult {
    let per_question: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .map(|question| grade(question, answers.get(&question.id), policy))
        .collect();

    let score = per_question
        .iter()
        .fold(0u32, |score, r| score.saturating_add(r.marks_awarded));
    let total_marks = quiz.computed_total_marks();

    ScoreResult {
        score,
        total_marks,
        percentage: percentage(score, total_marks),
        per_question,
    }
}

/// `round(100 * score / total)` with halves rounded up, in integer arithmetic.
pub fn percentage(score: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (score, total) = (u64::from(score), u64::from(total));
    ((200 * score + total) / (2 * total)) as u32
}

fn grade(question: &Question, answer: Option<&AnswerValue>, policy: &ShortAnswerPolicy) -> QuestionResult {
    let status = match (question.question_type, answer) {
        (QuestionType::DragDrop, _) => GradeStatus::Unsupported,
        (_, None) => GradeStatus::Unanswered,
        (QuestionType::MultipleChoice | QuestionType::TrueFalse, Some(answer)) => {
            verdict(choice_matches(question, answer))
        }
        (QuestionType::ShortAnswer, Some(answer)) => {
            verdict(policy.matches(&answer.to_string(), &question.correct_answer.to_string()))
        }
    };

    let correct = status == GradeStatus::Correct;
    QuestionResult {
        question_id: question.id,
        correct,
        marks_awarded: if correct { question.marks } else { 0 },
        status,
    }
}

fn verdict(correct: bool) -> GradeStatus {
    if correct {
        GradeStatus::Correct
    } else {
        GradeStatus::Incorrect
    }
}

fn choice_matches(question: &Question, submitted: &AnswerValue) -> bool {
    match (choice_index(question, submitted), choice_index(question, &question.correct_answer)) {
        (Some(given), Some(expected)) => given == expected,
        _ => false,
    }
}

/// Resolves an answer to an option index. Numbers are indices; text is looked
/// up among the labels (case-insensitively for true/false).
fn choice_index(question: &Question, value: &AnswerValue) -> Option<usize> {
    let choices = question.choices();
    match value {
        AnswerValue::Number(n) => usize::try_from(*n).ok().filter(|i| *i < choices.len()),
        AnswerValue::Text(text) => choices.iter().position(|label| match question.question_type {
            QuestionType::TrueFalse => label.eq_ignore_ascii_case(text.trim()),
            _ => *label == text,
        }),
    }
}
