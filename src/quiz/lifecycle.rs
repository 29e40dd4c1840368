// src/quiz/lifecycle.rs

//! State transitions of a quiz attempt: in progress, then completed for good.
//!
//! Every function takes the current value and returns a new one. Nothing here
//! touches storage; callers persist the result.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::models::attempt::{AttemptStatus, QuizAttempt};
use crate::models::quiz::{AnswerValue, Quiz};
use crate::quiz::evaluator::{ShortAnswerPolicy, evaluate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("attempt {attempt_id} is already in progress for this quiz")]
    Conflict { attempt_id: Uuid },

    #[error("cannot {operation} attempt {attempt_id}: it is {status}")]
    InvalidState {
        attempt_id: Uuid,
        status: AttemptStatus,
        operation: &'static str,
    },

    #[error("quiz {quiz_id} is not open for attempts")]
    QuizUnavailable { quiz_id: Uuid },

    #[error("attempt belongs to quiz {expected}, not {actual}")]
    QuizMismatch { expected: Uuid, actual: Uuid },
}

/// Opens a fresh attempt, refusing if `existing` holds one still in progress
/// for the same quiz and student.
pub fn start<'a>(
    quiz: &Quiz,
    student_id: Uuid,
    existing: impl IntoIterator<Item = &'a QuizAttempt>,
) -> Result<QuizAttempt, LifecycleError> {
    if !quiz.is_available() {
        return Err(LifecycleError::QuizUnavailable { quiz_id: quiz.id });
    }

    if let Some(active) = existing
        .into_iter()
        .find(|a| a.quiz_id == quiz.id && a.student_id == student_id && a.is_in_progress())
    {
        return Err(LifecycleError::Conflict { attempt_id: active.id });
    }

    Ok(QuizAttempt {
        id: Uuid::new_v4(),
        quiz_id: quiz.id,
        student_id,
        answers: BTreeMap::new(),
        status: AttemptStatus::InProgress,
        score: 0,
        total_marks: quiz.total_marks,
        percentage: 0,
        passed: false,
        results: Vec::new(),
        time_spent: 0,
        started_at: Utc::now(),
        completed_at: None,
    })
}

/// Upserts one answer. The latest value for a question replaces any earlier one.
pub fn record_answer(
    attempt: &QuizAttempt,
    question_id: Uuid,
    value: AnswerValue,
) -> Result<QuizAttempt, LifecycleError> {
    ensure_in_progress(attempt, "record an answer on")?;

    let mut next = attempt.clone();
    next.answers.insert(question_id, value);
    Ok(next)
}

/// Grades the attempt and closes it. A completed attempt is never re-graded.
pub fn submit(
    attempt: &QuizAttempt,
    quiz: &Quiz,
    elapsed_seconds: i64,
    policy: &ShortAnswerPolicy,
) -> Result<QuizAttempt, LifecycleError> {
    ensure_in_progress(attempt, "submit")?;

    if attempt.quiz_id != quiz.id {
        return Err(LifecycleError::QuizMismatch {
            expected: attempt.quiz_id,
            actual: quiz.id,
        });
    }

    let result = evaluate(quiz, &attempt.answers, policy);

    let mut next = attempt.clone();
    next.status = AttemptStatus::Completed;
    next.score = result.score;
    next.total_marks = result.total_marks;
    next.percentage = result.percentage;
    next.passed = result.percentage >= quiz.passing_score;
    next.results = result.per_question;
    next.time_spent = u32::try_from(elapsed_seconds.max(0)).unwrap_or(u32::MAX);
    next.completed_at = Some(Utc::now());
    Ok(next)
}

fn ensure_in_progress(attempt: &QuizAttempt, operation: &'static str) -> Result<(), LifecycleError> {
    if attempt.is_in_progress() {
        Ok(())
    } else {
        Err(LifecycleError::InvalidState {
            attempt_id: attempt.id,
            status: attempt.status,
            operation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::fixtures::{multiple_choice, quiz};

    #[test]
    fn start_opens_empty_attempt() {
        let q = quiz(vec![multiple_choice(1, 0)]);
        let student = Uuid::new_v4();

        let attempt = start(&q, student, &[]).unwrap();
        assert!(attempt.is_in_progress());
        assert!(attempt.answers.is_empty());
        assert_eq!(attempt.time_spent, 0);
        assert_eq!(attempt.completed_at, None);
    }

    #[test]
    fn second_start_conflicts_until_submitted() {
        let q = quiz(vec![multiple_choice(1, 0)]);
        let student = Uuid::new_v4();

        let first = start(&q, student, &[]).unwrap();
        let err = start(&q, student, [&first]).unwrap_err();
        assert_eq!(err, LifecycleError::Conflict { attempt_id: first.id });

        let done = submit(&first, &q, 30, &ShortAnswerPolicy::default()).unwrap();
        assert!(start(&q, student, [&done]).is_ok());
    }

    #[test]
    fn other_students_are_not_blocked() {
        let q = quiz(vec![multiple_choice(1, 0)]);
        let first = start(&q, Uuid::new_v4(), &[]).unwrap();
        assert!(start(&q, Uuid::new_v4(), [&first]).is_ok());
    }

    #[test]
    fn unpublished_quiz_cannot_be_started() {
        let mut q = quiz(vec![multiple_choice(1, 0)]);
        q.is_published = false;
        assert_eq!(
            start(&q, Uuid::new_v4(), &[]).unwrap_err(),
            LifecycleError::QuizUnavailable { quiz_id: q.id }
        );
    }

    #[test]
    fn record_answer_is_last_write_wins_and_idempotent() {
        let q = quiz(vec![multiple_choice(1, 0)]);
        let id = q.questions[0].id;
        let attempt = start(&q, Uuid::new_v4(), &[]).unwrap();

        let once = record_answer(&attempt, id, AnswerValue::Number(2)).unwrap();
        let twice = record_answer(&once, id, AnswerValue::Number(2)).unwrap();
        assert_eq!(once, twice);

        let changed = record_answer(&twice, id, AnswerValue::Number(0)).unwrap();
        assert_eq!(changed.answers.len(), 1);
        assert_eq!(changed.answers[&id], AnswerValue::Number(0));
        assert!(attempt.answers.is_empty());
    }

    #[test]
    fn submit_scores_and_completes() {
        let q = quiz(vec![multiple_choice(1, 0), multiple_choice(2, 1)]);
        let (q1, q2) = (q.questions[0].id, q.questions[1].id);
        let attempt = start(&q, Uuid::new_v4(), &[]).unwrap();
        let attempt = record_answer(&attempt, q1, AnswerValue::Number(0)).unwrap();
        let attempt = record_answer(&attempt, q2, AnswerValue::Number(0)).unwrap();

        let done = submit(&attempt, &q, -5, &ShortAnswerPolicy::default()).unwrap();
        assert!(done.is_completed());
        assert_eq!(done.score, 1);
        assert_eq!(done.percentage, 33);
        assert_eq!(done.total_marks, 3);
        assert!(!done.passed);
        assert_eq!(done.time_spent, 0);
        assert!(done.completed_at.is_some());
        assert_eq!(done.results.len(), 2);
    }

    #[test]
    fn completed_attempt_rejects_further_changes() {
        let q = quiz(vec![multiple_choice(1, 0)]);
        let attempt = start(&q, Uuid::new_v4(), &[]).unwrap();
        let done = submit(&attempt, &q, 10, &ShortAnswerPolicy::default()).unwrap();

        let again = submit(&done, &q, 99, &ShortAnswerPolicy::default()).unwrap_err();
        assert!(matches!(again, LifecycleError::InvalidState { operation: "submit", .. }));

        let answer = record_answer(&done, q.questions[0].id, AnswerValue::Number(0)).unwrap_err();
        assert!(matches!(answer, LifecycleError::InvalidState { status: AttemptStatus::Completed, .. }));
    }

    #[test]
    fn submit_against_wrong_quiz_is_rejected() {
        let q = quiz(vec![multiple_choice(1, 0)]);
        let other = quiz(vec![multiple_choice(1, 0)]);
        let attempt = start(&q, Uuid::new_v4(), &[]).unwrap();
        assert!(matches!(
            submit(&attempt, &other, 1, &ShortAnswerPolicy::default()),
            Err(LifecycleError::QuizMismatch { .. })
        ));
    }

    #[test]
    fn stored_percentage_agrees_with_stored_score() {
        let q = quiz(vec![multiple_choice(3, 0), multiple_choice(4, 1), multiple_choice(5, 2)]);
        let attempt = start(&q, Uuid::new_v4(), &[]).unwrap();
        let attempt = record_answer(&attempt, q.questions[1].id, AnswerValue::Number(1)).unwrap();
        let done = submit(&attempt, &q, 60, &ShortAnswerPolicy::default()).unwrap();
        assert_eq!(done.percentage, crate::quiz::evaluator::percentage(done.score, done.total_marks));
    }
}
