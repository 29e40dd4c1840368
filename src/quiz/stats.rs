// src/quiz/stats.rs

use std::collections::HashSet;

use crate::models::attempt::{QuizAttempt, QuizStats};
use crate::models::quiz::Quiz;

/// Dashboard figures over the completed attempts of `quiz`.
pub fn summarize(quiz: &Quiz, attempts: &[QuizAttempt]) -> QuizStats {
    let completed: Vec<&QuizAttempt> = attempts
        .iter()
        .filter(|a| a.quiz_id == quiz.id && a.is_completed())
        .collect();

    let count = completed.len();
    let students: HashSet<_> = completed.iter().map(|a| a.student_id).collect();

    let (average_percentage, pass_rate) = if count == 0 {
        (0.0, 0.0)
    } else {
        let sum: u64 = completed.iter().map(|a| u64::from(a.percentage)).sum();
        let passed = completed.iter().filter(|a| a.passed).count();
        (
            round1(sum as f64 / count as f64),
            round1(100.0 * passed as f64 / count as f64),
        )
    };

    QuizStats {
        quiz_id: quiz.id,
        attempts: count,
        students: students.len(),
        average_percentage,
        highest_percentage: completed.iter().map(|a| a.percentage).max().unwrap_or(0),
        pass_rate,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
