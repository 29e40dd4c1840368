// src/quiz/mod.rs

//! Quiz core: definition checks, grading, and the attempt lifecycle.
//! Pure and synchronous; storage is the caller's concern.

pub mod evaluator;
pub mod lifecycle;
pub mod stats;
pub mod validator;

pub use evaluator::{ShortAnswerPolicy, evaluate};
pub use lifecycle::LifecycleError;
pub use validator::{ValidQuiz, ValidationError, ValidationErrors, validate};
