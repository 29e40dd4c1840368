// tests/api_tests.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use stagewise::{
    config::Config,
    models::user::{User, UserRole},
    quiz::ShortAnswerPolicy,
    routes,
    state::AppState,
    store::{DynStore, MemoryStore},
    utils::hash::hash_password,
};
use uuid::Uuid;

struct TestApp {
    address: String,
    store: DynStore,
    client: reqwest::Client,
}

/// Spawns the app on a random port, backed by an in-memory store.
async fn spawn_app() -> TestApp {
    let store: DynStore = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: String::new(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_email: None,
        admin_password: None,
        short_answer: ShortAnswerPolicy::default(),
        port: 0,
    };

    let state = AppState { store: store.clone(), config };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp { address, store, client: reqwest::Client::new() }
}

impl TestApp {
    /// Inserts a staff user directly; staff cannot self-register.
    async fn seed_user(&self, role: UserRole, password: &str) -> User {
        self.seed_member(role, password, None).await
    }

    async fn seed_member(&self, role: UserRole, password: &str, school_id: Option<Uuid>) -> User {
        let now = Utc::now();
        let email = format!("{}-{}@school.test", role.as_str(), &Uuid::new_v4().to_string()[..8]);
        self.store
            .create_user(User {
                id: Uuid::new_v4(),
                email,
                name: format!("Test {}", role.as_str()),
                password: hash_password(password).unwrap(),
                role,
                school_id,
                class_ids: Vec::new(),
                avatar: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(format!("{}/api/auth/login", self.address))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn teacher_token(&self) -> String {
        let teacher = self.seed_user(UserRole::Teacher, "password123").await;
        self.login(&teacher.email, "password123").await
    }

    async fn student_token(&self) -> String {
        let email = format!("pupil-{}@school.test", &Uuid::new_v4().to_string()[..8]);
        let response = self
            .client
            .post(format!("{}/api/auth/register", self.address))
            .json(&json!({ "email": email, "name": "Pupil", "password": "password123" }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        self.login(&email, "password123").await
    }

    /// Creates a draft quiz and returns its JSON.
    async fn create_quiz(&self, token: &str, questions: Value) -> Value {
        let response = self
            .client
            .post(format!("{}/api/quizzes", self.address))
            .bearer_auth(token)
            .json(&json!({
                "title": "Fractions practice",
                "subject": "Maths",
                "key_stage": "KS2",
                "difficulty": "beginner",
                "is_public": true,
                "estimated_time": 15,
                "questions": questions,
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    async fn publish(&self, token: &str, quiz_id: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/quizzes/{}/publish", self.address, quiz_id))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn start(&self, token: &str, quiz_id: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/quizzes/{}/attempts", self.address, quiz_id))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

fn three_question_quiz() -> Value {
    json!([
        {
            "type": "multiple-choice",
            "prompt": "What is one half of ten?",
            "options": ["2", "5", "8"],
            "correct_answer": 1,
            "marks": 1
        },
        {
            "type": "true-false",
            "prompt": "Two quarters make one half.",
            "correct_answer": 0,
            "marks": 1
        },
        {
            "type": "short-answer",
            "prompt": "Write three quarters as a decimal.",
            "correct_answer": "0.75",
            "marks": 1
        }
    ])
}

fn question_ids(quiz: &Value) -> Vec<String> {
    quiz["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_login_and_me_work() {
    let app = spawn_app().await;
    let token = app.student_token().await;

    let response = app
        .client
        .get(format!("{}/api/auth/me", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "student");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_rejects_invalid_payload() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/auth/register", app.address))
        .json(&json!({ "email": "not-an-email", "name": "Pupil", "password": "123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = spawn_app().await;
    let payload = json!({ "email": "twin@school.test", "name": "Twin", "password": "password123" });

    let first = app
        .client
        .post(format!("{}/api/auth/register", app.address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = app
        .client
        .post(format!("{}/api/auth/register", app.address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    let teacher = app.seed_user(UserRole::Teacher, "password123").await;

    let response = app
        .client
        .post(format!("{}/api/auth/login", app.address))
        .json(&json!({ "email": teacher.email, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/api/quizzes", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn students_cannot_author_quizzes() {
    let app = spawn_app().await;
    let token = app.student_token().await;

    let response = app
        .client
        .post(format!("{}/api/quizzes", app.address))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Sneaky quiz",
            "subject": "Maths",
            "key_stage": "KS2",
            "difficulty": "beginner",
            "estimated_time": 10,
            "questions": three_question_quiz(),
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_routes_reject_teachers() {
    let app = spawn_app().await;
    let token = app.teacher_token().await;

    let response = app
        .client
        .get(format!("{}/api/admin/users", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn publishing_an_invalid_quiz_reports_every_problem() {
    let app = spawn_app().await;
    let token = app.teacher_token().await;

    let quiz = app
        .create_quiz(
            &token,
            json!([
                {
                    "type": "multiple-choice",
                    "prompt": "Pick the only answer here.",
                    "options": ["Only one"],
                    "correct_answer": 0,
                    "marks": 1
                },
                {
                    "type": "short-answer",
                    "prompt": "Too short",
                    "correct_answer": "",
                    "marks": 0
                }
            ]),
        )
        .await;
    let quiz_id = quiz["id"].as_str().unwrap();

    let response = app.publish(&token, quiz_id).await;
    assert_eq!(response.status().as_u16(), 422);

    let body: Value = response.json().await.unwrap();
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"questions[0].options"));
    assert!(fields.contains(&"questions[1].prompt"));
    assert!(fields.contains(&"questions[1].marks"));
    assert!(fields.contains(&"questions[1].correct_answer"));

    // Nothing was published.
    let fetched: Value = app
        .client
        .get(format!("{}/api/quizzes/{}", app.address, quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["is_published"], false);
}

#[tokio::test]
async fn drafts_are_hidden_from_students() {
    let app = spawn_app().await;
    let teacher = app.teacher_token().await;
    let student = app.student_token().await;

    let quiz = app.create_quiz(&teacher, three_question_quiz()).await;
    let quiz_id = quiz["id"].as_str().unwrap();

    let response = app
        .client
        .get(format!("{}/api/quizzes/{}", app.address, quiz_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = app.start(&student, quiz_id).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn published_quizzes_cannot_be_edited() {
    let app = spawn_app().await;
    let token = app.teacher_token().await;

    let quiz = app.create_quiz(&token, three_question_quiz()).await;
    let quiz_id = quiz["id"].as_str().unwrap();
    assert_eq!(app.publish(&token, quiz_id).await.status().as_u16(), 200);

    let response = app
        .client
        .put(format!("{}/api/quizzes/{}", app.address, quiz_id))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Fractions practice v2",
            "subject": "Maths",
            "key_stage": "KS2",
            "difficulty": "beginner",
            "is_public": true,
            "estimated_time": 15,
            "questions": three_question_quiz(),
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn full_attempt_flow() {
    let app = spawn_app().await;
    let teacher = app.teacher_token().await;
    let student = app.student_token().await;

    // 1. Teacher authors and publishes a three-mark quiz
    let quiz = app.create_quiz(&teacher, three_question_quiz()).await;
    assert_eq!(quiz["total_marks"], 3);
    let quiz_id = quiz["id"].as_str().unwrap().to_string();
    let ids = question_ids(&quiz);

    let response = app.publish(&teacher, &quiz_id).await;
    assert_eq!(response.status().as_u16(), 200);

    // 2. Student sees the quiz without answers
    let public: Value = app
        .client
        .get(format!("{}/api/quizzes/{}", app.address, quiz_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(public["questions"][0].get("correct_answer").is_none());

    // 3. Start an attempt; a second start conflicts
    let response = app.start(&student, &quiz_id).await;
    assert_eq!(response.status().as_u16(), 201);
    let attempt: Value = response.json().await.unwrap();
    let attempt_id = attempt["id"].as_str().unwrap().to_string();
    assert_eq!(attempt["status"], "in_progress");
    assert_eq!(attempt["is_completed"], false);

    let response = app.start(&student, &quiz_id).await;
    assert_eq!(response.status().as_u16(), 409);

    // 4. Answer: one right, one wrong, one left blank
    let answers = [(&ids[0], json!(1)), (&ids[1], json!(1))];
    for (question_id, value) in answers {
        let response = app
            .client
            .put(format!("{}/api/attempts/{}/answers", app.address, attempt_id))
            .bearer_auth(&student)
            .json(&json!({ "question_id": question_id, "value": value }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    // Unknown question
    let response = app
        .client
        .put(format!("{}/api/attempts/{}/answers", app.address, attempt_id))
        .bearer_auth(&student)
        .json(&json!({ "question_id": Uuid::new_v4(), "value": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // 5. Submit
    let response = app
        .client
        .post(format!("{}/api/attempts/{}/submit", app.address, attempt_id))
        .bearer_auth(&student)
        .json(&json!({ "elapsed_seconds": 240 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let graded: Value = response.json().await.unwrap();
    assert_eq!(graded["status"], "completed");
    assert_eq!(graded["is_completed"], true);
    assert_eq!(graded["score"], 1);
    assert_eq!(graded["total_marks"], 3);
    assert_eq!(graded["percentage"], 33);
    assert_eq!(graded["passed"], false);
    assert_eq!(graded["time_spent"], 240);
    assert_eq!(graded["results"][2]["status"], "unanswered");

    // 6. Completed attempts are final
    let response = app
        .client
        .post(format!("{}/api/attempts/{}/submit", app.address, attempt_id))
        .bearer_auth(&student)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .client
        .put(format!("{}/api/attempts/{}/answers", app.address, attempt_id))
        .bearer_auth(&student)
        .json(&json!({ "question_id": ids[2], "value": "0.75" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // 7. A new attempt may start once the previous one is done
    let response = app.start(&student, &quiz_id).await;
    assert_eq!(response.status().as_u16(), 201);

    // 8. Student history and teacher stats
    let history: Value = app
        .client
        .get(format!("{}/api/attempts?quiz_id={}", app.address, quiz_id))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 2);

    let stats: Value = app
        .client
        .get(format!("{}/api/quizzes/{}/stats", app.address, quiz_id))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["attempts"], 1);
    assert_eq!(stats["students"], 1);
    assert_eq!(stats["highest_percentage"], 33);
    assert_eq!(stats["pass_rate"], 0.0);
}

#[tokio::test]
async fn attempts_are_private_to_their_student() {
    let app = spawn_app().await;
    let teacher = app.teacher_token().await;
    let alice = app.student_token().await;
    let bob = app.student_token().await;

    let quiz = app.create_quiz(&teacher, three_question_quiz()).await;
    let quiz_id = quiz["id"].as_str().unwrap();
    app.publish(&teacher, quiz_id).await;

    let attempt: Value = app.start(&alice, quiz_id).await.json().await.unwrap();
    let attempt_id = attempt["id"].as_str().unwrap();

    let response = app
        .client
        .get(format!("{}/api/attempts/{}", app.address, attempt_id))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Each student has their own single open attempt
    let response = app.start(&bob, quiz_id).await;
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn teachers_cannot_start_attempts() {
    let app = spawn_app().await;
    let teacher = app.teacher_token().await;

    let quiz = app.create_quiz(&teacher, three_question_quiz()).await;
    let quiz_id = quiz["id"].as_str().unwrap();
    app.publish(&teacher, quiz_id).await;

    let response = app.start(&teacher, quiz_id).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn oversized_marks_are_stored_safely_and_block_publishing() {
    let app = spawn_app().await;
    let token = app.teacher_token().await;

    let quiz = app
        .create_quiz(
            &token,
            json!([
                {
                    "type": "multiple-choice",
                    "prompt": "What is one half of ten?",
                    "options": ["2", "5", "8"],
                    "correct_answer": 1,
                    "marks": 4294967295u32
                },
                {
                    "type": "true-false",
                    "prompt": "Two quarters make one half.",
                    "correct_answer": 0,
                    "marks": 2
                }
            ]),
        )
        .await;
    assert_eq!(quiz["total_marks"], 4294967295u32);

    let response = app.publish(&token, quiz["id"].as_str().unwrap()).await;
    assert_eq!(response.status().as_u16(), 422);

    let body: Value = response.json().await.unwrap();
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["questions[0].marks"]);
}

#[tokio::test]
async fn teachers_only_see_attempts_on_their_own_quizzes() {
    let app = spawn_app().await;
    let author = app.teacher_token().await;
    let outsider = app.teacher_token().await;
    let student = app.student_token().await;

    let quiz = app.create_quiz(&author, three_question_quiz()).await;
    let quiz_id = quiz["id"].as_str().unwrap();
    app.publish(&author, quiz_id).await;

    let attempt: Value = app.start(&student, quiz_id).await.json().await.unwrap();
    let attempt_id = attempt["id"].as_str().unwrap();

    let list = |token: String| {
        let request = app
            .client
            .get(format!("{}/api/attempts", app.address))
            .bearer_auth(token);
        async move { request.send().await.unwrap().json::<Value>().await.unwrap() }
    };

    let seen_by_outsider = list(outsider.clone()).await;
    assert_eq!(seen_by_outsider.as_array().unwrap().len(), 0);

    let seen_by_author = list(author.clone()).await;
    assert_eq!(seen_by_author.as_array().unwrap().len(), 1);

    let response = app
        .client
        .get(format!("{}/api/attempts/{}", app.address, attempt_id))
        .bearer_auth(&outsider)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .client
        .get(format!("{}/api/attempts/{}", app.address, attempt_id))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn role_changes_apply_to_tokens_already_issued() {
    let app = spawn_app().await;
    let admin = app.seed_user(UserRole::Admin, "password123").await;
    let admin_token = app.login(&admin.email, "password123").await;

    let teacher = app.seed_user(UserRole::Teacher, "password123").await;
    let teacher_token = app.login(&teacher.email, "password123").await;

    let response = app
        .client
        .put(format!("{}/api/admin/users/{}", app.address, teacher.id))
        .bearer_auth(&admin_token)
        .json(&json!({ "role": "student" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Old token, new role
    let response = app
        .client
        .post(format!("{}/api/quizzes", app.address))
        .bearer_auth(&teacher_token)
        .json(&json!({
            "title": "Fractions practice",
            "subject": "Maths",
            "key_stage": "KS2",
            "difficulty": "beginner",
            "estimated_time": 15,
            "questions": three_question_quiz(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_can_remove_a_user_from_their_school() {
    let app = spawn_app().await;
    let admin = app.seed_user(UserRole::Admin, "password123").await;
    let admin_token = app.login(&admin.email, "password123").await;
    let teacher = app
        .seed_member(UserRole::Teacher, "password123", Some(Uuid::new_v4()))
        .await;

    let response = app
        .client
        .put(format!("{}/api/admin/users/{}", app.address, teacher.id))
        .bearer_auth(&admin_token)
        .json(&json!({ "school_id": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert!(body["school_id"].is_null());
    assert_eq!(body["role"], "teacher");
}

#[tokio::test]
async fn classes_can_be_listed_per_teacher() {
    let app = spawn_app().await;
    let admin = app.seed_user(UserRole::Admin, "password123").await;
    let admin_token = app.login(&admin.email, "password123").await;

    let school: Value = app
        .client
        .post(format!("{}/api/admin/schools", app.address))
        .bearer_auth(&admin_token)
        .json(&json!({
            "name": "Riverside Primary",
            "address": "1 River Lane, Leeds",
            "subscription_plan": "basic",
            "max_students": 300,
            "max_teachers": 20,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let school_id: Uuid = school["id"].as_str().unwrap().parse().unwrap();

    let mut teachers = Vec::new();
    for (name, year_group) in [("5B", 5), ("6A", 6)] {
        let teacher = app
            .seed_member(UserRole::Teacher, "password123", Some(school_id))
            .await;
        let token = app.login(&teacher.email, "password123").await;

        let response = app
            .client
            .post(format!("{}/api/classes", app.address))
            .bearer_auth(&token)
            .json(&json!({
                "name": name,
                "school_id": school_id,
                "year_group": year_group,
                "subject": "Maths",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        teachers.push((teacher, token));
    }

    let (first, first_token) = &teachers[0];

    let all: Value = app
        .client
        .get(format!("{}/api/schools/{}/classes", app.address, school_id))
        .bearer_auth(first_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 2);

    let own: Value = app
        .client
        .get(format!(
            "{}/api/schools/{}/classes?teacher_id={}",
            app.address, school_id, first.id
        ))
        .bearer_auth(first_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let own = own.as_array().unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0]["name"], "5B");
}
