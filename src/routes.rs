// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attempt, auth, quiz, school},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, staff_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, admin, schools, quizzes, attempts).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store + config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().expect("static origin"),
        "http://127.0.0.1:3000".parse().expect("static origin"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let authenticated = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(authenticated.clone()),
        );

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/{id}", put(admin::update_user))
        .route("/schools", get(school::list_schools).post(school::create_school))
        .route("/schools/{id}", put(school::update_school))
        // Double middleware protection: Auth first, then Admin check
        .layer(
            ServiceBuilder::new()
                .layer(authenticated.clone())
                .layer(middleware::from_fn(admin_middleware)),
        );

    let staff_routes = Router::new()
        .route("/schools/{id}/classes", get(school::list_classes))
        .route("/classes", post(school::create_class))
        .route("/quizzes", post(quiz::create_quiz))
        .route("/quizzes/{id}", put(quiz::update_quiz).delete(quiz::delete_quiz))
        .route("/quizzes/{id}/publish", post(quiz::publish_quiz))
        .route("/quizzes/{id}/stats", get(quiz::quiz_stats))
        .layer(
            ServiceBuilder::new()
                .layer(authenticated.clone())
                .layer(middleware::from_fn(staff_middleware)),
        );

    let learner_routes = Router::new()
        .route("/quizzes", get(quiz::list_quizzes))
        .route("/quizzes/{id}", get(quiz::get_quiz))
        .route("/quizzes/{id}/attempts", post(attempt::start_attempt))
        .route("/attempts", get(attempt::list_attempts))
        .route("/attempts/{id}", get(attempt::get_attempt))
        .route("/attempts/{id}/answers", put(attempt::record_answer))
        .route("/attempts/{id}/submit", post(attempt::submit_attempt))
        .layer(authenticated);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api", staff_routes.merge(learner_routes))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
