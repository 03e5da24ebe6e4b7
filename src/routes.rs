// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, health, results},
    state::AppState,
    utils::jwt::{auth_middleware, student_middleware, teacher_middleware},
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Student routes start and submit attempts.
/// * Teacher routes grade, reconcile, rank and publish.
/// * Shared routes are readable by any authenticated user, subject to ownership checks.
/// * `/api/ping` and `/health` need no token.
pub fn create_router(state: AppState) -> Router {
    let student_routes = Router::new()
        .route("/papers/{paper_id}/attempt", get(attempts::start_attempt))
        .route("/papers/{paper_id}/submit", post(attempts::submit_attempt))
        .route_layer(middleware::from_fn(student_middleware));

    let teacher_routes = Router::new()
        .route("/papers/{paper_id}/attempts", get(attempts::list_paper_attempts))
        .route("/attempts/{id}/grade", put(attempts::grade_attempt))
        .route("/attempts/{id}/reconcile", post(attempts::reconcile_attempt))
        .route("/results/class/{paper_id}", get(results::list_class_results))
        .route("/results/{id}/publish", post(results::publish_result))
        .route_layer(middleware::from_fn(teacher_middleware));

    let shared_routes = Router::new()
        .route("/students/{student_id}/attempts", get(attempts::list_student_attempts))
        .route("/attempts/{id}", get(attempts::get_attempt))
        .route("/results/{id}", get(results::get_result))
        .route("/results/student/{student_id}", get(results::list_student_results));

    // Role checks run inside the auth layer, which must see the request first.
    let protected_routes = Router::new()
        .merge(student_routes)
        .merge(teacher_routes)
        .merge(shared_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/ping", get(health::ping))
        .merge(protected_routes);

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
