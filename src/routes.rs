// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{
        admin, analytics, auth, coaching, coaching_admin, exams, maintenance, mistakes, practice,
    },
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, super_admin_middleware},
};

/// Assembles the main application router.
///
/// * Public: register, login.
/// * Authenticated: everything else; account state is checked per handler by `ActiveUser`.
/// * Admin: `/api/admin`, with maintenance further restricted to super admins.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .route_layer(auth_layer.clone()),
        );

    let practice_routes = Router::new()
        .route("/questions", get(practice::fetch_questions))
        .route("/answers", post(practice::submit_answer))
        .route("/results", post(practice::submit_results));

    let exam_routes = Router::new()
        .route("/", get(exams::list_exams))
        .route("/{id}/runs", post(exams::start_run))
        .route("/runs/{run_id}", get(exams::run_status))
        .route("/runs/{run_id}/breaks", post(exams::start_break))
        .route("/runs/{run_id}/breaks/end", post(exams::end_break))
        .route("/runs/{run_id}/submit", post(exams::submit_run));

    let mistake_routes = Router::new()
        .route("/", get(mistakes::list_mistakes))
        .route(
            "/review",
            get(mistakes::review_pool).post(mistakes::submit_review),
        )
        .route("/stats", get(mistakes::stats))
        .route("/corrected", delete(mistakes::clear_corrected));

    let analytics_routes = Router::new()
        .route("/me", get(analytics::my_analytics))
        .route("/results", get(analytics::list_results))
        .route("/results/{id}", get(analytics::get_result));

    let coaching_routes = Router::new()
        .route("/groups", get(coaching::my_groups))
        .route("/groups/{id}/sessions", get(coaching::group_sessions))
        .route("/sessions/{id}/questions", get(coaching::session_questions))
        .route("/sessions/{id}/attempts", post(coaching::submit_attempt))
        .route("/sessions/{id}/scores", get(coaching::session_scores));

    let maintenance_routes = Router::new()
        .route("/results", delete(maintenance::purge_results))
        .route("/mistakes", delete(maintenance::purge_mistakes))
        .route(
            "/questions/inactive",
            delete(maintenance::purge_inactive_questions),
        )
        .route("/runs/stale", delete(maintenance::purge_stale_runs))
        .route_layer(middleware::from_fn(super_admin_middleware));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/questions/import", post(admin::import_questions))
        .route("/questions/generate", post(admin::generate_questions))
        .route("/exams", post(admin::create_exam))
        .route(
            "/exams/{id}",
            put(admin::update_exam).delete(admin::delete_exam),
        )
        .route(
            "/groups",
            get(coaching_admin::list_groups).post(coaching_admin::create_group),
        )
        .route(
            "/groups/{id}",
            put(coaching_admin::update_group).delete(coaching_admin::delete_group),
        )
        .route(
            "/groups/{id}/members",
            get(coaching_admin::list_members).post(coaching_admin::add_member),
        )
        .route(
            "/groups/{id}/members/{user_id}",
            delete(coaching_admin::remove_member),
        )
        .route("/groups/{id}/sessions", post(coaching_admin::create_session))
        .route(
            "/sessions/{id}",
            put(coaching_admin::update_session).delete(coaching_admin::delete_session),
        )
        .nest("/maintenance", maintenance_routes)
        // Auth first, then the role check
        .route_layer(middleware::from_fn(admin_middleware));

    let protected = Router::new()
        .nest("/api/practice", practice_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/mistakes", mistake_routes)
        .nest("/api/analytics", analytics_routes)
        .nest("/api/coaching", coaching_routes)
        .nest("/api/admin", admin_routes)
        .route_layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
