use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/templates",
            get(handlers::list_templates).post(handlers::create_template),
        )
        .route("/api/templates/manual", post(handlers::create_manual_template))
        .route("/api/templates/activate", post(handlers::activate_template))
        .route(
            "/api/templates/:id",
            get(handlers::get_template).delete(handlers::delete_template),
        )
        .route("/api/onboard", post(handlers::onboard))
        .route("/api/calendar/today", get(handlers::get_today))
        .route("/api/calendar/ensure", post(handlers::ensure_day))
        .route("/api/calendar/cleanup", post(handlers::cleanup_day))
        .route("/api/calendar/month", get(handlers::get_month))
        .route("/api/calendar/instances", post(handlers::add_instance))
        .route(
            "/api/calendar/instances/:id",
            patch(handlers::patch_instance).delete(handlers::delete_instance),
        )
        .route("/api/checks/toggle", post(handlers::toggle_check))
        .route("/api/scores/calculate", post(handlers::calculate_score))
        .route("/api/analytics/weekly", get(handlers::get_weekly_stats))
        .with_state(state)
}
