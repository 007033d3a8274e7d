use axum::{
    Json, Router, middleware,
    routing::{get, post, put},
};

use crate::middleware::resolve_viewer;
use crate::state::AppState;
use crate::{admin, auth, likes, listing, results};

/// Application routes. Every route except `/health` runs behind
/// [`resolve_viewer`]; operations that need a viewer enforce it themselves.
pub fn router(state: AppState) -> Router {
    let mut api = Router::new()
        .route("/auth/session", post(auth::session))
        .route("/results", get(listing::list).post(results::create))
        .route(
            "/results/{id}",
            get(results::show).put(results::update).delete(results::remove),
        )
        .route("/results/{id}/visibility", post(results::visibility))
        .route("/results/{id}/favorite", post(results::favorite))
        .route("/results/{id}/like", post(likes::toggle))
        .route("/feed", get(listing::feed));

    if state.admin_enabled {
        api = api
            .route("/admin/tables", get(admin::tables))
            .route("/admin/tables/{table}", get(admin::browse).post(admin::create))
            .route(
                "/admin/tables/{table}/{id}",
                put(admin::update).delete(admin::remove),
            );
    }

    let api = api
        .layer(middleware::from_fn_with_state(state.clone(), resolve_viewer))
        .with_state(state);

    Router::new().route("/health", get(health)).merge(api)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
