use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that are **unauthenticated** and accessible to any client.
/// All article retrieval here goes through the visibility-window filter at
/// the repository level: an article outside its `[start_date, end_date]`
/// window is treated as not found on this surface.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // New account creation. Grants no roles; an admin promotes readers
        // to Contributor separately.
        .route("/register", post(handlers::register))
        // POST /login
        // Credential verification and bearer token issuance.
        .route("/login", post(handlers::login))
        // GET /articles
        // Lists articles currently inside their visibility window, newest
        // first.
        .route("/articles", get(handlers::list_articles))
        // GET /articles/{id}
        // Single-article detail, window-filtered identically to the listing.
        .route("/articles/{id}", get(handlers::get_article_detail))
}
