use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes for any user who has passed the authentication layer. Every
/// handler here receives a validated `AuthUser`; role and ownership checks
/// are then made through the policy module, so a plain reader account can
/// reach these routes but cannot author or mutate anything.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The authenticated user's profile and role set.
        .route("/me", get(handlers::get_me))
        // GET /me/articles
        // All articles owned by the user, including out-of-window ones.
        .route("/me/articles", get(handlers::get_my_articles))
        // GET /me/articles/{id}
        // Owner/admin detail view that ignores the visibility window.
        .route("/me/articles/{id}", get(handlers::get_own_article))
        // POST /articles
        // Submits a new article (Contributor or Admin role required).
        // Ownership is pinned to the acting user.
        .route("/articles", post(handlers::create_article))
        // PUT/DELETE /articles/{id}
        // Edit or permanently remove an article. The owning contributor or
        // an admin only; anyone else gets an Authorization error.
        .route(
            "/articles/{id}",
            put(handlers::update_article).delete(handlers::delete_article),
        )
}
