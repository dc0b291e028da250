use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Admin Router Module
///
/// Role and ban management, exclusively for accounts holding the Admin
/// role. The router sits behind the authentication middleware; the Admin
/// check itself is performed inside each handler after the request passes
/// that layer.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users
        // Lists every account with its role names, ordered by username.
        .route("/users", get(handlers::list_users))
        // POST /admin/users/roles
        // Grants or revokes the Contributor role. Idempotent both ways;
        // unknown usernames produce 404 rather than a silent no-op.
        .route("/users/roles", post(handlers::update_user_roles))
        // DELETE /admin/users/{username}
        // Bans an account under the configured policy (hard delete or soft
        // flag). Irreversible under the hard policy.
        .route("/users/{username}", delete(handlers::ban_user))
}
