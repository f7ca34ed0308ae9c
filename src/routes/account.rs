use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Open Account Routes
///
/// The entry and exit points of the account system. These must stay outside
/// the login guard: a guarded login form would bounce every anonymous caller
/// straight back to itself.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // GET /auth/login?redirect_to=...
        // The login form shell; POST verifies credentials, rotates the
        // session and redirects to the carried target (or the front page).
        .route(
            "/auth/login",
            get(handlers::login_page).post(handlers::login),
        )
        // GET /auth/register
        // The registration form shell; POST creates the account and logs
        // the caller straight in.
        .route(
            "/auth/register",
            get(handlers::register_page).post(handlers::register),
        )
        // GET /auth/logout
        // Drops the server-side session, clears the cookie and returns to
        // the front page. Safe to call repeatedly.
        .route("/auth/logout", get(handlers::logout))
}

/// Guarded Account Routes
///
/// The account area proper. The caller mounts this group behind the
/// `login_required` middleware: anonymous callers are redirected to the
/// login form with the original path in `redirect_to`, and authenticated
/// callers without permission receive the fixed 403 fragment.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        // GET /auth/
        // Account home: the caller's profile plus queued notices.
        .route("/auth/", get(handlers::account_home))
        // GET /auth/user/comment?page=...
        // The caller's own comments, newest first, with post titles.
        .route("/auth/user/comment", get(handlers::my_comments))
        // GET /auth/userinfo/edit
        // The profile editor pre-filled from the stored profile; POST
        // applies the change set (username excluded).
        .route(
            "/auth/userinfo/edit",
            get(handlers::profile_form).post(handlers::profile_edit),
        )
}
