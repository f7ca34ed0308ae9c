use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use rand::RngCore;
use std::convert::Infallible;

use crate::{AppState, error::AppError, models::User, session};

/// Path of the account home page, matched verbatim by the permission rule.
pub const ACCOUNT_HOME_PATH: &str = "/auth/";

/// HTML fragment returned to authenticated callers whose permission check
/// failed.
pub const NO_PERMISSION_FRAGMENT: &str = "<h1>No permission!</h1>";

/// CurrentUser
///
/// The resolved identity of an authenticated request: the full account record
/// plus the permission verdict computed for the requested path. Handlers take
/// this as an extractor argument when they require a logged-in caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Permission verdict for the path this request was made against.
    pub has_perm: bool,
}

/// Identity
///
/// Per-request identity attached by [`resolve_identity`]. Every request
/// carries exactly one of these; a missing or stale session resolves to
/// `Anonymous` rather than an error.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Known(CurrentUser),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

/// derive_permission
///
/// Computes the per-request permission flag from the account flags and the
/// request path. Rules are evaluated top to bottom and the first match wins:
///
/// 1. An active superuser may do anything.
/// 2. An active, non-staff regular user may view the account home.
///    This rule never decides on its own: rule 3 matches the same users
///    regardless of path. It is kept in evaluation order, not folded away.
/// 3. An active, non-staff user is permitted in general.
/// 4. Everyone else is denied. In particular, staff accounts that are not
///    superusers always land here, as do deactivated accounts.
pub fn derive_permission(user: &User, path: &str) -> bool {
    if user.is_super_user && user.is_active {
        return true;
    }
    if !user.is_super_user && user.is_active && !user.is_staff && path == ACCOUNT_HOME_PATH {
        return true;
    }
    if user.is_active && !user.is_staff {
        return true;
    }
    false
}

// --- Middleware ---

/// resolve_identity
///
/// Runs on every request, before routing. Reads the session cookie, loads the
/// session, looks up the referenced account and attaches the resulting
/// [`Identity`] as a request extension. Any failure along the way (no cookie,
/// unknown token, expired session, vanished user) degrades to
/// `Identity::Anonymous`; this middleware never rejects a request.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user_id = match session::cookie_token(request.headers()) {
        Some(token) => state.sessions.load(&token).await.and_then(|s| s.user_id),
        None => None,
    };

    let identity = match user_id {
        Some(user_id) => match state.repo.get_user(user_id).await {
            Ok(Some(user)) => {
                let has_perm = derive_permission(&user, request.uri().path());
                Identity::Known(CurrentUser { user, has_perm })
            }
            Ok(None) => {
                // The session outlived its account. Treat as logged out.
                tracing::warn!(user_id, "session references a missing user");
                Identity::Anonymous
            }
            Err(e) => {
                tracing::error!(error = %e, "user lookup failed while resolving identity");
                Identity::Anonymous
            }
        },
        None => Identity::Anonymous,
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// login_required
///
/// Route-group guard for the account area. Anonymous callers are redirected
/// to the login form with the original path preserved in `redirect_to`;
/// authenticated callers without permission receive a fixed 403 fragment.
/// Assumes [`resolve_identity`] already ran for this request.
pub async fn login_required(request: Request, next: Next) -> Response {
    match request.extensions().get::<Identity>() {
        Some(Identity::Known(current)) => {
            if current.has_perm {
                next.run(request).await
            } else {
                (StatusCode::FORBIDDEN, Html(NO_PERMISSION_FRAGMENT)).into_response()
            }
        }
        _ => {
            let target = format!("/auth/login?redirect_to={}", request.uri().path());
            Redirect::to(&target).into_response()
        }
    }
}

// --- Extractors ---

/// Identity Extractor Implementation
///
/// Makes [`Identity`] usable as a handler argument on public routes that
/// render differently for logged-in users. Infallible: requests that never
/// passed through [`resolve_identity`] read as anonymous.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or(Identity::Anonymous))
    }
}

/// CurrentUser Extractor Implementation
///
/// Makes [`CurrentUser`] usable as a handler argument wherever a logged-in
/// caller is mandatory (e.g. posting a comment). Unlike the route-group
/// guard, this rejects with a plain 401 rather than a redirect, which suits
/// the form-submission endpoints.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(Identity::Known(current)) => Ok(current.clone()),
            _ => Err(AppError::Unauthenticated),
        }
    }
}

// --- Password Hashing ---

/// hash_password
///
/// Hashes a plain password with Argon2 under a fresh 16-byte random salt and
/// returns the self-describing PHC string for storage.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes).map_err(|_| AppError::PasswordHash)?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AppError::PasswordHash)?;

    Ok(hash.to_string())
}

/// verify_password
///
/// Checks a plain password against a stored PHC string. An unparseable
/// stored hash counts as a mismatch, not an error.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
