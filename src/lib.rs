use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod session;
pub mod storage;

// Module for routing segregation (public content vs. account area).
pub mod routes;
use auth::{login_required, resolve_identity};
use routes::{account, blog};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::AppConfig;
pub use error::AppError;
pub use repository::{PostgresRepository, Repository, RepositoryState};
pub use session::{MemorySessionStore, SessionStore, SessionStoreState};
pub use storage::{AvatarState, AvatarStore, LocalAvatarStore, MockAvatarStore};

/// ApiDoc
///
/// This struct auto-generates the OpenAPI documentation (Swagger JSON) for the application.
/// It aggregates all API paths and data schemas that have been decorated with
/// the `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // List all public handler functions here for documentation generation.
    paths(
        handlers::index, handlers::category_or_archive, handlers::post_detail,
        handlers::post_comment, handlers::tag_posts, handlers::search,
        handlers::login_page, handlers::login, handlers::register_page,
        handlers::register, handlers::logout, handlers::account_home,
        handlers::my_comments, handlers::profile_form, handlers::profile_edit
    ),
    // List all models (schemas) used in the request/response bodies.
    components(
        schemas(
            models::Post, models::Category, models::Tag, models::Comment,
            models::PostCard, models::TagBadge, models::BannerView, models::Sidebar,
            models::UserProfile, models::UserComment,
            models::IndexPage, models::CategoryPage, models::ArchivePage,
            models::DetailPage, models::TagPage, models::SearchPage,
            models::AccountPage, models::MyCommentsPage, models::LoginPage,
            models::RegisterPage,
            models::LoginForm, models::RegisterForm, models::CommentForm,
            models::ProfileForm,
        )
    ),
    tags(
        (name = "inkpress", description = "Blog and account API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**. This is the single, thread-safe, and immutable
/// container holding all essential application services and configuration.
/// The application state is shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// Session Layer: Server-side session records keyed by cookie token.
    pub sessions: SessionStoreState,
    /// Avatar Layer: Files uploaded avatar references below the static root.
    pub avatars: AvatarState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow handlers and middleware to selectively pull
// components from the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionStoreState {
    fn from_ref(app_state: &AppState) -> SessionStoreState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AvatarState {
    fn from_ref(app_state: &AppState) -> AvatarState {
        app_state.avatars.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and scoped middleware,
/// and registers the application state.
///
/// Middleware order matters here: `resolve_identity` is layered over every
/// route, so by the time the `login_required` guard on the account area runs,
/// the request already carries its `Identity` extension.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public content routes: no guard.
        .merge(blog::blog_routes())
        // Login/register/logout: must stay reachable anonymously.
        .merge(account::auth_routes())
        // The account area proper, behind the login guard.
        .merge(account::account_routes().route_layer(middleware::from_fn(login_required)))
        // Identity resolution runs on every request, before routing decides
        // whether a guard applies.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_identity,
        ))
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: wraps the request/response lifecycle in a
                // tracing span carrying the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: returns the x-request-id header to
                // the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer (Applied last, allowing all traffic in/out after processing)
        .layer(cors)
}

/// trace_span_logger
///
/// Helper function used by `TraceLayer` to customize the tracing span creation.
/// It extracts the `x-request-id` header (if present) and includes it in the
/// structured logging metadata alongside the HTTP method and URI, so every log
/// line for a single request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
