use crate::{AppState, handlers};
use axum::{Router, response::Redirect, routing::get};

/// Blog Router Module
///
/// Defines the public content surface. Every listing endpoint here is
/// readable anonymously; the lone write operation (posting a comment) shares
/// the detail path and requires a logged-in caller via the `CurrentUser`
/// extractor, answering anonymous submissions with a plain 401.
pub fn blog_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load
        // balancer checks. Returns "ok" immediately.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // The site root is the blog; send callers to the front page.
        .route("/", get(|| async { Redirect::to("/blog/") }))
        // GET /blog/?page=...
        // Front page: nine posts per page with covers, banners and sidebar.
        .route("/blog/", get(handlers::index))
        // GET /blog/category/{token}?page=...
        // Dual-purpose listing: a numeric token is a category id, anything
        // else is parsed as an archive month token such as "2022年07月".
        .route("/blog/category/{token}", get(handlers::category_or_archive))
        // GET /blog/category/{cate_id}/{post_id}?page=...
        // Post detail with prev/next links and one page of comments.
        // POST on the same path submits a comment and bounces back to the
        // detail view's comment anchor.
        .route(
            "/blog/category/{cate_id}/{post_id}",
            get(handlers::post_detail).post(handlers::post_comment),
        )
        // GET /blog/tags/{tag_id}
        // Every post carrying one tag, unpaginated.
        .route("/blog/tags/{tag_id}", get(handlers::tag_posts))
        // GET /blog/search?words=...&page=...
        // Title substring search; an empty pattern lists every post.
        .route("/blog/search", get(handlers::search))
}
