use crate::{
    AppState,
    auth::{self, ACCOUNT_HOME_PATH, CurrentUser},
    error::AppError,
    models::{
        AccountPage, ArchiveMonth, ArchivePage, BannerView, CategoryPage, CommentForm, DetailPage,
        IndexPage, LoginForm, LoginPage, MyCommentsPage, PostCard, ProfileForm, ProfileUpdate,
        RegisterForm, RegisterPage, SearchPage, Sidebar, TagBadge, TagPage, UserProfile,
    },
    pagination::clamp_page,
    repository::RepositoryState,
    session::{self, SessionData, SessionStoreState, SessionToken},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use validator::{Validate, ValidationError, ValidationErrors};

// Page sizes: the front page shows 9 cards, every other listing 10 rows.
pub const INDEX_PAGE_SIZE: i64 = 9;
pub const LIST_PAGE_SIZE: i64 = 10;

/// Number of posts shown in the sidebar "newest" block.
pub const SIDEBAR_RECENT: i64 = 6;

/// Cover images drawn per card on the front page.
pub const POST_COVERS: [&str; 3] = [
    "/static/img/cover-1.jpg",
    "/static/img/cover-2.jpg",
    "/static/img/cover-3.jpg",
];

// --- Filter Structs ---

/// PageQuery
///
/// The `page` query parameter accepted by every paginated listing endpoint.
/// Absent, zero or negative values fall back to the first page.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// 1-based page index.
    pub page: Option<i64>,
}

/// SearchQuery
///
/// Query parameters of the title search endpoint (GET /blog/search).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SearchQuery {
    /// Substring to look for in post titles. Absent or empty matches all posts.
    pub words: Option<String>,
    /// 1-based page index.
    pub page: Option<i64>,
}

/// RedirectQuery
///
/// The `redirect_to` query parameter carried through the login flow so a
/// successful login can return the caller to the page that sent them.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct RedirectQuery {
    pub redirect_to: Option<String>,
}

// --- Shared Helpers ---

/// build_sidebar
///
/// Assembles the navigation data repeated on every blog page: distinct
/// archive month labels (newest first), the style-cycled tag cloud and the
/// newest posts.
async fn build_sidebar(repo: &RepositoryState) -> Result<Sidebar, AppError> {
    let dates = repo
        .archive_months()
        .await?
        .iter()
        .map(ArchiveMonth::label)
        .collect();
    let tags = TagBadge::cycle(repo.list_tags().await?);
    let new_posts = repo.newest_posts(SIDEBAR_RECENT).await?;

    Ok(Sidebar {
        dates,
        tags,
        new_posts,
    })
}

/// drain_notices
///
/// Takes the one-shot notices queued on the caller's session, if any. Each
/// notice is delivered exactly once.
async fn drain_notices(sessions: &SessionStoreState, token: &SessionToken) -> Vec<String> {
    match &token.0 {
        Some(t) => sessions.take_notices(t).await,
        None => Vec::new(),
    }
}

/// parse_archive_token
///
/// Pulls (year, month) out of an archive token such as "2022年07月" by
/// pattern matching digit groups, not by strict date parsing: the first
/// four-digit group is the year, the next one- or two-digit group the month.
/// Tokens with fewer than two groups are rejected as malformed.
fn parse_archive_token(token: &str) -> Result<(i32, i32), AppError> {
    static ARCHIVE_TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = ARCHIVE_TOKEN.get_or_init(|| Regex::new(r"\d{4}|\d{1,2}").expect("archive pattern"));

    let mut groups = re.find_iter(token);
    let year = groups.next().and_then(|m| m.as_str().parse::<i32>().ok());
    let month = groups.next().and_then(|m| m.as_str().parse::<i32>().ok());

    match (year, month) {
        (Some(year), Some(month)) => Ok((year, month)),
        _ => Err(AppError::BadRequest(
            "archive token must contain a year and a month".to_string(),
        )),
    }
}

/// field_error
///
/// A single-field validation failure raised outside the derive-driven
/// validators, e.g. a taken username or a failed credential check.
fn field_error(field: &'static str, code: &'static str, message: &'static str) -> AppError {
    let mut errors = ValidationErrors::new();
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    errors.add(field.into(), error);
    AppError::Validation(errors)
}

// --- Blog Handlers ---

/// index
///
/// [Public Route] The front page: nine posts per page, newest first, each
/// decorated with a cover image drawn from a fixed pool, plus the carousel
/// banners and the sidebar.
#[utoipa::path(
    get,
    path = "/blog/",
    params(PageQuery),
    responses((status = 200, description = "Front page", body = IndexPage))
)]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    token: SessionToken,
) -> Result<Json<IndexPage>, AppError> {
    let posts = state
        .repo
        .recent_posts_page(clamp_page(query.page), INDEX_PAGE_SIZE)
        .await?;
    let banners: Vec<BannerView> = state
        .repo
        .list_banners()
        .await?
        .into_iter()
        .map(BannerView::from)
        .collect();
    let sidebar = build_sidebar(&state.repo).await?;
    let notices = drain_notices(&state.sessions, &token).await;

    // Covers are drawn after the last await: the thread-local generator is
    // not Send and must not be held across one.
    let mut rng = rand::rng();
    let posts = posts.map(|post| {
        let img = POST_COVERS[rng.random_range(0..POST_COVERS.len())];
        PostCard::new(post, img)
    });

    Ok(Json(IndexPage {
        posts,
        banners,
        sidebar,
        notices,
    }))
}

/// category_or_archive
///
/// [Public Route] One path segment serves two listings. A token that parses
/// as an integer is a category id (unknown ids are a 404); anything else is
/// treated as an archive month token such as "2022年07月" and filtered by
/// the extracted year and month.
#[utoipa::path(
    get,
    path = "/blog/category/{token}",
    params(
        ("token" = String, Path, description = "Category id, or an archive month token"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Category or archive listing"),
        (status = 400, description = "Malformed archive token"),
        (status = 404, description = "Unknown category")
    )
)]
pub async fn category_or_archive(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<PageQuery>,
    session_token: SessionToken,
) -> Result<Response, AppError> {
    let page = clamp_page(query.page);

    if let Ok(cate_id) = token.parse::<i64>() {
        let category = state
            .repo
            .get_category(cate_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let posts = state
            .repo
            .posts_by_category(cate_id, page, LIST_PAGE_SIZE)
            .await?;
        let sidebar = build_sidebar(&state.repo).await?;
        let notices = drain_notices(&state.sessions, &session_token).await;

        return Ok(Json(CategoryPage {
            category,
            posts,
            sidebar,
            notices,
        })
        .into_response());
    }

    let (year, month) = parse_archive_token(&token)?;
    let posts = state
        .repo
        .posts_by_month(year, month, page, LIST_PAGE_SIZE)
        .await?;
    let sidebar = build_sidebar(&state.repo).await?;
    let notices = drain_notices(&state.sessions, &session_token).await;

    Ok(Json(ArchivePage {
        date: token,
        posts,
        sidebar,
        notices,
    })
    .into_response())
}

/// post_detail
///
/// [Public Route] A single post with its id-adjacent neighbours for the
/// prev/next links and one page of comments, newest first. The category
/// segment of the URL is looked up but not validated; the post id alone
/// decides whether this is a 404.
#[utoipa::path(
    get,
    path = "/blog/category/{cate_id}/{post_id}",
    params(
        ("cate_id" = i64, Path, description = "Category id as carried in the URL"),
        ("post_id" = i64, Path, description = "Post id"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Post detail", body = DetailPage),
        (status = 404, description = "Unknown post")
    )
)]
pub async fn post_detail(
    State(state): State<AppState>,
    Path((cate_id, post_id)): Path<(i64, i64)>,
    Query(query): Query<PageQuery>,
    token: SessionToken,
) -> Result<Json<DetailPage>, AppError> {
    let post = state
        .repo
        .get_post(post_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let category = state.repo.get_category(cate_id).await?;
    let prev_post = state.repo.prev_post(post_id).await?;
    let next_post = state.repo.next_post(post_id).await?;
    let comments = state
        .repo
        .comments_for_post(post_id, clamp_page(query.page), LIST_PAGE_SIZE)
        .await?;
    let sidebar = build_sidebar(&state.repo).await?;
    let notices = drain_notices(&state.sessions, &token).await;

    Ok(Json(DetailPage {
        category,
        post,
        prev_post,
        next_post,
        comments,
        sidebar,
        notices,
    }))
}

/// post_comment
///
/// [Authenticated Route] Posts a comment on a post, then bounces back to the
/// detail view's comment anchor. Anonymous callers get a plain 401 from the
/// `CurrentUser` extractor; the login redirect is reserved for the account
/// area.
#[utoipa::path(
    post,
    path = "/blog/category/{cate_id}/{post_id}",
    request_body = CommentForm,
    params(
        ("cate_id" = i64, Path, description = "Category id as carried in the URL"),
        ("post_id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 303, description = "Comment stored; back to the detail view"),
        (status = 401, description = "Login required"),
        (status = 404, description = "Unknown post"),
        (status = 422, description = "Empty comment")
    )
)]
pub async fn post_comment(
    CurrentUser { user, .. }: CurrentUser,
    State(state): State<AppState>,
    Path((cate_id, post_id)): Path<(i64, i64)>,
    token: SessionToken,
    Json(form): Json<CommentForm>,
) -> Result<Redirect, AppError> {
    form.validate()?;

    let post = state
        .repo
        .get_post(post_id)
        .await?
        .ok_or(AppError::NotFound)?;
    state.repo.add_comment(post.id, user.id, &form.content).await?;

    if let Some(t) = &token.0 {
        state.sessions.push_notice(t, "Comment posted.").await;
    }

    Ok(Redirect::to(&format!(
        "/blog/category/{cate_id}/{post_id}#comment"
    )))
}

/// tag_posts
///
/// [Public Route] Every post carrying a tag, unpaginated. Unknown tag ids
/// are a 404.
#[utoipa::path(
    get,
    path = "/blog/tags/{tag_id}",
    params(("tag_id" = i64, Path, description = "Tag id")),
    responses(
        (status = 200, description = "Posts for one tag", body = TagPage),
        (status = 404, description = "Unknown tag")
    )
)]
pub async fn tag_posts(
    State(state): State<AppState>,
    Path(tag_id): Path<i64>,
    token: SessionToken,
) -> Result<Json<TagPage>, AppError> {
    let tag = state.repo.get_tag(tag_id).await?.ok_or(AppError::NotFound)?;
    let posts = state.repo.posts_by_tag(tag_id).await?;
    let sidebar = build_sidebar(&state.repo).await?;
    let notices = drain_notices(&state.sessions, &token).await;

    Ok(Json(TagPage {
        tag,
        posts,
        sidebar,
        notices,
    }))
}

/// search
///
/// [Public Route] Title substring search. A missing or empty pattern matches
/// every post rather than none, so the page is never a dead end.
#[utoipa::path(
    get,
    path = "/blog/search",
    params(SearchQuery),
    responses((status = 200, description = "Search results", body = SearchPage))
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    token: SessionToken,
) -> Result<Json<SearchPage>, AppError> {
    let words = query.words.unwrap_or_default();
    let posts = state
        .repo
        .search_posts(&words, clamp_page(query.page), LIST_PAGE_SIZE)
        .await?;
    let sidebar = build_sidebar(&state.repo).await?;
    let notices = drain_notices(&state.sessions, &token).await;

    Ok(Json(SearchPage {
        words,
        posts,
        sidebar,
        notices,
    }))
}

// --- Auth Handlers ---

/// login_page
///
/// [Public Route] The login form shell. Echoes the `redirect_to` target so
/// the form can carry it through the POST.
#[utoipa::path(
    get,
    path = "/auth/login",
    params(RedirectQuery),
    responses((status = 200, description = "Login form", body = LoginPage))
)]
pub async fn login_page(Query(query): Query<RedirectQuery>) -> Json<LoginPage> {
    Json(LoginPage {
        redirect_to: query.redirect_to,
    })
}

/// login
///
/// [Public Route] Verifies the credentials, rotates the session and binds the
/// fresh token to the client. An unknown username and a wrong password fail
/// identically, so the response does not reveal which half was wrong.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginForm,
    params(RedirectQuery),
    responses(
        (status = 303, description = "Logged in; redirected to the target"),
        (status = 422, description = "Malformed form or failed credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
    token: SessionToken,
    Json(form): Json<LoginForm>,
) -> Result<Response, AppError> {
    form.validate()?;

    let user = match state.repo.get_user_by_username(&form.username).await? {
        Some(user) if auth::verify_password(&form.password, &user.password_hash) => user,
        _ => {
            return Err(field_error(
                "username",
                "credentials",
                "Unknown username or wrong password.",
            ));
        }
    };

    // Any session the client already held is dropped, never reused.
    if let Some(old) = &token.0 {
        state.sessions.remove(old).await;
    }
    let fresh = session::new_token();
    state
        .sessions
        .save(&fresh, SessionData::for_user(user.id))
        .await;

    let target = query.redirect_to.as_deref().unwrap_or("/");
    Ok((
        AppendHeaders([(header::SET_COOKIE, session::session_cookie(&fresh))]),
        Redirect::to(target),
    )
        .into_response())
}

/// register_page
///
/// [Public Route] The registration form shell.
#[utoipa::path(
    get,
    path = "/auth/register",
    responses((status = 200, description = "Registration form", body = RegisterPage))
)]
pub async fn register_page() -> Json<RegisterPage> {
    Json(RegisterPage {})
}

/// register
///
/// [Public Route] Creates an account and logs the caller straight in. The
/// username must be free; the password is hashed before it is stored.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterForm,
    responses(
        (status = 303, description = "Registered and logged in"),
        (status = 422, description = "Malformed form or taken username")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    token: SessionToken,
    Json(form): Json<RegisterForm>,
) -> Result<Response, AppError> {
    form.validate()?;

    if state
        .repo
        .get_user_by_username(&form.username)
        .await?
        .is_some()
    {
        return Err(field_error(
            "username",
            "username_taken",
            "This username is already registered.",
        ));
    }

    let password_hash = auth::hash_password(&form.password)?;
    let user = state.repo.create_user(&form.username, &password_hash).await?;

    if let Some(old) = &token.0 {
        state.sessions.remove(old).await;
    }
    let fresh = session::new_token();
    state
        .sessions
        .save(&fresh, SessionData::for_user(user.id))
        .await;

    Ok((
        AppendHeaders([(header::SET_COOKIE, session::session_cookie(&fresh))]),
        Redirect::to("/"),
    )
        .into_response())
}

/// logout
///
/// [Public Route] Drops the server-side session and clears the cookie.
/// Logging out twice is harmless.
#[utoipa::path(
    get,
    path = "/auth/logout",
    responses((status = 303, description = "Logged out; back to the front page"))
)]
pub async fn logout(State(state): State<AppState>, token: SessionToken) -> Response {
    if let Some(t) = &token.0 {
        state.sessions.remove(t).await;
    }

    (
        AppendHeaders([(header::SET_COOKIE, session::expired_cookie())]),
        Redirect::to("/"),
    )
        .into_response()
}

// --- Account Handlers ---

/// account_home
///
/// [Authenticated Route] The account home page: the caller's profile plus
/// any notices queued by earlier form submissions.
#[utoipa::path(
    get,
    path = "/auth/",
    responses((status = 200, description = "Account home", body = AccountPage))
)]
pub async fn account_home(
    CurrentUser { user, .. }: CurrentUser,
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Json<AccountPage>, AppError> {
    let notices = drain_notices(&state.sessions, &token).await;

    Ok(Json(AccountPage {
        profile: UserProfile::from(user),
        notices,
    }))
}

/// my_comments
///
/// [Authenticated Route] The caller's own comments, newest first, each with
/// the title of the post it was left on.
#[utoipa::path(
    get,
    path = "/auth/user/comment",
    params(PageQuery),
    responses((status = 200, description = "Own comments", body = MyCommentsPage))
)]
pub async fn my_comments(
    CurrentUser { user, .. }: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    token: SessionToken,
) -> Result<Json<MyCommentsPage>, AppError> {
    let comments = state
        .repo
        .comments_by_user(user.id, clamp_page(query.page), LIST_PAGE_SIZE)
        .await?;
    let notices = drain_notices(&state.sessions, &token).await;

    Ok(Json(MyCommentsPage { comments, notices }))
}

/// profile_form
///
/// [Authenticated Route] The profile editor pre-filled with the stored
/// profile.
#[utoipa::path(
    get,
    path = "/auth/userinfo/edit",
    responses((status = 200, description = "Profile editor", body = UserProfile))
)]
pub async fn profile_form(CurrentUser { user, .. }: CurrentUser) -> Json<UserProfile> {
    Json(UserProfile::from(user))
}

/// profile_edit
///
/// [Authenticated Route] Applies a profile change. The submitted username is
/// discarded: the stored one is authoritative. An absent or empty password
/// keeps the current hash; a real change also ends the session that made it,
/// forcing a fresh login. The avatar is re-filed only when the submitted
/// reference differs from the stored one.
#[utoipa::path(
    post,
    path = "/auth/userinfo/edit",
    request_body = ProfileForm,
    responses(
        (status = 303, description = "Profile stored; back to the account home"),
        (status = 422, description = "Malformed form"),
        (status = 500, description = "Avatar store failure")
    )
)]
pub async fn profile_edit(
    CurrentUser { user, .. }: CurrentUser,
    State(state): State<AppState>,
    token: SessionToken,
    Json(form): Json<ProfileForm>,
) -> Result<Response, AppError> {
    form.validate()?;

    let password_hash = match form.password.as_deref() {
        Some(p) if !p.is_empty() => Some(auth::hash_password(p)?),
        _ => None,
    };
    let password_changed = password_hash.is_some();

    let avatar = match form.avatar.as_deref() {
        // Re-filing is skipped when the submitted reference equals the stored one.
        Some(f) if user.avatar.as_deref() != Some(f) => {
            Some(state.avatars.place(f).await.map_err(AppError::Storage)?)
        }
        _ => None,
    };

    let update = ProfileUpdate {
        password_hash,
        avatar,
        signature: form.signature,
        description: form.description,
        email: form.email,
        gender: form.gender,
        address: form.address,
    };
    state
        .repo
        .update_profile(user.id, update)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(t) = &token.0 {
        state.sessions.push_notice(t, "Profile updated.").await;
        // A changed password ends the session that changed it.
        if password_changed {
            state.sessions.remove(t).await;
        }
    }

    Ok(Redirect::to(ACCOUNT_HOME_PATH).into_response())
}
