use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

use crate::pagination::Page;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical account record stored in the `public.users` table. Carries
/// the password hash and the account flags consulted by the permission check,
/// so it never leaves the server; clients receive a [`UserProfile`] instead.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    // Unique login name. Immutable after registration.
    pub username: String,
    // Argon2 PHC string, never a plain password.
    pub password_hash: String,
    // Relative path below the static root, e.g. "avatar/selfie.png".
    pub avatar: Option<String>,
    pub signature: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,

    // Account flags consulted when deriving the per-request permission.
    pub is_super_user: bool,
    pub is_active: bool,
    pub is_staff: bool,

    pub created_at: DateTime<Utc>,
}

/// Category
///
/// A post category from the `public.categories` table. Every post belongs to
/// exactly one category.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Tag
///
/// A free-form label from the `public.tags` table, attached to posts through
/// the `post_tags` join table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Post
///
/// A blog post record from the `public.posts` table. This is the primary data
/// structure for the content side of the application.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    // FK to public.categories.id.
    pub category_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// A comment record from the `public.comments` table, augmented with the
/// author's username and avatar (a join operation).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub post_id: i64,
    pub user_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // These fields are loaded via a JOIN in the repository query.
    #[sqlx(default)]
    pub username: Option<String>,
    #[sqlx(default)]
    pub avatar: Option<String>,
}

/// Banner
///
/// Raw database row (internal use) from the `public.banners` table. The
/// repository hands it to the view layer, which turns it into a
/// [`BannerView`] with a servable image path.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Banner {
    pub id: i64,
    // Bare filename as stored, e.g. "promo.png".
    pub img: String,
    pub url: String,
}

/// ArchiveMonth
///
/// Internal (year, month) pair produced by the archive aggregation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct ArchiveMonth {
    pub year: i32,
    pub month: i32,
}

impl ArchiveMonth {
    /// label
    ///
    /// Renders the month as the archive link text, e.g. "2022年07月". The
    /// month is always zero-padded to two digits so labels sort and compare
    /// consistently.
    pub fn label(&self) -> String {
        format!("{}年{:02}月", self.year, self.month)
    }
}

/// ProfileUpdate
///
/// Internal change set applied by the repository when a user edits their
/// profile. `password_hash` and `avatar` are `None` when the stored value
/// must be kept; every other field overwrites the stored value as-is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub password_hash: Option<String>,
    pub avatar: Option<String>,
    pub signature: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

// --- View Models (Output Schemas) ---

/// Styles cycled over the sidebar tag list, in fixed order.
pub const TAG_STYLES: [&str; 8] = [
    "is-success",
    "is-danger",
    "is-black",
    "is-light",
    "is-primary",
    "is-link",
    "is-info",
    "is-warning",
];

/// PostCard
///
/// A post as shown on the front page: the row itself plus a cover image
/// assigned at render time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostCard {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub category_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Cover image path, drawn per request from a small fixed pool.
    pub img: String,
}

impl PostCard {
    pub fn new(post: Post, img: impl Into<String>) -> Self {
        Self {
            id: post.id,
            title: post.title,
            body: post.body,
            category_id: post.category_id,
            created_at: post.created_at,
            img: img.into(),
        }
    }
}

/// TagBadge
///
/// A tag decorated with its display style for the sidebar tag cloud.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TagBadge {
    pub id: i64,
    pub name: String,
    pub style: String,
}

impl TagBadge {
    /// cycle
    ///
    /// Decorates tags in their given order, assigning styles from
    /// [`TAG_STYLES`] by position and wrapping around after the eighth tag.
    pub fn cycle(tags: Vec<Tag>) -> Vec<TagBadge> {
        tags.into_iter()
            .enumerate()
            .map(|(i, tag)| TagBadge {
                id: tag.id,
                name: tag.name,
                style: TAG_STYLES[i % TAG_STYLES.len()].to_string(),
            })
            .collect()
    }
}

/// BannerView
///
/// A carousel banner with its image resolved to a servable static path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BannerView {
    pub img: String,
    pub url: String,
}

impl From<Banner> for BannerView {
    fn from(banner: Banner) -> Self {
        Self {
            img: format!("/static/{}", banner.img),
            url: banner.url,
        }
    }
}

/// Sidebar
///
/// Navigation data repeated on every blog page: archive month labels, the
/// decorated tag cloud and the newest posts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Sidebar {
    // Distinct month labels, newest first, e.g. ["2022年08月", "2022年07月"].
    pub dates: Vec<String>,
    pub tags: Vec<TagBadge>,
    pub new_posts: Vec<Post>,
}

/// UserProfile
///
/// Output schema for the authenticated user's profile. Mirrors [`User`]
/// minus the password hash and the permission flags.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub signature: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            avatar: user.avatar,
            signature: user.signature,
            description: user.description,
            email: user.email,
            gender: user.gender,
            address: user.address,
        }
    }
}

/// UserComment
///
/// A comment as listed on the "my comments" page, enriched with the title of
/// the post it was left on.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserComment {
    pub id: i64,
    pub content: String,
    pub post_id: i64,
    pub post_title: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Page Envelopes (Output Schemas) ---

/// IndexPage
///
/// Response body of the front page (GET /blog/).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct IndexPage {
    pub posts: Page<PostCard>,
    pub banners: Vec<BannerView>,
    pub sidebar: Sidebar,
    pub notices: Vec<String>,
}

/// CategoryPage
///
/// Response body of a category listing (GET /blog/category/{cate_id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryPage {
    pub category: Category,
    pub posts: Page<Post>,
    pub sidebar: Sidebar,
    pub notices: Vec<String>,
}

/// ArchivePage
///
/// Response body of a month-archive listing. `date` echoes the archive token
/// exactly as requested.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ArchivePage {
    pub date: String,
    pub posts: Page<Post>,
    pub sidebar: Sidebar,
    pub notices: Vec<String>,
}

/// DetailPage
///
/// Response body of the post detail view, with id-adjacent neighbours for the
/// prev/next links and the first page of comments.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DetailPage {
    // The category segment of the URL is not validated, so it may be absent.
    pub category: Option<Category>,
    pub post: Post,
    pub prev_post: Option<Post>,
    pub next_post: Option<Post>,
    pub comments: Page<Comment>,
    pub sidebar: Sidebar,
    pub notices: Vec<String>,
}

/// TagPage
///
/// Response body of a tag listing (GET /blog/tags/{tag_id}). Tag listings
/// are not paginated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TagPage {
    pub tag: Tag,
    pub posts: Vec<Post>,
    pub sidebar: Sidebar,
    pub notices: Vec<String>,
}

/// SearchPage
///
/// Response body of a title search. `words` echoes the pattern searched for.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SearchPage {
    pub words: String,
    pub posts: Page<Post>,
    pub sidebar: Sidebar,
    pub notices: Vec<String>,
}

/// AccountPage
///
/// Response body of the account home (GET /auth/).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AccountPage {
    pub profile: UserProfile,
    pub notices: Vec<String>,
}

/// MyCommentsPage
///
/// Response body of the "my comments" listing (GET /auth/user/comment).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MyCommentsPage {
    pub comments: Page<UserComment>,
    pub notices: Vec<String>,
}

/// LoginPage
///
/// Response body of the login form shell (GET /auth/login). Echoes the
/// return target so the form can post it back.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginPage {
    pub redirect_to: Option<String>,
}

/// RegisterPage
///
/// Response body of the registration form shell (GET /auth/register).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterPage {}

// --- Request Payloads (Input Schemas) ---

/// LoginForm
///
/// Input payload for the login endpoint (POST /auth/login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct LoginForm {
    #[validate(length(min = 2, max = 30, message = "Username must be 2 to 30 characters."))]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters."))]
    pub password: String,
}

/// RegisterForm
///
/// Input payload for the registration endpoint (POST /auth/register).
/// The password is hashed before it is stored and never persisted or logged
/// in clear text.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct RegisterForm {
    #[validate(length(min = 2, max = 30, message = "Username must be 2 to 30 characters."))]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters."))]
    pub password: String,
}

/// CommentForm
///
/// Input payload for posting a comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CommentForm {
    #[validate(length(min = 1, message = "Comment must not be empty."))]
    pub content: String,
}

/// ProfileForm
///
/// Input payload for the profile editor (POST /auth/userinfo/edit). The
/// username field is accepted but never applied; the stored username wins.
/// An absent or empty password keeps the current one.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct ProfileForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    // Bare filename of an already-uploaded avatar, e.g. "selfie.png".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Not a valid email address."))]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}
