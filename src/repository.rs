use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::models::{
    ArchiveMonth, Banner, Category, Comment, Post, ProfileUpdate, Tag, User, UserComment,
};
use crate::pagination::{Page, offset};

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. Handlers
/// interact with the data layer through this trait without knowing the
/// concrete implementation (Postgres in production, an in-memory table set in
/// tests).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's asynchronous task
/// boundaries. Every method surfaces database failures to the caller, where
/// they collapse into a 500 response.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Post Retrieval ---
    // Front page listing, newest first.
    async fn recent_posts_page(&self, page: i64, per_page: i64) -> Result<Page<Post>, sqlx::Error>;
    async fn posts_by_category(
        &self,
        category_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, sqlx::Error>;
    // Posts whose creation instant falls inside the given UTC month.
    async fn posts_by_month(
        &self,
        year: i32,
        month: i32,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, sqlx::Error>;
    // Tag listings are not paginated.
    async fn posts_by_tag(&self, tag_id: i64) -> Result<Vec<Post>, sqlx::Error>;
    // Title substring match. An empty pattern matches every post.
    async fn search_posts(
        &self,
        words: &str,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, sqlx::Error>;

    async fn get_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error>;
    // Neighbours by id, not by date: the nearest smaller / larger post id.
    async fn prev_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error>;
    async fn next_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error>;
    async fn newest_posts(&self, limit: i64) -> Result<Vec<Post>, sqlx::Error>;

    // --- Navigation Data ---
    // Distinct (year, month) pairs with at least one post, newest first.
    async fn archive_months(&self) -> Result<Vec<ArchiveMonth>, sqlx::Error>;
    async fn list_tags(&self) -> Result<Vec<Tag>, sqlx::Error>;
    async fn list_banners(&self) -> Result<Vec<Banner>, sqlx::Error>;
    async fn get_category(&self, id: i64) -> Result<Option<Category>, sqlx::Error>;
    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, sqlx::Error>;

    // --- Comments ---
    async fn comments_for_post(
        &self,
        post_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Comment>, sqlx::Error>;
    async fn add_comment(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<Comment, sqlx::Error>;
    async fn comments_by_user(
        &self,
        user_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<UserComment>, sqlx::Error>;

    // --- Users ---
    async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error>;
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, sqlx::Error>;
    // Applies a profile change set; None password/avatar keep the stored value.
    async fn update_profile(
        &self,
        id: i64,
        update: ProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Shared column lists keep the SELECTs in sync with the FromRow derives.
const POST_COLUMNS: &str = "id, title, body, category_id, created_at";
const USER_COLUMNS: &str = "id, username, password_hash, avatar, signature, description, email, \
     gender, address, is_super_user, is_active, is_staff, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    /// recent_posts_page
    ///
    /// Front page listing. Total row count and the requested window are read
    /// in two queries; a window past the end simply comes back empty while
    /// the count still describes the full set.
    async fn recent_posts_page(&self, page: i64, per_page: i64) -> Result<Page<Post>, sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(per_page)
        .bind(offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    async fn posts_by_category(
        &self,
        category_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, sqlx::Error> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE category_id = $1")
                .bind(category_id)
                .fetch_one(&self.pool)
                .await?;

        let items = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE category_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(category_id)
        .bind(per_page)
        .bind(offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    /// posts_by_month
    ///
    /// Month boundaries are taken in UTC regardless of the server's session
    /// time zone, matching how archive months are aggregated.
    async fn posts_by_month(
        &self,
        year: i32,
        month: i32,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM posts
            WHERE EXTRACT(YEAR FROM created_at AT TIME ZONE 'UTC')::INT = $1
              AND EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::INT = $2
            "#,
        )
        .bind(year)
        .bind(month)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS} FROM posts
            WHERE EXTRACT(YEAR FROM created_at AT TIME ZONE 'UTC')::INT = $1
              AND EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::INT = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(year)
        .bind(month)
        .bind(per_page)
        .bind(offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    async fn posts_by_tag(&self, tag_id: i64) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.title, p.body, p.category_id, p.created_at
            FROM posts p
            JOIN post_tags pt ON pt.post_id = p.id
            WHERE pt.tag_id = $1
            ORDER BY p.id ASC
            "#,
        )
        .bind(tag_id)
        .fetch_all(&self.pool)
        .await
    }

    /// search_posts
    ///
    /// Case-sensitive substring match over titles, in id order. The pattern
    /// is bound as a parameter and wrapped in wildcards inside SQL, so no
    /// part of it is interpolated into the query text.
    async fn search_posts(
        &self,
        words: &str,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts WHERE title LIKE '%' || $1 || '%'",
        )
        .bind(words)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE title LIKE '%' || $1 || '%' \
             ORDER BY id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(words)
        .bind(per_page)
        .bind(offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn prev_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id < $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn next_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id > $1 ORDER BY id ASC LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn newest_posts(&self, limit: i64) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// archive_months
    ///
    /// Aggregates the months that have at least one post, for the sidebar
    /// archive links. Years and months are extracted in UTC.
    async fn archive_months(&self) -> Result<Vec<ArchiveMonth>, sqlx::Error> {
        sqlx::query_as::<_, ArchiveMonth>(
            r#"
            SELECT DISTINCT
                EXTRACT(YEAR FROM created_at AT TIME ZONE 'UTC')::INT AS year,
                EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::INT AS month
            FROM posts
            ORDER BY year DESC, month DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, sqlx::Error> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
    }

    async fn list_banners(&self) -> Result<Vec<Banner>, sqlx::Error> {
        sqlx::query_as::<_, Banner>("SELECT id, img, url FROM banners ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, sqlx::Error> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// comments_for_post
    ///
    /// Comments joined with their author's username and avatar, newest first.
    async fn comments_for_post(
        &self,
        post_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Comment>, sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.content, c.post_id, c.user_id, c.created_at,
                   u.username AS username, u.avatar AS avatar
            FROM comments c
            JOIN users u ON c.user_id = u.id
            WHERE c.post_id = $1
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(post_id)
        .bind(per_page)
        .bind(offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    /// add_comment
    ///
    /// Inserts a new comment and immediately joins with `users` to return the
    /// enriched `Comment` model in one round trip, via a CTE.
    async fn add_comment(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (content, post_id, user_id)
                VALUES ($1, $2, $3)
                RETURNING id, content, post_id, user_id, created_at
            )
            SELECT i.id, i.content, i.post_id, i.user_id, i.created_at,
                   u.username AS username, u.avatar AS avatar
            FROM inserted i
            JOIN users u ON i.user_id = u.id
            "#,
        )
        .bind(content)
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    /// comments_by_user
    ///
    /// The "my comments" listing: one user's comments joined with the title
    /// of the post each was left on, newest first.
    async fn comments_by_user(
        &self,
        user_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<UserComment>, sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, UserComment>(
            r#"
            SELECT c.id, c.content, c.post_id, p.title AS post_title, c.created_at
            FROM comments c
            JOIN posts p ON c.post_id = p.id
            WHERE c.user_id = $1
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(per_page)
        .bind(offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// create_user
    ///
    /// Inserts a fresh account with default flags (active, not staff, not
    /// superuser). The unique constraint on `username` backs up the
    /// duplicate check done at the handler.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
    }

    /// update_profile
    ///
    /// Applies a profile change set. `COALESCE` keeps the stored password
    /// hash and avatar when the change set carries `None` for them; all
    /// other fields are overwritten as given. The username is never part of
    /// the change set.
    async fn update_profile(
        &self,
        id: i64,
        update: ProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET password_hash = COALESCE($2, password_hash),
                avatar = COALESCE($3, avatar),
                signature = $4,
                description = $5,
                email = $6,
                gender = $7,
                address = $8
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.password_hash)
        .bind(update.avatar)
        .bind(update.signature)
        .bind(update.description)
        .bind(update.email)
        .bind(update.gender)
        .bind(update.address)
        .fetch_optional(&self.pool)
        .await
    }
}
