#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use inkpress::{
    AppConfig, AppState, MemorySessionStore, Repository, RepositoryState, SessionStoreState,
    auth, create_router,
    models::{
        ArchiveMonth, Banner, Category, Comment, Post, ProfileUpdate, Tag, User, UserComment,
    },
    pagination::Page,
    storage::{AvatarState, MockAvatarStore},
};
use reqwest::cookie::{CookieStore, Jar};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;

// --- In-Memory Repository ---

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    posts: Vec<Post>,
    tags: Vec<Tag>,
    post_tags: Vec<(i64, i64)>,
    comments: Vec<Comment>,
    banners: Vec<Banner>,
}

/// MemoryRepository
///
/// A full `Repository` implementation over plain vectors, mirroring the SQL
/// backend's filtering and ordering semantics so handler tests run without a
/// database. Tests seed rows with explicit ids and read state back directly.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

fn newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

impl MemoryRepository {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- Seed Helpers ---

    pub fn seed_user(
        &self,
        id: i64,
        username: &str,
        password: &str,
        (is_super_user, is_active, is_staff): (bool, bool, bool),
    ) -> User {
        let user = User {
            id,
            username: username.to_string(),
            password_hash: auth::hash_password(password).unwrap(),
            is_super_user,
            is_active,
            is_staff,
            created_at: Utc::now(),
            ..Default::default()
        };
        self.lock().users.push(user.clone());
        user
    }

    pub fn seed_category(&self, id: i64, name: &str) -> Category {
        let category = Category {
            id,
            name: name.to_string(),
        };
        self.lock().categories.push(category.clone());
        category
    }

    pub fn seed_post(
        &self,
        id: i64,
        title: &str,
        category_id: i64,
        created_at: DateTime<Utc>,
    ) -> Post {
        let post = Post {
            id,
            title: title.to_string(),
            body: format!("body of {title}"),
            category_id,
            created_at,
        };
        self.lock().posts.push(post.clone());
        post
    }

    pub fn seed_tag(&self, id: i64, name: &str) -> Tag {
        let tag = Tag {
            id,
            name: name.to_string(),
        };
        self.lock().tags.push(tag.clone());
        tag
    }

    pub fn tag_post(&self, post_id: i64, tag_id: i64) {
        self.lock().post_tags.push((post_id, tag_id));
    }

    pub fn seed_banner(&self, id: i64, img: &str, url: &str) -> Banner {
        let banner = Banner {
            id,
            img: img.to_string(),
            url: url.to_string(),
        };
        self.lock().banners.push(banner.clone());
        banner
    }

    pub fn seed_comment(
        &self,
        id: i64,
        post_id: i64,
        user_id: i64,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Comment {
        let comment = Comment {
            id,
            content: content.to_string(),
            post_id,
            user_id,
            created_at,
            username: None,
            avatar: None,
        };
        self.lock().comments.push(comment.clone());
        comment
    }

    // --- Direct Reads for Assertions ---

    pub fn user_by_id(&self, id: i64) -> Option<User> {
        self.lock().users.iter().find(|u| u.id == id).cloned()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn recent_posts_page(&self, page: i64, per_page: i64) -> Result<Page<Post>, sqlx::Error> {
        let mut posts = self.lock().posts.clone();
        newest_first(&mut posts);
        Ok(Page::paginate(posts, page, per_page))
    }

    async fn posts_by_category(
        &self,
        category_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, sqlx::Error> {
        let mut posts: Vec<Post> = self
            .lock()
            .posts
            .iter()
            .filter(|p| p.category_id == category_id)
            .cloned()
            .collect();
        newest_first(&mut posts);
        Ok(Page::paginate(posts, page, per_page))
    }

    async fn posts_by_month(
        &self,
        year: i32,
        month: i32,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, sqlx::Error> {
        let mut posts: Vec<Post> = self
            .lock()
            .posts
            .iter()
            .filter(|p| p.created_at.year() == year && p.created_at.month() as i32 == month)
            .cloned()
            .collect();
        newest_first(&mut posts);
        Ok(Page::paginate(posts, page, per_page))
    }

    async fn posts_by_tag(&self, tag_id: i64) -> Result<Vec<Post>, sqlx::Error> {
        let tables = self.lock();
        let post_ids: Vec<i64> = tables
            .post_tags
            .iter()
            .filter(|(_, t)| *t == tag_id)
            .map(|(p, _)| *p)
            .collect();
        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .filter(|p| post_ids.contains(&p.id))
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.id);
        Ok(posts)
    }

    async fn search_posts(
        &self,
        words: &str,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Post>, sqlx::Error> {
        let mut posts: Vec<Post> = self
            .lock()
            .posts
            .iter()
            .filter(|p| p.title.contains(words))
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.id);
        Ok(Page::paginate(posts, page, per_page))
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        Ok(self.lock().posts.iter().find(|p| p.id == id).cloned())
    }

    async fn prev_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        Ok(self
            .lock()
            .posts
            .iter()
            .filter(|p| p.id < id)
            .max_by_key(|p| p.id)
            .cloned())
    }

    async fn next_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        Ok(self
            .lock()
            .posts
            .iter()
            .filter(|p| p.id > id)
            .min_by_key(|p| p.id)
            .cloned())
    }

    async fn newest_posts(&self, limit: i64) -> Result<Vec<Post>, sqlx::Error> {
        let mut posts = self.lock().posts.clone();
        newest_first(&mut posts);
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn archive_months(&self) -> Result<Vec<ArchiveMonth>, sqlx::Error> {
        let months: BTreeSet<(i32, i32)> = self
            .lock()
            .posts
            .iter()
            .map(|p| (p.created_at.year(), p.created_at.month() as i32))
            .collect();
        Ok(months
            .into_iter()
            .rev()
            .map(|(year, month)| ArchiveMonth { year, month })
            .collect())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, sqlx::Error> {
        let mut tags = self.lock().tags.clone();
        tags.sort_by_key(|t| t.id);
        Ok(tags)
    }

    async fn list_banners(&self) -> Result<Vec<Banner>, sqlx::Error> {
        let mut banners = self.lock().banners.clone();
        banners.sort_by_key(|b| b.id);
        Ok(banners)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, sqlx::Error> {
        Ok(self.lock().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, sqlx::Error> {
        Ok(self.lock().tags.iter().find(|t| t.id == id).cloned())
    }

    async fn comments_for_post(
        &self,
        post_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Comment>, sqlx::Error> {
        let tables = self.lock();
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| enrich_comment(c, &tables.users))
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::paginate(comments, page, per_page))
    }

    async fn add_comment(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<Comment, sqlx::Error> {
        let mut tables = self.lock();
        let id = tables.comments.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let comment = Comment {
            id,
            content: content.to_string(),
            post_id,
            user_id,
            created_at: Utc::now(),
            username: None,
            avatar: None,
        };
        tables.comments.push(comment.clone());
        Ok(enrich_comment(&comment, &tables.users))
    }

    async fn comments_by_user(
        &self,
        user_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<UserComment>, sqlx::Error> {
        let tables = self.lock();
        let mut comments: Vec<UserComment> = tables
            .comments
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| UserComment {
                id: c.id,
                content: c.content.clone(),
                post_id: c.post_id,
                post_title: tables
                    .posts
                    .iter()
                    .find(|p| p.id == c.post_id)
                    .map(|p| p.title.clone())
                    .unwrap_or_default(),
                created_at: c.created_at,
            })
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::paginate(comments, page, per_page))
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        Ok(self.user_by_id(id))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, sqlx::Error> {
        let mut tables = self.lock();
        let id = tables.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let user = User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            is_active: true,
            created_at: Utc::now(),
            ..Default::default()
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: i64,
        update: ProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut tables = self.lock();
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(hash) = update.password_hash {
            user.password_hash = hash;
        }
        if let Some(avatar) = update.avatar {
            user.avatar = Some(avatar);
        }
        user.signature = update.signature;
        user.description = update.description;
        user.email = update.email;
        user.gender = update.gender;
        user.address = update.address;
        Ok(Some(user.clone()))
    }
}

fn enrich_comment(comment: &Comment, users: &[User]) -> Comment {
    let author = users.iter().find(|u| u.id == comment.user_id);
    Comment {
        username: author.map(|u| u.username.clone()),
        avatar: author.and_then(|u| u.avatar.clone()),
        ..comment.clone()
    }
}

// --- Test Application ---

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryRepository>,
    pub sessions: Arc<MemorySessionStore>,
    pub avatars: MockAvatarStore,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_avatars(MockAvatarStore::new()).await
}

pub async fn spawn_app_with_avatars(avatars: MockAvatarStore) -> TestApp {
    let repo = Arc::new(MemoryRepository::default());
    let sessions = Arc::new(MemorySessionStore::new());

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        sessions: sessions.clone() as SessionStoreState,
        avatars: Arc::new(avatars.clone()) as AvatarState,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        sessions,
        avatars,
    }
}

// --- HTTP Helpers ---

/// A client that keeps cookies but never follows redirects, so tests can
/// assert on 303 responses and their Location headers directly.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client build")
}

/// Like [`client`], but exposes the cookie jar so tests can read the raw
/// session token out of it.
pub fn client_with_jar() -> (reqwest::Client, Arc<Jar>) {
    let jar = Arc::new(Jar::default());
    let client = reqwest::Client::builder()
        .cookie_provider(jar.clone())
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client build");
    (client, jar)
}

/// Reads the session token the jar currently holds for the test app.
pub fn session_token(jar: &Jar, address: &str) -> Option<String> {
    let url = address.parse::<reqwest::Url>().ok()?;
    let header = jar.cookies(&url)?;
    let value = header.to_str().ok()?;
    value.split(';').map(str::trim).find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some("sessionid"), Some(token)) => Some(token.to_string()),
            _ => None,
        }
    })
}

/// Shorthand for a fixed UTC timestamp, so seeded posts get deterministic
/// ordering and archive months.
pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub async fn register_user(
    client: &reqwest::Client,
    address: &str,
    username: &str,
    password: &str,
) -> reqwest::Response {
    client
        .post(format!("{address}/auth/register"))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("register request")
}

pub async fn login_user(
    client: &reqwest::Client,
    address: &str,
    username: &str,
    password: &str,
) -> reqwest::Response {
    client
        .post(format!("{address}/auth/login"))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("login request")
}
