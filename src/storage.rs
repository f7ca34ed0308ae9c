use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs;

// Avatar references are stored relative to the static root, under this
// subdirectory.
const AVATAR_SUBDIR: &str = "avatar";

// 1. AvatarStore Contract
/// AvatarStore
///
/// Defines the abstract contract for filing user avatars. The trait allows us
/// to swap the concrete implementation, from the real filesystem store
/// (LocalAvatarStore) in production to the in-memory Mock (MockAvatarStore)
/// during testing, without affecting the calling handlers.
#[async_trait]
pub trait AvatarStore: Send + Sync {
    /// Ensures the avatar directory exists below the configured static root.
    /// Safe to call at startup; creation is idempotent.
    async fn ensure_root_exists(&self);

    /// Files a newly referenced avatar and returns the relative path to store
    /// on the user record (e.g. `avatar/selfie.png`). The byte upload itself
    /// happens out of band; `filename` is the client-supplied reference.
    async fn place(&self, filename: &str) -> Result<String, String>;
}

/// The concrete type used to share the avatar store across the application state.
pub type AvatarState = Arc<dyn AvatarStore>;

/// sanitize_filename
///
/// Reduces a user-provided reference to its bare final filename, dropping
/// directory navigation components (`..`, `.`, empty segments) so a crafted
/// reference cannot escape the avatar directory.
fn sanitize_filename(name: &str) -> Option<String> {
    name.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .next_back()
        .map(str::to_string)
}

// 2. The Real Implementation (Local Filesystem)
/// LocalAvatarStore
///
/// Files avatars below `<root>/avatar` on the local filesystem, where `root`
/// is the configured static upload directory served back to clients.
#[derive(Clone)]
pub struct LocalAvatarStore {
    root: PathBuf,
}

impl LocalAvatarStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AvatarStore for LocalAvatarStore {
    async fn ensure_root_exists(&self) {
        let _ = fs::create_dir_all(self.root.join(AVATAR_SUBDIR)).await;
    }

    async fn place(&self, filename: &str) -> Result<String, String> {
        let name = sanitize_filename(filename)
            .ok_or_else(|| format!("unusable avatar filename: {filename}"))?;

        fs::create_dir_all(self.root.join(AVATAR_SUBDIR))
            .await
            .map_err(|e| e.to_string())?;

        Ok(format!("{AVATAR_SUBDIR}/{name}"))
    }
}

// 3. The Mock Implementation (For Unit Tests)
/// MockAvatarStore
///
/// A mock implementation of `AvatarStore` used exclusively for testing. It
/// records every placement so tests can assert whether, and with what name,
/// the store was touched.
#[derive(Clone, Default)]
pub struct MockAvatarStore {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    placements: Arc<Mutex<Vec<String>>>,
}

impl MockAvatarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Filenames placed so far, in call order.
    pub fn placements(&self) -> Vec<String> {
        self.placements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl AvatarStore for MockAvatarStore {
    async fn ensure_root_exists(&self) {
        // No-op in mock environment.
    }

    async fn place(&self, filename: &str) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock avatar store error: simulation requested".to_string());
        }

        let name = sanitize_filename(filename)
            .ok_or_else(|| format!("unusable avatar filename: {filename}"))?;

        self.placements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.clone());

        Ok(format!("{AVATAR_SUBDIR}/{name}"))
    }
}
