// Repository contracts. The API layer consumes these traits and never
// talks to a concrete store; src/db provides the SQLite implementation.

use async_trait::async_trait;

use crate::models::{AccessToken, Playlist, QuickConnectCode, StoredImage, User, UserData};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("storage error: {0}")]
    Io(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive username lookup.
    async fn get_user(&self, username: &str) -> RepoResult<User>;
    async fn get_user_by_id(&self, id: &str) -> RepoResult<User>;
    async fn get_users(&self) -> RepoResult<Vec<User>>;
    async fn upsert_user(&self, user: &User) -> RepoResult<()>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_access_token(&self, token: &str) -> RepoResult<AccessToken>;
    async fn get_access_token_by_device_id(&self, device_id: &str) -> RepoResult<AccessToken>;
    async fn get_access_tokens(&self, user_id: &str) -> RepoResult<Vec<AccessToken>>;
    async fn upsert_access_token(&self, token: &AccessToken) -> RepoResult<()>;
    async fn delete_access_token(&self, token: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait UserDataStore: Send + Sync {
    /// `NotFound` for an absent record; callers read that as all zeroes.
    async fn get_user_data(&self, user_id: &str, item_id: &str) -> RepoResult<UserData>;
    async fn update_user_data(&self, data: &UserData) -> RepoResult<()>;
    async fn get_favorites(&self, user_id: &str) -> RepoResult<Vec<String>>;
    /// Item IDs ordered by most recent update. `played_only` keeps only
    /// finished items (next-up); otherwise anything with a position
    /// counts (resume).
    async fn get_recently_watched(
        &self,
        user_id: &str,
        limit: Option<u32>,
        played_only: bool,
    ) -> RepoResult<Vec<String>>;
}

#[async_trait]
pub trait PlaylistStore: Send + Sync {
    async fn get_playlists(&self, user_id: &str) -> RepoResult<Vec<Playlist>>;
    async fn get_playlist(&self, user_id: &str, id: &str) -> RepoResult<Playlist>;
    async fn create_playlist(&self, playlist: &Playlist) -> RepoResult<()>;
    async fn rename_playlist(&self, user_id: &str, id: &str, name: &str) -> RepoResult<()>;
    async fn add_items_to_playlist(
        &self,
        user_id: &str,
        id: &str,
        item_ids: &[String],
    ) -> RepoResult<()>;
    async fn delete_playlist_items(
        &self,
        user_id: &str,
        id: &str,
        item_ids: &[String],
    ) -> RepoResult<()>;
    async fn move_playlist_item(
        &self,
        user_id: &str,
        id: &str,
        item_id: &str,
        index: u32,
    ) -> RepoResult<()>;
    async fn delete_playlist(&self, user_id: &str, id: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store_image(&self, image: &StoredImage) -> RepoResult<()>;
    async fn get_image(&self, owner_id: &str, image_type: &str) -> RepoResult<StoredImage>;
    async fn has_image(&self, owner_id: &str, image_type: &str) -> RepoResult<bool>;
    async fn delete_image(&self, owner_id: &str, image_type: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait QuickConnectStore: Send + Sync {
    async fn get_quick_connect_code_by_code(&self, code: &str) -> RepoResult<QuickConnectCode>;
    async fn get_quick_connect_code_by_secret(&self, secret: &str)
        -> RepoResult<QuickConnectCode>;
    async fn upsert_quick_connect_code(&self, code: &QuickConnectCode) -> RepoResult<()>;
}

pub trait Repository:
    UserStore + TokenStore + UserDataStore + PlaylistStore + ImageStore + QuickConnectStore
{
}

impl<T> Repository for T where
    T: UserStore + TokenStore + UserDataStore + PlaylistStore + ImageStore + QuickConnectStore
{
}
