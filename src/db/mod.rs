use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{AccessToken, Playlist, QuickConnectCode, StoredImage, User, UserData};
use crate::repo::{
    ImageStore, PlaylistStore, QuickConnectStore, RepoError, RepoResult, TokenStore, UserDataStore,
    UserStore,
};

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // One statement per execute; SQLite prepared statements take a
    // single statement at a time.
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_login TEXT,
            last_used TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS access_tokens (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            client TEXT NOT NULL,
            client_version TEXT NOT NULL,
            device_name TEXT NOT NULL,
            device_id TEXT NOT NULL,
            remote_addr TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_used TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, device_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS user_data (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            item_id TEXT NOT NULL,
            position REAL NOT NULL DEFAULT 0,
            played_percentage REAL NOT NULL DEFAULT 0,
            played INTEGER NOT NULL DEFAULT 0,
            favorite INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, item_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS playlists (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS playlist_items (
            playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
            item_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (playlist_id, item_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS images (
            owner_id TEXT NOT NULL,
            image_type TEXT NOT NULL,
            data BLOB NOT NULL,
            etag TEXT NOT NULL,
            PRIMARY KEY (owner_id, image_type)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS quick_connect (
            code TEXT PRIMARY KEY,
            secret TEXT NOT NULL UNIQUE,
            device_id TEXT NOT NULL,
            authenticated INTEGER NOT NULL DEFAULT 0,
            user_id TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_user_data_updated
            ON user_data(user_id, updated_at DESC)
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_playlist_items_pos
            ON playlist_items(playlist_id, position)
        "#,
    ];
    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}

/// SQLite-backed implementation of every repository contract. Single
/// writer per key; every mutation is an atomic upsert, which is all the
/// core's last-write-wins model needs.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn required<T>(row: Option<T>) -> RepoResult<T> {
    row.ok_or(RepoError::NotFound)
}

#[async_trait]
impl UserStore for SqliteRepository {
    async fn get_user(&self, username: &str) -> RepoResult<User> {
        let row = sqlx::query_as("SELECT * FROM users WHERE name = ?")
            .bind(username.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        required(row)
    }

    async fn get_user_by_id(&self, id: &str) -> RepoResult<User> {
        let row = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        required(row)
    }

    async fn get_users(&self) -> RepoResult<Vec<User>> {
        Ok(sqlx::query_as("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn upsert_user(&self, user: &User) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, password_hash, is_admin, created_at, last_login, last_used)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                password_hash = excluded.password_hash,
                is_admin = excluded.is_admin,
                last_login = excluded.last_login,
                last_used = excluded.last_used
            "#,
        )
        .bind(&user.id)
        .bind(user.name.to_lowercase())
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(&user.created_at)
        .bind(&user.last_login)
        .bind(&user.last_used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqliteRepository {
    async fn get_access_token(&self, token: &str) -> RepoResult<AccessToken> {
        let row = sqlx::query_as("SELECT * FROM access_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        required(row)
    }

    async fn get_access_token_by_device_id(&self, device_id: &str) -> RepoResult<AccessToken> {
        let row = sqlx::query_as("SELECT * FROM access_tokens WHERE device_id = ?")
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        required(row)
    }

    async fn get_access_tokens(&self, user_id: &str) -> RepoResult<Vec<AccessToken>> {
        Ok(
            sqlx::query_as("SELECT * FROM access_tokens WHERE user_id = ? ORDER BY last_used DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn upsert_access_token(&self, token: &AccessToken) -> RepoResult<()> {
        // (user, device) uniqueness: reauth with the same device replaces
        // the row instead of accumulating tokens.
        sqlx::query(
            r#"
            INSERT INTO access_tokens
                (token, user_id, client, client_version, device_name, device_id,
                 remote_addr, created_at, last_used)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, device_id) DO UPDATE SET
                token = excluded.token,
                client = excluded.client,
                client_version = excluded.client_version,
                device_name = excluded.device_name,
                remote_addr = excluded.remote_addr,
                last_used = excluded.last_used
            "#,
        )
        .bind(&token.token)
        .bind(&token.user_id)
        .bind(&token.client)
        .bind(&token.client_version)
        .bind(&token.device_name)
        .bind(&token.device_id)
        .bind(&token.remote_addr)
        .bind(&token.created_at)
        .bind(&token.last_used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_access_token(&self, token: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM access_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDataStore for SqliteRepository {
    async fn get_user_data(&self, user_id: &str, item_id: &str) -> RepoResult<UserData> {
        let row = sqlx::query_as("SELECT * FROM user_data WHERE user_id = ? AND item_id = ?")
            .bind(user_id)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        required(row)
    }

    async fn update_user_data(&self, data: &UserData) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_data
                (user_id, item_id, position, played_percentage, played, favorite, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, item_id) DO UPDATE SET
                position = excluded.position,
                played_percentage = excluded.played_percentage,
                played = excluded.played,
                favorite = excluded.favorite,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&data.user_id)
        .bind(&data.item_id)
        .bind(data.position)
        .bind(data.played_percentage)
        .bind(data.played)
        .bind(data.favorite)
        .bind(&data.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_favorites(&self, user_id: &str) -> RepoResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT item_id FROM user_data WHERE user_id = ? AND favorite = 1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn get_recently_watched(
        &self,
        user_id: &str,
        limit: Option<u32>,
        played_only: bool,
    ) -> RepoResult<Vec<String>> {
        let mut sql = String::from("SELECT item_id FROM user_data WHERE user_id = ? AND ");
        if played_only {
            sql.push_str("played = 1");
        } else {
            sql.push_str("position > 0 AND played = 0");
        }
        sql.push_str(" ORDER BY updated_at DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait]
impl PlaylistStore for SqliteRepository {
    async fn get_playlists(&self, user_id: &str) -> RepoResult<Vec<Playlist>> {
        let mut playlists: Vec<Playlist> =
            sqlx::query_as("SELECT * FROM playlists WHERE user_id = ? ORDER BY name")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        for pl in &mut playlists {
            pl.item_ids = self.playlist_item_ids(&pl.id).await?;
        }
        Ok(playlists)
    }

    async fn get_playlist(&self, user_id: &str, id: &str) -> RepoResult<Playlist> {
        let row: Option<Playlist> =
            sqlx::query_as("SELECT * FROM playlists WHERE user_id = ? AND id = ?")
                .bind(user_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let mut playlist = required(row)?;
        playlist.item_ids = self.playlist_item_ids(&playlist.id).await?;
        Ok(playlist)
    }

    async fn create_playlist(&self, playlist: &Playlist) -> RepoResult<()> {
        sqlx::query("INSERT INTO playlists (id, user_id, name) VALUES (?, ?, ?)")
            .bind(&playlist.id)
            .bind(&playlist.user_id)
            .bind(&playlist.name)
            .execute(&self.pool)
            .await?;
        for (pos, item_id) in playlist.item_ids.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO playlist_items (playlist_id, item_id, position) VALUES (?, ?, ?)",
            )
            .bind(&playlist.id)
            .bind(item_id)
            .bind(pos as i64)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn rename_playlist(&self, user_id: &str, id: &str, name: &str) -> RepoResult<()> {
        let result = sqlx::query("UPDATE playlists SET name = ? WHERE user_id = ? AND id = ?")
            .bind(name)
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn add_items_to_playlist(
        &self,
        user_id: &str,
        id: &str,
        item_ids: &[String],
    ) -> RepoResult<()> {
        let playlist = self.get_playlist(user_id, id).await?;
        let mut pos = playlist.item_ids.len() as i64;
        for item_id in item_ids {
            if playlist.item_ids.contains(item_id) {
                continue;
            }
            sqlx::query(
                "INSERT OR IGNORE INTO playlist_items (playlist_id, item_id, position) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(item_id)
            .bind(pos)
            .execute(&self.pool)
            .await?;
            pos += 1;
        }
        Ok(())
    }

    async fn delete_playlist_items(
        &self,
        user_id: &str,
        id: &str,
        item_ids: &[String],
    ) -> RepoResult<()> {
        // Ownership check before touching rows.
        let _ = self.get_playlist(user_id, id).await?;
        for item_id in item_ids {
            sqlx::query("DELETE FROM playlist_items WHERE playlist_id = ? AND item_id = ?")
                .bind(id)
                .bind(item_id)
                .execute(&self.pool)
                .await?;
        }
        self.renumber_playlist(id).await
    }

    async fn move_playlist_item(
        &self,
        user_id: &str,
        id: &str,
        item_id: &str,
        index: u32,
    ) -> RepoResult<()> {
        let playlist = self.get_playlist(user_id, id).await?;
        let mut ids = playlist.item_ids;
        let from = ids
            .iter()
            .position(|i| i == item_id)
            .ok_or(RepoError::NotFound)?;
        let moved = ids.remove(from);
        let to = (index as usize).min(ids.len());
        ids.insert(to, moved);

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM playlist_items WHERE playlist_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for (pos, item) in ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO playlist_items (playlist_id, item_id, position) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(item)
            .bind(pos as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_playlist(&self, user_id: &str, id: &str) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM playlists WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        sqlx::query("DELETE FROM playlist_items WHERE playlist_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl SqliteRepository {
    async fn playlist_item_ids(&self, playlist_id: &str) -> RepoResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT item_id FROM playlist_items WHERE playlist_id = ? ORDER BY position",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn renumber_playlist(&self, playlist_id: &str) -> RepoResult<()> {
        let ids = self.playlist_item_ids(playlist_id).await?;
        let mut tx = self.pool.begin().await?;
        for (pos, item) in ids.iter().enumerate() {
            sqlx::query(
                "UPDATE playlist_items SET position = ? WHERE playlist_id = ? AND item_id = ?",
            )
            .bind(pos as i64)
            .bind(playlist_id)
            .bind(item)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ImageStore for SqliteRepository {
    async fn store_image(&self, image: &StoredImage) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO images (owner_id, image_type, data, etag)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (owner_id, image_type) DO UPDATE SET
                data = excluded.data,
                etag = excluded.etag
            "#,
        )
        .bind(&image.owner_id)
        .bind(&image.image_type)
        .bind(&image.data)
        .bind(&image.etag)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_image(&self, owner_id: &str, image_type: &str) -> RepoResult<StoredImage> {
        let row = sqlx::query_as("SELECT * FROM images WHERE owner_id = ? AND image_type = ?")
            .bind(owner_id)
            .bind(image_type)
            .fetch_optional(&self.pool)
            .await?;
        required(row)
    }

    async fn has_image(&self, owner_id: &str, image_type: &str) -> RepoResult<bool> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM images WHERE owner_id = ? AND image_type = ?")
                .bind(owner_id)
                .bind(image_type)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn delete_image(&self, owner_id: &str, image_type: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM images WHERE owner_id = ? AND image_type = ?")
            .bind(owner_id)
            .bind(image_type)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl QuickConnectStore for SqliteRepository {
    async fn get_quick_connect_code_by_code(&self, code: &str) -> RepoResult<QuickConnectCode> {
        let row = sqlx::query_as("SELECT * FROM quick_connect WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        required(row)
    }

    async fn get_quick_connect_code_by_secret(
        &self,
        secret: &str,
    ) -> RepoResult<QuickConnectCode> {
        let row = sqlx::query_as("SELECT * FROM quick_connect WHERE secret = ?")
            .bind(secret)
            .fetch_optional(&self.pool)
            .await?;
        required(row)
    }

    async fn upsert_quick_connect_code(&self, code: &QuickConnectCode) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quick_connect (code, secret, device_id, authenticated, user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (code) DO UPDATE SET
                authenticated = excluded.authenticated,
                user_id = excluded.user_id
            "#,
        )
        .bind(&code.code)
        .bind(&code.secret)
        .bind(&code.device_id)
        .bind(code.authenticated)
        .bind(&code.user_id)
        .bind(&code.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth;
    use sqlx::sqlite::SqlitePoolOptions;

    /// One connection only: every connection to `sqlite::memory:` gets
    /// its own database.
    async fn test_repo() -> SqliteRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        SqliteRepository::new(pool)
    }

    async fn seed_user(repo: &SqliteRepository, id: &str, name: &str) {
        let user = User {
            id: id.to_string(),
            name: name.to_string(),
            password_hash: "x".to_string(),
            is_admin: false,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_login: None,
            last_used: None,
        };
        repo.upsert_user(&user).await.unwrap();
    }

    #[tokio::test]
    async fn quick_connect_codes_round_trip() {
        let repo = test_repo().await;
        let mut code = QuickConnectCode {
            code: auth::new_quick_connect_code(),
            secret: auth::new_secret(),
            device_id: "dev-1".to_string(),
            authenticated: false,
            user_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        repo.upsert_quick_connect_code(&code).await.unwrap();

        let by_code = repo
            .get_quick_connect_code_by_code(&code.code)
            .await
            .unwrap();
        assert_eq!(by_code.secret, code.secret);
        assert!(!by_code.authenticated);

        code.authenticated = true;
        code.user_id = Some("user-1".to_string());
        repo.upsert_quick_connect_code(&code).await.unwrap();

        let by_secret = repo
            .get_quick_connect_code_by_secret(&code.secret)
            .await
            .unwrap();
        assert!(by_secret.authenticated);
        assert_eq!(by_secret.user_id.as_deref(), Some("user-1"));

        assert!(matches!(
            repo.get_quick_connect_code_by_code("no-such-code").await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn deleting_a_playlist_drops_its_items() {
        let repo = test_repo().await;
        seed_user(&repo, "user-1", "alice").await;
        let playlist = Playlist {
            id: "p1".to_string(),
            user_id: "user-1".to_string(),
            name: "Queue".to_string(),
            item_ids: vec!["m1".to_string(), "m2".to_string()],
        };
        repo.create_playlist(&playlist).await.unwrap();

        // The wrong owner cannot delete it.
        assert!(matches!(
            repo.delete_playlist("user-2", "p1").await,
            Err(RepoError::NotFound)
        ));

        repo.delete_playlist("user-1", "p1").await.unwrap();
        assert!(matches!(
            repo.get_playlist("user-1", "p1").await,
            Err(RepoError::NotFound)
        ));
    }
}
