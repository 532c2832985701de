use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::HeaderMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rand_core::OsRng;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{AccessToken, User};
use crate::repo::{RepoError, Repository};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Failed to parse password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn new_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Opaque secret handed to the device that initiates quick connect.
pub fn new_secret() -> String {
    new_token()
}

/// Short numeric code the user types into an authenticated session.
pub fn new_quick_connect_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

/// Client identity carried in the MediaBrowser/Emby authorization scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthScheme {
    pub client: String,
    pub version: String,
    pub device: String,
    pub device_id: String,
    pub token: Option<String>,
}

/// Parse the authorization scheme from either the `Authorization` or the
/// `X-Emby-Authorization` header.
///
/// Format: `MediaBrowser Client="...", Device="...", DeviceId="...",
/// Version="...", Token="..."` — the `Emby ` prefix and unquoted
/// `Key=Value` pairs are accepted too, since clients disagree on both.
pub fn parse_auth_scheme(headers: &HeaderMap) -> Option<AuthScheme> {
    let raw = headers
        .get("x-emby-authorization")
        .or_else(|| headers.get("authorization"))?
        .to_str()
        .ok()?;

    let params = raw
        .strip_prefix("MediaBrowser ")
        .or_else(|| raw.strip_prefix("Emby "))
        .unwrap_or(raw);

    let mut scheme = AuthScheme::default();
    for part in params.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "Client" => scheme.client = value.to_string(),
                "Version" => scheme.version = value.to_string(),
                "Device" => scheme.device = value.to_string(),
                "DeviceId" => scheme.device_id = value.to_string(),
                "Token" => {
                    if !value.is_empty() {
                        scheme.token = Some(value.to_string());
                    }
                }
                _ => {}
            }
        }
    }
    Some(scheme)
}

/// Bearer token resolution, in contract order: scheme header token,
/// `x-emby-token`, `x-mediabrowser-token`, then the `apiKey` / `api_key`
/// query parameters.
pub fn resolve_token(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    if let Some(token) = parse_auth_scheme(headers).and_then(|s| s.token) {
        return Some(token);
    }
    for header in ["x-emby-token", "x-mediabrowser-token"] {
        if let Some(value) = headers.get(header).and_then(|v| v.to_str().ok()) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    for key in ["apiKey", "api_key"] {
        if let Some(value) = query.get(key) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }
    }
    None
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid access token")]
    InvalidToken,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Authenticate a user by name and issue (or reuse) the access token for
/// this device. Usernames compare case-insensitively; with auto-register
/// enabled an unknown name creates the account on first login.
pub async fn authenticate_by_name(
    repo: &dyn Repository,
    username: &str,
    password: &str,
    scheme: &AuthScheme,
    remote_addr: &str,
    auto_register: bool,
) -> Result<(User, AccessToken), AuthError> {
    let now = chrono::Utc::now().to_rfc3339();

    let mut user = match repo.get_user(username).await {
        Ok(user) => user,
        Err(RepoError::NotFound) if auto_register => {
            let user = User {
                id: Uuid::new_v4().to_string(),
                name: username.to_lowercase(),
                password_hash: hash_password(password)?,
                is_admin: false,
                created_at: now.clone(),
                last_login: None,
                last_used: None,
            };
            repo.upsert_user(&user).await?;
            tracing::info!("Auto-registered user '{}'", user.name);
            user
        }
        Err(RepoError::NotFound) => return Err(AuthError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    if !verify_password(password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials);
    }

    user.last_login = Some(now.clone());
    user.last_used = Some(now.clone());
    repo.upsert_user(&user).await?;

    let token = issue_token(repo, &user, scheme, remote_addr).await?;
    Ok((user, token))
}

/// Issue (or reuse) the access token for a (user, device) pair. One
/// active token per device ID: reauthentication with the same device
/// reuses the existing token string.
pub async fn issue_token(
    repo: &dyn Repository,
    user: &User,
    scheme: &AuthScheme,
    remote_addr: &str,
) -> Result<AccessToken, AuthError> {
    let now = chrono::Utc::now().to_rfc3339();
    let device_id = if scheme.device_id.is_empty() {
        "unknown".to_string()
    } else {
        scheme.device_id.clone()
    };

    let token_value = match repo.get_access_token_by_device_id(&device_id).await {
        Ok(existing) if existing.user_id == user.id => existing.token,
        _ => new_token(),
    };

    let token = AccessToken {
        token: token_value,
        user_id: user.id.clone(),
        client: scheme.client.clone(),
        client_version: scheme.version.clone(),
        device_name: scheme.device.clone(),
        device_id,
        remote_addr: remote_addr.to_string(),
        created_at: now.clone(),
        last_used: now,
    };
    repo.upsert_access_token(&token).await?;
    Ok(token)
}

/// Resolve a bearer token into its (user, token) pair and refresh the
/// mutable fields that change between requests.
pub async fn resolve_access_token(
    repo: &dyn Repository,
    token: &str,
    scheme: Option<&AuthScheme>,
    remote_addr: &str,
) -> Result<(User, AccessToken), AuthError> {
    let mut access = match repo.get_access_token(token).await {
        Ok(t) => t,
        Err(RepoError::NotFound) => return Err(AuthError::InvalidToken),
        Err(e) => return Err(e.into()),
    };
    let user = match repo.get_user_by_id(&access.user_id).await {
        Ok(u) => u,
        Err(RepoError::NotFound) => return Err(AuthError::InvalidToken),
        Err(e) => return Err(e.into()),
    };

    let now = chrono::Utc::now().to_rfc3339();
    let mut dirty = access.remote_addr != remote_addr;
    access.remote_addr = remote_addr.to_string();
    if let Some(scheme) = scheme {
        if !scheme.client.is_empty() && scheme.client != access.client {
            access.client = scheme.client.clone();
            dirty = true;
        }
        if !scheme.version.is_empty() && scheme.version != access.client_version {
            access.client_version = scheme.version.clone();
            dirty = true;
        }
        if !scheme.device.is_empty() && scheme.device != access.device_name {
            access.device_name = scheme.device.clone();
            dirty = true;
        }
    }
    access.last_used = now;
    if dirty {
        repo.upsert_access_token(&access).await?;
    }

    Ok((user, access))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_quoted_mediabrowser_scheme() {
        let headers = headers_with(
            "authorization",
            r#"MediaBrowser Client="Test", Device="dev", DeviceId="d1", Version="1.0", Token="abc""#,
        );
        let scheme = parse_auth_scheme(&headers).unwrap();
        assert_eq!(scheme.client, "Test");
        assert_eq!(scheme.device, "dev");
        assert_eq!(scheme.device_id, "d1");
        assert_eq!(scheme.version, "1.0");
        assert_eq!(scheme.token.as_deref(), Some("abc"));
    }

    #[test]
    fn parses_unquoted_emby_scheme_on_either_header() {
        let headers = headers_with(
            "x-emby-authorization",
            "Emby Client=Swiftfin, DeviceId=d2, Device=iPhone, Version=2",
        );
        let scheme = parse_auth_scheme(&headers).unwrap();
        assert_eq!(scheme.client, "Swiftfin");
        assert_eq!(scheme.device_id, "d2");
        assert!(scheme.token.is_none());
    }

    #[test]
    fn token_resolution_order() {
        let mut query = HashMap::new();
        query.insert("api_key".to_string(), "from-query".to_string());

        let mut headers = headers_with(
            "authorization",
            r#"MediaBrowser Client="c", DeviceId="d", Token="from-scheme""#,
        );
        headers.insert("x-emby-token", HeaderValue::from_static("from-emby"));

        // Scheme token wins over everything.
        assert_eq!(
            resolve_token(&headers, &query).as_deref(),
            Some("from-scheme")
        );

        // Without it, x-emby-token wins over the query parameter.
        let headers = {
            let mut h = headers_with("x-emby-token", "from-emby");
            h.insert("x-mediabrowser-token", HeaderValue::from_static("from-mb"));
            h
        };
        assert_eq!(resolve_token(&headers, &query).as_deref(), Some("from-emby"));

        // Query parameters are the last resort.
        let headers = HeaderMap::new();
        assert_eq!(resolve_token(&headers, &query).as_deref(), Some("from-query"));
        assert_eq!(resolve_token(&headers, &HashMap::new()), None);
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("secret").unwrap();
        assert!(verify_password("secret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
