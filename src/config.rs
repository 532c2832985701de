// XDG-compliant paths and TOML configuration. Environment variables
// override the file; the file overrides defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "finbridge";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub auth: AuthConfig,
    pub images: ImageConfig,
    /// Media libraries to scan on startup.
    pub libraries: Vec<LibraryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port (default: 8096, the port clients probe first).
    pub port: u16,
    pub bind_address: String,
    /// Display name reported to clients.
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8096,
            bind_address: "0.0.0.0".to_string(),
            name: "Finbridge".to_string(),
        }
    }
}

impl ServerConfig {
    /// Address clients can reach us on, as reported in system info.
    pub fn local_address(&self) -> String {
        let host = if self.bind_address == "0.0.0.0" {
            "localhost"
        } else {
            &self.bind_address
        };
        format!("http://{host}:{}", self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Override data directory (database location).
    pub data_dir: Option<PathBuf>,
    /// Override config directory.
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Create accounts on first login instead of rejecting unknown names.
    pub auto_register: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auto_register: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// JPEG quality for re-encoded posters (1-100).
    pub quality: u8,
    /// Posters wider than this are scaled down before serving.
    pub max_width: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            max_width: 800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    /// Library display name.
    pub name: String,
    /// Path to the media folder.
    pub path: PathBuf,
    /// "movies" or "tvshows".
    #[serde(rename = "type")]
    pub kind: String,
}

/// Resolved application directories.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    pub fn new(overrides: &PathsConfig) -> Self {
        Self {
            config_dir: Self::resolve_config_dir(&overrides.config_dir),
            data_dir: Self::resolve_data_dir(&overrides.data_dir),
        }
    }

    /// Everything in the current directory; used for development and
    /// portable installs.
    pub fn current_dir() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            config_dir: cwd.clone(),
            data_dir: cwd,
        }
    }

    fn resolve_config_dir(file_override: &Option<PathBuf>) -> PathBuf {
        if let Ok(path) = std::env::var("FINBRIDGE_CONFIG_DIR") {
            return PathBuf::from(path);
        }
        if let Some(path) = file_override {
            return path.clone();
        }
        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    fn resolve_data_dir(file_override: &Option<PathBuf>) -> PathBuf {
        if let Ok(path) = std::env::var("FINBRIDGE_DATA_DIR") {
            return PathBuf::from(path);
        }
        if let Some(path) = file_override {
            return path.clone();
        }
        if let Some(dir) = dirs::data_dir() {
            return dir.join(APP_NAME);
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("finbridge.db")
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.database_path().display())
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config_dir).await?;
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration: environment > config.toml > defaults.
    pub fn load() -> Self {
        let config_dir = Self::find_config_dir();
        let mut config = Self::load_config_file(&config_dir);
        config.apply_env_overrides();
        config
    }

    fn find_config_dir() -> PathBuf {
        if let Ok(path) = std::env::var("FINBRIDGE_CONFIG_DIR") {
            return PathBuf::from(path);
        }
        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    fn load_config_file(config_dir: &Path) -> Self {
        let config_path = config_dir.join(CONFIG_FILENAME);
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Self::default();
        }
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("FINBRIDGE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(addr) = std::env::var("FINBRIDGE_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Ok(name) = std::env::var("FINBRIDGE_SERVER_NAME") {
            self.server.name = name;
        }
        if let Ok(v) = std::env::var("FINBRIDGE_AUTO_REGISTER") {
            self.auth.auto_register = v.eq_ignore_ascii_case("true") || v == "1";
        }
    }

    pub fn app_paths(&self) -> AppPaths {
        AppPaths::new(&self.paths)
    }

    /// Database URL, with a DATABASE_URL escape hatch for tests and
    /// development.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.app_paths().database_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8096);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert!(!config.auth.auto_register);
        assert_eq!(config.images.quality, 80);
        assert!(config.libraries.is_empty());
    }

    #[test]
    fn local_address_substitutes_wildcard_bind() {
        let server = ServerConfig::default();
        assert_eq!(server.local_address(), "http://localhost:8096");

        let server = ServerConfig {
            bind_address: "192.168.1.5".to_string(),
            port: 9000,
            ..Default::default()
        };
        assert_eq!(server.local_address(), "http://192.168.1.5:9000");
    }

    #[test]
    fn parse_config_toml() {
        let toml_str = r#"
[server]
port = 9000
bind_address = "127.0.0.1"
name = "Living Room"

[auth]
auto_register = true

[images]
max_width = 600

[[libraries]]
name = "Movies"
path = "/media/movies"
type = "movies"

[[libraries]]
name = "Shows"
path = "/media/shows"
type = "tvshows"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.name, "Living Room");
        assert!(config.auth.auto_register);
        assert_eq!(config.images.max_width, 600);
        assert_eq!(config.images.quality, 80);
        assert_eq!(config.libraries.len(), 2);
        assert_eq!(config.libraries[1].kind, "tvshows");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: AppConfig = toml::from_str("[auth]\nauto_register = true\n").unwrap();
        assert_eq!(config.server.port, 8096);
        assert!(config.auth.auto_register);
    }

    #[test]
    fn database_url_format() {
        let paths = AppPaths::current_dir();
        let url = paths.database_url();
        assert!(url.starts_with("sqlite:"));
        assert!(url.ends_with("?mode=rwc"));
    }
}
