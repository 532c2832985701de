use std::sync::Arc;

use crate::config::AppConfig;
use crate::library::Library;
use crate::repo::Repository;

pub mod api;
pub mod config;
pub mod db;
pub mod ids;
pub mod library;
pub mod models;
pub mod nfo;
pub mod repo;
pub mod scanner;
pub mod services;
pub mod userdata;

/// Shared application state. The library is immutable after the startup
/// scan; all mutable state lives behind the repository.
pub struct AppState {
    pub library: Library,
    pub repo: Arc<dyn Repository>,
    pub config: AppConfig,
    pub server_id: String,
}
