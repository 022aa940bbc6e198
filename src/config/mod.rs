//! Configuration module for the SafeScript backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::errors::AppError;

/// Default chat-completions endpoint root.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model used for story generation.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Default number of recent team stories fed into the prompt.
pub const DEFAULT_CONTEXT_STORIES: i64 = 5;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the remote text model; `None` selects the heuristic generator
    pub openai_api_key: Option<String>,
    /// Base URL of the chat-completions API
    pub openai_base_url: String,
    /// Model name sent with each completion request
    pub openai_model: String,
    /// Writable directory holding the records database and team digests
    pub data_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Number of recent team stories fed into the generation prompt
    pub context_story_limit: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let openai_base_url = env::var("SAFESCRIPT_OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());

        let openai_model =
            env::var("SAFESCRIPT_OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());

        let data_dir = match env::var("SAFESCRIPT_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => default_data_dir(),
        };

        let bind_addr = env::var("SAFESCRIPT_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| {
                AppError::Internal(format!("Invalid SAFESCRIPT_BIND_ADDR format: {}", e))
            })?;

        let log_level = env::var("SAFESCRIPT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let context_story_limit =
            parse_story_limit(env::var("SAFESCRIPT_CONTEXT_STORIES").ok().as_deref());

        Ok(Self {
            openai_api_key,
            openai_base_url,
            openai_model,
            data_dir,
            bind_addr,
            log_level,
            context_story_limit,
        })
    }

    /// Path to the shared SQLite records file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("team-stories.sqlite")
    }

    /// Directory holding one context digest per team.
    pub fn teams_dir(&self) -> PathBuf {
        self.data_dir.join("teams")
    }
}

/// Prompt story count; anything but a positive integer gives the default.
fn parse_story_limit(value: Option<&str>) -> i64 {
    value
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_CONTEXT_STORIES)
}

/// Pick a writable data directory for the current execution environment.
///
/// Serverless hosts only allow writes under the temp dir; everywhere else the
/// data lives next to the working directory.
fn default_data_dir() -> PathBuf {
    let root = if env::var_os("VERCEL").is_some() {
        env::var_os("TMPDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp"))
    } else {
        env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf())
    };
    root.join(".data")
}
