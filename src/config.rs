//! Configuration file support

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, WatchError};
use crate::stream::ReconnectPolicy;
use crate::supabase::SupabaseConfig;
use crate::view::{RevealUnit, TypingSpeed, ViewConfig};

static AGENT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").unwrap());

/// Stream socket endpoints and reconnect limits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    pub dev_url: String,
    pub prod_url: String,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_retries: u32,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            dev_url: "ws://localhost:8765".to_string(),
            prod_url: "wss://kulti-stream.fly.dev".to_string(),
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            max_retries: 5,
        }
    }
}

/// Session store used for the session row, history and realtime
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SupabaseSection {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub history_limit: usize,
}

impl Default for SupabaseSection {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            history_limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ViewSection {
    pub thought_cap: usize,
    pub code_chars_per_tick: usize,
    pub code_tick_ms: u64,
    pub thought_words_per_tick: usize,
    pub thought_tick_ms: u64,
    /// Redraw interval while animating
    pub frame_ms: u64,
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            thought_cap: 50,
            code_chars_per_tick: 15,
            code_tick_ms: 10,
            thought_words_per_tick: 2,
            thought_tick_ms: 50,
            frame_ms: 16,
        }
    }
}

/// Configuration for kulti-watch
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamSection,
    pub supabase: SupabaseSection,
    pub view: ViewSection,
    /// Shown when the agent has no session
    pub landing_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream: StreamSection::default(),
            supabase: SupabaseSection::default(),
            view: ViewSection::default(),
            landing_url: "https://kulti.club/watch".to_string(),
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kulti-watch")
    }

    /// Explicit path, then `KULTI_WATCH_CONFIG`, then the config directory
    pub fn config_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var("KULTI_WATCH_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, then apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Self {
        let mut config = Self::load_from(&Self::config_path(explicit));
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Missing file gives defaults; a broken one is logged and ignored
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to parse config file");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read config file");
                Self::default()
            }
        }
    }

    /// Supabase settings from the environment win over the file
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|&key| get(key))
                .find(|value| !value.trim().is_empty())
        };
        if let Some(url) = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            self.supabase.url = Some(url);
        }
        if let Some(key) = first(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]) {
            self.supabase.anon_key = Some(key);
        }
    }

    /// Base URL of the stream socket. An explicit URL wins over `--dev`.
    pub fn stream_url(&self, dev: bool, explicit: Option<&str>) -> String {
        match explicit {
            Some(url) => url.to_string(),
            None if dev => self.stream.dev_url.clone(),
            None => self.stream.prod_url.clone(),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.stream.initial_backoff_ms),
            max_delay: Duration::from_millis(self.stream.max_backoff_ms),
            max_retries: self.stream.max_retries,
        }
    }

    pub fn view_config(&self) -> ViewConfig {
        ViewConfig {
            thought_cap: self.view.thought_cap.max(1),
            code_speed: TypingSpeed {
                unit: RevealUnit::Chars,
                per_tick: self.view.code_chars_per_tick.max(1),
                tick: Duration::from_millis(self.view.code_tick_ms.max(1)),
            },
            thought_speed: TypingSpeed {
                unit: RevealUnit::Words,
                per_tick: self.view.thought_words_per_tick.max(1),
                tick: Duration::from_millis(self.view.thought_tick_ms.max(1)),
            },
            ..ViewConfig::default()
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.view.frame_ms.max(1))
    }

    /// Both a URL and a key are needed to reach the session store
    pub fn supabase(&self) -> Option<SupabaseConfig> {
        match (&self.supabase.url, &self.supabase.anon_key) {
            (Some(url), Some(anon_key)) if !url.is_empty() && !anon_key.is_empty() => {
                Some(SupabaseConfig {
                    url: url.clone(),
                    anon_key: anon_key.clone(),
                })
            }
            _ => None,
        }
    }

    /// Like [`Config::supabase`], but an error for callers that require it
    pub fn require_supabase(&self) -> Result<SupabaseConfig> {
        self.supabase().ok_or(WatchError::SupabaseNotConfigured)
    }
}

/// Reject ids that could not name a session
pub fn validate_agent_id(agent_id: &str) -> Result<&str> {
    if AGENT_ID_RE.is_match(agent_id) {
        Ok(agent_id)
    } else {
        Err(WatchError::InvalidAgentId(agent_id.to_string()))
    }
}
