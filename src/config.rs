//! YAML configuration for the feedmix service.
//!
//! One file configures the search backend, both built-in generators and the
//! blender. Every section is optional and falls back to the defaults below.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! log_level: "info"
//!
//! backend:
//!   url: "http://localhost:9200"
//!   api_key: "base64-encoded-key"
//!   timeout_secs: 30
//!   posts_index: "posts"
//!   likes_index: "likes"
//!
//! popularity:
//!   window_hours: 24
//!   decay_scale_hours: 6
//!   decay_offset_hours: 1
//!   decay: 0.5
//!   like_factor: 1.5
//!
//! similarity:
//!   like_lookback: 50
//!   min_knn_candidates: 100
//!   knn_oversample: 10
//!
//! blend:
//!   max_num_candidates: 1000
//!   infill_multiplier: 2
//!   execution: "sequential"
//! ```
//!
//! `FEEDMIX_ES_URL` and `FEEDMIX_ES_API_KEY` override the backend URL and key.

use std::fs;
use std::path::Path;
use std::time::Duration;

use blend::BlendConfig;
use candidates::{PopularityConfig, PopularityModel, SimilarityConfig, TextSearchConfig};
use search::ElasticsearchConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_ES_URL: &str = "FEEDMIX_ES_URL";
pub const ENV_ES_API_KEY: &str = "FEEDMIX_ES_API_KEY";

const HOUR_SECS: u64 = 3600;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedmixConfig {
    /// Configuration format version.
    pub version: String,

    /// Optional configuration name/description.
    #[serde(default)]
    pub name: Option<String>,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub backend: BackendYamlConfig,

    #[serde(default)]
    pub popularity: PopularityYamlConfig,

    #[serde(default)]
    pub similarity: SimilarityYamlConfig,

    #[serde(default)]
    pub blend: BlendConfig,
}

impl FeedmixConfig {
    /// Load a YAML configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: FeedmixConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// File (or defaults when `path` is `None`) plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply backend overrides from `lookup` (normally the process
    /// environment). Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_ES_URL).filter(|v| !v.trim().is_empty()) {
            self.backend.url = url;
        }
        if let Some(key) = lookup(ENV_ES_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.backend.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        if self.log_level.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "log_level must not be empty".to_string(),
            ));
        }

        self.backend.validate()?;
        self.popularity_config()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;
        self.similarity_config()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;
        self.blend
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;
        Ok(())
    }

    pub fn popularity_config(&self) -> PopularityConfig {
        self.popularity.to_config(&self.backend)
    }

    pub fn similarity_config(&self) -> SimilarityConfig {
        self.similarity.to_config(&self.backend)
    }

    /// Text search runs against the configured posts index.
    pub fn text_search_config(&self) -> TextSearchConfig {
        TextSearchConfig {
            posts_index: self.backend.posts_index.clone(),
            ..TextSearchConfig::default()
        }
    }
}

impl Default for FeedmixConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            log_level: default_log_level(),
            backend: BackendYamlConfig::default(),
            popularity: PopularityYamlConfig::default(),
            similarity: SimilarityYamlConfig::default(),
            blend: BlendConfig::default(),
        }
    }
}

/// Search backend connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendYamlConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Sent as `Authorization: ApiKey <key>`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_posts_index")]
    pub posts_index: String,

    #[serde(default = "default_likes_index")]
    pub likes_index: String,
}

impl BackendYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let url = self.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigLoadError::Validation(format!(
                "backend.url must be an http(s) URL, got '{}'",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "backend.timeout_secs must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_elasticsearch_config(&self) -> ElasticsearchConfig {
        let mut cfg = ElasticsearchConfig::new(self.url.trim())
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(key) = &self.api_key {
            cfg = cfg.with_api_key(key.clone());
        }
        cfg
    }
}

impl Default for BackendYamlConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            posts_index: default_posts_index(),
            likes_index: default_likes_index(),
        }
    }
}

/// Popularity generator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularityYamlConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,

    #[serde(default = "default_decay_scale_hours")]
    pub decay_scale_hours: u64,

    #[serde(default = "default_decay_offset_hours")]
    pub decay_offset_hours: u64,

    #[serde(default = "default_decay")]
    pub decay: f64,

    #[serde(default = "default_like_factor")]
    pub like_factor: f64,
}

impl PopularityYamlConfig {
    fn to_config(&self, backend: &BackendYamlConfig) -> PopularityConfig {
        PopularityConfig {
            posts_index: backend.posts_index.clone(),
            window: Duration::from_secs(self.window_hours.saturating_mul(HOUR_SECS)),
            model: PopularityModel {
                decay_scale: Duration::from_secs(self.decay_scale_hours.saturating_mul(HOUR_SECS)),
                decay_offset: Duration::from_secs(
                    self.decay_offset_hours.saturating_mul(HOUR_SECS),
                ),
                decay: self.decay,
                like_factor: self.like_factor,
            },
        }
    }
}

impl Default for PopularityYamlConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            decay_scale_hours: default_decay_scale_hours(),
            decay_offset_hours: default_decay_offset_hours(),
            decay: default_decay(),
            like_factor: default_like_factor(),
        }
    }
}

/// Similarity generator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityYamlConfig {
    #[serde(default = "default_like_lookback")]
    pub like_lookback: usize,

    #[serde(default = "default_min_knn_candidates")]
    pub min_knn_candidates: usize,

    #[serde(default = "default_knn_oversample")]
    pub knn_oversample: usize,
}

impl SimilarityYamlConfig {
    fn to_config(&self, backend: &BackendYamlConfig) -> SimilarityConfig {
        SimilarityConfig {
            posts_index: backend.posts_index.clone(),
            likes_index: backend.likes_index.clone(),
            like_lookback: self.like_lookback,
            min_knn_candidates: self.min_knn_candidates,
            knn_oversample: self.knn_oversample,
        }
    }
}

impl Default for SimilarityYamlConfig {
    fn default() -> Self {
        Self {
            like_lookback: default_like_lookback(),
            min_knn_candidates: default_min_knn_candidates(),
            knn_oversample: default_knn_oversample(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_backend_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_posts_index() -> String {
    "posts".to_string()
}
fn default_likes_index() -> String {
    "likes".to_string()
}
fn default_window_hours() -> u64 {
    24
}
fn default_decay_scale_hours() -> u64 {
    6
}
fn default_decay_offset_hours() -> u64 {
    1
}
fn default_decay() -> f64 {
    0.5
}
fn default_like_factor() -> f64 {
    1.5
}
fn default_like_lookback() -> usize {
    50
}
fn default_min_knn_candidates() -> usize {
    100
}
fn default_knn_oversample() -> usize {
    10
}
