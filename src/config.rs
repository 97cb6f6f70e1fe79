//! Tool configuration.
//!
//! Resolution order (highest priority first):
//! 1. CLI flags (applied via `apply_cli_overrides`)
//! 2. Environment variables (`REVIEW_MINER_*`)
//! 3. The TOML file given by `--config` (default `review-miner.toml`)
//! 4. Compiled defaults

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::review::{SortOrder, StarRating};

pub const DEFAULT_CONFIG_FILE: &str = "review-miner.toml";
pub const ENV_COOKIE: &str = "REVIEW_MINER_COOKIE";
pub const ENV_APP_ID: &str = "REVIEW_MINER_APP_ID";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub collect: CollectConfig,
    pub analyze: AnalyzeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
    pub app_id: String,
    pub platform: String,
    pub user_agent: String,
    pub sec_ch_ua: String,
    pub sec_ch_ua_platform: String,
    pub accept_language: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            base_url: "https://appstoreconnect.apple.com/WebObjects/iTunesConnect.woa/ra".into(),
            app_id: "1021094295".into(),
            platform: "ios".into(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36"
                .into(),
            sec_ch_ua: r#""Chromium";v="134", "Not:A-Brand";v="24", "Google Chrome";v="134""#
                .into(),
            sec_ch_ua_platform: r#""macOS""#.into(),
            accept_language: "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7".into(),
        }
    }
}

/// The pasted browser session. There is no login flow; when the cookie
/// expires a fresh one has to be copied from the browser.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie: String,
    pub expires: Option<DateTime<Utc>>,
}

impl SessionConfig {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct ReviewQuery {
    pub sort: SortOrder,
    pub rating: StarRating,
    #[serde(default)]
    pub combine: bool,
}

impl ReviewQuery {
    /// File stem used for this query's output, e.g. `one_star_most_helpful`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.rating.label(), self.sort.label())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    pub limit: u32,
    pub delay_ms: u64,
    pub output_dir: PathBuf,
    pub queries: Vec<ReviewQuery>,
}

fn default_queries() -> Vec<ReviewQuery> {
    [(1, true), (2, true), (4, false), (5, false)]
        .into_iter()
        .filter_map(|(stars, combine)| {
            Some(ReviewQuery {
                sort: SortOrder::MostHelpful,
                rating: StarRating::try_from(stars).ok()?,
                combine,
            })
        })
        .collect()
}

impl Default for CollectConfig {
    fn default() -> Self {
        CollectConfig {
            limit: 200,
            delay_ms: 1000,
            output_dir: PathBuf::from("review_data"),
            queries: default_queries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub top_k: usize,
    pub chart_top: usize,
    pub font_family: String,
    pub app_name: String,
    pub user_dict: Option<PathBuf>,
    pub stop_words: Vec<String>,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        AnalyzeConfig {
            input_dir: PathBuf::from("review_data"),
            output_dir: PathBuf::from("analysis_results"),
            top_k: 50,
            chart_top: 20,
            font_family: "sans-serif".into(),
            app_name: "Moji辞书".into(),
            user_dict: None,
            stop_words: Vec::new(),
        }
    }
}

/// Flags that override whatever the file and environment resolved to.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub cookie: Option<String>,
    pub limit: Option<u32>,
    pub collect_output_dir: Option<PathBuf>,
    pub analyze_output_dir: Option<PathBuf>,
    pub top_k: Option<usize>,
}

impl Config {
    /// Loads `path` if it exists, otherwise starts from defaults. A path
    /// given explicitly on the command line must exist.
    pub fn load(
        path: Option<&Path>,
        cli_overrides: Option<&CliOverrides>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        if let Some(cli) = cli_overrides {
            config.apply_cli_overrides(cli);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    #[cfg(test)]
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(cookie) = lookup(ENV_COOKIE).filter(|c| !c.trim().is_empty()) {
            self.session.cookie = cookie;
        }
        if let Some(app_id) = lookup(ENV_APP_ID).filter(|a| !a.trim().is_empty()) {
            self.store.app_id = app_id;
        }
    }

    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(cookie) = &cli.cookie {
            self.session.cookie = cookie.clone();
        }
        if let Some(limit) = cli.limit {
            self.collect.limit = limit;
        }
        if let Some(dir) = &cli.collect_output_dir {
            self.collect.output_dir = dir.clone();
        }
        if let Some(dir) = &cli.analyze_output_dir {
            self.analyze.output_dir = dir.clone();
        }
        if let Some(top_k) = cli.top_k {
            self.analyze.top_k = top_k;
            self.analyze.chart_top = self.analyze.chart_top.min(top_k);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &str, message: &str) -> ConfigError {
            ConfigError::Invalid {
                field: field.to_string(),
                message: message.to_string(),
            }
        }

        if !(1..=1000).contains(&self.collect.limit) {
            return Err(invalid("collect.limit", "must be between 1 and 1000"));
        }
        if self.collect.queries.is_empty() {
            return Err(invalid("collect.queries", "at least one query is required"));
        }
        if self.store.app_id.trim().is_empty() {
            return Err(invalid("store.app_id", "must not be empty"));
        }
        if self.analyze.top_k == 0 {
            return Err(invalid("analyze.top_k", "must be at least 1"));
        }
        if self.analyze.chart_top == 0 || self.analyze.chart_top > self.analyze.top_k {
            return Err(invalid(
                "analyze.chart_top",
                "must be between 1 and analyze.top_k",
            ));
        }
        Ok(())
    }
}
