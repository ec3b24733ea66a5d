use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dates::parse_calendar_date;

/// Community harvested when nothing else is configured.
pub const DEFAULT_COMMUNITY: &str = "bioecoocean";
/// IPT feed that accompanies the default community.
pub const DEFAULT_OBIS_RSS: &str = "https://ipt.obis.org/bioecoocean/rss.do";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HarvestConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_catalogue_path")]
    pub output: PathBuf,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between consecutive page requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub obis_rss_url: Option<String>,
}

fn default_api_url() -> String {
    "https://zenodo.org/api/records".to_string()
}
fn default_community() -> String {
    DEFAULT_COMMUNITY.to_string()
}
fn default_catalogue_path() -> PathBuf {
    PathBuf::from("bioecoocean-catalogue.jsonld")
}
fn default_sort() -> String {
    "mostrecent".to_string()
}
fn default_timeout_secs() -> u64 {
    90
}
fn default_request_delay_ms() -> u64 {
    1200
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_user_agent() -> String {
    format!("mcat/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            community: default_community(),
            output: default_catalogue_path(),
            sort: default_sort(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
            access_token: None,
            obis_rss_url: None,
        }
    }
}

impl HarvestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// The OBIS IPT feed to merge into this harvest, if any.
    ///
    /// An explicit `obis_rss_url` always wins; otherwise the default feed is
    /// used only for the default community.
    pub fn obis_feed(&self) -> Option<&str> {
        match self.obis_rss_url.as_deref() {
            Some(url) => Some(url),
            None if self.community == DEFAULT_COMMUNITY => Some(DEFAULT_OBIS_RSS),
            None => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_catalogue_path")]
    pub input: PathBuf,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub sitemap: Option<PathBuf>,
    #[serde(default)]
    pub sitemap_xml: Option<PathBuf>,
    /// Fixed `YYYY-MM-DD` stamped on every sitemap entry.
    #[serde(default)]
    pub last_modified: Option<String>,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("jsonFiles")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            input: default_catalogue_path(),
            out_dir: default_out_dir(),
            base_url: None,
            sitemap: None,
            sitemap_xml: None,
            last_modified: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Checks shared by file-based and CLI-overridden configs.
pub fn validate(config: &Config) -> Result<()> {
    if config.harvest.timeout_secs == 0 {
        anyhow::bail!("harvest.timeout_secs must be > 0");
    }
    if config.harvest.community.trim().is_empty() {
        anyhow::bail!("harvest.community must not be empty");
    }
    check_http_url("harvest.api_url", &config.harvest.api_url)?;
    if let Some(ref feed) = config.harvest.obis_rss_url {
        check_http_url("harvest.obis_rss_url", feed)?;
    }

    if let Some(ref base) = config.export.base_url {
        check_http_url("export.base_url", base)?;
    }
    if let Some(ref date) = config.export.last_modified {
        if parse_calendar_date(date).is_none() {
            anyhow::bail!("export.last_modified is not a calendar date: '{}'", date);
        }
    }
    Ok(())
}

fn check_http_url(key: &str, value: &str) -> Result<()> {
    let parsed =
        url::Url::parse(value).with_context(|| format!("{} is not a URL: '{}'", key, value))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("{} must be http or https, got '{}'", key, other),
    }
}
