//! Configuration loading for the Polaris digest.
//!
//! Loads layered `.env` files and the process environment, producing a typed
//! [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::models::Filter;
use crate::polaris::RetryPolicy;

const REDACTED: &str = "[REDACTED]";
const MAX_CONCURRENCY_LIMIT: usize = 256;

/// Application configuration derived from environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub log: LogConfig,
    pub polaris: PolarisConfig,
    pub filter: Filter,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogConfig {
    /// Environment variable: `POLARIS_LOG_LEVEL`
    pub level: String,
    /// `json` or `pretty`. Environment variable: `POLARIS_LOG_FORMAT`
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Connection settings for the Polaris API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolarisConfig {
    /// Environment variable: `POLARIS_URL`
    pub base_url: Url,
    /// API access token exchanged for a JWT. Environment variable: `POLARIS_TOKEN`
    pub token: String,
    /// Environment variables: `POLARIS_RETRIES`, `POLARIS_WAIT_SECONDS`
    pub retry: RetryPolicy,
    /// Simultaneous outbound requests (default: 16)
    ///
    /// Environment variable: `POLARIS_MAX_CONCURRENCY`
    pub max_concurrency: usize,
    /// Environment variable: `POLARIS_APPLICATION_ID`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    /// Custom project properties a project must match, `key=value,key2=value2`
    ///
    /// Environment variable: `POLARIS_PROJECT_PROPERTIES`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub project_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackConfig>,
    /// Environment variable: `GOOGLE_SPACES_URL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_spaces_url: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackConfig {
    /// Environment variable: `SLACK_WEBHOOK_URL`
    pub webhook_url: Url,
    /// Environment variable: `SLACK_ONE_MESSAGE_PER_PROJECT`
    pub one_message_per_project: bool,
    /// Environment variable: `SEND_BOTH_ISSUES_AND_UNTRIAGED_AT_ONCE_TO_SLACK`
    pub send_untriaged_too: bool,
    /// Environment variable: `SLACK_LIST_ALL_ISSUES`
    pub list_all_issues: bool,
}

impl AppConfig {
    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(token) = value.pointer_mut("/polaris/token") {
            *token = REDACTED.into();
        }
        if let Some(url) = value.pointer_mut("/notify/slack/webhook_url") {
            *url = REDACTED.into();
        }
        if let Some(url) = value.pointer_mut("/notify/google_spaces_url") {
            *url = REDACTED.into();
        }
        serde_json::to_string_pretty(&value)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Polaris URL is missing; set POLARIS_URL environment variable")]
    MissingPolarisUrl,
    #[error("Polaris token is missing; set POLARIS_TOKEN environment variable")]
    MissingPolarisToken,
    #[error("invalid URL in {key} '{value}': {source}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("invalid boolean in {key}: '{value}' (expected true/false, yes/no, on/off or 1/0)")]
    InvalidFlag { key: &'static str, value: String },
    #[error("invalid number in {key}: '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("POLARIS_RETRIES must be at least 1, got {value}")]
    InvalidRetries { value: u32 },
    #[error("POLARIS_MAX_CONCURRENCY must be between 1 and 256, got {value}")]
    InvalidConcurrency { value: usize },
    #[error("invalid project property '{entry}' (expected key=value)")]
    InvalidProjectProperty { entry: String },
    #[error("failed to load env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
}

/// Loads configuration using layered `.env` files and the process environment.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_from(env::vars())
    }

    /// Loads configuration with `vars` standing in for the process environment.
    pub fn load_from<I>(&self, vars: I) -> Result<AppConfig, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut layered = self.collect_layered_env()?;

        // Overlay the environment last so it wins.
        layered.extend(vars);

        let mut vars = Vars(layered);

        let base_url = vars
            .take("POLARIS_URL")
            .ok_or(ConfigError::MissingPolarisUrl)?;
        let base_url = parse_url("POLARIS_URL", base_url)?;
        let token = vars
            .take("POLARIS_TOKEN")
            .ok_or(ConfigError::MissingPolarisToken)?;

        let retries = vars.number("POLARIS_RETRIES")?.unwrap_or(1);
        if retries < 1 {
            return Err(ConfigError::InvalidRetries { value: retries });
        }
        let wait_seconds = vars
            .number("POLARIS_WAIT_SECONDS")?
            .unwrap_or_else(default_wait_seconds);

        let max_concurrency = vars
            .number("POLARIS_MAX_CONCURRENCY")?
            .unwrap_or_else(default_max_concurrency);
        if !(1..=MAX_CONCURRENCY_LIMIT).contains(&max_concurrency) {
            return Err(ConfigError::InvalidConcurrency {
                value: max_concurrency,
            });
        }

        let project_properties = match vars.take("POLARIS_PROJECT_PROPERTIES") {
            Some(raw) => parse_properties(&raw)?,
            None => BTreeMap::new(),
        };

        let polaris = PolarisConfig {
            base_url,
            token,
            retry: RetryPolicy {
                retries,
                wait_seconds,
            },
            max_concurrency,
            application_id: vars.take("POLARIS_APPLICATION_ID"),
            project_properties,
        };

        let filter = Filter {
            only_security: vars.flag("POLARIS_FILTER_ONLY_SECURITY")?,
            only_untriaged: vars.flag("POLARIS_FILTER_ONLY_UNTRIAGED")?,
            only_med_high: vars.flag("POLARIS_FILTER_ONLY_MED_HIGH")?,
        };

        let slack = match vars.take("SLACK_WEBHOOK_URL") {
            Some(url) => Some(SlackConfig {
                webhook_url: parse_url("SLACK_WEBHOOK_URL", url)?,
                one_message_per_project: vars.flag("SLACK_ONE_MESSAGE_PER_PROJECT")?,
                send_untriaged_too: vars.flag("SEND_BOTH_ISSUES_AND_UNTRIAGED_AT_ONCE_TO_SLACK")?,
                list_all_issues: vars.flag("SLACK_LIST_ALL_ISSUES")?,
            }),
            None => None,
        };
        let google_spaces_url = vars
            .take("GOOGLE_SPACES_URL")
            .map(|url| parse_url("GOOGLE_SPACES_URL", url))
            .transpose()?;

        let log = LogConfig {
            level: vars
                .take("POLARIS_LOG_LEVEL")
                .unwrap_or_else(default_log_level),
            format: vars
                .take("POLARIS_LOG_FORMAT")
                .unwrap_or_else(default_log_format),
        };

        Ok(AppConfig {
            log,
            polaris,
            filter,
            notify: NotifyConfig {
                slack,
                google_spaces_url,
            },
        })
    }

    fn collect_layered_env(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        Ok(values)
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    values.insert(key, value);
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Merged variables; empty values count as unset.
struct Vars(BTreeMap<String, String>);

impl Vars {
    fn take(&mut self, key: &str) -> Option<String> {
        self.0
            .remove(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn flag(&mut self, key: &'static str) -> Result<bool, ConfigError> {
        match self.take(key) {
            None => Ok(false),
            Some(value) => parse_flag(&value).ok_or(ConfigError::InvalidFlag { key, value }),
        }
    }

    fn number<T: std::str::FromStr>(&mut self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.take(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber { key, value })
            })
            .transpose()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn parse_url(key: &'static str, value: String) -> Result<Url, ConfigError> {
    match Url::parse(&value) {
        Ok(url) if !url.cannot_be_a_base() => Ok(url),
        Ok(_) => Err(ConfigError::InvalidUrl {
            key,
            value,
            source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
        }),
        Err(source) => Err(ConfigError::InvalidUrl { key, value, source }),
    }
}

fn parse_properties(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidProjectProperty {
                entry: entry.to_string(),
            }),
        })
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_wait_seconds() -> u64 {
    60
}

fn default_max_concurrency() -> usize {
    16
}
