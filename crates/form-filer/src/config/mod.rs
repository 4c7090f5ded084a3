use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

pub const DEFAULT_SUBJECT_TEMPLATE: &str = "New form submission";
pub const DEFAULT_STANDARD_FILE_TEMPLATE: &str = "{QuestionTitle}";
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M";
pub const DEFAULT_FALLBACK_CATEGORY: &str = "Uncategorized";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Process-level settings for the HTTP service and logging.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub drive_service_account_key: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let include_targets = environment != AppEnvironment::Production;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets,
            },
            drive_service_account_key: optional_var("DRIVE_SERVICE_ACCOUNT_KEY").map(PathBuf::from),
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub include_targets: bool,
}

/// Naming, routing, and notification settings for one submission run.
///
/// Every string template may reference question titles as `{Title}` placeholders.
/// The value is built once per invocation and handed to each component by reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    pub destination_container_id: String,
    pub recipients: Vec<String>,
    pub admin_address: String,
    #[serde(default = "default_subject_template")]
    pub subject_template: String,
    #[serde(default = "default_standard_file_template")]
    pub standard_file_template: String,
    #[serde(default)]
    pub special_file_prefix_template: String,
    #[serde(default)]
    pub special_question_title: String,
    #[serde(default)]
    pub folder_name_exclusions: BTreeSet<String>,
    #[serde(default)]
    pub email_body_exclusions: BTreeSet<String>,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl RoutingConfig {
    /// Loads from `FORM_ROUTING_FILE` when set, otherwise from `FORM_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        match optional_var("FORM_ROUTING_FILE") {
            Some(path) => Self::from_json_file(path),
            None => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            destination_container_id: required_var("FORM_DESTINATION_CONTAINER_ID")?,
            recipients: split_list(&required_var("FORM_RECIPIENTS")?, ','),
            admin_address: required_var("FORM_ADMIN_ADDRESS")?,
            subject_template: env::var("FORM_SUBJECT_TEMPLATE")
                .unwrap_or_else(|_| default_subject_template()),
            standard_file_template: env::var("FORM_STANDARD_FILE_TEMPLATE")
                .unwrap_or_else(|_| default_standard_file_template()),
            special_file_prefix_template: env::var("FORM_SPECIAL_PREFIX_TEMPLATE")
                .unwrap_or_default(),
            special_question_title: env::var("FORM_SPECIAL_QUESTION").unwrap_or_default(),
            folder_name_exclusions: split_list(
                &env::var("FORM_FOLDER_EXCLUSIONS").unwrap_or_default(),
                ';',
            )
            .into_iter()
            .collect(),
            email_body_exclusions: split_list(
                &env::var("FORM_EMAIL_EXCLUSIONS").unwrap_or_default(),
                ';',
            )
            .into_iter()
            .collect(),
            timestamp_format: env::var("FORM_TIMESTAMP_FORMAT")
                .unwrap_or_else(|_| default_timestamp_format()),
        })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects settings that would make every run fail or mis-file attachments.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination_container_id.trim().is_empty() {
            return Err(ConfigError::Blank("destination container id"));
        }
        if self.admin_address.trim().is_empty() {
            return Err(ConfigError::Blank("admin address"));
        }
        if self.recipients.iter().all(|r| r.trim().is_empty()) {
            return Err(ConfigError::Blank("recipient list"));
        }
        if self.standard_file_template.trim().is_empty() {
            return Err(ConfigError::Blank("standard file template"));
        }
        check_timestamp_format(&self.timestamp_format)?;
        if self.special_question_enabled() && self.special_file_prefix_template.trim().is_empty() {
            return Err(ConfigError::MissingSpecialPrefix {
                question: self.special_question_title.clone(),
            });
        }
        Ok(())
    }

    pub fn special_question_enabled(&self) -> bool {
        !self.special_question_title.trim().is_empty()
    }

    pub fn is_special_question(&self, title: &str) -> bool {
        self.special_question_enabled() && title == self.special_question_title
    }
}

fn default_subject_template() -> String {
    DEFAULT_SUBJECT_TEMPLATE.to_string()
}

fn default_standard_file_template() -> String {
    DEFAULT_STANDARD_FILE_TEMPLATE.to_string()
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

/// Rejects blank formats and formats holding a specifier chrono cannot render.
pub fn check_timestamp_format(format: &str) -> Result<(), ConfigError> {
    if format.trim().is_empty() {
        return Err(ConfigError::Blank("timestamp format"));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidTimestampFormat(format.to_string()));
    }
    Ok(())
}

/// Keyword rule mapping a submission container into an archive category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub keyword: String,
    pub category: String,
}

/// Settings for the periodic folder reclassifier.
///
/// `timestamp_format` must match the one submissions were named with, since
/// it is how submission folders are recognised and dated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub root_container_id: String,
    pub keyword_rules: Vec<KeywordRule>,
    pub fallback_category: String,
    pub timestamp_format: String,
}

impl ArchiveConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let keyword_rules = split_list(&env::var("ARCHIVE_KEYWORDS").unwrap_or_default(), ';')
            .into_iter()
            .map(|entry| parse_keyword_rule(&entry))
            .collect::<Result<Vec<_>, _>>()?;

        let timestamp_format = optional_var("FORM_TIMESTAMP_FORMAT")
            .unwrap_or_else(default_timestamp_format);
        check_timestamp_format(&timestamp_format)?;

        Ok(Self {
            root_container_id: required_var("ARCHIVE_ROOT_CONTAINER_ID")?,
            keyword_rules,
            fallback_category: optional_var("ARCHIVE_FALLBACK_CATEGORY")
                .unwrap_or_else(|| DEFAULT_FALLBACK_CATEGORY.to_string()),
            timestamp_format,
        })
    }
}

fn parse_keyword_rule(entry: &str) -> Result<KeywordRule, ConfigError> {
    let (keyword, category) = entry
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidKeywordRule(entry.to_string()))?;
    let keyword = keyword.trim();
    let category = category.trim();
    if keyword.is_empty() || category.is_empty() {
        return Err(ConfigError::InvalidKeywordRule(entry.to_string()));
    }
    Ok(KeywordRule {
        keyword: keyword.to_string(),
        category: category.to_string(),
    })
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::MissingVar(name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingVar(&'static str),
    Blank(&'static str),
    MissingSpecialPrefix { question: String },
    InvalidKeywordRule(String),
    InvalidTimestampFormat(String),
    Unreadable { path: PathBuf, source: std::io::Error },
    Malformed { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingVar(name) => write!(f, "{name} must be set"),
            ConfigError::Blank(field) => write!(f, "{field} must not be blank"),
            ConfigError::MissingSpecialPrefix { question } => write!(
                f,
                "special question '{question}' is configured without a file prefix template"
            ),
            ConfigError::InvalidKeywordRule(entry) => {
                write!(f, "archive keyword rule '{entry}' must look like keyword=Category")
            }
            ConfigError::InvalidTimestampFormat(format) => {
                write!(f, "timestamp format '{format}' contains an unsupported specifier")
            }
            ConfigError::Unreadable { path, .. } => {
                write!(f, "unable to read routing config {}", path.display())
            }
            ConfigError::Malformed { path, .. } => {
                write!(f, "routing config {} is not valid JSON", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::Unreadable { source, .. } => Some(source),
            ConfigError::Malformed { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::MissingVar(_)
            | ConfigError::Blank(_)
            | ConfigError::MissingSpecialPrefix { .. }
            | ConfigError::InvalidKeywordRule(_)
            | ConfigError::InvalidTimestampFormat(_) => None,
        }
    }
}
