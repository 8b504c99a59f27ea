use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub cors: Option<CorsSection>,
    #[serde(default)]
    pub uploads: Option<UploadsSection>,
    #[serde(default)]
    pub jobs: Option<JobsSection>,
    #[serde(default)]
    pub auth: Option<AuthSection>,
    #[serde(default)]
    pub automations: Option<AutomationsSection>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub body_limit_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CorsSection {
    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(default)]
    pub allow_all_origins: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UploadsSection {
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobsSection {
    #[serde(default)]
    pub work_root: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub jwt_pem: Option<String>,
    #[serde(default)]
    pub jwt_pem_path: Option<String>,
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AutomationsSection {
    #[serde(default)]
    pub invoice_download: Option<AutomationSection>,
    #[serde(default)]
    pub report_generation: Option<AutomationSection>,
    #[serde(default)]
    pub batch_lookup: Option<AutomationSection>,
}

#[derive(Debug, Deserialize)]
pub struct AutomationSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse a config document. Unknown extensions try yaml, toml, then json.
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    let parse_err = |e: &dyn std::fmt::Display| ConfigError::Parse(e.to_string());
    match ext {
        Some("toml") => toml::from_str(s).map_err(|e| parse_err(&e)),
        Some("yaml" | "yml") => serde_yaml::from_str(s).map_err(|e| parse_err(&e)),
        Some("json") => serde_json::from_str(s).map_err(|e| parse_err(&e)),
        _ => serde_yaml::from_str(s)
            .ok()
            .or_else(|| toml::from_str(s).ok())
            .or_else(|| serde_json::from_str(s).ok())
            .ok_or_else(|| ConfigError::Parse("unrecognized configuration format".into())),
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub uploads: UploadsConfig,
    pub jobs: JobsConfig,
    pub auth: AuthConfig,
    pub automations: AutomationsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body, uploads included.
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_all_origins: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadsConfig {
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobsConfig {
    /// Parent of the per-job working directories.
    pub work_root: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Trust the caller-supplied `email` header (or `userEmail` body field).
    Header,
    /// Require a bearer JWT and take the identity from its claims.
    Jwt,
}

impl std::str::FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "jwt" => Ok(Self::Jwt),
            other => Err(ConfigError::Parse(format!("unknown auth mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub jwt_pem: Option<String>,
    pub jwt_pem_path: Option<String>,
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutomationConfig {
    pub enabled: bool,
    pub program: Option<String>,
    pub args: Vec<String>,
}

impl AutomationConfig {
    /// Program to launch, if the automation is enabled and has one configured.
    pub fn active_program(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.program.as_deref().filter(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutomationsConfig {
    pub invoice_download: AutomationConfig,
    pub report_generation: AutomationConfig,
    pub batch_lookup: AutomationConfig,
}

impl AutomationsConfig {
    /// Automations by config key, in a stable order.
    pub fn entries(&self) -> [(&'static str, &AutomationConfig); 3] {
        [
            ("invoice_download", &self.invoice_download),
            ("report_generation", &self.report_generation),
            ("batch_lookup", &self.batch_lookup),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3001,
                body_limit_bytes: 25 * 1024 * 1024,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            cors: CorsConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
                allow_all_origins: false,
            },
            uploads: UploadsConfig {
                directory: "./uploads".to_string(),
            },
            jobs: JobsConfig {
                work_root: "./work".to_string(),
            },
            auth: AuthConfig {
                mode: AuthMode::Header,
                jwt_pem: None,
                jwt_pem_path: None,
                jwt_secret: None,
            },
            automations: AutomationsConfig::default(),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "sim" => Some(true),
        "0" | "false" | "no" | "n" | "nao" | "não" => Some(false),
        _ => None,
    }
}

/// Comma-separated list, blanks dropped.
fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

fn apply_automation(target: &mut AutomationConfig, section: Option<AutomationSection>) {
    let Some(section) = section else {
        return;
    };
    // A configured program enables the automation unless it is switched off explicitly.
    if section.program.is_some() {
        target.enabled = true;
    }
    apply_opt!(target.program, section.program, wrap);
    apply_opt!(target.args, section.args);
    apply_opt!(target.enabled, section.enabled);
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        if let Some(server) = raw.server {
            apply_opt!(cfg.server.host, server.host);
            apply_opt!(cfg.server.port, server.port);
            apply_opt!(cfg.server.body_limit_bytes, server.body_limit_bytes);
        }
        if let Some(logging) = raw.logging {
            apply_opt!(cfg.logging.level, logging.level);
            apply_opt!(cfg.logging.json, logging.json);
        }
        if let Some(cors) = raw.cors {
            apply_opt!(cfg.cors.allowed_origins, cors.allowed_origins);
            apply_opt!(cfg.cors.allow_all_origins, cors.allow_all_origins);
        }
        if let Some(uploads) = raw.uploads {
            apply_opt!(cfg.uploads.directory, uploads.directory);
        }
        if let Some(jobs) = raw.jobs {
            apply_opt!(cfg.jobs.work_root, jobs.work_root);
        }
        if let Some(auth) = raw.auth {
            if let Some(mode) = auth.mode {
                cfg.auth.mode = mode.parse()?;
            }
            apply_opt!(cfg.auth.jwt_pem, auth.jwt_pem, wrap);
            apply_opt!(cfg.auth.jwt_pem_path, auth.jwt_pem_path, wrap);
            apply_opt!(cfg.auth.jwt_secret, auth.jwt_secret, wrap);
        }
        if let Some(automations) = raw.automations {
            apply_automation(&mut cfg.automations.invoice_download, automations.invoice_download);
            apply_automation(&mut cfg.automations.report_generation, automations.report_generation);
            apply_automation(&mut cfg.automations.batch_lookup, automations.batch_lookup);
        }
    }

    // Apply environment variable overrides (env takes precedence)
    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    env_str(key)
        .map(|v| v.parse::<T>().map_err(|e| ConfigError::Parse(format!("invalid {key}: {e}"))))
        .transpose()
}

fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    env_str(key)
        .map(|v| parse_bool(&v).ok_or_else(|| ConfigError::Parse(format!("invalid {key}: {v}"))))
        .transpose()
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn apply_automation_env(
    target: &mut AutomationConfig,
    prefix: &str,
) -> Result<(), ConfigError> {
    if let Some(v) = env_str(&format!("{prefix}_PROGRAM")) {
        target.program = Some(v);
        target.enabled = true;
    }
    if let Some(v) = env_str(&format!("{prefix}_ARGS")) {
        target.args = split_csv(&v);
    }
    if let Some(v) = env_bool(&format!("{prefix}_ENABLED"))? {
        target.enabled = v;
    }
    Ok(())
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Server
    if let Some(v) = env_str("JOBGATE_SERVER_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = env_parse::<u16>("JOBGATE_SERVER_PORT")? {
        cfg.server.port = v;
    }
    // Deployments that only know the classic PORT variable
    if let Some(v) = env_parse::<u16>("PORT")? {
        cfg.server.port = v;
    }
    if let Some(v) = env_parse::<usize>("JOBGATE_BODY_LIMIT_BYTES")? {
        cfg.server.body_limit_bytes = v;
    }

    // Logging
    if let Some(v) = env_str("JOBGATE_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("JOBGATE_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // CORS
    if let Some(v) = env_str("JOBGATE_CORS_ALLOWED_ORIGINS") {
        cfg.cors.allowed_origins = split_csv(&v);
    }
    if let Some(v) = env_bool("JOBGATE_CORS_ALLOW_ALL_ORIGINS")? {
        cfg.cors.allow_all_origins = v;
    }

    // Storage
    if let Some(v) = env_str("JOBGATE_UPLOADS_DIRECTORY") {
        cfg.uploads.directory = v;
    }
    if let Some(v) = env_str("JOBGATE_WORK_ROOT") {
        cfg.jobs.work_root = v;
    }

    // Auth
    if let Some(v) = env_str("JOBGATE_AUTH_MODE") {
        cfg.auth.mode = v.parse()?;
    }
    if let Some(v) = env_str("JOBGATE_JWT_PEM") {
        cfg.auth.jwt_pem = Some(v);
    }
    if let Some(v) = env_str("JOBGATE_JWT_PEM_PATH") {
        cfg.auth.jwt_pem_path = Some(v);
    }
    if let Some(v) = env_str("JOBGATE_JWT_SECRET") {
        cfg.auth.jwt_secret = Some(v);
    }

    // Automations
    apply_automation_env(
        &mut cfg.automations.invoice_download,
        "JOBGATE_INVOICE_DOWNLOAD",
    )?;
    apply_automation_env(
        &mut cfg.automations.report_generation,
        "JOBGATE_REPORT_GENERATION",
    )?;
    apply_automation_env(&mut cfg.automations.batch_lookup, "JOBGATE_BATCH_LOOKUP")?;

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }
    if cfg.server.body_limit_bytes == 0 {
        return Err(ConfigError::Validation(
            "server.body_limit_bytes must be > 0".into(),
        ));
    }

    if cfg.uploads.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "uploads.directory must not be empty".into(),
        ));
    }
    if cfg.jobs.work_root.trim().is_empty() {
        return Err(ConfigError::Validation(
            "jobs.work_root must not be empty".into(),
        ));
    }

    if cfg.auth.mode == AuthMode::Jwt
        && cfg.auth.jwt_pem.is_none()
        && cfg.auth.jwt_pem_path.is_none()
        && cfg.auth.jwt_secret.is_none()
    {
        return Err(ConfigError::Validation(
            "auth.mode = jwt requires jwt_pem, jwt_pem_path or jwt_secret".into(),
        ));
    }

    for (name, automation) in cfg.automations.entries() {
        if automation.enabled && automation.active_program().is_none() {
            return Err(ConfigError::Validation(format!(
                "automations.{name} is enabled but has no program"
            )));
        }
    }

    for origin in cfg.cors.allowed_origins.iter().filter(|o| *o != "*") {
        let scheme_ok = url::Url::parse(origin)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !scheme_ok {
            return Err(ConfigError::Validation(format!(
                "cors origin must be an http(s) url: {origin}"
            )));
        }
    }
    Ok(())
}
