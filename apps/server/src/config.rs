//! Configuration management for the MHD gateway

use mhd_models::ResourceKind;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, net::SocketAddr};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub fhir: FhirConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path the FHIR endpoints are mounted under. Default: `/FHIR/R4`
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes. Bundles carry base64 documents inline,
    /// so this is sized for documents rather than metadata.
    /// Default: 50 MB
    #[serde(default = "default_max_request_body_size")]
    pub max_request_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FhirConfig {
    /// Externally reachable base URL of this gateway. Rewritten attachment
    /// locators are built from it as `{base_url}/Binary/{id}`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_fhir_version")]
    pub version: String,
    #[serde(default)]
    pub capability_statement: CapabilityStatementConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityStatementConfig {
    #[serde(default = "default_cs_name")]
    pub name: String,
    #[serde(default = "default_cs_publisher")]
    pub publisher: String,
    #[serde(default = "default_cs_software_name")]
    pub software_name: String,
    #[serde(default = "default_cs_software_version")]
    pub software_version: String,
}

impl Default for CapabilityStatementConfig {
    fn default() -> Self {
        Self {
            name: default_cs_name(),
            publisher: default_cs_publisher(),
            software_name: default_cs_software_name(),
            software_version: default_cs_software_version(),
        }
    }
}

/// Which resource store the gateway persists to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local store. Nothing survives a restart.
    Memory,
    /// FHIR REST server at `backend.url`.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,
    /// Base URL of the backend FHIR server (required for `http`)
    pub url: Option<String>,
    /// Per-call timeout. Calls are never retried. Default: 30
    #[serde(default = "default_backend_timeout")]
    pub timeout_seconds: u64,
}

/// What the client sees when a single resource fails to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Emit an error issue / error entry in the failed resource's position.
    #[default]
    Report,
    /// Leave failed resources out of the response.
    Omit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Store inline Binaries referenced by attachments and rewrite their locators.
    #[serde(default = "default_true")]
    pub relocate_attachments: bool,
    /// MessageHeader event code -> focal resource type.
    #[serde(default = "default_message_events")]
    pub message_events: HashMap<String, String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            relocate_attachments: true,
            message_events: default_message_events(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting for console logs (recommended for production)
    #[serde(default)]
    pub json: bool,

    /// Enable file logging in addition to console
    #[serde(default)]
    pub file_enabled: bool,

    /// Directory for log files (default: ./logs)
    #[serde(default = "default_log_directory")]
    pub file_directory: String,

    /// Log file prefix (default: mhd-gateway)
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,

    /// Log rotation: daily, hourly, minutely, never (default: daily)
    #[serde(default = "default_log_rotation")]
    pub file_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file_enabled: false,
            file_directory: default_log_directory(),
            file_prefix: default_log_file_prefix(),
            file_rotation: default_log_rotation(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_base_path() -> String {
    "/FHIR/R4".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_request_body_size() -> usize {
    50 * 1024 * 1024
}

fn default_base_url() -> String {
    "http://localhost:8080/FHIR/R4".to_string()
}

fn default_fhir_version() -> String {
    "R4".to_string()
}

fn default_cs_name() -> String {
    "IHE MHD Document Gateway".to_string()
}

fn default_cs_publisher() -> String {
    "NHS England".to_string()
}

fn default_cs_software_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_cs_software_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_backend_kind() -> BackendKind {
    BackendKind::Memory
}

fn default_backend_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_message_events() -> HashMap<String, String> {
    HashMap::from([("document".to_string(), "DocumentReference".to_string())])
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "./logs".to_string()
}

fn default_log_file_prefix() -> String {
    "mhd-gateway".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

impl Config {
    /// Load configuration from defaults, `config.*`, an optional explicit file and
    /// the environment (highest precedence).
    pub fn load(config_file: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("server.base_path", default_base_path())?
            .set_default("server.cors_origins", default_cors_origins())?
            .set_default(
                "server.max_request_body_size",
                default_max_request_body_size() as i64,
            )?
            .set_default("fhir.base_url", default_base_url())?
            .set_default("fhir.version", default_fhir_version())?
            .set_default("backend.kind", "memory")?
            .set_default("backend.timeout_seconds", default_backend_timeout())?
            .set_default("processing.failure_policy", "report")?
            .set_default("processing.relocate_attachments", default_true())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .set_default("logging.file_enabled", false)?
            .set_default("logging.file_directory", default_log_directory())?
            .set_default("logging.file_prefix", default_log_file_prefix())?
            .set_default("logging.file_rotation", default_log_rotation())?
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false));

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            // Override with environment variables
            // Example: MHD__BACKEND__URL -> config.backend.url
            .add_source(
                config::Environment::with_prefix("MHD")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        Ok(addr.parse()?)
    }

    /// Base URL with any trailing slash removed.
    pub fn external_base_url(&self) -> &str {
        self.fhir.base_url.trim_end_matches('/')
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.server.base_path.starts_with('/') {
            return Err("server.base_path must start with '/'".to_string());
        }

        url::Url::parse(&self.fhir.base_url)
            .map_err(|e| format!("fhir.base_url is not a valid URL: {e}"))?;

        if self.backend.kind == BackendKind::Http {
            let url = self
                .backend
                .url
                .as_deref()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| "backend.url must be set when backend.kind=http".to_string())?;
            url::Url::parse(url).map_err(|e| format!("backend.url is not a valid URL: {e}"))?;
        }
        if self.backend.timeout_seconds == 0 {
            return Err("backend.timeout_seconds must be > 0".to_string());
        }

        for (event, resource_type) in &self.processing.message_events {
            match ResourceKind::from_type_name(resource_type) {
                ResourceKind::DocumentReference | ResourceKind::Binary => {}
                ResourceKind::MessageHeader
                | ResourceKind::OperationOutcome
                | ResourceKind::Other => {
                    return Err(format!(
                        "processing.message_events.{event}: '{resource_type}' cannot be persisted \
                         (expected DocumentReference or Binary)"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Configuration used by tests and `backend.kind = memory` quick starts.
    pub fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                base_path: default_base_path(),
                cors_origins: default_cors_origins(),
                max_request_body_size: default_max_request_body_size(),
            },
            fhir: FhirConfig {
                base_url: "https://mhd.example.org/FHIR/R4".to_string(),
                version: default_fhir_version(),
                capability_statement: CapabilityStatementConfig::default(),
            },
            backend: BackendConfig {
                kind: BackendKind::Memory,
                url: None,
                timeout_seconds: default_backend_timeout(),
            },
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
