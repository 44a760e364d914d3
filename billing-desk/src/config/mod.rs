use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub auth: AuthSettings,
    pub smtp: SmtpSettings,
    pub documents: DocumentSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Mark session cookies `Secure`. Enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_session_idle_hours")]
    pub session_idle_hours: i64,
}

fn default_session_idle_hours() -> i64 {
    12
}

#[derive(Deserialize, Clone)]
pub struct BackendSettings {
    /// Base URL of the billing REST backend, without the `/api` suffix.
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Deserialize, Clone)]
pub struct AuthSettings {
    pub base_url: String,
    /// Exchange the refresh token for a fresh ID token before every backend
    /// operation instead of reusing the one issued at login.
    #[serde(default = "default_true")]
    pub refresh_per_request: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Clone)]
pub struct SmtpSettings {
    #[serde(default)]
    pub enabled: bool,
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Deserialize, Clone)]
pub struct DocumentSettings {
    pub company_name: String,
    #[serde(default)]
    pub company_address: String,
    pub company_gstin: Option<String>,
    #[serde(default = "default_payment_terms_days")]
    pub payment_terms_days: u64,
    /// Client-side limit on PDF generation and server PDF fetches.
    #[serde(default = "default_operation_timeout_secs")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_operation_timeout_secs")]
    pub email_timeout_secs: u64,
}

fn default_payment_terms_days() -> u64 {
    30
}

fn default_operation_timeout_secs() -> u64 {
    30
}

impl DocumentSettings {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn email_timeout(&self) -> Duration {
        Duration::from_secs(self.email_timeout_secs)
    }
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load `config/base.yaml`, then apply `APP__SECTION__KEY` overrides.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("Cannot read current dir: {}", e)))?;

    // Works from the workspace root and from the crate directory.
    let configuration_directory = if base_path.ends_with("billing-desk") {
        base_path.join("config")
    } else {
        base_path.join("billing-desk").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
