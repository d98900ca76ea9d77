use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `LINES_ADMIN__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub contact: ContactConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: i64,
    #[serde(default = "default_reset_ttl_minutes")]
    pub reset_ttl_minutes: i64,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
    /// bcrypt work factor for stored passwords.
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
    /// Wrong guesses allowed before a pending one-time code is discarded.
    #[serde(default = "default_max_otp_attempts")]
    pub max_otp_attempts: u32,
}

/// Operator account accepted by the admin gate. The gate stays closed
/// unless a password and at least one identifier are configured.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_admin_grant_ttl_hours")]
    pub grant_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactConfig {
    #[serde(default = "default_contact_phone")]
    pub phone_number: String,
    #[serde(default = "default_contact_message")]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Capacity of the change-feed broadcast buffer.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

// Default functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_session_ttl_hours() -> i64 {
    24
}
fn default_otp_ttl_minutes() -> i64 {
    60
}
fn default_reset_ttl_minutes() -> i64 {
    60
}
fn default_min_password_len() -> usize {
    6
}
fn default_password_hash_cost() -> u32 {
    10
}
fn default_max_otp_attempts() -> u32 {
    5
}
fn default_admin_grant_ttl_hours() -> i64 {
    8
}
fn default_contact_phone() -> String {
    "201559181558".to_string()
}
fn default_contact_message() -> String {
    "Hello, I would like to ask about the internet lines management system".to_string()
}
fn default_feed_capacity() -> usize {
    256
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            otp_ttl_minutes: default_otp_ttl_minutes(),
            reset_ttl_minutes: default_reset_ttl_minutes(),
            min_password_len: default_min_password_len(),
            password_hash_cost: default_password_hash_cost(),
            max_otp_attempts: default_max_otp_attempts(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: None,
            username: None,
            password: None,
            grant_ttl_hours: default_admin_grant_ttl_hours(),
        }
    }
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            phone_number: default_contact_phone(),
            message: default_contact_message(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            feed_capacity: default_feed_capacity(),
        }
    }
}

impl AdminConfig {
    /// True when the gate has a password and something to match it against.
    pub fn is_configured(&self) -> bool {
        let has_identifier = self.email.as_deref().is_some_and(|s| !s.is_empty())
            || self.username.as_deref().is_some_and(|s| !s.is_empty());
        has_identifier && self.password.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    /// Environment variables win over the file.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("LINES_ADMIN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
