use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Discord bot configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    /// Bot token. Required; usually supplied as ROLEGATE_DISCORD__TOKEN.
    #[serde(default)]
    pub token: String,
    /// Prefix for text commands such as `!verify`
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "!".to_string()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            prefix: default_prefix(),
        }
    }
}

/// Secrets used at rest
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SecurityConfig {
    /// Base64 encoded 32-byte key for the configuration cipher
    #[serde(default)]
    pub encryption_key: String,
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://rolegate.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Which backend holds guild configuration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Sql,
    File,
}

/// Configuration store layout
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Authoritative backend
    #[serde(default = "default_primary")]
    pub primary: BackendKind,
    /// Optional best-effort mirror; must differ from `primary`
    #[serde(default)]
    pub replica: Option<BackendKind>,
    /// Location of the encrypted file backend
    #[serde(default = "default_file_path")]
    pub file_path: PathBuf,
    /// Deadline for each store operation
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
}

fn default_primary() -> BackendKind {
    BackendKind::Sql
}

fn default_file_path() -> PathBuf {
    PathBuf::from("data/guilds.enc")
}

fn default_io_timeout() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            replica: None,
            file_path: default_file_path(),
            io_timeout_secs: default_io_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    /// Replica backend, ignoring a replica that names the primary.
    pub fn effective_replica(&self) -> Option<BackendKind> {
        self.replica.filter(|kind| *kind != self.primary)
    }

    /// Whether either role uses the given backend
    pub fn uses(&self, kind: BackendKind) -> bool {
        self.primary == kind || self.effective_replica() == Some(kind)
    }
}

/// Identity provider settings
#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_url")]
    pub base_url: String,
    #[serde(default = "default_identity_timeout")]
    pub timeout_secs: u64,
}

fn default_identity_url() -> String {
    "https://api.geysermc.org/v2/xbox".to_string()
}

fn default_identity_timeout() -> u64 {
    10
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: default_identity_url(),
            timeout_secs: default_identity_timeout(),
        }
    }
}

/// Verification workflow switches
#[derive(Debug, Deserialize, Clone)]
pub struct VerificationConfig {
    /// Only accept verification in the guild's designated channel
    #[serde(default = "default_true")]
    pub restrict_channel: bool,
    /// Require a gamertag claim checked against the identity provider
    #[serde(default)]
    pub require_identity: bool,
    /// Delete the triggering text command after a successful grant
    #[serde(default = "default_true")]
    pub cleanup_on_success: bool,
}

fn default_true() -> bool {
    true
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            restrict_channel: true,
            require_identity: false,
            cleanup_on_success: true,
        }
    }
}

/// Liveness endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct LivenessConfig {
    #[serde(default = "default_liveness_host")]
    pub host: String,
    #[serde(default = "default_liveness_port")]
    pub port: u16,
}

fn default_liveness_host() -> String {
    "0.0.0.0".to_string()
}

fn default_liveness_port() -> u16 {
    10000
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            host: default_liveness_host(),
            port: default_liveness_port(),
        }
    }
}

/// Root application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default config file
            .add_source(File::with_name("config/default").required(false))
            // Override with local config if present
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (prefix: ROLEGATE_)
            // e.g., ROLEGATE_DISCORD__TOKEN, ROLEGATE_SECURITY__ENCRYPTION_KEY
            .add_source(
                Environment::with_prefix("ROLEGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            // Hosting platforms hand out the health check port as PORT
            .set_override_option("liveness.port", std::env::var("PORT").ok())?
            .build()?;

        config.try_deserialize()
    }

    /// Initialize the global config singleton
    pub fn init() -> Result<&'static Self, ConfigError> {
        let config = Self::load()?;
        Ok(CONFIG.get_or_init(|| config))
    }
}
