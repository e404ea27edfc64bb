//! Configuration system for the voxrelay signaling server.
//!
//! Layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/voxrelay/config.toml`)
//! 4. Compiled defaults
//!
//! Recognized environment variables: `ADMIN_UUID`, `ADMIN_USERNAME`,
//! `PROTOCOL`, `HOST`, `PORT`, `MAX_CHAT_MESSAGES`, `LOG_FILEPATH`,
//! `TURN_SECRET_KEY`.

use std::path::PathBuf;

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Scheme the HTTP front end is served over. TLS termination itself is out
/// of scope for this crate; `Https` only changes how the value is surfaced
/// to clients that need to construct absolute URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP.
    Http,
    /// HTTPS (certificate loading is a deployment concern, not this crate's).
    Https,
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Https => "https",
        })
    }
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RelayConfigFile {
    server: ServerFileConfig,
    admin: AdminFileConfig,
    chat: ChatFileConfig,
    logging: LoggingFileConfig,
    turn: TurnFileConfig,
    storage: StorageFileConfig,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    host: Option<String>,
    port: Option<u16>,
    protocol: Option<Protocol>,
}

/// `[admin]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AdminFileConfig {
    uuid: Option<String>,
    username: Option<String>,
}

/// `[chat]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    max_messages: Option<usize>,
}

/// `[logging]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LoggingFileConfig {
    filepath: Option<PathBuf>,
    level: Option<String>,
}

/// `[turn]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TurnFileConfig {
    secret_key: Option<String>,
}

/// `[storage]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    db_path: Option<PathBuf>,
    media_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the signaling server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "voxrelay signaling and presence server")]
pub struct RelayCliArgs {
    /// Host/interface to bind to.
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to bind to.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Scheme clients should use to reach this server (`http` or `https`).
    #[arg(long, env = "PROTOCOL")]
    pub protocol: Option<Protocol>,

    /// Path to config file (default: `~/.config/voxrelay/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// `user_uuid` of the account provisioned with `is_admin=true` at startup.
    #[arg(long, env = "ADMIN_UUID")]
    pub admin_uuid: Option<String>,

    /// Display name of the admin account provisioned at startup.
    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    /// Maximum number of chat messages retained before oldest rows evict.
    #[arg(long, env = "MAX_CHAT_MESSAGES")]
    pub max_chat_messages: Option<usize>,

    /// File to append logs to, in addition to stderr. Unset means stderr only.
    #[arg(long, env = "LOG_FILEPATH")]
    pub log_filepath: Option<PathBuf>,

    /// Shared secret used to mint TURN credentials.
    #[arg(long, env = "TURN_SECRET_KEY")]
    pub turn_secret_key: Option<String>,

    /// Path to the SQLite database file.
    #[arg(long, env = "VOXRELAY_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory uploaded media and avatars are written to.
    #[arg(long, env = "VOXRELAY_MEDIA_DIR")]
    pub media_dir: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "VOXRELAY_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Host/interface to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Scheme clients should use to reach this server.
    pub protocol: Protocol,
    /// `user_uuid` of the admin account provisioned at startup, if any.
    pub admin_uuid: Option<String>,
    /// Display name of the admin account provisioned at startup, if any.
    pub admin_username: Option<String>,
    /// Maximum number of chat messages retained before oldest rows evict.
    pub max_chat_messages: usize,
    /// File to append logs to, in addition to stderr.
    pub log_filepath: Option<PathBuf>,
    /// Log level filter string.
    pub log_level: String,
    /// Shared secret used to mint TURN credentials.
    pub turn_secret_key: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory uploaded media and avatars are written to.
    pub media_dir: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            protocol: Protocol::Http,
            admin_uuid: None,
            admin_username: None,
            max_chat_messages: 1000,
            log_filepath: None,
            log_level: "info".to_string(),
            turn_secret_key: String::new(),
            db_path: PathBuf::from("voxrelay.db"),
            media_dir: PathBuf::from("media"),
        }
    }
}

impl RelayConfig {
    /// The address to bind the HTTP/WebSocket listener to, e.g. `0.0.0.0:9000`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicitly-named config file cannot be
    /// read or parsed.
    pub fn load(cli: &RelayCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `RelayConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &RelayCliArgs, file: &RelayConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            host: cli
                .host
                .clone()
                .or_else(|| file.server.host.clone())
                .unwrap_or(defaults.host),
            port: cli.port.or(file.server.port).unwrap_or(defaults.port),
            protocol: cli
                .protocol
                .or(file.server.protocol)
                .unwrap_or(defaults.protocol),
            admin_uuid: cli.admin_uuid.clone().or_else(|| file.admin.uuid.clone()),
            admin_username: cli
                .admin_username
                .clone()
                .or_else(|| file.admin.username.clone()),
            max_chat_messages: cli
                .max_chat_messages
                .or(file.chat.max_messages)
                .unwrap_or(defaults.max_chat_messages),
            log_filepath: cli
                .log_filepath
                .clone()
                .or_else(|| file.logging.filepath.clone()),
            log_level: cli.log_level.clone(),
            turn_secret_key: cli
                .turn_secret_key
                .clone()
                .or_else(|| file.turn.secret_key.clone())
                .unwrap_or(defaults.turn_secret_key),
            db_path: cli
                .db_path
                .clone()
                .or_else(|| file.storage.db_path.clone())
                .unwrap_or(defaults.db_path),
            media_dir: cli
                .media_dir
                .clone()
                .or_else(|| file.storage.media_dir.clone())
                .unwrap_or(defaults.media_dir),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<RelayConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(RelayConfigFile::default());
        };
        config_dir.join("voxrelay").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
