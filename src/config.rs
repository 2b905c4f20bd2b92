use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo
    pub owner_id: Option<u64>, // Sin cooldown

    // Lavalink
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,
    pub lavalink_ssl: bool,
    pub lavalink_max_reconnects: u32,
    pub search_prefix: String,

    // Sesiones
    pub default_volume: u16,
    pub queue_wait_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_track_length: Duration,

    // Límites
    pub cooldown: Duration,
    pub premium_cooldown: Duration,

    // Paths
    pub data_dir: PathBuf,
    pub track_log_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let data_dir: PathBuf = std::env::var("DATA_DIR")
            .unwrap_or_else(|_| "/app/data".to_string())
            .into();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),
            owner_id: std::env::var("OWNER_ID").ok().and_then(|s| s.parse().ok()),

            // Lavalink
            lavalink_host: std::env::var("LAVALINK_HOST")
                .unwrap_or_else(|_| defaults.lavalink_host.clone()),
            lavalink_port: std::env::var("LAVALINK_PORT")
                .unwrap_or_else(|_| "2333".to_string())
                .parse()?,
            lavalink_password: std::env::var("LAVALINK_PASSWORD")
                .unwrap_or_else(|_| defaults.lavalink_password.clone()),
            lavalink_ssl: std::env::var("LAVALINK_SSL")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            lavalink_max_reconnects: std::env::var("LAVALINK_MAX_RECONNECTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            search_prefix: std::env::var("SEARCH_PREFIX")
                .unwrap_or_else(|_| defaults.search_prefix.clone()),

            // Sesiones
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            queue_wait_timeout: env_duration("QUEUE_WAIT_TIMEOUT", "5m")?,
            connect_timeout: env_duration("CONNECT_TIMEOUT", "10s")?,
            max_track_length: env_duration("MAX_TRACK_LENGTH", "24h")?,

            // Límites
            cooldown: env_duration("COMMAND_COOLDOWN", "5s")?,
            premium_cooldown: env_duration("PREMIUM_COOLDOWN", "2s")?,

            // Paths
            track_log_dir: std::env::var("TRACK_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("logs").join("tracks")),
            data_dir,
        };

        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.track_log_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Default volume must be between 0 and 1000 (Lavalink range)
    /// - Timeouts must be non-zero
    /// - The Lavalink port and search prefix must be set
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 1000 {
            anyhow::bail!("Default volume must be between 0 and 1000, got: {}", self.default_volume);
        }

        if self.lavalink_port == 0 {
            anyhow::bail!("Lavalink port must be greater than 0");
        }

        if self.search_prefix.trim().is_empty() {
            anyhow::bail!("Search prefix cannot be empty");
        }

        if self.queue_wait_timeout.is_zero() || self.connect_timeout.is_zero() {
            anyhow::bail!("Session timeouts must be greater than 0");
        }

        if self.max_track_length.is_zero() {
            anyhow::bail!("Max track length must be greater than 0");
        }

        Ok(())
    }

    /// URL base para la API REST del nodo
    pub fn lavalink_http_url(&self) -> String {
        let scheme = if self.lavalink_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.lavalink_host, self.lavalink_port)
    }

    /// URL del websocket de eventos del nodo
    pub fn lavalink_ws_url(&self) -> String {
        let scheme = if self.lavalink_ssl { "wss" } else { "ws" };
        format!("{}://{}:{}/v4/websocket", scheme, self.lavalink_host, self.lavalink_port)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and passwords are never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Lavalink: {}\n  \
            Sessions: {} vol, {} wait, {} connect, {} max track\n  \
            Cooldown: {} ({} premium)",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.lavalink_http_url(),
            self.default_volume,
            humantime::format_duration(self.queue_wait_timeout),
            humantime::format_duration(self.connect_timeout),
            humantime::format_duration(self.max_track_length),
            humantime::format_duration(self.cooldown),
            humantime::format_duration(self.premium_cooldown),
        )
    }
}

fn env_duration(key: &str, default: &str) -> Result<Duration> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    humantime::parse_duration(&raw)
        .map_err(|e| anyhow::anyhow!("{} inválido ({}): {}", key, raw, e))
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            owner_id: None,

            lavalink_host: "localhost".to_string(),
            lavalink_port: 2333,
            lavalink_password: "youshallnotpass".to_string(),
            lavalink_ssl: false,
            lavalink_max_reconnects: 10,
            search_prefix: "ytsearch".to_string(),

            default_volume: 100,
            queue_wait_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            max_track_length: Duration::from_secs(24 * 60 * 60),

            cooldown: Duration::from_secs(5),
            premium_cooldown: Duration::from_secs(2),

            data_dir: "/app/data".into(),
            track_log_dir: "/app/data/logs/tracks".into(),
        }
    }
}
