//! PostgreSQL connection configuration.

use std::time::Duration;

use crate::error::{PgError, PgResult};

/// Environment variable read by [`PgConfig::from_env`].
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const DEFAULT_PORT: u16 = 5432;
const DEFAULT_USER: &str = "postgres";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PgConfig {
    /// Host.
    pub host: String,
    /// Port (default: 5432).
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Username (default: postgres).
    pub user: String,
    /// Password.
    pub password: Option<String>,
    /// SSL mode.
    pub ssl_mode: SslMode,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Application name (shown in pg_stat_activity).
    pub application_name: Option<String>,
}

/// SSL mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Disable SSL.
    Disable,
    /// Prefer SSL but allow non-SSL.
    #[default]
    Prefer,
    /// Require SSL.
    Require,
}

impl SslMode {
    fn parse(value: &str) -> PgResult<Self> {
        match value {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            other => Err(PgError::config(format!("invalid sslmode: {}", other))),
        }
    }

    fn to_driver(self) -> tokio_postgres::config::SslMode {
        match self {
            Self::Disable => tokio_postgres::config::SslMode::Disable,
            Self::Prefer => tokio_postgres::config::SslMode::Prefer,
            Self::Require => tokio_postgres::config::SslMode::Require,
        }
    }
}

impl PgConfig {
    /// Parse a `postgres://` or `postgresql://` URL.
    ///
    /// Recognized query parameters are `sslmode`, `connect_timeout` (seconds)
    /// and `application_name`; anything else is rejected.
    pub fn from_url(url: &str) -> PgResult<Self> {
        let parsed =
            url::Url::parse(url).map_err(|e| PgError::config(format!("invalid database URL: {}", e)))?;

        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(PgError::config(format!(
                "invalid scheme: expected 'postgresql' or 'postgres', got '{}'",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| PgError::config("missing host in URL"))?
            .to_string();

        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(PgError::config("missing database name in URL"));
        }

        let mut config = Self {
            host,
            port: parsed.port().unwrap_or(DEFAULT_PORT),
            database,
            user: match parsed.username() {
                "" => DEFAULT_USER.to_string(),
                user => user.to_string(),
            },
            password: parsed.password().map(String::from),
            ssl_mode: SslMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            application_name: None,
        };

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "sslmode" => config.ssl_mode = SslMode::parse(&value)?,
                "connect_timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| PgError::config(format!("invalid connect_timeout: {}", value)))?;
                    config.connect_timeout = Duration::from_secs(secs);
                }
                "application_name" => config.application_name = Some(value.into_owned()),
                other => {
                    return Err(PgError::config(format!("unsupported URL parameter: {}", other)));
                }
            }
        }

        Ok(config)
    }

    /// Read the URL from `DATABASE_URL`.
    pub fn from_env() -> PgResult<Self> {
        let url = std::env::var(DATABASE_URL_ENV)
            .map_err(|_| PgError::config(format!("{} is not set", DATABASE_URL_ENV)))?;
        Self::from_url(&url)
    }

    /// Create a builder for configuration.
    pub fn builder() -> PgConfigBuilder {
        PgConfigBuilder::new()
    }

    /// The connection URL with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        format!(
            "postgresql://{}{}@{}:{}/{}",
            self.user,
            if self.password.is_some() { ":***" } else { "" },
            self.host,
            self.port,
            self.database
        )
    }

    /// Convert to a tokio-postgres config.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .ssl_mode(self.ssl_mode.to_driver())
            .connect_timeout(self.connect_timeout);

        if let Some(ref password) = self.password {
            config.password(password);
        }
        if let Some(ref name) = self.application_name {
            config.application_name(name);
        }
        config
    }
}

/// Builder for PostgreSQL configuration.
///
/// Explicit values override whatever the URL provided.
#[derive(Debug, Default)]
pub struct PgConfigBuilder {
    url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    ssl_mode: Option<SslMode>,
    connect_timeout: Option<Duration>,
    application_name: Option<String>,
}

impl PgConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a database URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the SSL mode.
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = Some(mode);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> PgResult<PgConfig> {
        let mut config = match self.url {
            Some(ref url) => PgConfig::from_url(url)?,
            None => PgConfig {
                host: "localhost".to_string(),
                port: DEFAULT_PORT,
                database: String::new(),
                user: DEFAULT_USER.to_string(),
                password: None,
                ssl_mode: SslMode::default(),
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                application_name: None,
            },
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(user) = self.user {
            config.user = user;
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
        if let Some(ssl_mode) = self.ssl_mode {
            config.ssl_mode = ssl_mode;
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout = timeout;
        }
        if let Some(name) = self.application_name {
            config.application_name = Some(name);
        }

        if config.database.is_empty() {
            return Err(PgError::config("database name is required"));
        }
        Ok(config)
    }
}
