use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Largest accepted request body, in KB of compact JSON
    pub max_body_kb: usize,
    pub enable_request_logging: bool,
    /// Create a unique index on `users.username` at startup
    pub unique_usernames: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub name: Option<String>,
    pub connection_string: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    pub socket_timeout_ms: u64,
    pub max_idle_ms: u64,
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }
}

/// Outbound client timeouts. No outbound client exists yet; these are reported at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub connect_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("PORT").or_else(|_| env::var("APP_PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // API overrides
        if let Ok(v) = env::var("API_MAX_BODY_KB") {
            self.api.max_body_kb = v.parse().unwrap_or(self.api.max_body_kb);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_UNIQUE_USERNAMES") {
            self.api.unique_usernames = v.parse().unwrap_or(self.api.unique_usernames);
        }

        // Database overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.database.backend = v.parse().unwrap_or(self.database.backend);
        }
        if let Ok(v) = env::var("DB_NAME") {
            self.database.name = Some(v);
        }
        if let Ok(v) = env::var("DB_CON_STRING") {
            self.database.connection_string = Some(v);
        }
        if let Ok(v) = env::var("DB_USERNAME") {
            self.database.username = Some(v);
        }
        if let Ok(v) = env::var("DB_PASSWORD") {
            self.database.password = Some(v);
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DB_CONNECT_TIMEOUT_MS") {
            self.database.connect_timeout_ms = v.parse().unwrap_or(self.database.connect_timeout_ms);
        }
        if let Ok(v) = env::var("DB_SOCKET_TIMEOUT_MS") {
            self.database.socket_timeout_ms = v.parse().unwrap_or(self.database.socket_timeout_ms);
        }
        if let Ok(v) = env::var("DB_MAX_IDLE_MS") {
            self.database.max_idle_ms = v.parse().unwrap_or(self.database.max_idle_ms);
        }

        // Network overrides
        if let Ok(v) = env::var("NET_CONNECT_TIMEOUT_MS") {
            self.network.connect_timeout_ms = v.parse().unwrap_or(self.network.connect_timeout_ms);
        }
        if let Ok(v) = env::var("NET_CALL_TIMEOUT_MS") {
            self.network.call_timeout_ms = v.parse().unwrap_or(self.network.call_timeout_ms);
        }
        if let Ok(v) = env::var("NET_READ_TIMEOUT_MS") {
            self.network.read_timeout_ms = v.parse().unwrap_or(self.network.read_timeout_ms);
        }
        if let Ok(v) = env::var("NET_WRITE_TIMEOUT_MS") {
            self.network.write_timeout_ms = v.parse().unwrap_or(self.network.write_timeout_ms);
        }

        self
    }

    fn base(environment: Environment, backend: StoreBackend) -> Self {
        Self {
            environment,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8001,
            },
            api: ApiConfig {
                max_body_kb: 6,
                enable_request_logging: true,
                unique_usernames: false,
            },
            database: DatabaseConfig {
                backend,
                name: None,
                connection_string: None,
                username: None,
                password: None,
                max_connections: 10,
                connect_timeout_ms: 5_000,
                socket_timeout_ms: 5_000,
                max_idle_ms: 90_000,
            },
            network: NetworkConfig {
                connect_timeout_ms: 50_000,
                call_timeout_ms: 30_000,
                read_timeout_ms: 20_000,
                write_timeout_ms: 15_000,
            },
        }
    }

    fn development() -> Self {
        Self::base(Environment::Development, StoreBackend::Memory)
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging, StoreBackend::Postgres);
        config.database.max_connections = 20;
        config.api.unique_usernames = true;
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production, StoreBackend::Postgres);
        config.database.max_connections = 50;
        config.api.enable_request_logging = false;
        config.api.unique_usernames = true;
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
