use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_AUTH_SECRET: &str = "change_me";

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub model: ModelConfig,
    pub storage: StorageConfig,
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

        let secret =
            env::var("APP_AUTH_SECRET").unwrap_or_else(|_| DEFAULT_AUTH_SECRET.to_string());
        if environment == AppEnvironment::Production
            && (secret.trim().is_empty() || secret == DEFAULT_AUTH_SECRET)
        {
            return Err(ConfigError::InsecureSecret);
        }
        let access_token_ttl_minutes = env::var("APP_ACCESS_TOKEN_TTL_MIN")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<i64>()
            .ok()
            .filter(|minutes| *minutes > 0)
            .ok_or(ConfigError::InvalidTokenTtl)?;

        let model_path = env::var("APP_MODEL_PATH")
            .unwrap_or_else(|_| "models/heart_risk_model.json".to_string());
        let model_version = env::var("APP_MODEL_VERSION").unwrap_or_else(|_| "v1.0".to_string());
        let default_threshold = env::var("APP_DEFAULT_THRESHOLD")
            .unwrap_or_else(|_| "0.5".to_string())
            .parse::<f64>()
            .ok()
            .filter(|threshold| (0.0..=1.0).contains(threshold))
            .ok_or(ConfigError::InvalidThreshold)?;

        let database_path = env::var("APP_DATABASE_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            auth: AuthConfig {
                secret,
                access_token_ttl_minutes,
            },
            model: ModelConfig {
                path: PathBuf::from(model_path),
                version: model_version,
                default_threshold,
            },
            storage: StorageConfig { database_path },
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
}

/// Token signing settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub access_token_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .finish()
    }
}

/// Location and metadata of the scoring model artifact.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub version: String,
    pub default_threshold: f64,
}

/// `database_path` unset keeps users and history in memory.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTokenTtl,
    InvalidThreshold,
    InsecureSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTokenTtl => {
                write!(f, "APP_ACCESS_TOKEN_TTL_MIN must be a positive number of minutes")
            }
            ConfigError::InvalidThreshold => {
                write!(f, "APP_DEFAULT_THRESHOLD must be a number between 0 and 1")
            }
            ConfigError::InsecureSecret => {
                write!(f, "APP_AUTH_SECRET must be set to a non-default value in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidTokenTtl
            | ConfigError::InvalidThreshold
            | ConfigError::InsecureSecret => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_AUTH_SECRET",
            "APP_ACCESS_TOKEN_TTL_MIN",
            "APP_MODEL_PATH",
            "APP_MODEL_VERSION",
            "APP_DEFAULT_THRESHOLD",
            "APP_DATABASE_PATH",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.auth.access_token_ttl_minutes, 60);
        assert_eq!(
            config.model.path,
            PathBuf::from("models/heart_risk_model.json")
        );
        assert_eq!(config.model.version, "v1.0");
        assert_eq!(config.model.default_threshold, 0.5);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn production_rejects_default_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InsecureSecret)
        ));

        env::set_var("APP_AUTH_SECRET", "a-real-deployment-secret");
        let config = AppConfig::load().expect("custom secret accepted");
        assert_eq!(config.environment, AppEnvironment::Production);
        reset_env();
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_DEFAULT_THRESHOLD", "1.5");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidThreshold)
        ));
        reset_env();
    }

    #[test]
    fn non_positive_token_ttl_is_rejected() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ACCESS_TOKEN_TTL_MIN", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidTokenTtl)
        ));
        reset_env();
    }

    #[test]
    fn database_path_enables_sqlite_storage() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_DATABASE_PATH", "data/cardio.sqlite");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.storage.database_path,
            Some(PathBuf::from("data/cardio.sqlite"))
        );
        reset_env();
    }
}
