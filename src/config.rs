use anyhow::{Context, Result};
use secrecy::SecretBox;
use serde::Deserialize;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub uploads: UploadConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    pub secret_key: SecretBox<String>,
    pub access_token_expire_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_file_size: usize,
    /// Lowercase, without the leading dot.
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: Environment,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Server configuration
        let host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .context("Failed to parse SERVER_HOST")?;

        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("Failed to parse SERVER_PORT")?;

        // Database configuration
        let db_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let db_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(val) => Some(val.parse().context("Failed to parse DATABASE_MAX_CONNECTIONS")?),
            Err(_) => Some(10),
        };
        let db_min_connections = match env::var("DATABASE_MIN_CONNECTIONS") {
            Ok(val) => Some(val.parse().context("Failed to parse DATABASE_MIN_CONNECTIONS")?),
            Err(_) => Some(1),
        };

        // Token signing
        let secret_key = env::var("SECRET_KEY").context("SECRET_KEY must be set")?;
        let access_token_expire_minutes = env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<i64>()
            .context("Failed to parse ACCESS_TOKEN_EXPIRE_MINUTES")?;

        // File uploads
        let upload_dir = env::var("UPLOAD_FOLDER").unwrap_or_else(|_| "./uploads".to_string());
        let max_file_size = env::var("MAX_FILE_SIZE")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse::<usize>()
            .context("Failed to parse MAX_FILE_SIZE")?;
        let allowed_extensions = parse_extensions(
            &env::var("ALLOWED_EXTENSIONS").unwrap_or_else(|_| "pdf,jpg,jpeg,png".to_string()),
        );

        // App configuration
        let environment = env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .parse::<Environment>()
            .unwrap_or_default();
        let app_name =
            env::var("APP_NAME").unwrap_or_else(|_| "SSO Document Management".to_string());
        let api_prefix = env::var("API_V1_PREFIX").unwrap_or_else(|_| "/api/v1".to_string());
        let cors_origins = parse_list(
            &env::var("BACKEND_CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        );

        Ok(Config {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: db_url,
                max_connections: db_max_connections,
                min_connections: db_min_connections,
            },
            auth: AuthConfig {
                secret_key: SecretBox::new(Box::new(secret_key)),
                access_token_expire_minutes,
            },
            uploads: UploadConfig {
                dir: PathBuf::from(upload_dir),
                max_file_size,
                allowed_extensions,
            },
            app: AppConfig {
                name: app_name,
                environment,
                api_prefix,
                cors_origins,
            },
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    pub fn is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_extensions(raw: &str) -> Vec<String> {
    parse_list(raw)
        .into_iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect()
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" => Ok(Environment::Development),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

use once_cell::sync::OnceCell;

static CONFIG: OnceCell<Config> = OnceCell::new();

pub fn init() -> Result<&'static Config> {
    CONFIG.get_or_try_init(Config::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_normalized() {
        assert_eq!(
            parse_extensions(" .PDF, jpg,,.Png "),
            vec!["pdf".to_string(), "jpg".to_string(), "png".to_string()]
        );
    }

    #[test]
    fn unknown_environment_is_rejected() {
        assert_eq!("Staging".parse::<Environment>(), Ok(Environment::Staging));
        assert!("qa".parse::<Environment>().is_err());
    }
}
