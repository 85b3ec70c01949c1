use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub bootstrap: BootstrapConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS (the scheduling front-end).
    pub frontend_url: String,
    /// Requests still running after this many seconds get a 408.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for auth endpoints
    pub auth_per_second: u32,
    /// Burst size for auth endpoints
    pub auth_burst: u32,
}

/// Administrator account created at start-up when the employee table is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_password: Option<String>,
    pub admin_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Color used for new shifts when the caller sends none and the status
    /// has no color of its own.
    pub default_shift_color: String,
    /// Upper bound on the number of days a bulk range operation may span.
    pub max_range_days: i64,
    /// Whether template apply writes all rows in one transaction by default.
    pub template_apply_atomic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<LogFormat> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" | "" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string()))?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/scheduling.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .unwrap_or(24),
            },
            security: SecurityConfig {
                bcrypt_cost: env::var("BCRYPT_COST")
                    .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("BCRYPT_COST".to_string()))?,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: env::var("RATE_LIMIT_AUTH_PER_SECOND")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                auth_burst: env::var("RATE_LIMIT_AUTH_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            bootstrap: BootstrapConfig {
                admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
                admin_password: env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty()),
                admin_email: env::var("ADMIN_EMAIL")
                    .unwrap_or_else(|_| "admin@company.com".to_string()),
            },
            schedule: ScheduleConfig {
                default_shift_color: env::var("DEFAULT_SHIFT_COLOR")
                    .unwrap_or_else(|_| "#007bff".to_string()),
                max_range_days: env::var("MAX_RANGE_DAYS")
                    .unwrap_or_else(|_| "366".to_string())
                    .parse()
                    .unwrap_or(366),
                template_apply_atomic: env::var("TEMPLATE_APPLY_ATOMIC")
                    .ok()
                    .and_then(|v| parse_bool(&v))
                    .unwrap_or(false),
            },
            logging: LoggingConfig {
                format: match env::var("LOG_FORMAT") {
                    Ok(v) => LogFormat::parse(&v)
                        .ok_or_else(|| ConfigError::InvalidValue("LOG_FORMAT".to_string()))?,
                    Err(_) => LogFormat::default(),
                },
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
                request_timeout_secs: 30,
            },
            database: DatabaseConfig {
                url: "sqlite://data/scheduling.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 24,
            },
            security: SecurityConfig {
                bcrypt_cost: bcrypt::DEFAULT_COST,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
            },
            bootstrap: BootstrapConfig {
                admin_username: "admin".to_string(),
                admin_password: None,
                admin_email: "admin@company.com".to_string(),
            },
            schedule: ScheduleConfig {
                default_shift_color: "#007bff".to_string(),
                max_range_days: 366,
                template_apply_atomic: false,
            },
            logging: LoggingConfig {
                format: LogFormat::default(),
            },
        }
    }
}
