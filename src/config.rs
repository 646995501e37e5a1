use std::{env, net::SocketAddr};

use url::Url;

use crate::error::AppError;

/// Process-wide configuration, read once at startup. Base URLs and mail
/// credentials are required: a missing value aborts startup instead of
/// failing individual requests later.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub api_base_url: String,
    pub web_base_url: String,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub sender: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://planner.db".to_string());

        let port: u16 = require_var("PORT")?
            .parse()
            .map_err(|err| AppError::Config(format!("invalid PORT: {err}")))?;
        let listen_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let api_base_url = base_url(&require_var("API_BASE_URL")?, "API_BASE_URL")?;
        let web_base_url = base_url(&require_var("WEB_BASE_URL")?, "WEB_BASE_URL")?;

        let smtp_port = match env::var("SMTP_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|err| AppError::Config(format!("invalid SMTP_PORT: {err}")))?,
            Err(_) => 587,
        };

        let mail = MailConfig {
            smtp_host: require_var("SMTP_HOST")?,
            smtp_port,
            smtp_username: require_var("SMTP_USERNAME")?,
            smtp_password: require_var("SMTP_PASSWORD")?,
            sender: env::var("MAIL_SENDER")
                .unwrap_or_else(|_| "Trip Planner <team@planner.dev>".to_string()),
        };

        Ok(Self {
            database_url,
            listen_addr,
            api_base_url,
            web_base_url,
            mail,
        })
    }
}

fn require_var(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Config(format!("missing required env var {name}")))
}

fn base_url(raw: &str, name: &str) -> Result<String, AppError> {
    Url::parse(raw).map_err(|err| AppError::Config(format!("invalid {name}: {err}")))?;
    Ok(raw.trim_end_matches('/').to_string())
}
