use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub forum: ForumConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Accounts are restricted to emails ending in this domain suffix.
    pub email_domain: String,
    /// Shared key that grants read-only access to public endpoints.
    pub anon_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumConfig {
    /// Messages older than this are hidden and purged.
    pub retention_minutes: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/campus_rate.db?mode=rwc".to_string()),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            auth: AuthConfig {
                email_domain: env::var("STUDENT_EMAIL_DOMAIN")
                    .unwrap_or_else(|_| "@my.unt.edu".to_string()),
                anon_key: env::var("ANON_KEY").unwrap_or_default(),
            },
            forum: ForumConfig {
                retention_minutes: env::var("FORUM_RETENTION_MINUTES")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()
                    .unwrap_or(120),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
