use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use swopp_core::{DEFAULT_MAX_IMAGE_BYTES, Policy};

/// Secrets that ship in sample env files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub image_dir: PathBuf,
    pub public_reads: bool,
    pub token_ttl: chrono::Duration,
    pub admin: Option<(String, String)>,
    pub policy: Policy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup so tests need not touch the process env.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("SWOPP_JWT_SECRET").context("SWOPP_JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            bail!("SWOPP_JWT_SECRET is a placeholder, set a real secret");
        }

        let host = get("SWOPP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&get, "SWOPP_PORT", 3000)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", host, port))?;

        let ttl_hours: i64 = parse_or(&get, "SWOPP_TOKEN_TTL_HOURS", 720)?;
        if ttl_hours <= 0 {
            bail!("SWOPP_TOKEN_TTL_HOURS must be positive");
        }

        let admin = match (get("SWOPP_ADMIN_EMAIL"), get("SWOPP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some((email, password)),
            (None, None) => None,
            _ => bail!("SWOPP_ADMIN_EMAIL and SWOPP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            jwt_secret,
            db_path: get("SWOPP_DB_PATH").unwrap_or_else(|| "swopp.db".into()).into(),
            addr,
            image_dir: get("SWOPP_IMAGE_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            public_reads: parse_or(&get, "SWOPP_PUBLIC_READS", true)?,
            token_ttl: chrono::Duration::hours(ttl_hours),
            admin,
            policy: Policy {
                accepted_withdrawal: parse_or(&get, "SWOPP_ACCEPTED_WITHDRAWAL", false)?,
                max_image_bytes: parse_or(&get, "SWOPP_MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
            },
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}='{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
