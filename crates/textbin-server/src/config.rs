use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub environment: String,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub store_timeout: Duration,
    pub request_timeout: Duration,
    pub cleanup_interval: Duration,
}

impl Config {
    /// Reads `TEXTBIN_*` variables. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = get("TEXTBIN_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TEXTBIN_JWT_SECRET is unset or still a placeholder");
        }

        let host = get("TEXTBIN_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&get, "TEXTBIN_PORT", 4000)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            addr,
            environment: get("TEXTBIN_ENV").unwrap_or_else(|| "development".into()),
            db_path: get("TEXTBIN_DB_PATH").unwrap_or_else(|| "textbin.db".into()).into(),
            jwt_secret,
            store_timeout: Duration::from_millis(parse_or(&get, "TEXTBIN_STORE_TIMEOUT_MS", 3000)?),
            request_timeout: Duration::from_secs(parse_or(&get, "TEXTBIN_REQUEST_TIMEOUT_SECS", 10)?),
            cleanup_interval: Duration::from_secs(parse_or(&get, "TEXTBIN_CLEANUP_INTERVAL_SECS", 3600)?),
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.parse().with_context(|| format!("{} is not valid: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("TEXTBIN_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.addr.port(), 4000);
        assert_eq!(cfg.environment, "development");
        assert_eq!(cfg.db_path, PathBuf::from("textbin.db"));
        assert_eq!(cfg.store_timeout, Duration::from_secs(3));
        assert_eq!(cfg.cleanup_interval, Duration::from_secs(3600));
    }

    #[test]
    fn placeholder_secret_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("TEXTBIN_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let cfg = config(&[
            ("TEXTBIN_JWT_SECRET", "s3cret"),
            ("TEXTBIN_HOST", "127.0.0.1"),
            ("TEXTBIN_PORT", "8080"),
            ("TEXTBIN_STORE_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(cfg.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(cfg.store_timeout, Duration::from_millis(250));

        assert!(config(&[("TEXTBIN_JWT_SECRET", "s3cret"), ("TEXTBIN_PORT", "http")]).is_err());
    }
}
