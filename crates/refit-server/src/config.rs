use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub production_db_path: Option<PathBuf>,
    pub jwt_secret: String,
    pub admin_enabled: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("REFIT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("REFIT_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port = match lookup("REFIT_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("REFIT_PORT must be a port number, got '{raw}'"))?,
            None => 3000,
        };

        let admin_enabled = match lookup("REFIT_ADMIN_ENABLED").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => bail!("REFIT_ADMIN_ENABLED must be true or false, got '{other}'"),
        };

        Ok(Self {
            host: lookup("REFIT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: lookup("REFIT_DB_PATH").unwrap_or_else(|| "refit.db".into()).into(),
            production_db_path: lookup("REFIT_DB_PATH_PRODUCTION")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            jwt_secret,
            admin_enabled,
        })
    }
}
