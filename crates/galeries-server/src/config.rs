use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use galeries_api::tokens::TokenKeys;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// How tokens are signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtConfig {
    /// RS256 with PEM files on disk.
    KeyPair { private_key: PathBuf, public_key: PathBuf },
    /// HS256 with a shared secret. Local development only.
    Secret(String),
}

impl JwtConfig {
    pub fn load_keys(&self) -> Result<TokenKeys> {
        match self {
            Self::KeyPair { private_key, public_key } => {
                let private_pem = std::fs::read(private_key)
                    .with_context(|| format!("reading JWT private key {}", private_key.display()))?;
                let public_pem = std::fs::read(public_key)
                    .with_context(|| format!("reading JWT public key {}", public_key.display()))?;
                TokenKeys::from_rsa_pem(&private_pem, &public_pem)
            }
            Self::Secret(secret) => Ok(TokenKeys::from_secret(secret.as_bytes())),
        }
    }
}

/// Credentials of the superAdmin created on first boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt: JwtConfig,
    pub secure_cookies: bool,
    pub admin: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("GALERIES_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("GALERIES_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("GALERIES_PORT must be a port number")?;
        let db_path: PathBuf = var("GALERIES_DB_PATH").unwrap_or_else(|| "galeries.db".into()).into();

        let jwt = match (var("GALERIES_JWT_PRIVATE_KEY"), var("GALERIES_JWT_PUBLIC_KEY")) {
            (Some(private_key), Some(public_key)) => JwtConfig::KeyPair {
                private_key: private_key.into(),
                public_key: public_key.into(),
            },
            (Some(_), None) | (None, Some(_)) => {
                bail!("GALERIES_JWT_PRIVATE_KEY and GALERIES_JWT_PUBLIC_KEY must be set together")
            }
            (None, None) => {
                let secret = var("GALERIES_JWT_SECRET").unwrap_or_default();
                if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
                    bail!("no JWT key pair configured and GALERIES_JWT_SECRET is unset or still a placeholder");
                }
                JwtConfig::Secret(secret)
            }
        };

        let secure_cookies = match var("GALERIES_SECURE_COOKIES") {
            Some(v) => parse_bool(&v).context("GALERIES_SECURE_COOKIES must be true or false")?,
            None => true,
        };

        let admin = match (
            var("GALERIES_ADMIN_USER_NAME"),
            var("GALERIES_ADMIN_EMAIL"),
            var("GALERIES_ADMIN_PASSWORD"),
        ) {
            (Some(user_name), Some(email), Some(password)) => Some(AdminSeed { user_name, email, password }),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            db_path,
            jwt,
            secure_cookies,
            admin,
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_with_dev_secret() {
        let config = config(&[("GALERIES_JWT_SECRET", "a-real-random-secret")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("galeries.db"));
        assert_eq!(config.jwt, JwtConfig::Secret("a-real-random-secret".into()));
        assert!(config.secure_cookies);
        assert!(config.admin.is_none());
    }

    #[test]
    fn placeholder_secret_is_fatal() {
        assert!(config(&[]).is_err());
        assert!(config(&[("GALERIES_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn key_pair_takes_precedence() {
        let pair = config(&[
            ("GALERIES_JWT_PRIVATE_KEY", "/keys/private.pem"),
            ("GALERIES_JWT_PUBLIC_KEY", "/keys/public.pem"),
            ("GALERIES_JWT_SECRET", "dev-secret-change-me"),
        ])
        .unwrap();
        assert!(matches!(pair.jwt, JwtConfig::KeyPair { .. }));

        assert!(config(&[("GALERIES_JWT_PRIVATE_KEY", "/keys/private.pem")]).is_err());
    }

    #[test]
    fn admin_seed_needs_all_three_values() {
        let partial = config(&[
            ("GALERIES_JWT_SECRET", "a-real-random-secret"),
            ("GALERIES_ADMIN_USER_NAME", "root"),
        ])
        .unwrap();
        assert!(partial.admin.is_none());

        let full = config(&[
            ("GALERIES_JWT_SECRET", "a-real-random-secret"),
            ("GALERIES_ADMIN_USER_NAME", "root"),
            ("GALERIES_ADMIN_EMAIL", "root@galeries.app"),
            ("GALERIES_ADMIN_PASSWORD", "Sup3rSecret"),
            ("GALERIES_SECURE_COOKIES", "false"),
        ])
        .unwrap();
        assert_eq!(full.admin.unwrap().user_name, "root");
        assert!(!full.secure_cookies);
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config(&[("GALERIES_JWT_SECRET", "a-real-random-secret"), ("GALERIES_PORT", "http")]).is_err());
    }
}
