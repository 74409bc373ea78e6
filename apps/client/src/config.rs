use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STORAGE_PATH: &str = ".skillmatch/storage.json";
const DEFAULT_ALLOWED_DOMAIN: &str = "@pilani.bits-pilani.ac.in";

/// Which `KeyValueStorage` adapter backs the session cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
    Redis,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "redis" => Ok(StorageBackend::Redis),
            other => Err(anyhow!(
                "unknown storage backend '{other}' (expected memory, file or redis)"
            )),
        }
    }
}

/// What logout does to the departing user's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoutPolicy {
    /// Drop canonical document text and the identity record; keep analysis evidence.
    #[default]
    Teardown,
    /// Remove every `jm_` entry plus the legacy unscoped keys.
    FullReset,
}

impl FromStr for LogoutPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teardown" => Ok(LogoutPolicy::Teardown),
            "full_reset" | "full-reset" => Ok(LogoutPolicy::FullReset),
            other => Err(anyhow!(
                "unknown logout policy '{other}' (expected teardown or full_reset)"
            )),
        }
    }
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote analysis API, without a trailing slash.
    pub api_url: String,
    pub request_timeout: Duration,
    pub storage_backend: StorageBackend,
    pub storage_path: PathBuf,
    pub redis_url: Option<String>,
    pub storage_profile: String,
    /// `None` disables the client-side email domain check.
    pub allowed_email_domain: Option<String>,
    pub logout_policy: LogoutPolicy,
    pub rust_log: String,
}

/// In-memory storage with the stock endpoints; what embedders and tests start from.
impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            storage_backend: StorageBackend::Memory,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            redis_url: None,
            storage_profile: "default".to_string(),
            allowed_email_domain: Some(DEFAULT_ALLOWED_DOMAIN.to_string()),
            logout_policy: LogoutPolicy::Teardown,
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = var("SKILLMATCH_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();

        let timeout_secs = match var("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw
                .parse::<StorageBackend>()
                .context("invalid STORAGE_BACKEND")?,
            None => StorageBackend::File,
        };

        let redis_url = var("REDIS_URL");
        if storage_backend == StorageBackend::Redis && redis_url.is_none() {
            bail!("Required environment variable 'REDIS_URL' is not set (STORAGE_BACKEND=redis)");
        }

        let storage_profile = var("STORAGE_PROFILE").unwrap_or_else(|| "default".to_string());
        if !storage_profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!("STORAGE_PROFILE may only contain ASCII letters, digits, '-' and '_'");
        }

        // Present-but-empty disables the check, unset keeps the default.
        let allowed_email_domain = match lookup("ALLOWED_EMAIL_DOMAIN") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(raw.trim().to_ascii_lowercase()),
            None => Some(DEFAULT_ALLOWED_DOMAIN.to_string()),
        };

        let logout_policy = match var("LOGOUT_POLICY") {
            Some(raw) => raw
                .parse::<LogoutPolicy>()
                .context("invalid LOGOUT_POLICY")?,
            None => LogoutPolicy::default(),
        };

        Ok(Config {
            api_url,
            request_timeout: Duration::from_secs(timeout_secs),
            storage_backend,
            storage_path: var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH)),
            redis_url,
            storage_profile,
            allowed_email_domain,
            logout_policy,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:5000");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.storage_backend, StorageBackend::File);
        assert_eq!(config.logout_policy, LogoutPolicy::Teardown);
        assert_eq!(
            config.allowed_email_domain.as_deref(),
            Some("@pilani.bits-pilani.ac.in")
        );
    }

    #[test]
    fn test_api_url_trailing_slash_trimmed() {
        let config =
            Config::from_lookup(lookup_from(&[("SKILLMATCH_API_URL", "https://api.test/")]))
                .unwrap();
        assert_eq!(config.api_url, "https://api.test");
    }

    #[test]
    fn test_redis_backend_requires_url() {
        let err = Config::from_lookup(lookup_from(&[("STORAGE_BACKEND", "redis")])).unwrap_err();
        assert!(err.to_string().contains("REDIS_URL"));

        let config = Config::from_lookup(lookup_from(&[
            ("STORAGE_BACKEND", "Redis"),
            ("REDIS_URL", "redis://127.0.0.1/"),
        ]))
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Redis);
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("REQUEST_TIMEOUT_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("REQUEST_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn test_empty_domain_disables_check() {
        let config = Config::from_lookup(lookup_from(&[("ALLOWED_EMAIL_DOMAIN", "")])).unwrap();
        assert!(config.allowed_email_domain.is_none());
    }

    #[test]
    fn test_logout_policy_parses_both_spellings() {
        assert_eq!(
            "full-reset".parse::<LogoutPolicy>().unwrap(),
            LogoutPolicy::FullReset
        );
        assert_eq!(
            "FULL_RESET".parse::<LogoutPolicy>().unwrap(),
            LogoutPolicy::FullReset
        );
        assert!("wipe".parse::<LogoutPolicy>().is_err());
    }

    #[test]
    fn test_profile_with_glob_chars_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("STORAGE_PROFILE", "a*b")])).is_err());
    }
}
