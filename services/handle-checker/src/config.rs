//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Account tokens are loaded from `HANDLE_CHECKER_TOKEN_<ID>` env vars or a
//! per-account token_file, never stored in the TOML directly to avoid
//! leaking secrets.

use common::Secret;
use handle_pool::{CredentialState, DelayRange, Settings};
use probe::Credential;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub checker: CheckerConfig,
    pub probe: ProbeConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// Run tunables and file locations
#[derive(Debug, Deserialize)]
pub struct CheckerConfig {
    #[serde(default = "default_handles_file")]
    pub handles_file: PathBuf,
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_requeue_delay_secs")]
    pub requeue_delay_secs: u64,
    #[serde(default = "default_pacing_min_ms")]
    pub pacing_min_ms: u64,
    #[serde(default = "default_pacing_max_ms")]
    pub pacing_max_ms: u64,
    #[serde(default = "default_cooldown_jitter_min_secs")]
    pub cooldown_jitter_min_secs: u64,
    #[serde(default = "default_cooldown_jitter_max_secs")]
    pub cooldown_jitter_max_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Longest rate-limit window honoured before jitter
    #[serde(default = "default_max_cooldown_secs")]
    pub max_cooldown_secs: u64,
    /// Where to write the Prometheus text snapshot at end of run
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}

/// Availability service endpoint
#[derive(Debug, Deserialize)]
pub struct ProbeConfig {
    pub base_url: String,
    /// HTTP(S) proxy for every probe request
    #[serde(default)]
    pub proxy_url: Option<String>,
}

/// One credential in the pool
#[derive(Debug, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path to a file containing the token (alternative to the env var)
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(skip)]
    pub token: Option<Secret<String>>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            handles_file: default_handles_file(),
            output_file: default_output_file(),
            max_concurrency: default_max_concurrency(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            requeue_delay_secs: default_requeue_delay_secs(),
            pacing_min_ms: default_pacing_min_ms(),
            pacing_max_ms: default_pacing_max_ms(),
            cooldown_jitter_min_secs: default_cooldown_jitter_min_secs(),
            cooldown_jitter_max_secs: default_cooldown_jitter_max_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            max_cooldown_secs: default_max_cooldown_secs(),
            metrics_file: None,
        }
    }
}

fn default_handles_file() -> PathBuf {
    PathBuf::from("usernames.txt")
}

fn default_output_file() -> PathBuf {
    PathBuf::from("available.txt")
}

fn default_max_concurrency() -> usize {
    6
}

fn default_fetch_timeout_ms() -> u64 {
    1000
}

fn default_requeue_delay_secs() -> u64 {
    5
}

fn default_pacing_min_ms() -> u64 {
    3000
}

fn default_pacing_max_ms() -> u64 {
    6000
}

fn default_cooldown_jitter_min_secs() -> u64 {
    5
}

fn default_cooldown_jitter_max_secs() -> u64 {
    15
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_max_cooldown_secs() -> u64 {
    3600
}

fn default_enabled() -> bool {
    true
}

/// Env var holding the token for account `id`.
///
/// `account-1` → `HANDLE_CHECKER_TOKEN_ACCOUNT_1`
pub fn token_env_var(id: &str) -> String {
    let suffix: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("HANDLE_CHECKER_TOKEN_{suffix}")
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Token resolution order per account:
    /// 1. HANDLE_CHECKER_TOKEN_<ID> env var
    /// 2. token_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        for account in &mut config.accounts {
            if let Ok(token) = std::env::var(token_env_var(&account.id)) {
                account.token = Some(Secret::new(token));
            } else if let Some(ref token_file) = account.token_file {
                let token = std::fs::read_to_string(token_file).map_err(|e| {
                    common::Error::Config(format!(
                        "failed to read token_file {} for account {}: {e}",
                        token_file.display(),
                        account.id
                    ))
                })?;
                let token = token.trim().to_owned();
                if !token.is_empty() {
                    account.token = Some(Secret::new(token));
                }
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !is_http_url(&self.probe.base_url) {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.probe.base_url
            )));
        }
        if let Some(ref proxy) = self.probe.proxy_url {
            if !is_http_url(proxy) {
                return Err(common::Error::Config(format!(
                    "proxy_url must start with http:// or https://, got: {proxy}"
                )));
            }
        }

        let checker = &self.checker;
        if checker.max_concurrency == 0 {
            return Err(common::Error::Config(
                "max_concurrency must be greater than 0".into(),
            ));
        }
        if checker.fetch_timeout_ms == 0 {
            return Err(common::Error::Config(
                "fetch_timeout_ms must be greater than 0".into(),
            ));
        }
        if checker.probe_timeout_secs == 0 {
            return Err(common::Error::Config(
                "probe_timeout_secs must be greater than 0".into(),
            ));
        }
        if checker.max_cooldown_secs == 0 {
            return Err(common::Error::Config(
                "max_cooldown_secs must be greater than 0".into(),
            ));
        }
        if checker.pacing_min_ms > checker.pacing_max_ms {
            return Err(common::Error::Config(format!(
                "pacing_min_ms ({}) exceeds pacing_max_ms ({})",
                checker.pacing_min_ms, checker.pacing_max_ms
            )));
        }
        if checker.cooldown_jitter_min_secs > checker.cooldown_jitter_max_secs {
            return Err(common::Error::Config(format!(
                "cooldown_jitter_min_secs ({}) exceeds cooldown_jitter_max_secs ({})",
                checker.cooldown_jitter_min_secs, checker.cooldown_jitter_max_secs
            )));
        }

        if self.accounts.is_empty() {
            return Err(common::Error::Config(
                "at least one [[accounts]] entry is required".into(),
            ));
        }
        let mut seen = HashSet::new();
        for account in &self.accounts {
            if account.id.trim().is_empty() {
                return Err(common::Error::Config("account id must not be empty".into()));
            }
            if !seen.insert(account.id.as_str()) {
                return Err(common::Error::Config(format!(
                    "duplicate account id: {}",
                    account.id
                )));
            }
        }
        Ok(())
    }

    /// Engine tunables from the `[checker]` table.
    pub fn to_settings(&self) -> Settings {
        let c = &self.checker;
        Settings {
            max_concurrency: c.max_concurrency,
            fetch_timeout: Duration::from_millis(c.fetch_timeout_ms),
            requeue_delay: Duration::from_secs(c.requeue_delay_secs),
            pacing: DelayRange::new(
                Duration::from_millis(c.pacing_min_ms),
                Duration::from_millis(c.pacing_max_ms),
            ),
            cooldown_jitter: DelayRange::new(
                Duration::from_secs(c.cooldown_jitter_min_secs),
                Duration::from_secs(c.cooldown_jitter_max_secs),
            ),
            probe_timeout: Duration::from_secs(c.probe_timeout_secs),
            max_cooldown: Duration::from_secs(c.max_cooldown_secs),
        }
    }

    /// One credential state per configured account, in file order.
    pub fn credentials(&self) -> Vec<CredentialState> {
        self.accounts
            .iter()
            .map(|account| {
                let credential = Credential {
                    id: account.id.clone(),
                    token: account.token.clone(),
                };
                CredentialState::new(credential, account.enabled)
            })
            .collect()
    }

    /// Resolve config file path from CLI arg or HANDLE_CHECKER_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("HANDLE_CHECKER_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("handle-checker.toml")
    }
}
