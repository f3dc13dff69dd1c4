use crate::error::RelayError;
use figment::{Figment, providers::{Env, Format, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub erp: ErpConfig,
}

/// Inbound device listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_listen_addr")]
    pub addr: String,
    /// Upper bound for reading one full request (head + body).
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// Largest `Content-Length` accepted on a data push.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Append-only raw exchange log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_path")]
    pub path: PathBuf,
}

/// Downstream ERP forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    #[serde(default = "default_erp_timeout")]
    pub timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_listen_addr() -> String { "0.0.0.0:5000".into() }
fn default_read_timeout() -> u64 { 30_000 }
fn default_max_header_bytes() -> usize { 16 * 1024 }
fn default_max_body_bytes() -> usize { 16 * 1024 * 1024 }
fn default_journal_path() -> PathBuf { PathBuf::from("zkteco_raw.log") }
fn default_erp_timeout() -> u64 { 15_000 }

// ── Impls ─────────────────────────────────────────────────────

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            addr: default_listen_addr(),
            read_timeout_ms: default_read_timeout(),
            max_header_bytes: default_max_header_bytes(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { path: default_journal_path() }
    }
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            api_key: None,
            api_secret: None,
            timeout_ms: default_erp_timeout(),
        }
    }
}

impl ErpConfig {
    /// Basic-auth pair, present only when a non-empty key is configured.
    /// A missing secret is sent as an empty password.
    pub fn credentials(&self) -> Option<(String, String)> {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Some((
                key.to_string(),
                self.api_secret.clone().unwrap_or_default(),
            )),
            _ => None,
        }
    }
}

impl RelayConfig {
    /// Load configuration from YAML file + env overrides.
    ///
    /// Environment variables use the `ICLOCK_` prefix and `__` as the
    /// nesting separator, e.g. `ICLOCK_ERP__API_KEY`. A missing file is
    /// treated as empty so defaults and env still apply.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: RelayConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("ICLOCK_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the relay cannot serve with.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.erp.enabled && self.erp.url.trim().is_empty() {
            return Err(RelayError::Config(
                "erp.enabled is set but erp.url is empty".into(),
            ));
        }
        if self.listener.max_header_bytes == 0 {
            return Err(RelayError::Config(
                "listener.max_header_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Replace the port of `listener.addr`, keeping its host part.
    pub fn set_listen_port(&mut self, port: u16) {
        let host = match self.listener.addr.rsplit_once(':') {
            Some((host, _)) if !host.is_empty() => host.to_string(),
            _ => "0.0.0.0".to_string(),
        };
        self.listener.addr = format!("{host}:{port}");
    }
}
