//! One-shot POST of a device payload to the ERP.
//!
//! Any completed HTTP exchange counts as delivered, whatever the status;
//! only transport faults (timeout, refused connection, bad URL) are
//! failures. There is never a second attempt.

use iclock_core::RelayError;
use iclock_core::config::ErpConfig;
use std::error::Error as _;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The ERP answered with this status code.
    Success(u16),
    /// Transport-level failure description.
    Failure(String),
}

impl fmt::Display for ForwardOutcome {
    /// Journal rendering of the outcome.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardOutcome::Success(status) => write!(f, "Forwarded to the ERP -> {status}"),
            ForwardOutcome::Failure(reason) => write!(f, "ERROR forwarding to the ERP: {reason}"),
        }
    }
}

pub struct ErpForwarder {
    client: reqwest::Client,
    url: String,
    credentials: Option<(String, String)>,
}

impl ErpForwarder {
    pub fn new(config: &ErpConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RelayError::Config(format!("ERP client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            credentials: config.credentials(),
        })
    }

    /// Send `payload` verbatim. `SN` is added to the query only when known.
    pub async fn forward(&self, payload: Vec<u8>, sn: &str) -> ForwardOutcome {
        let mut req = self
            .client
            .post(&self.url)
            .header("Content-Type", "text/plain")
            .body(payload);
        if !sn.is_empty() {
            req = req.query(&[("SN", sn)]);
        }
        if let Some((key, secret)) = &self.credentials {
            req = req.basic_auth(key, Some(secret));
        }

        match req.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                debug!(url = %self.url, sn, status, "ERP accepted payload");
                ForwardOutcome::Success(status)
            }
            Err(e) => {
                warn!(url = %self.url, sn, error = %e, "ERP forward failed");
                ForwardOutcome::Failure(describe(&e))
            }
        }
    }
}

/// Flatten a reqwest error and its causes into one line.
fn describe(err: &reqwest::Error) -> String {
    let mut out = if err.is_timeout() {
        format!("timed out: {err}")
    } else {
        err.to_string()
    };
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_renders_status() {
        assert_eq!(
            ForwardOutcome::Success(500).to_string(),
            "Forwarded to the ERP -> 500"
        );
    }

    #[test]
    fn failure_renders_reason() {
        assert_eq!(
            ForwardOutcome::Failure("connection refused".into()).to_string(),
            "ERROR forwarding to the ERP: connection refused"
        );
    }

    #[test]
    fn new_keeps_url_and_credentials() {
        let cfg = ErpConfig {
            enabled: true,
            url: "http://erp.local/cdata".into(),
            api_key: Some("k".into()),
            api_secret: None,
            timeout_ms: 15_000,
        };
        let fwd = ErpForwarder::new(&cfg).unwrap();
        assert_eq!(fwd.url, "http://erp.local/cdata");
        assert_eq!(fwd.credentials, Some(("k".into(), String::new())));
    }

    #[tokio::test]
    async fn invalid_url_is_a_failure_not_a_panic() {
        let cfg = ErpConfig {
            enabled: true,
            url: "not a url".into(),
            ..ErpConfig::default()
        };
        let fwd = ErpForwarder::new(&cfg).unwrap();
        let outcome = fwd.forward(b"payload".to_vec(), "SN1").await;
        assert!(matches!(outcome, ForwardOutcome::Failure(_)), "{outcome:?}");
    }
}
