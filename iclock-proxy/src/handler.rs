use crate::forwarder::ErpForwarder;
use iclock_core::config::ErpConfig;
use iclock_core::router::{Endpoint, POLL_PATH, PUSH_PATH};
use iclock_core::{InboundRequest, RelayError};
use iclock_observability::Journal;
use std::sync::Arc;
use tracing::debug;

/// Status and plain-text body sent back to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: &'static str,
}

impl Reply {
    pub const OK: Reply = Reply { status: 200, body: "OK" };
    pub const NOT_FOUND: Reply = Reply { status: 404, body: "Not Found" };
}

/// Terminal protocol flows: journal every recognised exchange, forward
/// pushes to the ERP when enabled, and always acknowledge the device.
///
/// Shared by every connection task; holds no per-request state.
pub struct IclockHandler {
    journal: Arc<Journal>,
    forwarder: Option<ErpForwarder>,
}

impl IclockHandler {
    pub fn new(journal: Arc<Journal>, erp: &ErpConfig) -> Result<Self, RelayError> {
        let forwarder = if erp.enabled {
            Some(ErpForwarder::new(erp)?)
        } else {
            None
        };
        Ok(Self { journal, forwarder })
    }

    pub fn forwarding_enabled(&self) -> bool {
        self.forwarder.is_some()
    }

    /// Dispatch one request. Only a journal write failure is an error;
    /// ERP trouble never reaches the device.
    pub async fn handle_request(&self, req: &InboundRequest) -> Result<Reply, RelayError> {
        match Endpoint::resolve(&req.method, &req.path) {
            Endpoint::Poll => self.poll(req),
            Endpoint::Push => self.push(req).await,
            Endpoint::NotFound => {
                debug!(method = req.method.as_str(), path = %req.path, "No route matched");
                Ok(Reply::NOT_FOUND)
            }
        }
    }

    fn poll(&self, req: &InboundRequest) -> Result<Reply, RelayError> {
        let sn = req.serial_number();
        debug!(sn = %sn, peer = %req.peer, "Device poll");
        self.record(&format!("GET {POLL_PATH} SN={sn} from {}", req.source_ip()))?;
        Ok(Reply::OK)
    }

    async fn push(&self, req: &InboundRequest) -> Result<Reply, RelayError> {
        let sn = req.serial_number();
        let text = req.body_text();
        debug!(sn = %sn, peer = %req.peer, bytes = req.body.len(), "Device data push");

        self.record(&format!(
            "POST {PUSH_PATH} SN={sn} from {}\n{}",
            req.source_ip(),
            text.trim_end()
        ))?;

        if let Some(forwarder) = &self.forwarder {
            let outcome = forwarder.forward(req.body.clone(), &sn).await;
            self.record(&outcome.to_string())?;
        }

        // The device retires records only on 200; anything else makes it resend.
        Ok(Reply::OK)
    }

    fn record(&self, line: &str) -> Result<(), RelayError> {
        self.journal.append(line).map_err(RelayError::Journal)
    }
}
