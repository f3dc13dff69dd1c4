use crate::connection::{ConnectionLimits, handle_connection};
use crate::handler::IclockHandler;
use iclock_core::{RelayConfig, RelayError};
use iclock_observability::Journal;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Running device listener.
///
/// The accept loop owns the socket; [`Listener::stop`] ends the loop and
/// the port is released when the socket drops. Connections already being
/// served are left to finish on their own.
pub struct Listener {
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
    accept_task: JoinHandle<()>,
}

impl Listener {
    /// Bind `config.listener.addr` and start serving in the background.
    pub async fn start(config: &RelayConfig, journal: Arc<Journal>) -> Result<Self, RelayError> {
        let handler = Arc::new(IclockHandler::new(journal, &config.erp)?);
        let limits = ConnectionLimits::from(&config.listener);

        let addr = config.listener.addr.clone();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RelayError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        info!(
            addr = %local_addr,
            forwarding = handler.forwarding_enabled(),
            "Listening for /iclock/getrequest and /iclock/cdata"
        );

        let shutdown = Arc::new(Notify::new());
        let accept_task = tokio::spawn(accept_loop(
            listener,
            handler,
            limits,
            Arc::clone(&shutdown),
        ));

        Ok(Self {
            local_addr,
            shutdown,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and release the port.
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.accept_task.await {
            error!(error = %e, "Accept loop ended abnormally");
        }
        info!(addr = %self.local_addr, "Listener stopped");
    }
}

/// One task per accepted connection; nothing shared but the handler.
async fn accept_loop(
    listener: TcpListener,
    handler: Arc<IclockHandler>,
    limits: ConnectionLimits,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let _ = stream.set_nodelay(true);
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        match handle_connection(stream, peer, &handler, limits).await {
                            Ok(()) => {}
                            Err(e @ RelayError::Journal(_)) => {
                                error!(peer = %peer, error = %e, "Exchange not journaled");
                            }
                            Err(e) => {
                                debug!(peer = %peer, error = %e, "Connection closed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept error");
                }
            },
        }
    }
}
