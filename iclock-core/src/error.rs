use thiserror::Error;

/// Unified error type for the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Journal write failed: {0}")]
    Journal(#[source] std::io::Error),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Request head exceeds {0} bytes")]
    HeaderTooLarge(usize),

    #[error("Declared body of {declared} bytes exceeds limit of {limit}")]
    BodyTooLarge { declared: usize, limit: usize },

    #[error("Timed out reading request")]
    Timeout,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Status to send back to the device, if the connection can still carry one.
    ///
    /// `None` means the peer is gone or never finished its request.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RelayError::MalformedRequest(_) => Some(400),
            RelayError::HeaderTooLarge(_) => Some(431),
            RelayError::BodyTooLarge { .. } => Some(413),
            RelayError::Journal(_) => Some(500),
            RelayError::Timeout | RelayError::Io(_) => None,
            RelayError::Bind { .. } | RelayError::Config(_) => None,
        }
    }
}
