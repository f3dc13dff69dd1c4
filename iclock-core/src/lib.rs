pub mod config;
pub mod error;
pub mod request;
pub mod router;

pub use config::RelayConfig;
pub use error::RelayError;
pub use request::{InboundRequest, Method};
pub use router::Endpoint;
