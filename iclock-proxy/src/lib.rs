pub mod connection;
pub mod forwarder;
pub mod handler;
pub mod listener;

pub use forwarder::{ErpForwarder, ForwardOutcome};
pub use handler::{IclockHandler, Reply};
pub use listener::Listener;
