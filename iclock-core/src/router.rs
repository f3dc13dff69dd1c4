use crate::request::Method;

pub const POLL_PATH: &str = "/iclock/getrequest";
pub const PUSH_PATH: &str = "/iclock/cdata";

/// Terminal protocol endpoint a request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Heartbeat / command poll.
    Poll,
    /// Attendance data upload.
    Push,
    NotFound,
}

impl Endpoint {
    /// Match method and path. The poll path must match exactly; the push
    /// path ignores trailing slashes.
    pub fn resolve(method: &Method, path: &str) -> Self {
        match method {
            Method::Get if path == POLL_PATH => Endpoint::Poll,
            Method::Post if path.trim_end_matches('/') == PUSH_PATH => {
                Endpoint::Push
            }
            _ => Endpoint::NotFound,
        }
    }
}
