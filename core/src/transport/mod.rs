//! Interchangeable backends that execute one HTTP request.
//!
//! # Design
//! Every backend receives the same `HttpRequest` and returns a `RawResponse`.
//! Connections are opened and closed inside `execute`; nothing is kept
//! between calls. Timeouts apply per connection attempt, so each redirect hop
//! or probe gets a fresh budget.

pub mod buffered;
pub mod form;
pub mod socket;
pub mod stream;

use std::time::Duration;

use crate::config::{ClientConfig, TransportKind};
use crate::http::{Credentials, HeadResponse, HttpMethod, HttpRequest, RawResponse};
use crate::redirect::RedirectStrategy;

pub use buffered::{BufferedTransport, UreqProber};
pub use socket::SocketTransport;
pub use stream::StreamTransport;

/// Executes a single request against the network.
pub trait Transport: Send + Sync {
    /// Short name used in logs and configuration errors.
    fn name(&self) -> &'static str;

    fn supports(&self, method: HttpMethod) -> bool;

    fn execute(&self, request: &HttpRequest) -> RawResponse;
}

/// Issues header-only requests. Used for reachability checks and for walking
/// redirect chains by hand.
pub trait HeadProber: Send + Sync {
    fn head(&self, url: &str) -> Result<HeadResponse, String>;
}

/// Build the backend selected by `kind`.
pub fn build(
    kind: TransportKind,
    credentials: &Credentials,
    config: &ClientConfig,
    redirects: RedirectStrategy,
) -> Box<dyn Transport> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match kind {
        TransportKind::Buffered => Box::new(BufferedTransport::new(
            credentials.clone(),
            timeout,
            config.verify_peer,
            redirects,
        )),
        TransportKind::Socket => Box::new(SocketTransport::new(credentials.clone(), timeout, config.port)),
        TransportKind::Stream => Box::new(StreamTransport::new(credentials.clone(), timeout, config.verify_peer)),
    }
}
