//! Streaming GET with a fixed header block.
//!
//! Only GET is available. The configured request headers are not sent; the
//! backend always uses the same language, content type and Basic credentials.
//! The body is streamed through a reader into the result buffer. Error
//! statuses count as failures here, as they do for URL stream readers.

use std::io::Read;
use std::time::Duration;

use tracing::{debug, warn};
use ureq::tls::TlsConfig;
use ureq::Agent;

use super::Transport;
use crate::http::{Credentials, HttpMethod, HttpRequest, RawResponse};

pub struct StreamTransport {
    credentials: Credentials,
    timeout: Duration,
    verify_peer: bool,
}

impl StreamTransport {
    pub fn new(credentials: Credentials, timeout: Duration, verify_peer: bool) -> Self {
        Self {
            credentials,
            timeout,
            verify_peer,
        }
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .tls_config(TlsConfig::builder().disable_verification(!self.verify_peer).build())
            .build()
            .new_agent();
        let response = agent
            .get(url)
            .header("Accept-Language", "en")
            .header("Content-Type", "application/json")
            .header("Authorization", self.credentials.basic_header())
            .call()
            .map_err(|e| e.to_string())?;

        let mut body = Vec::new();
        response
            .into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| e.to_string())?;
        Ok(body)
    }
}

impl Transport for StreamTransport {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn supports(&self, method: HttpMethod) -> bool {
        method == HttpMethod::Get
    }

    fn execute(&self, request: &HttpRequest) -> RawResponse {
        debug!(url = %request.url, "stream request");
        match self.fetch(&request.url) {
            Ok(body) => RawResponse::ok(body),
            Err(error) => {
                warn!(url = %request.url, %error, "stream request failed");
                RawResponse::failed(error)
            }
        }
    }
}
