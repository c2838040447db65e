//! Blocking HTTP client backend built on ureq.
//!
//! Status codes are returned as data, never as errors: only failures to carry
//! out the request (DNS, connect, TLS, timeout) produce a transport error. TLS
//! peer verification is off unless `verify_peer` is set.
//!
//! GET requests honor the configured `RedirectStrategy`. Under
//! `RedirectStrategy::Manual` the agent never follows redirects itself; the
//! chain is walked with HEAD probes first and the GET is sent to the final URL.

use std::time::Duration;

use tracing::{debug, warn};
use ureq::config::RedirectAuthHeaders;
use ureq::tls::TlsConfig;
use ureq::{Agent, RequestBuilder};

use super::{form, HeadProber, Transport};
use crate::http::{Credentials, HeadResponse, HttpMethod, HttpRequest, RawResponse};
use crate::redirect::{self, RedirectStrategy};

fn agent(timeout: Duration, verify_peer: bool, follow_redirects: bool) -> Agent {
    let tls = TlsConfig::builder().disable_verification(!verify_peer).build();
    let mut config = Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .tls_config(tls);
    if follow_redirects {
        config = config.redirect_auth_headers(RedirectAuthHeaders::SameHost);
    } else {
        config = config.max_redirects(0).max_redirects_will_error(false);
    }
    config.build().new_agent()
}

fn read_body(mut response: ureq::http::Response<ureq::Body>) -> Result<Vec<u8>, ureq::Error> {
    response.body_mut().read_to_vec()
}

/// HEAD requests through ureq, optionally authenticated.
pub struct UreqProber {
    agent: Agent,
    authorization: Option<String>,
}

impl UreqProber {
    /// Unauthenticated prober that never follows redirects.
    pub fn new(timeout: Duration, verify_peer: bool) -> Self {
        Self {
            agent: agent(timeout, verify_peer, false),
            authorization: None,
        }
    }

    pub fn with_credentials(mut self, credentials: &Credentials) -> Self {
        self.authorization = Some(credentials.basic_header());
        self
    }
}

impl HeadProber for UreqProber {
    fn head(&self, url: &str) -> Result<HeadResponse, String> {
        let mut request = self.agent.head(url);
        if let Some(authorization) = &self.authorization {
            request = request.header("Authorization", authorization);
        }
        let response = request.call().map_err(|e| e.to_string())?;
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Ok(HeadResponse {
            status: response.status().as_u16(),
            headers,
        })
    }
}

/// Single blocking request per call, with Basic auth and custom headers.
pub struct BufferedTransport {
    credentials: Credentials,
    timeout: Duration,
    verify_peer: bool,
    redirects: RedirectStrategy,
}

impl BufferedTransport {
    pub fn new(
        credentials: Credentials,
        timeout: Duration,
        verify_peer: bool,
        redirects: RedirectStrategy,
    ) -> Self {
        Self {
            credentials,
            timeout,
            verify_peer,
            redirects,
        }
    }

    fn prepare<B>(&self, mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
        builder = builder.header("Authorization", self.credentials.basic_header());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    fn get(&self, request: &HttpRequest) -> Result<Vec<u8>, ureq::Error> {
        let url = match self.redirects {
            RedirectStrategy::Native => request.url.clone(),
            RedirectStrategy::Manual { max_redirects } => {
                let prober =
                    UreqProber::new(self.timeout, self.verify_peer).with_credentials(&self.credentials);
                redirect::follow(&prober, &request.url, max_redirects)
            }
        };
        let agent = agent(
            self.timeout,
            self.verify_peer,
            self.redirects == RedirectStrategy::Native,
        );
        let response = self.prepare(agent.get(&url), request).call()?;
        read_body(response)
    }

    fn post(&self, request: &HttpRequest) -> Result<Vec<u8>, ureq::Error> {
        let agent = agent(self.timeout, self.verify_peer, false);
        let builder = self.prepare(agent.post(&request.url), request);
        let fields = request.form.as_deref().unwrap_or_default();
        let response = if fields.is_empty() {
            builder.send_empty()?
        } else {
            let boundary = form::boundary();
            builder
                .content_type(format!("multipart/form-data; boundary={boundary}"))
                .send(form::multipart(&boundary, fields))?
        };
        read_body(response)
    }

    fn delete(&self, request: &HttpRequest) -> Result<Vec<u8>, ureq::Error> {
        let agent = agent(self.timeout, self.verify_peer, false);
        let response = self.prepare(agent.delete(&request.url), request).call()?;
        read_body(response)
    }
}

impl Transport for BufferedTransport {
    fn name(&self) -> &'static str {
        "curl"
    }

    fn supports(&self, _method: HttpMethod) -> bool {
        true
    }

    fn execute(&self, request: &HttpRequest) -> RawResponse {
        debug!(method = %request.method, url = %request.url, redirects = ?self.redirects, "buffered request");
        let result = match request.method {
            HttpMethod::Get => self.get(request),
            HttpMethod::Post => self.post(request),
            HttpMethod::Delete => self.delete(request),
        };
        match result {
            Ok(body) => RawResponse::ok(body),
            Err(error) => {
                warn!(url = %request.url, %error, "buffered request failed");
                RawResponse::failed(error.to_string())
            }
        }
    }
}
