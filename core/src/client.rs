//! Client for the Smart Dealer REST webservice.
//!
//! # Design
//! `Client` owns the configuration, credentials, route table and the selected
//! transport, all fixed at construction. Every public operation starts a fresh
//! `ErrorSink`, runs to completion (redirect hops included) and stores the
//! sink's contents as the "last errors" before returning. Operations take
//! `&mut self`, so two calls can never interleave on one client and errors
//! cannot leak between calls.
//!
//! Dispatch order for `get`, `post` and `delete`:
//! 1. route validation, when enabled for the operation kind (reads by default);
//! 2. reachability check (capability flag, then a HEAD probe of the base URL
//!    expecting the configured `Server-Signature`);
//! 3. transport selection and verb support;
//! 4. transport execution and decoding.
//!
//! Any error recorded along the way turns the result into
//! `DecodedResponse::Empty`.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::{Capabilities, ClientConfig};
use crate::decode::{self, DecodedResponse};
use crate::error::{CallError, ErrorSink};
use crate::http::{Credentials, HttpMethod, HttpRequest};
use crate::redirect::RedirectStrategy;
use crate::routes::{RouteEntry, RouteTable};
use crate::transport::{self, form, HeadProber, Transport, UreqProber};

/// Header carrying the webservice signature.
pub const SIGNATURE_HEADER: &str = "Server-Signature";

pub struct Client {
    base_url: String,
    credentials: Credentials,
    config: ClientConfig,
    capabilities: Capabilities,
    routes: RouteTable,
    transport: Result<Box<dyn Transport>, CallError>,
    prober: Box<dyn HeadProber>,
    last_errors: Vec<CallError>,
}

/// Assembles a `Client`. Transport and prober default to the ones implied by
/// the options; tests and embedders can supply their own.
pub struct ClientBuilder {
    identifier: String,
    username: String,
    password: String,
    options: Value,
    capabilities: Capabilities,
    routes: RouteTable,
    transport: Option<Box<dyn Transport>>,
    prober: Option<Box<dyn HeadProber>>,
}

impl ClientBuilder {
    pub fn new(identifier: &str, username: &str, password: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            options: Value::Null,
            capabilities: Capabilities::default(),
            routes: RouteTable::standard(),
            transport: None,
            prober: None,
        }
    }

    /// JSON object of option overrides, see `ClientConfig::merge`.
    pub fn options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Use `transport` instead of the one named by the `handle` option.
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn prober(mut self, prober: Box<dyn HeadProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn build(self) -> Client {
        let config = ClientConfig::merge(&self.options, &self.capabilities);
        let credentials = Credentials::new(&self.username, &self.password);
        let base_url = config.resolve_base_url(&self.identifier);
        let redirects = RedirectStrategy::select(&self.capabilities, config.max_redirects);

        let transport = match self.transport {
            Some(transport) => Ok(transport),
            None => config
                .transport_kind()
                .map(|kind| transport::build(kind, &credentials, &config, redirects)),
        };
        let prober = self.prober.unwrap_or_else(|| {
            Box::new(UreqProber::new(
                Duration::from_secs(config.timeout_secs),
                config.verify_peer,
            ))
        });

        debug!(%base_url, user = credentials.username(), ?redirects, "client ready");
        Client {
            base_url,
            credentials,
            config,
            capabilities: self.capabilities,
            routes: self.routes,
            transport,
            prober,
            last_errors: Vec::new(),
        }
    }
}

impl Client {
    /// Client with default capabilities and transports.
    pub fn new(identifier: &str, username: &str, password: &str, options: Value) -> Self {
        ClientBuilder::new(identifier, username, password)
            .options(options)
            .build()
    }

    pub fn builder(identifier: &str, username: &str, password: &str) -> ClientBuilder {
        ClientBuilder::new(identifier, username, password)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Read `path` with `query` appended as a url-encoded query string.
    pub fn get(&mut self, path: &str, query: &[(&str, &str)]) -> DecodedResponse {
        let mut sink = ErrorSink::new();
        let url = self.endpoint(path, query);
        let response = self.dispatch(HttpMethod::Get, path, url, None, &mut sink);
        self.finish(sink, response)
    }

    /// Submit `fields` as a form to `path`.
    pub fn post(&mut self, path: &str, fields: &[(&str, &str)]) -> DecodedResponse {
        let mut sink = ErrorSink::new();
        let url = self.endpoint(path, &[]);
        let form = fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let response = self.dispatch(HttpMethod::Post, path, url, Some(form), &mut sink);
        self.finish(sink, response)
    }

    pub fn delete(&mut self, path: &str) -> DecodedResponse {
        let mut sink = ErrorSink::new();
        let url = self.endpoint(path, &[]);
        let response = self.dispatch(HttpMethod::Delete, path, url, None, &mut sink);
        self.finish(sink, response)
    }

    /// The known routes, without blank entries. No I/O.
    pub fn methods(&self) -> Vec<&RouteEntry> {
        self.routes.methods()
    }

    /// Errors recorded by the last call, in order.
    pub fn errors(&self) -> &[CallError] {
        &self.last_errors
    }

    /// Errors of the last call rendered as messages.
    pub fn error_messages(&self) -> Vec<String> {
        self.last_errors.iter().map(ToString::to_string).collect()
    }

    /// Run the reachability check on its own. Counts as a call.
    pub fn check_server(&mut self) -> bool {
        let mut sink = ErrorSink::new();
        if let Err(error) = self.reachable() {
            sink.push(error);
        }
        let reachable = sink.is_empty();
        self.last_errors = sink.into_errors();
        reachable
    }

    fn finish(&mut self, sink: ErrorSink, response: DecodedResponse) -> DecodedResponse {
        let response = if sink.is_empty() {
            response
        } else {
            DecodedResponse::Empty
        };
        self.last_errors = sink.into_errors();
        response
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = self.base_url.clone();
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        if !query.is_empty() {
            let pairs: Vec<(String, String)> = query
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&form::urlencoded(&pairs));
        }
        url
    }

    fn validates(&self, method: HttpMethod) -> bool {
        match method {
            HttpMethod::Get => self.config.route_validation.reads,
            HttpMethod::Post | HttpMethod::Delete => self.config.route_validation.writes,
        }
    }

    fn reachable(&self) -> Result<(), CallError> {
        let unreachable = |reason: String| CallError::ServerUnreachable { reason };

        if !self.capabilities.url_io {
            return Err(unreachable(
                "outbound URL I/O is disabled in this environment".to_string(),
            ));
        }
        let head = self.prober.head(&self.base_url).map_err(unreachable)?;
        if head.status == 404 {
            return Err(unreachable(format!("{} answered 404", self.base_url)));
        }
        match head.header(SIGNATURE_HEADER).map(str::trim) {
            Some(signature) if signature == self.config.server_signature => Ok(()),
            Some(signature) => Err(unreachable(format!("unexpected server signature {signature:?}"))),
            None => Err(unreachable(format!("missing {SIGNATURE_HEADER} header"))),
        }
    }

    fn dispatch(
        &self,
        method: HttpMethod,
        path: &str,
        url: String,
        form: Option<Vec<(String, String)>>,
        sink: &mut ErrorSink,
    ) -> DecodedResponse {
        if self.validates(method) && self.routes.match_path(path).is_none() {
            sink.push(CallError::InvalidRoute {
                path: path.to_string(),
            });
            return DecodedResponse::Empty;
        }

        if let Err(error) = self.reachable() {
            sink.push(error);
            return DecodedResponse::Empty;
        }

        let transport = match &self.transport {
            Ok(transport) => transport,
            Err(error) => {
                sink.push(error.clone());
                return DecodedResponse::Empty;
            }
        };
        if !transport.supports(method) {
            sink.push(CallError::Configuration(format!(
                "the {} handle does not support {method}",
                transport.name()
            )));
            return DecodedResponse::Empty;
        }

        let request = HttpRequest {
            method,
            url,
            headers: self.config.headers().to_vec(),
            form,
        };
        debug!(%method, url = %request.url, transport = transport.name(), "dispatching");
        let raw = transport.execute(&request);
        if let Some(error) = &raw.error {
            sink.push(CallError::TransportFailure(error.clone()));
        }
        decode::decode(raw, &self.config, sink)
    }
}
