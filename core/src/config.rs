//! Client configuration built once from user overrides.
//!
//! # Design
//! Options arrive as a JSON object. Each recognized key has an expected
//! primitive kind in `SCHEMA`; unknown keys are ignored. A value of the wrong
//! kind is coerced when the intent is unambiguous (`"2"` for an integer, `1`
//! for a boolean) and dropped otherwise.
//!
//! `output_format` and `gzip` are also forwarded to the webservice as request
//! headers, but only when the caller supplied them with exactly the expected
//! kind. A coerced value still configures the client; it just does not produce
//! the header.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::CallError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_MAX_REDIRECTS: u32 = 1;

/// Signature the webservice advertises in its `Server-Signature` header.
pub const DEFAULT_SERVER_SIGNATURE: &str = "7cac394e6e2864b8e2f98e7fe815ab6b";

/// Suffix appended to a bare dealership name to form the webservice URL.
pub const WEBSERVICE_DOMAIN_PATH: &str = ".smartdealer.com.br/webservice/rest/";

/// Backend used to execute requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Blocking HTTP client with redirect and TLS support.
    Buffered,
    /// Hand-written HTTP/1.0 over a plain TCP connection.
    Socket,
    /// Streaming GET with a fixed header block.
    Stream,
}

impl TransportKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "curl" | "buffered" | "http" => Some(TransportKind::Buffered),
            "socket" => Some(TransportKind::Socket),
            "stream" => Some(TransportKind::Stream),
            _ => None,
        }
    }
}

/// Target structure for decoded response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Raw,
    Json,
    Xml,
}

impl OutputFormat {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => OutputFormat::Json,
            2 => OutputFormat::Xml,
            _ => OutputFormat::Raw,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            OutputFormat::Raw => 0,
            OutputFormat::Json => 1,
            OutputFormat::Xml => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Raw => "raw",
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
        }
    }
}

/// What the execution environment allows. Probed by the host, not the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Outbound URL-based I/O is permitted.
    pub url_io: bool,
    /// Gzip decompression is available.
    pub decompression: bool,
    /// The HTTP backend may follow redirects on its own.
    pub native_redirects: bool,
}

impl Capabilities {
    /// An environment where automatic redirect following is forbidden.
    pub fn sandboxed() -> Self {
        Self {
            native_redirects: false,
            ..Self::default()
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            url_io: true,
            decompression: true,
            native_redirects: true,
        }
    }
}

/// Whether a path is checked against the route table before dispatch.
///
/// Writes are not validated by default, matching the webservice clients in the
/// field. This is most likely an oversight, kept switchable rather than fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteValidation {
    pub reads: bool,
    pub writes: bool,
}

impl Default for RouteValidation {
    fn default() -> Self {
        Self {
            reads: true,
            writes: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Boolean,
    Integer,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
enum Setting {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

const SCHEMA: &[(&str, Kind)] = &[
    ("handle", Kind::Text),
    ("timeout", Kind::Integer),
    ("use_ssl", Kind::Boolean),
    ("port", Kind::Integer),
    ("debug", Kind::Boolean),
    ("output_format", Kind::Integer),
    ("output_compile", Kind::Boolean),
    ("gzip", Kind::Boolean),
    ("verify_peer", Kind::Boolean),
    ("max_redirects", Kind::Integer),
    ("strict_decode", Kind::Boolean),
    ("validate_reads", Kind::Boolean),
    ("validate_writes", Kind::Boolean),
    ("server_signature", Kind::Text),
];

/// Settings forwarded to the webservice as request headers.
const HEADER_KEYS: &[(&str, &str)] = &[("output_format", "Output-Format"), ("gzip", "Gzip")];

impl Kind {
    fn of(key: &str) -> Option<Kind> {
        SCHEMA.iter().find(|(name, _)| *name == key).map(|(_, kind)| *kind)
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Kind::Boolean => value.is_boolean(),
            Kind::Integer => value.is_i64() || value.is_u64(),
            Kind::Text => value.is_string(),
        }
    }

    fn coerce(self, value: &Value) -> Option<Setting> {
        match (self, value) {
            (Kind::Boolean, Value::Bool(b)) => Some(Setting::Boolean(*b)),
            (Kind::Boolean, Value::Number(n)) => n.as_f64().map(|n| Setting::Boolean(n != 0.0)),
            (Kind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Some(Setting::Boolean(true)),
                "false" | "0" | "off" | "no" | "" => Some(Setting::Boolean(false)),
                _ => None,
            },
            (Kind::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Setting::Integer),
            (Kind::Integer, Value::Bool(b)) => Some(Setting::Integer(i64::from(*b))),
            (Kind::Integer, Value::String(s)) => s.trim().parse().ok().map(Setting::Integer),
            (Kind::Text, Value::String(s)) => Some(Setting::Text(s.clone())),
            (Kind::Text, Value::Number(n)) => Some(Setting::Text(n.to_string())),
            // An explicit null or false means "not set", not the text "false".
            (Kind::Text, Value::Null | Value::Bool(false)) => Some(Setting::Text(String::new())),
            (Kind::Text, Value::Bool(true)) => Some(Setting::Text("true".to_string())),
            _ => None,
        }
    }
}

/// Immutable client settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    handle: String,
    pub transport: Option<TransportKind>,
    pub timeout_secs: u64,
    pub use_ssl: bool,
    pub port: u16,
    pub debug: bool,
    pub output_format: OutputFormat,
    pub auto_decode: bool,
    pub gzip: bool,
    pub verify_peer: bool,
    pub max_redirects: u32,
    pub strict_decode: bool,
    pub route_validation: RouteValidation,
    pub server_signature: String,
    headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut config = Self {
            handle: "curl".to_string(),
            transport: Some(TransportKind::Buffered),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            use_ssl: true,
            port: DEFAULT_PORT,
            debug: false,
            output_format: OutputFormat::Json,
            auto_decode: true,
            gzip: false,
            verify_peer: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            strict_decode: false,
            route_validation: RouteValidation::default(),
            server_signature: DEFAULT_SERVER_SIGNATURE.to_string(),
            headers: Vec::new(),
        };
        config.headers = config.build_headers(&HEADER_KEYS.iter().map(|(key, _)| *key).collect());
        config
    }
}

impl ClientConfig {
    /// Merge `overrides` into the defaults.
    ///
    /// Non-object overrides are treated as empty. Decompression is forced off
    /// when the environment cannot provide it, whatever the caller asked for.
    pub fn merge(overrides: &Value, capabilities: &Capabilities) -> Self {
        let mut config = Self::default();
        let mut header_eligible: HashSet<&str> = HEADER_KEYS.iter().map(|(key, _)| *key).collect();

        match overrides {
            Value::Object(map) => {
                for (key, value) in map {
                    let Some(kind) = Kind::of(key) else {
                        debug!(key = %key, "ignoring unknown option");
                        continue;
                    };
                    if !kind.matches(value) {
                        header_eligible.remove(key.as_str());
                    }
                    match kind.coerce(value) {
                        Some(setting) => config.apply(key, setting),
                        None => debug!(key = %key, value = %value, "ignoring option with unusable value"),
                    }
                }
            }
            Value::Null => {}
            other => debug!(options = %other, "options are not an object; using defaults"),
        }

        if !capabilities.decompression {
            config.gzip = false;
        }
        config.headers = config.build_headers(&header_eligible);
        config
    }

    fn apply(&mut self, key: &str, setting: Setting) {
        match (key, setting) {
            ("handle", Setting::Text(name)) => {
                self.transport = TransportKind::parse(&name);
                self.handle = name;
            }
            ("timeout", Setting::Integer(secs)) => {
                self.timeout_secs = u64::try_from(secs)
                    .ok()
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS);
            }
            ("port", Setting::Integer(port)) => {
                self.port = u16::try_from(port)
                    .ok()
                    .filter(|port| *port > 0)
                    .unwrap_or(DEFAULT_PORT);
            }
            ("max_redirects", Setting::Integer(max)) => {
                self.max_redirects = u32::try_from(max.max(0)).unwrap_or(u32::MAX);
            }
            ("output_format", Setting::Integer(code)) => self.output_format = OutputFormat::from_code(code),
            ("use_ssl", Setting::Boolean(b)) => self.use_ssl = b,
            ("debug", Setting::Boolean(b)) => self.debug = b,
            ("output_compile", Setting::Boolean(b)) => self.auto_decode = b,
            ("gzip", Setting::Boolean(b)) => self.gzip = b,
            ("verify_peer", Setting::Boolean(b)) => self.verify_peer = b,
            ("strict_decode", Setting::Boolean(b)) => self.strict_decode = b,
            ("validate_reads", Setting::Boolean(b)) => self.route_validation.reads = b,
            ("validate_writes", Setting::Boolean(b)) => self.route_validation.writes = b,
            ("server_signature", Setting::Text(token)) => {
                let token = token.trim();
                if !token.is_empty() {
                    self.server_signature = token.to_string();
                }
            }
            (key, setting) => debug!(key, ?setting, "option kind does not fit its key"),
        }
    }

    fn build_headers(&self, eligible: &HashSet<&str>) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        for (key, header) in HEADER_KEYS {
            if !eligible.contains(key) {
                continue;
            }
            let value = match *key {
                "output_format" => self.output_format.code().to_string(),
                _ => u8::from(self.gzip).to_string(),
            };
            headers.push((header.to_string(), value));
        }
        headers.push(("Expect".to_string(), "100-continue".to_string()));
        headers
    }

    /// Headers sent with every webservice request, besides authorization.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The configured backend, or the configuration error explaining its absence.
    pub fn transport_kind(&self) -> Result<TransportKind, CallError> {
        if self.handle.trim().is_empty() {
            return Err(CallError::Configuration("required 'handle' setting".to_string()));
        }
        self.transport.ok_or_else(|| {
            CallError::Configuration(format!(
                "invalid 'handle' {:?} (use curl, socket, stream)",
                self.handle
            ))
        })
    }

    fn scheme(&self) -> &'static str {
        if self.use_ssl {
            "https"
        } else {
            "http"
        }
    }

    /// Webservice base URL for a full URL or a bare dealership name.
    pub fn resolve_base_url(&self, identifier: &str) -> String {
        let identifier = identifier.trim();
        let is_url = Url::parse(identifier)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .unwrap_or(false);
        let base = if is_url {
            identifier.to_string()
        } else {
            format!("{}://{}{}", self.scheme(), identifier, WEBSERVICE_DOMAIN_PATH)
        };
        base.trim_matches(|c| c == ' ' || c == '/').to_string()
    }
}
