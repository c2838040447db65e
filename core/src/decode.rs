//! Normalization of raw response bodies.
//!
//! Steps, in order:
//! 1. gunzip a successful, non-empty body when gzip is enabled and the bytes
//!    carry the gzip magic number;
//! 2. record `Unauthorized` when the text contains "unauthorized" in any case
//!    (decoding still goes on);
//! 3. with auto-decode on, parse as JSON or XML according to the output
//!    format. A body that fails to parse yields `DecodedResponse::Empty`, and
//!    only strict decoding records an error for it.

use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientConfig, OutputFormat};
use crate::error::{CallError, ErrorSink};
use crate::http::RawResponse;
use crate::xml;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const UNAUTHORIZED_MARKER: &[u8] = b"unauthorized";
const DEBUG_BODY_LIMIT: usize = 2048;

/// Result of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedResponse {
    /// Nothing usable: the call failed or the body did not decode.
    Empty,
    /// Parsed JSON, or XML converted to the same value model.
    Structured(Value),
    /// Body bytes, returned untouched when auto-decode is off.
    Raw(Vec<u8>),
}

impl DecodedResponse {
    pub fn is_empty(&self) -> bool {
        match self {
            DecodedResponse::Empty => true,
            DecodedResponse::Structured(_) => false,
            DecodedResponse::Raw(bytes) => bytes.is_empty(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            DecodedResponse::Structured(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            DecodedResponse::Structured(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DecodedResponse::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }
}

pub fn looks_gzipped(body: &[u8]) -> bool {
    body.starts_with(&GZIP_MAGIC)
}

fn gunzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(body).read_to_end(&mut out)?;
    Ok(out)
}

pub fn mentions_unauthorized(body: &[u8]) -> bool {
    body.windows(UNAUTHORIZED_MARKER.len())
        .any(|window| window.eq_ignore_ascii_case(UNAUTHORIZED_MARKER))
}

/// Decode `raw` according to `config`, recording problems in `sink`.
pub fn decode(raw: RawResponse, config: &ClientConfig, sink: &mut ErrorSink) -> DecodedResponse {
    let success = raw.is_success();
    let mut body = raw.body;

    if success && !body.is_empty() && config.gzip && looks_gzipped(&body) {
        match gunzip(&body) {
            Ok(inflated) => body = inflated,
            Err(error) => warn!(%error, "gzip body could not be inflated; decoding raw bytes"),
        }
    }

    if config.debug {
        let shown = &body[..body.len().min(DEBUG_BODY_LIMIT)];
        debug!(len = body.len(), body = %String::from_utf8_lossy(shown), "response body");
    }

    if mentions_unauthorized(&body) {
        sink.push(CallError::Unauthorized);
    }

    if !config.auto_decode {
        return DecodedResponse::Raw(body);
    }
    if body.is_empty() {
        return DecodedResponse::Empty;
    }

    let format = config.output_format;
    let parsed = match format {
        OutputFormat::Json => serde_json::from_slice::<Value>(&body)
            .map(|value| (!value.is_null()).then_some(value))
            .map_err(|e| e.to_string()),
        OutputFormat::Xml => xml::first_element_contents(&String::from_utf8_lossy(&body)),
        OutputFormat::Raw => return DecodedResponse::Empty,
    };

    match parsed {
        Ok(Some(value)) => DecodedResponse::Structured(value),
        Ok(None) => DecodedResponse::Empty,
        Err(message) => {
            debug!(format = format.name(), %message, "response body did not decode");
            if config.strict_decode {
                sink.push(CallError::Decode {
                    format: format.name(),
                    message,
                });
            }
            DecodedResponse::Empty
        }
    }
}
