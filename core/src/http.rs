//! HTTP request and response values shared by every transport.
//!
//! # Design
//! Requests are described as plain data so that the client can assemble them
//! once and hand them to whichever backend is configured. Form fields are kept
//! as key/value pairs rather than a pre-encoded body: each backend picks its own
//! encoding (multipart for the buffered client, url-encoded for the raw socket).
//!
//! Responses carry only what the decoder needs: the body bytes and the error
//! text reported by the backend. Status lines are not interpreted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[serde(alias = "GET")]
    Get,
    #[serde(alias = "POST")]
    Post,
    #[serde(alias = "DELETE")]
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username and password sent as HTTP Basic credentials.
///
/// Both values are sanitized once at construction and never change afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: sanitize(username),
            password: sanitize(password),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Value of the `Authorization` header for these credentials.
    pub fn basic_header(&self) -> String {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

        let token = BASE64.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn sanitize(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect::<String>().trim().to_string()
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
}

/// Outcome of one transport execution.
///
/// `error` holds the backend's own error text when the request could not be
/// carried out. A response the backend received but could not make sense of
/// is still returned as bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub body: Vec<u8>,
    pub error: Option<String>,
}

impl RawResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self { body, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            body: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Status line and headers of a header-only request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl HeadResponse {
    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_header_encodes_user_and_password() {
        let creds = Credentials::new("dealer", "secret");
        assert_eq!(creds.basic_header(), "Basic ZGVhbGVyOnNlY3JldA==");
    }

    #[test]
    fn credentials_drop_control_characters_and_padding() {
        let creds = Credentials::new("  deal\u{0}er\n", "pa\tss ");
        assert_eq!(creds.username(), "dealer");
        assert_eq!(creds.password(), "pass");
    }

    #[test]
    fn debug_output_hides_password() {
        let creds = Credentials::new("dealer", "secret");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("dealer"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn head_response_header_lookup_ignores_case() {
        let head = HeadResponse {
            status: 200,
            headers: vec![("server-signature".to_string(), "abc".to_string())],
        };
        assert_eq!(head.header("Server-Signature"), Some("abc"));
        assert_eq!(head.header("Location"), None);
    }

    #[test]
    fn method_names_are_uppercase() {
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert_eq!(HttpMethod::Get.as_str(), "GET");
    }
}
