//! Hand-written HTTP/1.0 over a plain TCP connection.
//!
//! The request line, header block and url-encoded body are rendered by hand,
//! with the Basic credentials encoded locally. The response is read line by
//! line until the peer closes the connection. The status line is never
//! interpreted: the head is split off at the first blank line and whatever
//! follows is returned as the body.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use super::{form, Transport};
use crate::config::DEFAULT_PORT;
use crate::http::{Credentials, HttpMethod, HttpRequest, RawResponse};

pub struct SocketTransport {
    credentials: Credentials,
    timeout: Duration,
    port: u16,
}

impl SocketTransport {
    pub fn new(credentials: Credentials, timeout: Duration, port: u16) -> Self {
        Self {
            credentials,
            timeout,
            port,
        }
    }

    fn connect(&self, host: &str) -> Result<TcpStream, String> {
        let addrs: Vec<SocketAddr> = (host, self.port)
            .to_socket_addrs()
            .map_err(|e| e.to_string())?
            .collect();
        let mut last_error = format!("no address found for {host}");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout)).map_err(|e| e.to_string())?;
                    stream.set_write_timeout(Some(self.timeout)).map_err(|e| e.to_string())?;
                    return Ok(stream);
                }
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(last_error)
    }

    /// Full request message: request line, headers, blank line, body.
    pub fn render(&self, request: &HttpRequest, url: &Url) -> Vec<u8> {
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        // Name the port actually dialed, which is `self.port`, not the URL's.
        let host = url.host_str().unwrap_or_default();
        let host = if self.port == DEFAULT_PORT {
            host.to_string()
        } else {
            format!("{host}:{}", self.port)
        };

        let mut head = format!("{} {target} HTTP/1.0\r\n", request.method);
        head.push_str(&format!("Host: {host}\r\n"));
        head.push_str("Accept: */*\r\n");
        head.push_str(&format!("Authorization: {}\r\n", self.credentials.basic_header()));
        for (name, value) in &request.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }

        let body = request.form.as_deref().map(form::urlencoded);
        if let Some(body) = &body {
            head.push_str("Content-Type: application/x-www-form-urlencoded\r\n");
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let mut message = head.into_bytes();
        if let Some(body) = body {
            message.extend_from_slice(body.as_bytes());
        }
        message
    }

    fn exchange(&self, request: &HttpRequest) -> Result<Vec<u8>, String> {
        let url = Url::parse(&request.url).map_err(|e| format!("{}: {e}", request.url))?;
        let host = url
            .host_str()
            .ok_or_else(|| format!("{} has no host", request.url))?;

        let mut stream = self.connect(host)?;
        stream
            .write_all(&self.render(request, &url))
            .map_err(|e| e.to_string())?;

        let mut reader = BufReader::new(stream);
        let mut received = Vec::new();
        loop {
            match reader.read_until(b'\n', &mut received) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) => return Err(e.to_string()),
            }
        }
        Ok(split_head(received))
    }
}

/// Drop everything up to and including the first blank line, if there is one.
/// Interim `1xx` heads (e.g. `100 Continue`) are skipped as well.
pub fn split_head(mut received: Vec<u8>) -> Vec<u8> {
    loop {
        let crlf = received.windows(4).position(|w| w == b"\r\n\r\n").map(|at| at + 4);
        let lf = || received.windows(2).position(|w| w == b"\n\n").map(|at| at + 2);
        let Some(start) = crlf.or_else(lf) else {
            return received;
        };
        let interim = is_interim(&received[..start]);
        received = received.split_off(start);
        if !interim {
            return received;
        }
    }
}

fn is_interim(head: &[u8]) -> bool {
    head.starts_with(b"HTTP/")
        && head
            .splitn(3, |b| *b == b' ')
            .nth(1)
            .is_some_and(|code| code.starts_with(b"1"))
}

impl Transport for SocketTransport {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn supports(&self, _method: HttpMethod) -> bool {
        true
    }

    fn execute(&self, request: &HttpRequest) -> RawResponse {
        debug!(method = %request.method, url = %request.url, port = self.port, "socket request");
        match self.exchange(request) {
            Ok(body) => RawResponse::ok(body),
            Err(error) => {
                warn!(url = %request.url, %error, "socket request failed");
                RawResponse::failed(error)
            }
        }
    }
}
