//! Client library for the Smart Dealer REST webservice.
//!
//! # Overview
//! Validates requested paths against the webservice's fixed route table,
//! dispatches requests over one of three interchangeable transports with HTTP
//! Basic credentials, follows redirects by hand where the environment forbids
//! automatic following, and normalizes response bodies into JSON values.
//!
//! # Design
//! - Calls never fail with `Err`. Each public operation collects its failures
//!   in a fresh `ErrorSink`; read them with `Client::errors()` afterwards. A
//!   call that recorded any error returns `DecodedResponse::Empty`.
//! - Configuration is merged once from a JSON options object against a small
//!   typed schema and does not change afterwards.
//! - Environment restrictions (URL I/O, decompression, native redirects) are
//!   plain flags in `Capabilities`, supplied by the host.
//! - Transports and the reachability prober sit behind traits so that they can
//!   be swapped without touching dispatch.

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod redirect;
pub mod routes;
pub mod transport;
pub mod xml;

pub use client::{Client, ClientBuilder};
pub use config::{Capabilities, ClientConfig, OutputFormat, RouteValidation, TransportKind};
pub use decode::DecodedResponse;
pub use error::{CallError, ErrorSink, RouteTableError};
pub use http::{Credentials, HeadResponse, HttpMethod, HttpRequest, RawResponse};
pub use redirect::RedirectStrategy;
pub use routes::{RouteEntry, RouteTable};
pub use transport::{HeadProber, Transport};
