//! End-to-end calls against the live mock webservice.
//!
//! # Design
//! Each test starts its own mock server on a random port, then drives the
//! public `Client` API over real HTTP with each transport. Only the mock's
//! fixed credentials are accepted, and every response carries the signature
//! the client checks before dispatching.

use std::net::SocketAddr;

use serde_json::{json, Value};
use smartdealer_core::{CallError, Capabilities, Client, DecodedResponse};

/// Start the mock server advertising `signature` and return its address.
fn spawn(signature: &'static str) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::serve(listener, mock_server::app_with_signature(signature)).await
        })
        .unwrap();
    });
    addr
}

fn client(addr: SocketAddr, options: Value) -> Client {
    Client::new(
        &format!("http://{addr}"),
        mock_server::USERNAME,
        mock_server::PASSWORD,
        options,
    )
}

fn sandboxed(addr: SocketAddr, options: Value) -> Client {
    Client::builder(
        &format!("http://{addr}"),
        mock_server::USERNAME,
        mock_server::PASSWORD,
    )
    .options(options)
    .capabilities(Capabilities::sandboxed())
    .build()
}

fn value(response: DecodedResponse) -> Value {
    response.into_value().expect("structured response")
}

// --- buffered ---

#[test]
fn buffered_read_write_delete() {
    let addr = spawn(mock_server::SIGNATURE);
    let mut client = client(addr, json!({}));

    assert!(client.check_server());

    let parts = value(client.get("/parts/", &[]));
    assert!(client.errors().is_empty(), "{:?}", client.errors());
    assert_eq!(parts["parts"][0]["code"], "A1");

    let page = value(client.get("/parts/2", &[("filter", "freio")]));
    assert_eq!(page["page"], 2);

    let order = value(client.post("/parts/order/", &[("part", "B2"), ("qty", "3")]));
    assert_eq!(order["order"]["status"], "created");
    assert_eq!(order["order"]["fields"], json!({"part": "B2", "qty": "3"}));

    let empty_order = value(client.post("/parts/order/", &[]));
    assert_eq!(empty_order["order"]["fields"], json!({}));

    let deleted = value(client.delete("/parts/order/12"));
    assert_eq!(deleted["order"], json!({"id": 12, "status": "deleted"}));
    assert!(client.errors().is_empty());
}

#[test]
fn unknown_route_never_reaches_server() {
    let addr = spawn(mock_server::SIGNATURE);
    let mut client = client(addr, json!({}));

    assert_eq!(client.get("/nonexistent/", &[]), DecodedResponse::Empty);
    assert!(matches!(client.errors(), [CallError::InvalidRoute { .. }]));
}

#[test]
fn wrong_credentials_are_reported() {
    let addr = spawn(mock_server::SIGNATURE);
    let mut client = Client::new(&format!("http://{addr}"), "dealer", "guess", json!({}));

    assert_eq!(client.get("/parts/tires/", &[]), DecodedResponse::Empty);
    assert_eq!(client.errors(), &[CallError::Unauthorized]);
}

#[test]
fn unexpected_signature_means_unreachable() {
    let addr = spawn("0123456789abcdef");
    let mut client = client(addr, json!({}));

    assert!(!client.check_server());
    assert_eq!(client.get("/parts/", &[]), DecodedResponse::Empty);
    assert!(matches!(client.errors(), [CallError::ServerUnreachable { .. }]));

    let mut trusting = client_with_signature(addr, "0123456789abcdef");
    assert!(trusting.check_server());
    assert!(!trusting.get("/parts/", &[]).is_empty());
}

fn client_with_signature(addr: SocketAddr, signature: &str) -> Client {
    client(addr, json!({"server_signature": signature}))
}

#[test]
fn gzip_bodies_are_inflated() {
    let addr = spawn(mock_server::SIGNATURE);
    let mut client = client(addr, json!({"gzip": true}));

    let tires = value(client.get("/parts/tires/", &[]));
    assert_eq!(tires["tires"][0]["stock"], 4);
}

#[test]
fn xml_output_returns_first_element() {
    let addr = spawn(mock_server::SIGNATURE);
    let mut client = client(addr, json!({"output_format": 2}));

    let codes = value(client.get("/connect/codes/", &[]));
    assert_eq!(
        codes,
        json!([{"code": "100", "message": "ok"}, {"code": "200", "message": "pending"}])
    );
}

#[test]
fn raw_bytes_when_auto_decode_is_off() {
    let addr = spawn(mock_server::SIGNATURE);
    let mut client = client(addr, json!({"output_compile": false}));

    let response = client.get("/connect/codes/", &[]);
    let body: Value = serde_json::from_slice(response.as_bytes().unwrap()).unwrap();
    assert_eq!(body["codes"][1]["message"], "pending");
}

// --- redirects ---

#[test]
fn native_redirects_reach_provider_list() {
    let addr = spawn(mock_server::SIGNATURE);
    let mut client = client(addr, json!({}));

    let providers = value(client.get("/parts/provider/", &[]));
    assert_eq!(providers["providers"], json!(["Bosch", "Continental"]));
}

#[test]
fn manual_redirects_follow_up_to_budget() {
    let addr = spawn(mock_server::SIGNATURE);

    let mut enough = sandboxed(addr, json!({"max_redirects": 2}));
    let providers = value(enough.get("/parts/provider/", &[]));
    assert_eq!(providers["providers"][0], "Bosch");

    // One hop lands on the 302 itself, whose body is empty.
    let mut short = sandboxed(addr, json!({}));
    assert_eq!(short.get("/parts/provider/", &[]), DecodedResponse::Empty);
    assert!(short.errors().is_empty());
}

// --- socket ---

#[test]
fn socket_transport_round_trip() {
    let addr = spawn(mock_server::SIGNATURE);
    let mut client = client(addr, json!({"handle": "socket", "port": addr.port()}));

    let affiliates = value(client.get("/config/affiliates/", &[]));
    assert!(client.errors().is_empty(), "{:?}", client.errors());
    assert_eq!(affiliates["affiliates"][1]["name"], "Filial Centro");

    let order = value(client.post("/parts/order/", &[("part", "A 1")]));
    assert_eq!(order["order"]["fields"]["part"], "A 1");

    let deleted = value(client.delete("/parts/order/4"));
    assert_eq!(deleted["order"]["id"], 4);
}

#[test]
fn socket_transport_refused_connection() {
    let addr = spawn(mock_server::SIGNATURE);
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let unused = closed.local_addr().unwrap().port();
    drop(closed);

    let mut client = client(addr, json!({"handle": "socket", "port": unused}));
    assert_eq!(client.get("/parts/", &[]), DecodedResponse::Empty);
    assert!(matches!(client.errors(), [CallError::TransportFailure(_)]));
}

// --- stream ---

#[test]
fn stream_transport_reads_only() {
    let addr = spawn(mock_server::SIGNATURE);
    let mut client = client(addr, json!({"handle": "stream"}));

    let parts = value(client.get("/parts/", &[]));
    assert_eq!(parts["parts"][1]["code"], "B2");

    assert_eq!(client.delete("/parts/order/1"), DecodedResponse::Empty);
    assert!(matches!(client.errors(), [CallError::Configuration(_)]));
}
