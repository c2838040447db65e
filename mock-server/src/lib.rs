//! In-process imitation of the Smart Dealer webservice.
//!
//! Covers a subset of the route table with canned payloads, plus:
//! - HTTP Basic auth on every API route (`401 Unauthorized` otherwise);
//! - a `Server-Signature` header on every response, including `/`;
//! - `Output-Format: 2` selects XML bodies, anything else JSON;
//! - `Gzip: 1` gzips the body without setting `Content-Encoding`;
//! - `/parts/provider/` answers 301, then 302, before reaching the list.

use std::collections::BTreeMap;
use std::io::Write;

use axum::{
    extract::{FromRequest, Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Form, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{write::GzEncoder, Compression};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const SIGNATURE: &str = "7cac394e6e2864b8e2f98e7fe815ab6b";
pub const USERNAME: &str = "dealer";
pub const PASSWORD: &str = "secret";

pub fn app() -> Router {
    app_with_signature(SIGNATURE)
}

/// Same service, advertising `signature` instead of the real one.
pub fn app_with_signature(signature: &'static str) -> Router {
    let api = Router::new()
        .route("/config/affiliates/", get(affiliates))
        .route("/parts/", get(parts))
        .route("/parts/{page}", get(parts_page))
        .route("/parts/provider/", get(provider_moved))
        .route("/parts/provider/moved/", get(provider_found))
        .route("/parts/providers/", get(providers))
        .route("/parts/tires/", get(tires))
        .route("/parts/order/", post(create_order))
        .route("/parts/order/{id}", delete(delete_order))
        .route("/connect/codes/", get(codes))
        .route_layer(middleware::from_fn(require_basic_auth));

    Router::new()
        .route("/", get(root))
        .merge(api)
        .layer(middleware::map_response_with_state(
            HeaderValue::from_static(signature),
            sign,
        ))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, app()).await
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

async fn sign(State(signature): State<HeaderValue>, mut response: Response) -> Response {
    response.headers_mut().insert("server-signature", signature);
    response
}

async fn require_basic_auth(request: Request, next: Next) -> Response {
    let expected = format!("Basic {}", BASE64.encode(format!("{USERNAME}:{PASSWORD}")));
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == expected);
    if authorized {
        next.run(request).await
    } else {
        tracing::debug!(uri = %request.uri(), "rejecting unauthenticated request");
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

async fn root() -> &'static str {
    "Smart Dealer webservice"
}

/// Render `payload` as JSON or XML and gzip it, as the request headers ask.
pub fn respond(headers: &HeaderMap, payload: Value) -> Response {
    let wants = |name: &str, value: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == value)
    };

    let (content_type, body) = if wants("output-format", "2") {
        ("application/xml", to_xml("response", &payload).into_bytes())
    } else {
        ("application/json", payload.to_string().into_bytes())
    };

    let body = if wants("gzip", "1") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        match encoder.write_all(&body).and_then(|_| encoder.finish()) {
            Ok(compressed) => compressed,
            Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    } else {
        body
    };

    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// XML rendering where arrays repeat their parent element.
pub fn to_xml(name: &str, value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(|item| to_xml(name, item)).collect(),
        Value::Object(map) => {
            let inner: String = map.iter().map(|(key, item)| to_xml(key, item)).collect();
            format!("<{name}>{inner}</{name}>")
        }
        Value::Null => format!("<{name}/>"),
        Value::String(text) => format!("<{name}>{}</{name}>", escape(text)),
        other => format!("<{name}>{other}</{name}>"),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn catalog() -> Value {
    json!([
        {"code": "A1", "description": "Filtro de oleo", "stock": 12},
        {"code": "B2", "description": "Pastilha de freio", "stock": 3}
    ])
}

async fn affiliates(headers: HeaderMap) -> Response {
    respond(
        &headers,
        json!({"affiliates": [{"id": 1, "name": "Matriz"}, {"id": 2, "name": "Filial Centro"}]}),
    )
}

async fn parts(headers: HeaderMap) -> Response {
    respond(&headers, json!({"parts": catalog(), "page": 1}))
}

async fn parts_page(headers: HeaderMap, Path(page): Path<u32>) -> Response {
    respond(&headers, json!({"parts": catalog(), "page": page}))
}

async fn provider_moved() -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/parts/provider/moved/")]).into_response()
}

async fn provider_found() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/parts/providers/")]).into_response()
}

async fn providers(headers: HeaderMap) -> Response {
    respond(&headers, json!({"providers": ["Bosch", "Continental"]}))
}

async fn tires(headers: HeaderMap) -> Response {
    respond(&headers, json!({"tires": [{"size": "175/70 R13", "stock": 4}]}))
}

async fn codes(headers: HeaderMap) -> Response {
    respond(
        &headers,
        json!({"codes": [{"code": "100", "message": "ok"}, {"code": "200", "message": "pending"}]}),
    )
}

/// Form fields from a multipart or url-encoded body. A body without a content
/// type counts as an empty form.
async fn read_form(request: Request) -> Result<BTreeMap<String, String>, StatusCode> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase);

    match content_type {
        None => Ok(BTreeMap::new()),
        Some(ct) if ct.starts_with("multipart/form-data") => {
            let mut multipart = axum::extract::Multipart::from_request(request, &())
                .await
                .map_err(|_| StatusCode::BAD_REQUEST)?;
            let mut fields = BTreeMap::new();
            while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
                let name = field.name().unwrap_or_default().to_string();
                let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                fields.insert(name, value);
            }
            Ok(fields)
        }
        Some(_) => {
            let Form(fields) = Form::<BTreeMap<String, String>>::from_request(request, &())
                .await
                .map_err(|_| StatusCode::BAD_REQUEST)?;
            Ok(fields)
        }
    }
}

async fn create_order(headers: HeaderMap, request: Request) -> Response {
    match read_form(request).await {
        Ok(fields) => respond(&headers, json!({"order": {"status": "created", "fields": fields}})),
        Err(status) => status.into_response(),
    }
}

async fn delete_order(headers: HeaderMap, Path(id): Path<u64>) -> Response {
    respond(&headers, json!({"order": {"id": id, "status": "deleted"}}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_repeats_array_elements() {
        let xml = to_xml("response", &json!({"parts": [{"code": "A1"}, {"code": "B2"}]}));
        assert_eq!(
            xml,
            "<response><parts><code>A1</code></parts><parts><code>B2</code></parts></response>"
        );
    }

    #[test]
    fn xml_escapes_text() {
        assert_eq!(to_xml("m", &json!("a<b & c")), "<m>a&lt;b &amp; c</m>");
        assert_eq!(to_xml("m", &Value::Null), "<m/>");
    }

    #[test]
    fn respond_defaults_to_json() {
        let response = respond(&HeaderMap::new(), json!({"a": 1}));
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn respond_switches_to_xml() {
        let mut headers = HeaderMap::new();
        headers.insert("output-format", HeaderValue::from_static("2"));
        let response = respond(&headers, json!({"a": 1}));
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml"
        );
    }
}
