use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

pub const DEFAULT_USER: &str = "user";
pub const DEFAULT_PASSWORD: &str = "secret";
pub const SESSION_ID: &str = "mock-session";
/// Body of `GET /binary`; deliberately not valid UTF-8.
pub const BINARY_PAYLOAD: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff, 0xfe, 0x00, 0x80];
const REALM: &str = "mock";

/// What the server saw, returned as the JSON body of every echoed request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    /// Path exactly as sent, percent-encoding intact.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    fn capture(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> Self {
        let query = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        let cookies = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self {
            method: method.to_string(),
            path: uri.path().to_string(),
            query,
            headers: headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            cookies,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// First header value with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone)]
struct MockState {
    expected_authorization: Arc<String>,
    hits: Arc<AtomicUsize>,
}

/// Router guarding `/secure` with the default credentials.
pub fn app() -> Router {
    app_with_credentials(DEFAULT_USER, DEFAULT_PASSWORD)
}

/// - `GET /__hits`: number of requests served by the other routes.
/// - `/secure`, `/secure/*`: echo, but only with matching Basic credentials;
///   otherwise `401` with a Basic challenge.
/// - `/status/{code}`: empty response with the given status.
/// - `/session`: echo and set a `JSESSIONID` cookie.
/// - `GET /binary`: `BINARY_PAYLOAD` as `application/octet-stream`.
/// - anything else: echo.
pub fn app_with_credentials(user: &str, password: &str) -> Router {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
    let state = MockState {
        expected_authorization: Arc::new(format!("Basic {encoded}")),
        hits: Arc::new(AtomicUsize::new(0)),
    };
    Router::new()
        .route("/__hits", get(hits))
        .route("/secure", any(secure))
        .route("/secure/{*rest}", any(secure))
        .route("/status/{code}", any(status))
        .route("/session", any(session))
        .route("/binary", get(binary))
        .fallback(echo)
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn hits(State(state): State<MockState>) -> Json<usize> {
    Json(state.hits.load(Ordering::SeqCst))
}

async fn echo(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    tracing::debug!(%method, %uri, "echo");
    Json(Echo::capture(&method, &uri, &headers, &body))
}

async fn secure(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let presented = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    if presented != Some(state.expected_authorization.as_str()) {
        tracing::debug!(%uri, "challenging unauthenticated request");
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{REALM}\""))],
        )
            .into_response();
    }
    Json(Echo::capture(&method, &uri, &headers, &body)).into_response()
}

async fn status(State(state): State<MockState>, Path(code): Path<u16>) -> StatusCode {
    state.hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn binary(State(state): State<MockState>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "application/octet-stream")], BINARY_PAYLOAD).into_response()
}

async fn session(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    (
        [(header::SET_COOKIE, format!("JSESSIONID={SESSION_ID}; Path=/; HttpOnly"))],
        Json(Echo::capture(&method, &uri, &headers, &body)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(uri: &str, headers: &[(&str, &str)], body: &str) -> Echo {
        let uri: Uri = uri.parse().unwrap();
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(
                header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        Echo::capture(&Method::POST, &uri, &map, &Bytes::from(body.to_string()))
    }

    #[test]
    fn echo_captures_path_and_query() {
        let echo = capture("/api/users%20x?page=2&q=a+b", &[], "");
        assert_eq!(echo.method, "POST");
        assert_eq!(echo.path, "/api/users%20x");
        assert_eq!(
            echo.query,
            vec![("page".to_string(), "2".to_string()), ("q".to_string(), "a b".to_string())]
        );
    }

    #[test]
    fn echo_keeps_duplicate_headers() {
        let echo = capture("/", &[("x-id", "1"), ("x-id", "2")], "");
        let ids: Vec<_> = echo.headers.iter().filter(|(n, _)| n == "x-id").map(|(_, v)| v.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(echo.header("X-ID"), Some("1"));
    }

    #[test]
    fn echo_splits_cookie_header() {
        let echo = capture("/", &[("cookie", "a=1; JSESSIONID=s")], "");
        assert_eq!(
            echo.cookies,
            vec![("a".to_string(), "1".to_string()), ("JSESSIONID".to_string(), "s".to_string())]
        );
    }

    #[test]
    fn echo_body_is_lossy_utf8() {
        let echo = capture("/", &[], "hello");
        assert_eq!(echo.body, "hello");
        assert!(echo.query.is_empty());
        assert!(echo.cookies.is_empty());
    }
}
