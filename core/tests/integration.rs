//! End-to-end calls against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `ApiBase` with the
//! default ureq transport over real HTTP. The server echoes each request back
//! as JSON, so assertions check what actually went over the wire.

use std::io::Write;
use std::net::SocketAddr;

use api_base::{ApiBase, ApiError, ContentType, Cookie, HttpMethod, HttpResponse};
use mock_server::{Echo, BINARY_PAYLOAD, DEFAULT_PASSWORD, DEFAULT_USER, SESSION_ID};

api_base::endpoints! {
    enum EndPoints {
        Users => "/users",
        UserById => "/users/{id}",
    }
}

/// Start the mock server on a random port and return its address.
fn start_server() -> SocketAddr {
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
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn api(addr: SocketAddr, base_path: &str) -> ApiBase {
    ApiBase::new("http://127.0.0.1", addr.port(), base_path)
}

fn echo(response: &HttpResponse) -> Echo {
    assert_eq!(response.status, 200, "unexpected status, body: {}", response.text());
    serde_json::from_slice(&response.body).unwrap()
}

fn hits(addr: SocketAddr) -> usize {
    let mut counter = api(addr, "/");
    let response = counter.get_response(HttpMethod::Get, "/__hits").unwrap();
    serde_json::from_slice(&response.body).unwrap()
}

#[test]
fn get_sends_headers_to_the_composed_url() {
    let addr = start_server();
    let mut api = ApiBase::init("http://127.0.0.1", addr.port(), "/api", [("Accept", "application/json")]);

    let response = api.get_response(HttpMethod::Get, "/users").unwrap();
    let echo = echo(&response);
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.path, "/api/users");
    assert_eq!(echo.header("accept"), Some("application/json"));
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(hits(addr), 1);
}

#[test]
fn enum_and_literal_endpoints_hit_the_same_path() {
    let addr = start_server();
    let mut api = api(addr, "/api");
    api.set_path_params("id", "42");

    let by_enum = echo(&api.get_response(HttpMethod::Get, &EndPoints::UserById).unwrap());
    let by_literal = echo(&api.get_response(HttpMethod::Get, "/users/{id}").unwrap());
    assert_eq!(by_enum.path, "/api/users/42");
    assert_eq!(by_enum.path, by_literal.path);

    let listed = echo(&api.get_response(HttpMethod::Get, &EndPoints::Users).unwrap());
    assert_eq!(listed.path, "/api/users");
}

#[test]
fn post_and_put_carry_content_type_and_body() {
    let addr = start_server();
    let mut api = api(addr, "/api");
    api.set_content_type_and_body(ContentType::Json, r#"{"name":"Ada"}"#);

    for method in [HttpMethod::Post, HttpMethod::Put] {
        let echo = echo(&api.get_response(method, "/users").unwrap());
        assert_eq!(echo.method, method.to_string());
        assert_eq!(echo.header("content-type"), Some("application/json"));
        assert_eq!(echo.body, r#"{"name":"Ada"}"#);
    }
}

#[test]
fn delete_reaches_the_server() {
    let addr = start_server();
    let mut api = api(addr, "/api");
    let echo = echo(&api.get_response(HttpMethod::Delete, "/users/1").unwrap());
    assert_eq!(echo.method, "DELETE");
    assert_eq!(echo.path, "/api/users/1");
}

#[test]
fn query_params_apply_after_build() {
    let addr = start_server();
    let mut api = api(addr, "/api");
    assert!(matches!(api.set_query_params([("page", 1)]), Err(ApiError::SpecNotBuilt)));

    api.build_request_spec().unwrap();
    api.set_query_params([("page", "2"), ("q", "a b")]).unwrap();
    let echo = echo(&api.get_response(HttpMethod::Get, "/users").unwrap());
    assert_eq!(
        echo.query,
        vec![("page".to_string(), "2".to_string()), ("q".to_string(), "a b".to_string())]
    );
}

#[test]
fn unsupported_verb_issues_no_call() {
    let addr = start_server();
    let mut api = api(addr, "/api");
    assert!(api.get_response_by_name("PATCH", "/users").unwrap().is_none());
    assert_eq!(hits(addr), 0);
}

#[test]
fn later_mutations_do_not_leak_into_dispatch() {
    let addr = start_server();
    let mut api = api(addr, "/api");
    api.set_request_headers([("X-Phase", "built")]);
    api.build_request_spec().unwrap();
    api.set_request_headers([("X-Late", "1")]).set_base_path("/other").unwrap();

    for endpoint in ["/a", "/b"] {
        let echo = echo(&api.get_response(HttpMethod::Get, endpoint).unwrap());
        assert!(echo.path.starts_with("/api/"));
        assert_eq!(echo.header("x-phase"), Some("built"));
        assert!(echo.header("x-late").is_none());
    }
}

#[test]
fn basic_auth_waits_for_the_challenge() {
    let addr = start_server();
    let mut api = api(addr, "/");
    api.set_basic_auth(DEFAULT_USER, DEFAULT_PASSWORD);

    let echo = echo(&api.get_response(HttpMethod::Get, "/secure/data").unwrap());
    assert!(echo.header("authorization").is_some());
    assert_eq!(hits(addr), 2);
}

#[test]
fn preemptive_auth_succeeds_in_one_call() {
    let addr = start_server();
    let mut api = api(addr, "/");
    api.set_preemptive_basic_auth(DEFAULT_USER, DEFAULT_PASSWORD);

    echo(&api.get_response(HttpMethod::Get, "/secure/data").unwrap());
    assert_eq!(hits(addr), 1);
}

#[test]
fn wrong_credentials_return_the_challenge() {
    let addr = start_server();
    let mut api = api(addr, "/");
    api.set_basic_auth(DEFAULT_USER, "wrong");

    let response = api.get_response(HttpMethod::Get, "/secure").unwrap();
    assert_eq!(response.status, 401);
    assert!(response.header("www-authenticate").is_some());
}

#[test]
fn error_statuses_come_back_unmodified() {
    let addr = start_server();
    let mut api = api(addr, "/");
    let response = api.get_response(HttpMethod::Get, "/status/418").unwrap();
    assert_eq!(response.status, 418);
    assert!(!response.is_success());
}

#[test]
fn session_cookie_round_trip() {
    let addr = start_server();
    let mut login = api(addr, "/");
    let response = login.get_response(HttpMethod::Post, "/session").unwrap();
    let session = response
        .cookies()
        .into_iter()
        .find(|c| c.name == "JSESSIONID")
        .unwrap();
    assert_eq!(session.value, SESSION_ID);

    let mut api = ApiBase::init_with_cookie(
        "http://127.0.0.1",
        addr.port(),
        "/api",
        Vec::<(String, String)>::new(),
        ContentType::Text,
        Cookie::new("theme", "dark"),
    );
    api.set_session_config(&session.value);
    let echo = echo(&api.get_response(HttpMethod::Get, "/me").unwrap());
    assert_eq!(
        echo.cookies,
        vec![
            ("theme".to_string(), "dark".to_string()),
            ("JSESSIONID".to_string(), SESSION_ID.to_string()),
        ]
    );
}

#[test]
fn multipart_text_and_file_fields_are_uploaded() {
    let addr = start_server();
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    file.write_all(b"file contents").unwrap();

    let mut api = api(addr, "/api");
    api.set_multi_part("title", "report")
        .set_multi_part_file("attachment", file.path());

    let echo = echo(&api.get_response(HttpMethod::Post, "/upload").unwrap());
    let content_type = echo.header("content-type").unwrap();
    let boundary = content_type.strip_prefix("multipart/form-data; boundary=").unwrap();
    assert!(echo.body.starts_with(&format!("--{boundary}\r\n")));
    assert!(echo.body.contains("name=\"title\""));
    assert!(echo.body.contains("\r\n\r\nreport\r\n"));
    assert!(echo.body.contains("name=\"attachment\"; filename="));
    assert!(echo.body.contains("Content-Type: text/plain\r\n\r\nfile contents\r\n"));
    assert!(echo.body.ends_with(&format!("--{boundary}--\r\n")));
}

#[test]
fn connection_refused_surfaces_as_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut api = ApiBase::new("http://127.0.0.1", port, "/api");
    let err = api.get_response(HttpMethod::Get, "/users").unwrap_err();
    assert!(matches!(err, ApiError::Transport { method: HttpMethod::Get, .. }));
}

#[test]
fn binary_response_body_arrives_byte_for_byte() {
    let addr = start_server();
    let mut api = api(addr, "/");

    let response = api.get_response(HttpMethod::Get, "/binary").unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/octet-stream"));
    assert_eq!(response.body, BINARY_PAYLOAD);
    assert!(response.body_str().is_err());
}
