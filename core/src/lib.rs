//! Fluent HTTP request accumulator for API test suites.
//!
//! # Overview
//! `ApiBase` collects request configuration (base URI, port, base path,
//! headers, cookies, auth, body, multipart fields, path and query params,
//! session id) through chained setters, finalizes it into a `RequestSpec`,
//! and dispatches GET/POST/PUT/DELETE calls against it through a `Transport`.
//!
//! ```no_run
//! use api_base::{ApiBase, HttpMethod};
//!
//! let mut api = ApiBase::init("http://localhost", 8080, "/api", [("Accept", "application/json")]);
//! let response = api.get_response(HttpMethod::Get, "/users")?;
//! println!("{} {}", response.status, response.text());
//! # Ok::<(), api_base::ApiError>(())
//! ```
//!
//! # Design
//! - Setters mutate a draft; `build_request_spec` snapshots it. Dispatch reads
//!   only the snapshot and builds one lazily on first use.
//! - Request assembly is pure data (`HttpRequest`), so it is testable without
//!   a network. `UreqTransport` does the actual I/O by default.
//! - Responses come back untouched, including 4xx/5xx.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
mod multipart;
pub mod spec;
pub mod transport;
pub mod types;

pub use client::ApiBase;
pub use config::TargetConfig;
pub use error::{ApiError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use spec::{RequestSpec, DEFAULT_SESSION_ID_NAME};
pub use transport::{Transport, UreqTransport};
pub use types::{Auth, ContentType, Cookie, Endpoint, MultiPart, PartValue};
