//! The seam between request assembly and the network.
//!
//! # Design
//! `ApiBase` never talks to the network itself. It hands a fully assembled
//! `HttpRequest` to a `Transport` and returns whatever comes back. TLS,
//! redirects, timeouts and connection reuse are the transport's business.

use std::fmt;

use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one HTTP request and returns the response as data.
///
/// Implementations must return 4xx/5xx responses as `Ok`; `Err` is reserved
/// for failures that produced no response at all.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    /// Agent with ureq's status-code-as-error behavior disabled.
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a caller-configured agent. It should have `http_status_as_error`
    /// disabled, otherwise error statuses surface as transport errors.
    pub fn with_agent(agent: Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let body = request.body.as_deref();

        let mut response = match request.method {
            HttpMethod::Get => send_without_body(apply_headers(self.agent.get(url), request), body)?,
            HttpMethod::Delete => send_without_body(apply_headers(self.agent.delete(url), request), body)?,
            HttpMethod::Post => send_with_body(apply_headers(self.agent.post(url), request), body)?,
            HttpMethod::Put => send_with_body(apply_headers(self.agent.put(url), request), body)?,
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.body_mut().read_to_vec()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn apply_headers<B>(mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_without_body(
    builder: RequestBuilder<WithoutBody>,
    body: Option<&[u8]>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.force_send_body().send(body),
        None => builder.call(),
    }
}

fn send_with_body(
    builder: RequestBuilder<WithBody>,
    body: Option<&[u8]>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body),
        None => builder.send_empty(),
    }
}
