//! The request spec and its translation into an `HttpRequest`.
//!
//! # Design
//! `RequestSpec` is the single bundle of configuration shared by the
//! accumulator (which mutates a draft copy) and the dispatcher (which only
//! reads a finalized copy). Turning it into an `HttpRequest` is a pure
//! function of the spec, the verb and the endpoint, apart from reading
//! multipart files.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::multipart;
use crate::types::{Auth, ContentType, Cookie, MultiPart};

/// Cookie name used for the session id unless overridden.
pub const DEFAULT_SESSION_ID_NAME: &str = "JSESSIONID";

// Unreserved characters stay literal inside a substituted path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Configuration for calls against one target service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub(crate) base_uri: String,
    pub(crate) port: u16,
    pub(crate) base_path: String,
    pub(crate) content_type: Option<ContentType>,
    pub(crate) body: Option<String>,
    pub(crate) auth: Auth,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) cookies: Vec<Cookie>,
    pub(crate) multi_parts: Vec<MultiPart>,
    pub(crate) path_params: BTreeMap<String, String>,
    pub(crate) query_params: BTreeMap<String, String>,
    pub(crate) session_id: Option<String>,
    pub(crate) session_id_name: String,
}

impl RequestSpec {
    pub(crate) fn new(base_uri: &str, port: u16, base_path: &str) -> Self {
        Self {
            base_uri: base_uri.to_string(),
            port,
            base_path: base_path.to_string(),
            content_type: None,
            body: None,
            auth: Auth::None,
            headers: Vec::new(),
            cookies: Vec::new(),
            multi_parts: Vec::new(),
            path_params: BTreeMap::new(),
            query_params: BTreeMap::new(),
            session_id: None,
            session_id_name: DEFAULT_SESSION_ID_NAME.to_string(),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn multi_parts(&self) -> &[MultiPart] {
        &self.multi_parts
    }

    pub fn path_params(&self) -> &BTreeMap<String, String> {
        &self.path_params
    }

    pub fn query_params(&self) -> &BTreeMap<String, String> {
        &self.query_params
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn session_id_name(&self) -> &str {
        &self.session_id_name
    }

    /// Replace a cookie with the same name in place, or append.
    pub(crate) fn put_cookie(&mut self, cookie: Cookie) {
        match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => existing.value = cookie.value,
            None => self.cookies.push(cookie),
        }
    }

    /// Check the invariants a finalized spec must hold.
    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        if self.base_path.trim().is_empty() {
            return Err(ApiError::configuration("base path supplied is blank"));
        }
        let url = Url::parse(&self.base_uri)
            .map_err(|e| ApiError::configuration(format!("invalid base URI `{}`: {e}", self.base_uri)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
            return Err(ApiError::configuration(format!(
                "base URI `{}` must be an absolute http(s) URL",
                self.base_uri
            )));
        }
        Ok(())
    }

    /// Assemble the request for `method` against `endpoint`.
    ///
    /// The `Authorization` header is only added for preemptive basic auth;
    /// challenge-driven basic auth is handled by the dispatcher. An explicit
    /// content type (or a multipart body) replaces any `Content-Type` given
    /// through the request headers.
    pub fn to_request(&self, method: HttpMethod, endpoint: &str) -> Result<HttpRequest, ApiError> {
        let url = self.resolve_url(endpoint)?;

        let mut headers = self.headers.clone();
        let mut body = self.body.as_ref().map(|b| b.clone().into_bytes());

        if self.content_type.is_some() || !self.multi_parts.is_empty() {
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
        }

        if self.multi_parts.is_empty() {
            if let Some(content_type) = &self.content_type {
                headers.push(("Content-Type".to_string(), content_type.to_string()));
            }
        } else {
            if body.is_some() {
                return Err(ApiError::configuration(
                    "a request cannot carry both a body and multipart parts",
                ));
            }
            let media_type = match &self.content_type {
                None => ContentType::Multipart.to_string(),
                Some(ct) if ct.is_multipart() => ct.to_string(),
                Some(ct) => {
                    return Err(ApiError::configuration(format!(
                        "multipart parts require a multipart content type, got `{ct}`"
                    )))
                }
            };
            let boundary = multipart::new_boundary();
            body = Some(multipart::encode(&self.multi_parts, &boundary)?);
            headers.push(("Content-Type".to_string(), format!("{media_type}; boundary={boundary}")));
        }

        if let Some(cookie_header) = self.cookie_header() {
            headers.push(("Cookie".to_string(), cookie_header));
        }

        if let Auth::PreemptiveBasic { .. } = self.auth {
            if let Some(value) = self.auth.authorization_header() {
                headers.push(("Authorization".to_string(), value));
            }
        }

        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        })
    }

    fn resolve_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let endpoint = self.substitute_path_params(endpoint)?;
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            let mut url = Url::parse(&endpoint)
                .map_err(|e| ApiError::configuration(format!("invalid endpoint URL `{endpoint}`: {e}")))?;
            self.append_query(&mut url);
            return Ok(url);
        }

        let base_path = self.substitute_path_params(&self.base_path)?;
        let (endpoint_path, endpoint_query) = match endpoint.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (endpoint.as_str(), None),
        };

        let mut url = Url::parse(&self.base_uri)
            .map_err(|e| ApiError::configuration(format!("invalid base URI `{}`: {e}", self.base_uri)))?;
        url.set_port(Some(self.port))
            .map_err(|()| ApiError::configuration(format!("base URI `{}` cannot carry a port", self.base_uri)))?;
        let path = join_paths(&[url.path(), base_path.as_str(), endpoint_path]);
        url.set_path(&path);
        url.set_query(endpoint_query.filter(|q| !q.is_empty()));
        self.append_query(&mut url);
        Ok(url)
    }

    fn append_query(&self, url: &mut Url) {
        if self.query_params.is_empty() {
            return;
        }
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &self.query_params {
            pairs.append_pair(name, value);
        }
    }

    /// Replace every `{name}` placeholder with its encoded path param value.
    fn substitute_path_params(&self, template: &str) -> Result<String, ApiError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            let name = &rest[open + 1..close];
            let value = self
                .path_params
                .get(name)
                .ok_or_else(|| ApiError::configuration(format!("unresolved path parameter `{name}`")))?;
            out.push_str(&rest[..open]);
            out.extend(utf8_percent_encode(value, PATH_SEGMENT));
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn cookie_header(&self) -> Option<String> {
        let mut pairs: Vec<String> = self.cookies.iter().map(Cookie::to_string).collect();
        if let Some(session_id) = &self.session_id {
            pairs.push(format!("{}={session_id}", self.session_id_name));
        }
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

/// Join path pieces with exactly one `/` between non-empty pieces.
///
/// A trailing slash is kept only when the last piece (the endpoint) has one.
fn join_paths(pieces: &[&str]) -> String {
    let mut path = String::new();
    for piece in pieces {
        let trimmed = piece.trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        path.push('/');
        path.push_str(trimmed);
    }
    let trailing_slash = pieces
        .last()
        .is_some_and(|last| last.ends_with('/') && !last.trim_matches('/').is_empty());
    if path.is_empty() || trailing_slash {
        path.push('/');
    }
    path
}
