//! Fluent request accumulator and dispatcher.
//!
//! # Design
//! `ApiBase` keeps two copies of the configuration: a draft mutated by the
//! chained setters and an optional finalized `RequestSpec` produced by
//! `build_request_spec`. Dispatch only ever reads the finalized copy, building
//! it on first use, so setters called after a build take effect at the next
//! explicit build. Query params are the exception: they are applied to the
//! finalized copy directly.

use std::path::PathBuf;

use tracing::{debug, debug_span, warn};

use crate::config::TargetConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::spec::RequestSpec;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Auth, ContentType, Cookie, Endpoint, MultiPart, PartValue};

/// Accumulates request configuration for one target service and dispatches
/// calls against it.
#[derive(Debug)]
pub struct ApiBase<T = UreqTransport> {
    draft: RequestSpec,
    spec: Option<RequestSpec>,
    transport: T,
    log_on_failure: bool,
}

impl ApiBase<UreqTransport> {
    /// Accumulator for `base_uri:port` under `base_path`, dispatching through ureq.
    pub fn new(base_uri: &str, port: u16, base_path: &str) -> Self {
        Self::with_transport(base_uri, port, base_path, UreqTransport::new())
    }

    /// `new` followed by `set_request_headers(headers)`.
    pub fn init<K, V>(
        base_url: &str,
        port: u16,
        endpoint: &str,
        headers: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut api = Self::new(base_url, port, endpoint);
        api.set_request_headers(headers);
        api
    }

    /// `init` plus a content type.
    pub fn init_with_content_type<K, V>(
        base_url: &str,
        port: u16,
        endpoint: &str,
        headers: impl IntoIterator<Item = (K, V)>,
        content_type: impl Into<ContentType>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut api = Self::init(base_url, port, endpoint, headers);
        api.set_content_type(content_type);
        api
    }

    /// `init_with_content_type` plus one cookie.
    pub fn init_with_cookie<K, V>(
        base_url: &str,
        port: u16,
        endpoint: &str,
        headers: impl IntoIterator<Item = (K, V)>,
        content_type: impl Into<ContentType>,
        cookie: Cookie,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut api = Self::init_with_content_type(base_url, port, endpoint, headers, content_type);
        api.set_cookie(cookie);
        api
    }

    /// Seed an accumulator from `config`, dispatching through ureq.
    pub fn from_config(config: &TargetConfig) -> Self {
        Self::from_config_with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> ApiBase<T> {
    /// Like `new`, but every request goes through `transport`.
    pub fn with_transport(base_uri: &str, port: u16, base_path: &str, transport: T) -> Self {
        Self {
            draft: RequestSpec::new(base_uri, port, base_path),
            spec: None,
            transport,
            log_on_failure: true,
        }
    }

    /// Seed an accumulator from `config`. Headers, content type, cookies and
    /// session id are applied through the regular setters.
    pub fn from_config_with_transport(config: &TargetConfig, transport: T) -> Self {
        let mut api = Self::with_transport(&config.base_uri, config.port, &config.base_path, transport);
        api.log_on_failure = config.log_on_failure;
        api.set_request_headers(config.headers.iter().cloned())
            .set_cookies(config.cookies.iter().cloned());
        if let Some(content_type) = &config.content_type {
            api.set_content_type(content_type.clone());
        }
        if let Some(session_id) = &config.session_id {
            api.set_session_config(session_id);
        }
        api
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The finalized spec, if `build_request_spec` or a dispatch has run.
    pub fn request_spec(&self) -> Option<&RequestSpec> {
        self.spec.as_ref()
    }

    pub fn set_base_path(&mut self, base_path: &str) -> Result<&mut Self, ApiError> {
        if base_path.trim().is_empty() {
            return Err(ApiError::configuration("base path supplied is blank"));
        }
        self.note_deferred("base path");
        self.draft.base_path = base_path.to_string();
        Ok(self)
    }

    pub fn set_content_type(&mut self, content_type: impl Into<ContentType>) -> &mut Self {
        self.note_deferred("content type");
        self.draft.content_type = Some(content_type.into());
        self
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> &mut Self {
        self.note_deferred("body");
        self.draft.body = Some(body.into());
        self
    }

    pub fn set_content_type_and_body(
        &mut self,
        content_type: impl Into<ContentType>,
        body: impl Into<String>,
    ) -> &mut Self {
        self.set_content_type(content_type).set_body(body)
    }

    /// Replace the auth scheme. Only one scheme is ever active.
    pub fn set_auth(&mut self, auth: Auth) -> &mut Self {
        self.note_deferred("auth");
        self.draft.auth = auth;
        self
    }

    /// Basic auth sent only in answer to a server challenge.
    pub fn set_basic_auth(&mut self, user: &str, password: &str) -> &mut Self {
        self.set_auth(Auth::basic(user, password))
    }

    /// Basic auth sent with the first request.
    pub fn set_preemptive_basic_auth(&mut self, user: &str, password: &str) -> &mut Self {
        self.set_auth(Auth::preemptive_basic(user, password))
    }

    pub fn set_session_config(&mut self, session_id: &str) -> &mut Self {
        self.note_deferred("session id");
        self.draft.session_id = Some(session_id.to_string());
        self
    }

    /// Cookie name carrying the session id. Defaults to `JSESSIONID`.
    pub fn set_session_id_name(&mut self, name: &str) -> &mut Self {
        self.note_deferred("session id name");
        self.draft.session_id_name = name.to_string();
        self
    }

    /// Append headers in order. Repeated names are kept, not merged.
    pub fn set_request_headers<K, V>(&mut self, headers: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.note_deferred("headers");
        self.draft
            .headers
            .extend(headers.into_iter().map(|(name, value)| (name.into(), value.into())));
        self
    }

    pub fn set_cookie(&mut self, cookie: Cookie) -> &mut Self {
        self.note_deferred("cookies");
        self.draft.put_cookie(cookie);
        self
    }

    pub fn set_cookies(&mut self, cookies: impl IntoIterator<Item = Cookie>) -> &mut Self {
        for cookie in cookies {
            self.set_cookie(cookie);
        }
        self
    }

    pub fn set_multi_part(&mut self, name: &str, value: &str) -> &mut Self {
        self.push_part(name, PartValue::Text(value.to_string()))
    }

    /// File field; the file is read when the request is dispatched.
    pub fn set_multi_part_file(&mut self, name: &str, path: impl Into<PathBuf>) -> &mut Self {
        self.push_part(name, PartValue::File(path.into()))
    }

    fn push_part(&mut self, name: &str, value: PartValue) -> &mut Self {
        self.note_deferred("multipart parts");
        self.draft.multi_parts.push(MultiPart {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn set_path_params(&mut self, name: &str, value: &str) -> &mut Self {
        self.note_deferred("path params");
        self.draft.path_params.insert(name.to_string(), value.to_string());
        self
    }

    /// Merge query params into the finalized spec. Later keys overwrite.
    pub fn set_query_params<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>) -> Result<&mut Self, ApiError>
    where
        K: Into<String>,
        V: ToString,
    {
        let spec = self.spec.as_mut().ok_or(ApiError::SpecNotBuilt)?;
        spec.query_params
            .extend(params.into_iter().map(|(name, value)| (name.into(), value.to_string())));
        Ok(self)
    }

    /// Snapshot the accumulated configuration as the spec used for dispatch.
    pub fn build_request_spec(&mut self) -> Result<&RequestSpec, ApiError> {
        self.draft.validate()?;
        Ok(&*self.spec.insert(self.draft.clone()))
    }

    /// Issue `method` against `endpoint`, building the spec first if needed.
    pub fn get_response<E>(&mut self, method: HttpMethod, endpoint: &E) -> Result<HttpResponse, ApiError>
    where
        E: Endpoint + ?Sized,
    {
        let path = endpoint.path();
        let _span = debug_span!("get_response", %method, endpoint = %path).entered();

        if self.spec.is_none() {
            self.build_request_spec()?;
        }
        let Some(spec) = self.spec.as_ref() else {
            return Err(ApiError::SpecNotBuilt);
        };

        let request = spec.to_request(method, &path)?;
        let mut response = self.execute(&request)?;

        if let Auth::Basic { .. } = spec.auth {
            if is_basic_challenge(&response) {
                if let Some(credentials) = spec.auth.authorization_header() {
                    debug!("answering basic auth challenge");
                    let request = request.with_header("Authorization", credentials);
                    response = self.execute(&request)?;
                }
            }
        }

        Ok(response)
    }

    /// Dispatch by verb name. Names other than GET, POST, PUT and DELETE
    /// yield `Ok(None)`: nothing is built and no call is made.
    pub fn get_response_by_name<E>(&mut self, method: &str, endpoint: &E) -> Result<Option<HttpResponse>, ApiError>
    where
        E: Endpoint + ?Sized,
    {
        let Ok(method) = method.parse::<HttpMethod>() else {
            debug!(method, "unsupported method; no request issued");
            return Ok(None);
        };
        self.get_response(method, endpoint).map(Some)
    }

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(
            method = %request.method,
            url = %request.url,
            headers = ?redacted(&request.headers),
            "sending request"
        );
        let response = self
            .transport
            .execute(request)
            .map_err(|source| ApiError::Transport {
                method: request.method,
                url: request.url.clone(),
                source,
            })?;
        debug!(status = response.status, "received response");

        if self.log_on_failure && response.is_failure() {
            warn!(
                method = %request.method,
                url = %request.url,
                request_headers = ?redacted(&request.headers),
                status = response.status,
                response_headers = ?response.headers,
                body = %response.text(),
                "request failed"
            );
        }
        Ok(response)
    }

    fn note_deferred(&self, what: &str) {
        if self.spec.is_some() {
            debug!(setting = what, "spec already built; change applies at next build_request_spec");
        }
    }
}

/// A 401 whose `WWW-Authenticate` headers offer the Basic scheme, whether as
/// a separate header or as one entry of a comma-joined list.
fn is_basic_challenge(response: &HttpResponse) -> bool {
    response.status == 401
        && response
            .headers_named("www-authenticate")
            .flat_map(|value| value.split(','))
            .filter_map(|challenge| challenge.split_whitespace().next())
            .any(|scheme| scheme.eq_ignore_ascii_case("basic"))
}

fn redacted(headers: &[(String, String)]) -> Vec<(&str, &str)> {
    headers
        .iter()
        .map(|(name, value)| {
            if name.eq_ignore_ascii_case("authorization") {
                (name.as_str(), "***")
            } else {
                (name.as_str(), value.as_str())
            }
        })
        .collect()
}
