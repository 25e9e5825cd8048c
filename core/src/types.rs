//! Value types held by a request spec.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Content type of a request body.
///
/// Known MIME types map to named variants; anything else is kept verbatim in
/// `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Any,
    Text,
    Json,
    Xml,
    Html,
    UrlEncoded,
    Binary,
    Multipart,
    Custom(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Any => "*/*",
            ContentType::Text => "text/plain",
            ContentType::Json => "application/json",
            ContentType::Xml => "application/xml",
            ContentType::Html => "text/html",
            ContentType::UrlEncoded => "application/x-www-form-urlencoded",
            ContentType::Binary => "application/octet-stream",
            ContentType::Multipart => "multipart/form-data",
            ContentType::Custom(raw) => raw,
        }
    }

    pub(crate) fn is_multipart(&self) -> bool {
        self.as_str()
            .get(..10)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/"))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ContentType {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "*/*" => ContentType::Any,
            "text/plain" => ContentType::Text,
            "application/json" => ContentType::Json,
            "application/xml" => ContentType::Xml,
            "text/html" => ContentType::Html,
            "application/x-www-form-urlencoded" => ContentType::UrlEncoded,
            "application/octet-stream" => ContentType::Binary,
            "multipart/form-data" => ContentType::Multipart,
            _ => ContentType::Custom(raw.to_string()),
        }
    }
}

impl From<String> for ContentType {
    fn from(raw: String) -> Self {
        ContentType::from(raw.as_str())
    }
}

impl From<ContentType> for String {
    fn from(content_type: ContentType) -> Self {
        content_type.as_str().to_string()
    }
}

/// Authentication scheme applied to every dispatched call.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Auth {
    #[default]
    None,
    /// Credentials are sent only after the server answers with a Basic challenge.
    Basic { user: String, password: String },
    /// Credentials are sent with the first request.
    PreemptiveBasic { user: String, password: String },
}

impl Auth {
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn preemptive_basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::PreemptiveBasic {
            user: user.into(),
            password: password.into(),
        }
    }

    /// `Authorization` header value for either basic variant.
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Auth::None => None,
            Auth::Basic { user, password } | Auth::PreemptiveBasic { user, password } => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
                Some(format!("Basic {encoded}"))
            }
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            Auth::PreemptiveBasic { user, .. } => f
                .debug_struct("PreemptiveBasic")
                .field("user", user)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// A request cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

impl FromStr for Cookie {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| ApiError::configuration(format!("cookie `{s}` is not name=value")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::configuration(format!("cookie `{s}` has an empty name")));
        }
        Ok(Cookie::new(name, value.trim()))
    }
}

/// Value of one multipart/form-data field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartValue {
    Text(String),
    /// Read from disk when the request is assembled.
    File(PathBuf),
}

/// One named field of a multipart/form-data body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPart {
    pub name: String,
    pub value: PartValue,
}

/// Anything that resolves to a request path.
///
/// Implemented for string types. Enums of named endpoints implement it
/// through [`endpoints!`](crate::endpoints) and must resolve to the same
/// literal a raw string would.
pub trait Endpoint {
    fn path(&self) -> Cow<'_, str>;
}

impl Endpoint for str {
    fn path(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Endpoint for String {
    fn path(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl<T: Endpoint + ?Sized> Endpoint for &T {
    fn path(&self) -> Cow<'_, str> {
        (**self).path()
    }
}

/// Declares an enum of named endpoints, each mapped to its literal path.
///
/// ```
/// api_base::endpoints! {
///     pub enum UserEndpoints {
///         Users => "/users",
///         UserById => "/users/{id}",
///     }
/// }
///
/// use api_base::Endpoint;
/// assert_eq!(UserEndpoints::UserById.path(), "/users/{id}");
/// assert_eq!(UserEndpoints::Users.to_string(), "/users");
/// ```
#[macro_export]
macro_rules! endpoints {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $path:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),*
        }

        impl $name {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $path),*
                }
            }
        }

        impl $crate::Endpoint for $name {
            fn path(&self) -> ::std::borrow::Cow<'_, str> {
                ::std::borrow::Cow::Borrowed(self.as_str())
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
