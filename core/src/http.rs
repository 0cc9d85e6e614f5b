//! HTTP vocabulary shared by the request builder and the dispatcher.
//!
//! # Design
//! `HttpMethod` keeps the verbs the client exposes as named variants and
//! lets anything else through as `Custom`, which is validated only when the
//! request head is built. Media types are classified by their essence
//! (parameters stripped, case folded) so `application/json; charset=utf-8`
//! and `application/problem+json` both select the JSON codec.

use ureq::http::Method;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const XML_CONTENT_TYPE: &str = "application/xml";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";
pub const STREAM_CONTENT_TYPE: &str = "application/octet-stream";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    /// Extension method; must be a valid token or the call fails before I/O.
    Custom(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Custom(name) => name,
        }
    }

    pub(crate) fn to_method(&self) -> Result<Method, ureq::http::method::InvalidMethod> {
        match self {
            HttpMethod::Get => Ok(Method::GET),
            HttpMethod::Post => Ok(Method::POST),
            HttpMethod::Put => Ok(Method::PUT),
            HttpMethod::Delete => Ok(Method::DELETE),
            HttpMethod::Patch => Ok(Method::PATCH),
            HttpMethod::Head => Ok(Method::HEAD),
            HttpMethod::Custom(name) => Method::from_bytes(name.as_bytes()),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured encodings the client knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
}

impl Format {
    /// Classify a `Content-Type` / `Accept` value. `None` means "leave the
    /// body unparsed".
    pub fn from_media_type(value: &str) -> Option<Format> {
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => Some(Format::Json),
            "application/xml" | "text/xml" => Some(Format::Xml),
            e if e.ends_with("+json") => Some(Format::Json),
            e if e.ends_with("+xml") => Some(Format::Xml),
            _ => None,
        }
    }
}
