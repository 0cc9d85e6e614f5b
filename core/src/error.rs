//! Error types for the httpkit client.
//!
//! # Design
//! Every failure of a call lands in one enum. Non-success responses keep the
//! numeric status, reason phrase and raw body as separate fields so callers
//! can match on them instead of parsing the display string; the display
//! string still carries all three for logging.

use thiserror::Error;

/// Boxed error returned by a pre-request hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by `Client` calls.
#[derive(Debug, Error)]
pub enum Error {
    /// The URL could not be parsed.
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The request head could not be assembled (bad method token or header value).
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ureq::http::Error),

    /// The pre-request hook refused the request. No network I/O happened.
    #[error("pre-request hook failed: {0}")]
    Hook(#[source] BoxError),

    /// Connection, DNS, TLS or protocol failure. No status code is available.
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),

    /// The server answered with a status other than 200, 201 or 204.
    #[error("request failed: status={status} {reason}, body={body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    /// JSON encoding of a request body or decoding of a response body failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// XML encoding of a request body failed.
    #[error("xml encode: {0}")]
    XmlEncode(#[from] quick_xml::se::SeError),

    /// XML decoding of a response body failed.
    #[error("xml decode: {0}")]
    XmlDecode(#[from] quick_xml::de::DeError),

    /// The multipart producer failed while streaming the form body.
    #[error("multipart form: {0}")]
    Form(#[source] std::io::Error),
}

impl Error {
    /// Status code of the response, when the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body of a non-success response.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}
