//! Blocking HTTP convenience client with typed request options.
//!
//! # Overview
//! `Client::get/post/put/delete/request` take a URL and a `RequestOptions`
//! record (accept type, query parameters, body or multipart form, response
//! destination), send the request with `ureq`, classify the status and
//! decode the response body into the caller's value.
//!
//! ```no_run
//! use httpkit::{Body, Client, RequestOptions};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Default)]
//! struct Item {
//!     name: String,
//! }
//!
//! # fn main() -> Result<(), httpkit::Error> {
//! let client = Client::new();
//! let mut created = Item::default();
//! let status = client.post(
//!     "http://localhost:3000/items",
//!     RequestOptions::new()
//!         .body(Body::json(&Item { name: "bolt".into() })?)
//!         .into_value(&mut created),
//! )?;
//! assert_eq!(status, 201);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - Options are resolved last-write-wins, from builder calls or from a list
//!   of `RequestOption` values.
//! - 200, 201 and 204 are success; only 200 fills the destination.
//! - The response `Content-Type` picks the codec, falling back to the
//!   request's Accept when the server sends none.
//! - Multipart bodies stream from a background thread through a bounded pipe.

pub mod client;
pub mod error;
pub mod http;
pub mod multipart;
pub mod options;
mod pipe;
pub mod request;

pub use client::{BeforeRequest, Client, ClientBuilder, ClientConfig};
pub use error::{BoxError, Error};
pub use http::{
    Format, HttpMethod, JSON_CONTENT_TYPE, STREAM_CONTENT_TYPE, TEXT_CONTENT_TYPE,
    XML_CONTENT_TYPE, ZIP_CONTENT_TYPE,
};
pub use multipart::FormReport;
pub use options::{
    Body, Decode, Destination, FailurePolicy, Form, Payload, RequestOption, RequestOptions,
    UploadFile,
};
pub use ureq::http::Request;
