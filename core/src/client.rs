//! Blocking HTTP client with typed per-call options.
//!
//! # Design
//! `Client` holds a `ureq::Agent`, an optional pre-request hook and its
//! configuration; none of it changes after construction, so clones share
//! the agent's connection pool. A call goes through three steps:
//!
//! 1. `request::prepare` builds the head and the pending body.
//! 2. The hook may edit the head or refuse the call. Only after it passes is
//!    a multipart producer started.
//! 3. The agent runs the request and the status is classified. A non-success
//!    body is read up to the size limit into `Error::Status`. On exactly 200
//!    with a destination, the body is read under the same limit and copied
//!    or decoded into it. Other success bodies are not read.
//!
//! The agent is built with `http_status_as_error(false)` so every status
//! comes back as data and classification happens here.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace};
use ureq::http::header::{HeaderName, ACCEPT, CONTENT_TYPE};
use ureq::http::{HeaderMap, Request};
use ureq::{Agent, SendBody};

use crate::error::{BoxError, Error};
use crate::http::{Format, HttpMethod};
use crate::multipart::{self, FormReport};
use crate::options::{Destination, RequestOptions};
use crate::request::{self, PendingBody, Prepared};

/// Hook run on every outgoing request head before it is sent.
pub type BeforeRequest = dyn Fn(&mut Request<()>) -> Result<(), BoxError> + Send + Sync;

/// Settings fixed at client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Overall deadline per call. `None` waits as long as the server does.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    /// Largest response body read into memory.
    pub max_response_bytes: u64,
    /// Chunks buffered between the multipart producer and the transport.
    pub pipe_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: Some(concat!("httpkit/", env!("CARGO_PKG_VERSION")).to_string()),
            max_response_bytes: 10 * 1024 * 1024,
            pipe_capacity: 8,
        }
    }
}

#[derive(Clone)]
pub struct Client {
    agent: Agent,
    before_request: Option<Arc<BeforeRequest>>,
    config: ClientConfig,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("before_request", &self.before_request.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Client whose requests all pass through `hook` first.
    pub fn with_hook<F>(hook: F) -> Self
    where
        F: Fn(&mut Request<()>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::builder().before_request(hook).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn get(&self, url: &str, options: RequestOptions<'_>) -> Result<u16, Error> {
        self.request(url, HttpMethod::Get, options)
    }

    pub fn post(&self, url: &str, options: RequestOptions<'_>) -> Result<u16, Error> {
        self.request(url, HttpMethod::Post, options)
    }

    pub fn put(&self, url: &str, options: RequestOptions<'_>) -> Result<u16, Error> {
        self.request(url, HttpMethod::Put, options)
    }

    pub fn delete(&self, url: &str, options: RequestOptions<'_>) -> Result<u16, Error> {
        self.request(url, HttpMethod::Delete, options)
    }

    pub fn patch(&self, url: &str, options: RequestOptions<'_>) -> Result<u16, Error> {
        self.request(url, HttpMethod::Patch, options)
    }

    pub fn head(&self, url: &str, options: RequestOptions<'_>) -> Result<u16, Error> {
        self.request(url, HttpMethod::Head, options)
    }

    /// Send one request and return its status code.
    ///
    /// 200, 201 and 204 are success. Any other status is returned as
    /// `Error::Status` with the raw body. Only a 200 fills the destination.
    pub fn request(
        &self,
        url: &str,
        method: HttpMethod,
        options: RequestOptions<'_>,
    ) -> Result<u16, Error> {
        self.request_with_report(url, method, options).map(|(code, _)| code)
    }

    /// Same as `request`, also returning the multipart producer's report when
    /// the payload was a form. Files skipped under `FailurePolicy::Skip` show
    /// up in `FormReport::skipped`.
    pub fn request_with_report(
        &self,
        url: &str,
        method: HttpMethod,
        options: RequestOptions<'_>,
    ) -> Result<(u16, Option<FormReport>), Error> {
        let Prepared {
            mut head,
            body,
            destination,
        } = request::prepare(url, &method, options, self.config.user_agent.as_deref())?;

        if let Some(hook) = &self.before_request {
            hook(&mut head).map_err(Error::Hook)?;
        }

        // Decoding falls back to the Accept that goes on the wire, hook edits included.
        let accept = header_value(head.headers(), ACCEPT);
        debug!(%method, uri = %head.uri(), "sending request");

        let (send_body, producer) = self.start_body(body)?;
        let result = self.agent.run(head.map(|()| send_body));
        let (mut response, report) = match (result, producer) {
            (Ok(response), Some(producer)) => match join_producer(producer) {
                Ok(report) => (response, Some(report)),
                Err(err) => {
                    debug!(error = %err, "multipart producer ended after the response");
                    (response, None)
                }
            },
            (Ok(response), None) => (response, None),
            // A producer that failed on its own explains the transport failure
            // better than the io error the transport saw. BrokenPipe only means
            // the transport hung up first.
            (Err(err), Some(producer)) => match join_producer(producer) {
                Err(form_err) if form_err.kind() != io::ErrorKind::BrokenPipe => {
                    return Err(Error::Form(form_err))
                }
                _ => return Err(Error::Transport(err)),
            },
            (Err(err), None) => return Err(Error::Transport(err)),
        };

        let status = response.status();
        let code = status.as_u16();
        let content_type = header_value(response.headers(), CONTENT_TYPE);

        if !matches!(code, 200 | 201 | 204) {
            let bytes = read_error_body(response.body_mut(), self.config.max_response_bytes);
            debug!(status = code, bytes = bytes.len(), "request failed");
            return Err(Error::Status {
                status: code,
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        debug!(status = code, "response received");
        if code == 200 {
            if let Some(destination) = destination {
                let bytes = response
                    .body_mut()
                    .with_config()
                    .limit(self.config.max_response_bytes)
                    .read_to_vec()?;
                fill_destination(destination, &content_type, &accept, &bytes)?;
            }
        }

        Ok((code, report))
    }

    fn start_body(
        &self,
        body: Option<PendingBody>,
    ) -> Result<(SendBody<'static>, Option<JoinHandle<io::Result<FormReport>>>), Error> {
        match body {
            None => Ok((SendBody::none(), None)),
            Some(PendingBody::Stream(body)) => Ok((SendBody::from_owned_reader(body.reader), None)),
            Some(PendingBody::Form { form, boundary }) => {
                let (reader, handle) = multipart::spawn(form, boundary, self.config.pipe_capacity)
                    .map_err(Error::Form)?;
                Ok((SendBody::from_owned_reader(reader), Some(handle)))
            }
        }
    }
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Read at most `limit` bytes of a non-success body. A body cut short by the
/// limit or by a read error is kept as far as it got.
fn read_error_body(body: &mut ureq::Body, limit: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    if let Err(err) = body.as_reader().take(limit).read_to_end(&mut bytes) {
        debug!(error = %err, "reading the error body failed");
    }
    bytes
}

fn join_producer(handle: JoinHandle<io::Result<FormReport>>) -> io::Result<FormReport> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("multipart writer panicked")))
}

/// Copy or decode a 200 body. The response's own content type decides the
/// codec; the request's Accept is used only when the response has none.
pub fn fill_destination(
    destination: Destination<'_>,
    content_type: &str,
    accept: &str,
    body: &[u8],
) -> Result<(), Error> {
    match destination {
        Destination::Bytes(buf) => {
            buf.clear();
            buf.extend_from_slice(body);
            Ok(())
        }
        Destination::Value(value) => {
            let declared = if content_type.trim().is_empty() {
                accept
            } else {
                content_type
            };
            match Format::from_media_type(declared) {
                Some(format) => {
                    trace!(?format, declared, "decoding response body");
                    value.decode(format, body)
                }
                None => {
                    trace!(declared, "leaving response body unparsed");
                    Ok(())
                }
            }
        }
    }
}

/// Builder for `Client`.
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    before_request: Option<Arc<BeforeRequest>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("before_request", &self.before_request.is_some())
            .finish()
    }
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// `None` sends no `User-Agent` header.
    pub fn user_agent(mut self, user_agent: Option<String>) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    pub fn max_response_bytes(mut self, limit: u64) -> Self {
        self.config.max_response_bytes = limit;
        self
    }

    pub fn pipe_capacity(mut self, chunks: usize) -> Self {
        self.config.pipe_capacity = chunks;
        self
    }

    pub fn before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Request<()>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.before_request = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Client {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(self.config.timeout)
            .build()
            .new_agent();
        Client {
            agent,
            before_request: self.before_request,
            config: self.config,
        }
    }
}
