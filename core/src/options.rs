//! Per-call request options and the resolver that folds them together.
//!
//! # Design
//! A call is configured by a `RequestOptions` record with named optional
//! fields. It can be built with chained setters or resolved from an ordered
//! list of `RequestOption` values; both paths go through `apply`, so the
//! precedence rule is the same: the last option of a kind wins. `Body` and
//! `Form` share one payload slot.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;
use crate::http::{
    Format, JSON_CONTENT_TYPE, STREAM_CONTENT_TYPE, TEXT_CONTENT_TYPE, XML_CONTENT_TYPE,
};

/// A request body: a byte stream plus the headers that describe it.
pub struct Body {
    pub(crate) reader: Box<dyn Read + Send + 'static>,
    pub(crate) content_type: String,
    pub(crate) length: Option<u64>,
}

impl Body {
    /// Stream `reader` as the body. `length` becomes `Content-Length` when set;
    /// otherwise the body is sent chunked.
    pub fn new(
        reader: impl Read + Send + 'static,
        length: Option<u64>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            content_type: content_type.into(),
            length,
        }
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::buffered(bytes, JSON_CONTENT_TYPE))
    }

    pub fn xml<T: Serialize>(value: &T) -> Result<Self, Error> {
        let text = quick_xml::se::to_string(value)?;
        Ok(Self::buffered(text.into_bytes(), XML_CONTENT_TYPE))
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::buffered(data.into(), STREAM_CONTENT_TYPE)
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::buffered(data.into().into_bytes(), TEXT_CONTENT_TYPE)
    }

    fn buffered(data: Vec<u8>, content_type: &str) -> Self {
        let length = data.len() as u64;
        Self::new(std::io::Cursor::new(data), Some(length), content_type)
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("content_type", &self.content_type)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// A file to attach to a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub field_name: Option<String>,
    pub path: PathBuf,
}

impl UploadFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            field_name: None,
            path: path.into(),
        }
    }

    pub fn named(field_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            path: path.into(),
        }
    }

    /// Field name used on the wire. Unnamed files are called `file`, then
    /// `file1`, `file2` and so on by position in the form.
    pub fn field_name_at(&self, index: usize) -> String {
        match &self.field_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ if index == 0 => "file".to_string(),
            _ => format!("file{index}"),
        }
    }
}

/// What the multipart producer does when a file cannot be opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Omit the file, log it, and keep writing the remaining parts.
    #[default]
    Skip,
    /// Stop the upload and fail the call with `Error::Form`.
    Abort,
}

/// A `multipart/form-data` payload: text fields followed by file parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pub fields: BTreeMap<String, String>,
    pub files: Vec<UploadFile>,
    pub on_failure: FailurePolicy,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields plus a single file uploaded under the field name `file`.
    pub fn with_file<K, V>(
        fields: impl IntoIterator<Item = (K, V)>,
        path: impl Into<PathBuf>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_files(fields, [UploadFile::named("file", path)])
    }

    pub fn with_files<K, V>(
        fields: impl IntoIterator<Item = (K, V)>,
        files: impl IntoIterator<Item = UploadFile>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            files: files.into_iter().collect(),
            on_failure: FailurePolicy::default(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn file(mut self, file: UploadFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }
}

/// Something a successful response body can be decoded into.
///
/// Implemented for every `DeserializeOwned` type, so `&mut T` works as a
/// destination for any serde-compatible value.
pub trait Decode {
    fn decode(&mut self, format: Format, body: &[u8]) -> Result<(), Error>;
}

impl<T: DeserializeOwned> Decode for T {
    fn decode(&mut self, format: Format, body: &[u8]) -> Result<(), Error> {
        *self = match format {
            Format::Json => serde_json::from_slice(body)?,
            Format::Xml => quick_xml::de::from_reader(body)?,
        };
        Ok(())
    }
}

/// Where the body of a 200 response goes.
pub enum Destination<'a> {
    /// Replace the buffer's contents with the raw body, whatever its type.
    Bytes(&'a mut Vec<u8>),
    /// Decode JSON or XML into the value; other content types leave it untouched.
    Value(&'a mut dyn Decode),
}

impl fmt::Debug for Destination<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Bytes(_) => f.write_str("Destination::Bytes"),
            Destination::Value(_) => f.write_str("Destination::Value"),
        }
    }
}

/// The request payload slot.
#[derive(Debug)]
pub enum Payload {
    Body(Body),
    Form(Form),
}

/// One aspect of an outgoing call.
#[derive(Debug)]
pub enum RequestOption<'a> {
    Accept(String),
    Query(BTreeMap<String, String>),
    Body(Body),
    Form(Form),
    Destination(Destination<'a>),
}

impl<'a> RequestOption<'a> {
    pub fn accept(value: impl Into<String>) -> Self {
        RequestOption::Accept(value.into())
    }

    pub fn query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        RequestOption::Query(collect_pairs(pairs))
    }

    pub fn into_bytes(buf: &'a mut Vec<u8>) -> Self {
        RequestOption::Destination(Destination::Bytes(buf))
    }

    pub fn into_value<T: Decode>(value: &'a mut T) -> Self {
        RequestOption::Destination(Destination::Value(value))
    }
}

/// Normalized options for a single call.
#[derive(Debug)]
pub struct RequestOptions<'a> {
    pub accept: String,
    pub query: Option<BTreeMap<String, String>>,
    pub payload: Option<Payload>,
    pub destination: Option<Destination<'a>>,
}

impl Default for RequestOptions<'_> {
    fn default() -> Self {
        Self {
            accept: JSON_CONTENT_TYPE.to_string(),
            query: None,
            payload: None,
            destination: None,
        }
    }
}

impl<'a> RequestOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `options` in order; later options of a kind replace earlier ones.
    pub fn resolve(options: impl IntoIterator<Item = RequestOption<'a>>) -> Self {
        options
            .into_iter()
            .fold(Self::default(), |resolved, option| resolved.apply(option))
    }

    pub fn apply(mut self, option: RequestOption<'a>) -> Self {
        match option {
            RequestOption::Accept(accept) => self.accept = accept,
            RequestOption::Query(query) => self.query = Some(query),
            RequestOption::Body(body) => self.payload = Some(Payload::Body(body)),
            RequestOption::Form(form) => self.payload = Some(Payload::Form(form)),
            RequestOption::Destination(dest) => self.destination = Some(dest),
        }
        self
    }

    pub fn accept(self, value: impl Into<String>) -> Self {
        self.apply(RequestOption::accept(value))
    }

    pub fn query<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.apply(RequestOption::query(pairs))
    }

    pub fn body(self, body: Body) -> Self {
        self.apply(RequestOption::Body(body))
    }

    pub fn form(self, form: Form) -> Self {
        self.apply(RequestOption::Form(form))
    }

    pub fn into_bytes(self, buf: &'a mut Vec<u8>) -> Self {
        self.apply(RequestOption::into_bytes(buf))
    }

    pub fn into_value<T: Decode>(self, value: &'a mut T) -> Self {
        self.apply(RequestOption::into_value(value))
    }
}

impl<'a> FromIterator<RequestOption<'a>> for RequestOptions<'a> {
    fn from_iter<I: IntoIterator<Item = RequestOption<'a>>>(iter: I) -> Self {
        Self::resolve(iter)
    }
}

fn collect_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> BTreeMap<String, String>
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
