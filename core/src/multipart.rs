//! Streaming `multipart/form-data` encoder.
//!
//! # Design
//! `write_form` serializes a `Form` into any `Write`: fields first (sorted by
//! name), then files in the order given, each file copied straight from disk
//! so its size never matters. `spawn` runs the same encoder on a background
//! thread feeding a bounded pipe whose reader becomes the request body.
//!
//! A file that cannot be opened is handled by the form's `FailurePolicy`.
//! A read error halfway through a file always fails the stream: that part is
//! already partially on the wire and cannot be dropped.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::options::{FailurePolicy, Form};
use crate::pipe::{pipe, PipeReader};

/// Outcome of a completed multipart stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormReport {
    pub fields_written: usize,
    pub files_written: usize,
    /// Files omitted under `FailurePolicy::Skip`, with the open error.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Random boundary; 32 hex digits never collide with realistic field data.
pub fn boundary() -> String {
    format!("httpkit-{}", Uuid::new_v4().simple())
}

pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

/// Encode `form` into `out` using `boundary`.
pub fn write_form<W: Write>(form: &Form, boundary: &str, out: &mut W) -> io::Result<FormReport> {
    let mut report = FormReport::default();

    for (name, value) in &form.fields {
        write!(
            out,
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
            escape(name)
        )?;
        out.write_all(value.as_bytes())?;
        out.write_all(b"\r\n")?;
        report.fields_written += 1;
    }

    for (index, upload) in form.files.iter().enumerate() {
        let mut file = match File::open(&upload.path) {
            Ok(file) => file,
            Err(err) => match form.on_failure {
                FailurePolicy::Skip => {
                    warn!(path = %upload.path.display(), error = %err, "skipping upload file");
                    report.skipped.push((upload.path.clone(), err.to_string()));
                    continue;
                }
                FailurePolicy::Abort => {
                    return Err(io::Error::new(
                        err.kind(),
                        format!("open {}: {err}", upload.path.display()),
                    ));
                }
            },
        };

        let field_name = upload.field_name_at(index);
        let mime = mime_guess::from_path(&upload.path).first_or_octet_stream();
        write!(
            out,
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            escape(&field_name),
            escape(&file_name(&upload.path)),
        )?;
        write!(out, "Content-Type: {}\r\n\r\n", mime.essence_str())?;
        io::copy(&mut file, out)?;
        out.write_all(b"\r\n")?;
        report.files_written += 1;
    }

    write!(out, "--{boundary}--\r\n")?;
    out.flush()?;
    Ok(report)
}

/// Start the encoder on its own thread. The reader yields the body; the
/// handle yields the report, or the error that also ended the reader.
pub(crate) fn spawn(
    form: Form,
    boundary: String,
    capacity: usize,
) -> io::Result<(PipeReader, JoinHandle<io::Result<FormReport>>)> {
    let (mut writer, reader) = pipe(capacity);
    let handle = thread::Builder::new()
        .name("httpkit-multipart".to_string())
        .spawn(move || match write_form(&form, &boundary, &mut writer) {
            Ok(report) => {
                writer.finish()?;
                debug!(
                    fields = report.fields_written,
                    files = report.files_written,
                    skipped = report.skipped.len(),
                    "multipart body complete"
                );
                Ok(report)
            }
            Err(err) => {
                writer.fail(&err);
                Err(err)
            }
        })?;
    Ok((reader, handle))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
