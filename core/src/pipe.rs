//! Bounded in-memory pipe between a producer thread and a request body reader.
//!
//! # Design
//! The writer batches bytes into fixed-size chunks and hands them over a
//! `sync_channel`, so at most `capacity` chunks are in flight and memory stays
//! bounded no matter how much the producer writes. Completion is explicit:
//! the producer calls `finish` on success or `fail` on error. A writer that
//! is dropped without either (panic, early return) pushes an error down the
//! pipe, so the reader never mistakes an aborted stream for a complete one.

use std::io::{self, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

type Chunk = io::Result<Vec<u8>>;

/// Create a pipe holding at most `capacity` chunks in flight.
pub(crate) fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (sender, receiver) = sync_channel(capacity.max(1));
    (
        PipeWriter {
            sender: Some(sender),
            buf: Vec::with_capacity(CHUNK_SIZE),
        },
        PipeReader {
            receiver,
            current: Vec::new(),
            pos: 0,
            done: false,
        },
    )
}

pub(crate) struct PipeWriter {
    sender: Option<SyncSender<Chunk>>,
    buf: Vec<u8>,
}

impl PipeWriter {
    /// Flush buffered bytes and close the pipe; the reader sees EOF.
    pub(crate) fn finish(mut self) -> io::Result<()> {
        self.send_buffered()?;
        self.sender = None;
        Ok(())
    }

    /// Close the pipe with an error; the reader's next `read` returns it.
    pub(crate) fn fail(mut self, err: &io::Error) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Err(io::Error::new(err.kind(), err.to_string())));
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pipe already closed"))?;
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE));
        sender
            .send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body reader hung up"))
    }
}

impl Write for PipeWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = CHUNK_SIZE - self.buf.len();
        let n = room.min(data.len());
        self.buf.extend_from_slice(&data[..n]);
        if self.buf.len() == CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Err(io::Error::other(
                "multipart writer stopped before completing the body",
            )));
        }
    }
}

pub(crate) struct PipeReader {
    receiver: Receiver<Chunk>,
    current: Vec<u8>,
    pos: usize,
    done: bool,
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.pos == self.current.len() {
            if self.done {
                return Ok(0);
            }
            match self.receiver.recv() {
                Ok(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(Err(err)) => {
                    self.done = true;
                    return Err(err);
                }
                // Sender gone after `finish`.
                Err(_) => {
                    self.done = true;
                    return Ok(0);
                }
            }
        }
        let n = (self.current.len() - self.pos).min(out.len());
        out[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
