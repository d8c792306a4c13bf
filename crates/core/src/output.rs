//! Output Stream
//!
//! Everything the runner sends to the host goes through [`Output`]. Two write
//! modes exist:
//!
//! - [`Output::log`] keeps a multi-line message inside one log record: the
//!   first line is written as-is and every following line is prefixed with
//!   [`CONTINUATION_MARKER`].
//! - [`Output::emit`] writes a payload verbatim, for markdown the host must
//!   render unchanged (inline images, pipe tables, chat replies).
//!
//! Both flush immediately; the host consumes output incrementally.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Prefix for continuation lines of a multi-line log message.
pub const CONTINUATION_MARKER: &str = " >> ";

/// Apply log framing to `msg`.
pub fn format_log_message(msg: &str) -> String {
    let cleaned = msg.replace('\r', "");
    let mut lines = cleaned.split('\n');
    let mut framed = lines.next().unwrap_or_default().to_string();
    for line in lines {
        framed.push('\n');
        framed.push_str(CONTINUATION_MARKER);
        framed.push_str(line);
    }
    framed
}

/// Line-oriented output stream to the host.
pub struct Output {
    writer: Box<dyn Write + Send>,
}

impl Output {
    /// Wrap an arbitrary writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    /// Output bound to the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write a log-framed message followed by a newline.
    pub fn log(&mut self, msg: &str) -> io::Result<()> {
        let framed = format_log_message(msg);
        self.writer.write_all(framed.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Write `payload` verbatim followed by a newline.
    pub fn emit(&mut self, payload: &str) -> io::Result<()> {
        self.writer.write_all(payload.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

/// Cloneable in-memory writer, used to capture output in tests and when a
/// caller needs to inspect what a skill wrote.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Written lines, without trailing newlines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Drop everything written so far.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
