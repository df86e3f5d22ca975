//! Output sink shared by commands.

use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex, PoisonError};

use eldritch_common_config::{vars, Environment};

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Where command output goes: stdout/stderr normally, memory in tests.
#[derive(Clone)]
pub struct Console {
    out: Sink,
    err: Sink,
    color: bool,
}

impl Console {
    /// Write to the process's stdout and stderr. Colour needs a terminal and
    /// no `NO_COLOR`.
    pub fn stdio() -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(io::stdout()))),
            err: Arc::new(Mutex::new(Box::new(io::stderr()))),
            color: Environment::get(vars::NO_COLOR).is_none() && io::stdout().is_terminal(),
        }
    }

    /// Capture everything in memory; read it back through the returned buffer.
    pub fn buffered() -> (Self, ConsoleBuffer) {
        let buffer = ConsoleBuffer::default();
        let console = Self {
            out: Arc::new(Mutex::new(Box::new(SharedBytes(Arc::clone(&buffer.out))))),
            err: Arc::new(Mutex::new(Box::new(SharedBytes(Arc::clone(&buffer.err))))),
            color: false,
        };
        (console, buffer)
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// `text` in green when colour is on, unchanged otherwise.
    pub fn success(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[32m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn print(&self, text: &str) -> io::Result<()> {
        write_to(&self.out, text.as_bytes())
    }

    pub fn println(&self, line: &str) -> io::Result<()> {
        write_to(&self.out, format!("{line}\n").as_bytes())
    }

    pub fn blank(&self) -> io::Result<()> {
        write_to(&self.out, b"\n")
    }

    pub fn eprint(&self, text: &str) -> io::Result<()> {
        write_to(&self.err, text.as_bytes())
    }

    pub fn eprintln(&self, line: &str) -> io::Result<()> {
        write_to(&self.err, format!("{line}\n").as_bytes())
    }

    pub fn is_color(&self) -> bool {
        self.color
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::stdio()
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console").field("color", &self.color).finish_non_exhaustive()
    }
}

fn write_to(sink: &Sink, bytes: &[u8]) -> io::Result<()> {
    let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
    sink.write_all(bytes)?;
    sink.flush()
}

/// Read side of [`Console::buffered`].
#[derive(Debug, Clone, Default)]
pub struct ConsoleBuffer {
    out: Arc<Mutex<Vec<u8>>>,
    err: Arc<Mutex<Vec<u8>>>,
}

impl ConsoleBuffer {
    /// Everything printed to the output side so far.
    pub fn contents(&self) -> String {
        read(&self.out)
    }

    /// Everything printed to the error side so far.
    pub fn errors(&self) -> String {
        read(&self.err)
    }

    pub fn clear(&self) {
        self.out.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.err.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

fn read(bytes: &Mutex<Vec<u8>>) -> String {
    String::from_utf8_lossy(&bytes.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
}

struct SharedBytes(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBytes {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
