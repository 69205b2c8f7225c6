use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Shared output sink for log events and status lines.
///
/// Workers run concurrently, so every event is written while holding the lock
/// and lines from different swaps never interleave.
#[derive(Clone)]
pub struct Console {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Writes one complete line.
    pub fn line(&self, message: &str) {
        let mut out = self.lock();
        let _ = writeln!(out, "{message}");
        let _ = out.flush();
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

pub struct ConsoleGuard<'a> {
    out: MutexGuard<'a, Box<dyn Write + Send>>,
}

impl Write for ConsoleGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl<'a> MakeWriter<'a> for Console {
    type Writer = ConsoleGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleGuard { out: self.lock() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

impl LogLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            LogLevel::Debug
        } else if quiet {
            LogLevel::Error
        } else {
            LogLevel::Info
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Error => "error",
        }
    }
}

/// Installs the global `tracing` subscriber writing through `console`.
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(console: &Console, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(console.clone())
        .try_init();
}
