//! Rolling Logger
//!
//! Installs the global `tracing` subscriber for the app. Every formatted
//! line goes to `<dir>/<app>.log`, which is rotated by size into
//! `<app>.log.1` .. `<app>.log.N`, and into a circular buffer of recent
//! lines that settings screens can show without touching the filesystem.
//!
//! `log` records are bridged into the same subscriber.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Logger setup errors
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("failed to open log file in {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("logger already initialized")]
    AlreadyInitialized,
    #[error("logger not initialized")]
    NotInitialized,
}

/// Rotation and buffering knobs
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    /// Rotate once the active file would grow past this many bytes
    pub max_file_bytes: u64,
    /// Number of rotated files kept next to the active one
    pub max_files: usize,
    /// Capacity of the in-memory line buffer
    pub buffer_lines: usize,
    /// `EnvFilter` directive, e.g. `info` or `kanban_core=debug`
    pub filter: String,
    /// Also print to stderr (useful on desktop/dev builds)
    pub echo_stderr: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_files: 3,
            buffer_lines: 500,
            filter: "info".to_string(),
            echo_stderr: cfg!(debug_assertions),
        }
    }
}

struct RollingState {
    dir: PathBuf,
    base_name: String,
    file: Option<File>,
    written: u64,
    max_file_bytes: u64,
    max_files: usize,
    buffer: VecDeque<String>,
    buffer_lines: usize,
    partial: String,
}

impl RollingState {
    fn open(dir: &Path, app_name: &str, options: &LoggerOptions) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut state = Self {
            dir: dir.to_path_buf(),
            base_name: app_name.to_string(),
            file: None,
            written: 0,
            max_file_bytes: options.max_file_bytes.max(1),
            max_files: options.max_files,
            buffer: VecDeque::with_capacity(options.buffer_lines),
            buffer_lines: options.buffer_lines,
            partial: String::new(),
        };
        state.open_active()?;
        Ok(state)
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rotated_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, n))
    }

    fn open_active(&mut self) -> io::Result<()> {
        let path = self.active_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.written = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        // Close before renaming, Windows refuses to move open files
        self.file = None;

        if self.max_files == 0 {
            fs::remove_file(self.active_path())?;
        } else {
            let oldest = self.rotated_path(self.max_files);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for n in (1..self.max_files).rev() {
                let from = self.rotated_path(n);
                if from.exists() {
                    fs::rename(&from, self.rotated_path(n + 1))?;
                }
            }
            fs::rename(self.active_path(), self.rotated_path(1))?;
        }

        self.open_active()
    }

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_file_bytes {
            self.rotate()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
            self.written += buf.len() as u64;
        }
        self.remember(buf);
        Ok(())
    }

    fn remember(&mut self, buf: &[u8]) {
        self.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = self.partial.find('\n') {
            let line = self.partial[..pos].trim_end_matches('\r').to_string();
            self.partial.drain(..=pos);
            self.push_line(line);
        }
    }

    fn push_line(&mut self, line: String) {
        if self.buffer_lines == 0 {
            return;
        }
        if self.buffer.len() == self.buffer_lines {
            self.buffer.pop_front();
        }
        self.buffer.push_back(line);
    }
}

/// Handle to a rolling log file plus its line buffer.
///
/// Cheap to clone; all clones share the same file.
#[derive(Clone)]
pub struct RollingLogger {
    state: Arc<Mutex<RollingState>>,
}

impl RollingLogger {
    pub fn new(dir: impl AsRef<Path>, app_name: &str, options: &LoggerOptions) -> Result<Self, LoggerError> {
        let dir = dir.as_ref();
        let state = RollingState::open(dir, app_name, options).map_err(|source| LoggerError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Most recent lines, oldest first
    pub fn recent_lines(&self) -> Vec<String> {
        match self.state.lock() {
            Ok(state) => state.buffer.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Path of the file currently written to
    pub fn log_path(&self) -> Option<PathBuf> {
        self.state.lock().ok().map(|state| state.active_path())
    }
}

/// Writer handed out per event by [`RollingLogger`]
pub struct RollingWriter {
    state: Arc<Mutex<RollingState>>,
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("rolling logger poisoned"))?;
        state.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("rolling logger poisoned"))?;
        match state.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RollingLogger {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RollingWriter {
            state: Arc::clone(&self.state),
        }
    }
}

/// Local wall-clock timestamps, millisecond precision
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

static LOGGER: OnceLock<RollingLogger> = OnceLock::new();

/// Initialize logging with default options
pub fn init_logger(log_dir: PathBuf, app_name: &str) -> Result<(), LoggerError> {
    init_logger_with(log_dir, app_name, LoggerOptions::default())
}

/// Initialize logging; fails if a global subscriber is already set
pub fn init_logger_with(log_dir: PathBuf, app_name: &str, options: LoggerOptions) -> Result<(), LoggerError> {
    if LOGGER.get().is_some() {
        return Err(LoggerError::AlreadyInitialized);
    }

    let logger = RollingLogger::new(&log_dir, app_name, &options)?;
    let filter = EnvFilter::try_new(&options.filter).map_err(|e| LoggerError::Filter(e.to_string()))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(LocalTimer)
        .with_writer(logger.clone());
    let stderr_layer = options.echo_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_timer(LocalTimer)
            .with_writer(io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    let _ = LOGGER.set(logger);
    log::info!("{} logging to {}", app_name, log_dir.display());
    Ok(())
}

/// Lines kept by the global logger, empty before init
pub fn recent_lines() -> Vec<String> {
    LOGGER.get().map(RollingLogger::recent_lines).unwrap_or_default()
}

fn ensure_initialized() -> Result<(), LoggerError> {
    LOGGER.get().map(|_| ()).ok_or(LoggerError::NotInitialized)
}

pub fn info(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::info!(target: "app", "{}", msg);
    Ok(())
}

pub fn warn(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::warn!(target: "app", "{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::error!(target: "app", "{}", msg);
    Ok(())
}
