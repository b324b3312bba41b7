use parking_lot::Mutex;
/// Debugging infrastructure for par-global-menu
///
/// Controlled by DEBUG_LEVEL environment variable:
/// - 0 or unset: No debugging
/// - 1: Errors only
/// - 2: Info level (registrations, service transitions)
/// - 3: Debug level (fills, clears, reconciliation passes)
/// - 4: Trace level (every native call and event)
///
/// All output goes to /tmp/par_global_menu_debug.log on Unix/macOS,
/// or %TEMP%\par_global_menu_debug.log on Windows, so the host
/// application's own stdout/stderr stays untouched.
use par_global_menu_config::TraceConfig;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn from_env() -> Self {
        match std::env::var("DEBUG_LEVEL") {
            Ok(val) => Self::parse(&val),
            Err(_) => DebugLevel::Off,
        }
    }

    fn parse(val: &str) -> Self {
        match val.trim().parse::<u8>() {
            Ok(1) => DebugLevel::Error,
            Ok(2) => DebugLevel::Info,
            Ok(3) => DebugLevel::Debug,
            Ok(4) => DebugLevel::Trace,
            _ => DebugLevel::Off,
        }
    }

    fn from_log(level: log::Level) -> Self {
        match level {
            log::Level::Error | log::Level::Warn => DebugLevel::Error,
            log::Level::Info => DebugLevel::Info,
            log::Level::Debug => DebugLevel::Debug,
            log::Level::Trace => DebugLevel::Trace,
        }
    }
}

/// Log file location. Kept out of the host's stdout/stderr.
fn log_path() -> std::path::PathBuf {
    #[cfg(unix)]
    {
        std::path::PathBuf::from("/tmp/par_global_menu_debug.log")
    }
    #[cfg(not(unix))]
    {
        std::env::temp_dir().join("par_global_menu_debug.log")
    }
}

struct DebugLogger {
    level: DebugLevel,
    file: Option<std::fs::File>,
}

impl DebugLogger {
    fn from_env() -> Self {
        let level = DebugLevel::from_env();
        let mut logger = DebugLogger { level, file: None };
        if level == DebugLevel::Off {
            return logger;
        }
        // An unwritable log file leaves the logger silent.
        logger.file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(log_path())
            .ok();
        let rule = "=".repeat(80);
        logger.write_line(&format!(
            "\n{rule}\npar-global-menu debug session started at {} (level={:?})\n{rule}",
            timestamp(),
            level
        ));
        logger
    }

    fn write_line(&mut self, line: &str) {
        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(file, "{}", line);
            let _ = file.flush();
        }
    }

    fn log(&mut self, level: DebugLevel, category: &str, msg: &str) {
        let tag = match level {
            DebugLevel::Off => return,
            _ if level > self.level => return,
            DebugLevel::Error => "ERROR",
            DebugLevel::Info => "INFO ",
            DebugLevel::Debug => "DEBUG",
            DebugLevel::Trace => "TRACE",
        };
        self.write_line(&format!("[{}] [{}] [{}] {}", timestamp(), tag, category, msg));
    }
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::from_env()))
}

/// Seconds and microseconds since the epoch.
fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Check if debugging is enabled at given level
pub fn is_enabled(level: DebugLevel) -> bool {
    level != DebugLevel::Off && level <= logger().lock().level
}

/// Log a message at specified level
pub fn log(level: DebugLevel, category: &str, msg: &str) {
    logger().lock().log(level, category, msg);
}

/// Log formatted message
pub fn logf(level: DebugLevel, category: &str, args: fmt::Arguments) {
    if is_enabled(level) {
        log(level, category, &format!("{}", args));
    }
}

// Convenience macros for logging
#[macro_export]
macro_rules! debug_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Error, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Info, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Debug, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Trace, $category, format_args!($($arg)*))
    };
}

/// `log` backend that routes records into the debug file, and to stderr
/// when `RUST_LOG` is set.
struct LogBridge {
    stderr: bool,
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Trace records already went to the file through `Tracer`.
        if !record.target().starts_with(TRACE_TARGET) {
            logf(DebugLevel::from_log(record.level()), record.target(), *record.args());
        }
        if self.stderr {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOG_BRIDGE: OnceLock<LogBridge> = OnceLock::new();

/// Install the `log` facade backend. `level` overrides the maximum level;
/// otherwise it follows `RUST_LOG` (any value enables debug) and falls back
/// to `Info`. Calling it twice, or after another logger was installed, is
/// harmless.
pub fn init_log_bridge(level: Option<log::LevelFilter>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let max = level.unwrap_or(if rust_log.is_some() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    let bridge = LOG_BRIDGE.get_or_init(|| LogBridge {
        stderr: rust_log.is_some(),
    });
    if log::set_logger(bridge).is_ok() {
        log::set_max_level(max);
    }
}

const TRACE_TARGET: &str = "par_global_menu::trace";

/// Diagnostic categories that can be switched on independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCategory {
    Events,
    SyncStats,
    Clearing,
    Hierarchy,
}

impl TraceCategory {
    fn target(self) -> &'static str {
        match self {
            TraceCategory::Events => "par_global_menu::trace::events",
            TraceCategory::SyncStats => "par_global_menu::trace::sync",
            TraceCategory::Clearing => "par_global_menu::trace::clearing",
            TraceCategory::Hierarchy => "par_global_menu::trace::hierarchy",
        }
    }

    fn category(self) -> &'static str {
        match self {
            TraceCategory::Events => "EVENTS",
            TraceCategory::SyncStats => "SYNC",
            TraceCategory::Clearing => "CLEAR",
            TraceCategory::Hierarchy => "HIERARCHY",
        }
    }
}

/// Category-gated tracing of mirror activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tracer {
    config: TraceConfig,
}

impl Tracer {
    pub fn new(config: TraceConfig) -> Self {
        Self { config }
    }

    pub fn enabled(&self, category: TraceCategory) -> bool {
        match category {
            TraceCategory::Events => self.config.events,
            TraceCategory::SyncStats => self.config.sync_stats,
            TraceCategory::Clearing => self.config.clearing,
            TraceCategory::Hierarchy => self.config.hierarchy,
        }
    }

    pub fn trace(&self, category: TraceCategory, args: fmt::Arguments) {
        if !self.enabled(category) {
            return;
        }
        log::info!(target: category.target(), "{}", args);
        logf(DebugLevel::Info, category.category(), args);
    }
}
