//! Centralized timestamped logging
//!
//! All logs go through `logd!`, `logi!`, `logw!` or `loge!` so they share one shape:
//!   <timestamp> [TAG][thread] message
//!
//! The minimum level comes from `ALPHAMOVIE_LOG` (`debug`, `info`, `warn`, `error`; default
//! `info`). Info and debug lines go to stdout, warnings and errors to stderr. An optional
//! file sink receives every emitted line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn parse(s: &str) -> Option<Level> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }

    fn from_u8(v: u8) -> Level {
        match v {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            _ => Level::Error,
        }
    }
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();

/// Initialize logging. Call once at startup.
///
/// Reads `ALPHAMOVIE_LOG` for the minimum level and, if `log_file` is set, appends every
/// emitted line to it.
pub fn init(log_file: Option<PathBuf>) {
    if let Ok(v) = std::env::var("ALPHAMOVIE_LOG") {
        match Level::parse(&v) {
            Some(level) => set_min_level(level),
            None => eprintln!(
                "{} [INIT][{}] ignoring unknown ALPHAMOVIE_LOG value '{v}'",
                log_timestamp(),
                log_thread_name()
            ),
        }
    }

    let sink = LOG_FILE.get_or_init(|| Mutex::new(None));
    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => {
                if let Ok(mut guard) = sink.lock() {
                    *guard = Some(f);
                }
            }
            // The macros route through log_line, so report this one directly.
            Err(e) => eprintln!(
                "{} [INIT][{}] failed to open log file {}: {e}",
                log_timestamp(),
                log_thread_name(),
                path.display()
            ),
        }
    }
}

pub fn set_min_level(level: Level) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn min_level() -> Level {
    Level::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: Level) -> bool {
    level >= min_level()
}

// Local time when the offset can be determined, UTC otherwise.
pub fn log_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let fmt = time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    );
    now.format(&fmt).unwrap_or_else(|_| "<time-format-error>".to_string())
}

pub fn log_thread_name() -> String {
    std::thread::current().name().unwrap_or("thread").to_string()
}

pub fn format_line(tag: &str, msg: &str) -> String {
    format!("{} [{}][{}] {}", log_timestamp(), tag, log_thread_name(), msg)
}

#[doc(hidden)]
pub fn log_line(level: Level, tag: &str, msg: &str) {
    if !enabled(level) {
        return;
    }
    let line = format_line(tag, msg);

    match level {
        Level::Debug | Level::Info => println!("{line}"),
        Level::Warn | Level::Error => eprintln!("{line}"),
    }

    if let Some(m) = LOG_FILE.get() {
        if let Ok(mut guard) = m.lock() {
            if let Some(f) = guard.as_mut() {
                let _ = writeln!(f, "{line}");
                let _ = f.flush();
            }
        }
    }
}

/// Debug log: stdout, hidden unless `ALPHAMOVIE_LOG=debug`
#[macro_export]
macro_rules! logd {
    ($tag:expr, $($arg:tt)*) => {{
        if $crate::logging::enabled($crate::logging::Level::Debug) {
            $crate::logging::log_line($crate::logging::Level::Debug, $tag, &format!($($arg)*));
        }
    }};
}

/// Info log: stdout
#[macro_export]
macro_rules! logi {
    ($tag:expr, $($arg:tt)*) => {{
        $crate::logging::log_line($crate::logging::Level::Info, $tag, &format!($($arg)*));
    }};
}

/// Warning log: stderr
#[macro_export]
macro_rules! logw {
    ($tag:expr, $($arg:tt)*) => {{
        $crate::logging::log_line($crate::logging::Level::Warn, $tag, &format!($($arg)*));
    }};
}

/// Error log: stderr
#[macro_export]
macro_rules! loge {
    ($tag:expr, $($arg:tt)*) => {{
        $crate::logging::log_line($crate::logging::Level::Error, $tag, &format!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!(Level::parse("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::parse(" warn "), Some(Level::Warn));
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("loud"), None);
    }

    #[test]
    fn line_carries_tag_and_message() {
        let line = format_line("RENDER", "program linked");
        assert!(line.contains("[RENDER]["));
        assert!(line.ends_with("] program linked"));
    }
}
