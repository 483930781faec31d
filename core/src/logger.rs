//! Process-wide debug logger
//!
//! Keeps the most recent entries in a bounded ring buffer (for the `logs`
//! command) and optionally appends every entry to a file.

use chrono::Local;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

const DEFAULT_RING_SIZE: usize = 1000;

pub struct DebugLogEntry {
    pub timestamp: String,
    pub level: String,
    pub module: String,
    pub message: String,
}

impl DebugLogEntry {
    fn render(&self) -> String {
        format!(
            "[{}] [{}] [{}] {}",
            self.timestamp, self.level, self.module, self.message
        )
    }
}

pub struct DebugLogger {
    ring_buffer: VecDeque<DebugLogEntry>,
    max_entries: usize,
    file_path: Option<PathBuf>,
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::new(DEFAULT_RING_SIZE)))
}

impl DebugLogger {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            ring_buffer: VecDeque::with_capacity(max_entries),
            max_entries,
            file_path: None,
        }
    }

    pub fn set_file_path(&mut self, path: PathBuf) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        self.file_path = Some(path);
    }

    pub fn set_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries.max(1);
        while self.ring_buffer.len() > self.max_entries {
            self.ring_buffer.pop_front();
        }
    }

    pub fn log(&mut self, level: &str, module: &str, message: &str) {
        let entry = DebugLogEntry {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            level: level.to_string(),
            module: module.to_string(),
            message: message.to_string(),
        };

        if let Some(path) = &self.file_path {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(file, "{}", entry.render());
            }
        }

        if self.ring_buffer.len() >= self.max_entries {
            self.ring_buffer.pop_front();
        }
        self.ring_buffer.push_back(entry);
    }

    /// Newest first
    pub fn get_recent(&self, n: usize) -> Vec<String> {
        self.ring_buffer
            .iter()
            .rev()
            .take(n)
            .map(DebugLogEntry::render)
            .collect()
    }
}

/// Route log output to `path` and resize the ring buffer
pub fn init(path: PathBuf, ring_size: usize) {
    let mut logger = get_logger().lock();
    logger.set_file_path(path);
    logger.set_max_entries(ring_size);
}

pub fn log(level: &str, module: &str, message: impl Into<String>) {
    get_logger().lock().log(level, module, &message.into());
}

pub fn get_recent_logs(n: usize) -> Vec<String> {
    get_logger().lock().get_recent(n)
}

#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        $crate::logger::log("DEBUG", module_path!(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        $crate::logger::log("INFO", module_path!(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        $crate::logger::log("WARN", module_path!(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        $crate::logger::log("ERROR", module_path!(), format!($($arg)*))
    };
}
