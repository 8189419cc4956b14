// src/logging.rs
//
// Timestamped stderr/file logging plus the global system-log sequence
// consumed by the external log viewer.

use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::Serialize;

/// Global log file handle. When `Some`, `tlog!` writes to both stderr and this file.
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Initialise file logging to the given reports directory.
/// Creates a timestamped log file and a `linetap.log` symlink (Unix only).
pub fn init_file_logging(reports_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(reports_dir)
        .map_err(|e| format!("Failed to create reports dir: {}", e))?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-linetap.log")
        .to_string();
    let log_path = reports_dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to create log file: {}", e))?;

    // Update linetap.log symlink (Unix only — Windows symlinks require elevated privileges)
    #[cfg(unix)]
    {
        let symlink_path = reports_dir.join("linetap.log");
        // Remove existing symlink/file if present
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            eprintln!(
                "{} [logging] Failed to create linetap.log symlink: {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                e
            );
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    // Use eprintln directly here since tlog! would try to lock LOG_FILE (which we just set)
    eprintln!(
        "{} [logging] File logging started: {}",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        log_path.display()
    );

    Ok(())
}

/// Stop file logging and close the log file.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.is_some() {
            *guard = None;
            eprintln!(
                "{} [logging] File logging stopped",
                chrono::Local::now().format("%H:%M:%S%.3f")
            );
        }
    }
}

/// Timestamped logging macro.
/// Prepends `HH:MM:SS.mmm` local time to every message written to stderr.
/// Also writes to the log file when file logging is enabled.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let msg = format!("{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), format_args!($($arg)*));
        eprintln!("{}", msg);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }};
}

pub(crate) use tlog;

// ============================================================================
// System Log Sequence
// ============================================================================

/// One entry in the global system log. Append-only; the log viewer reads
/// these to show engine-level activity (frames completed, diagnostics).
#[derive(Clone, Debug, Serialize)]
pub struct SystemLogEntry {
    pub message: String,
    /// Host UNIX timestamp in microseconds.
    pub timestamp_us: u64,
}

static SYSTEM_LOG: Lazy<Mutex<Vec<SystemLogEntry>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Append a message to the system log and echo it through `tlog!`.
pub fn system_log(message: impl Into<String>) {
    let message = message.into();
    tlog!("[system] {}", message);
    if let Ok(mut log) = SYSTEM_LOG.lock() {
        log.push(SystemLogEntry {
            message,
            timestamp_us: crate::session::now_us(),
        });
    }
}

/// Snapshot of the system log (most recent last).
pub fn system_log_entries() -> Vec<SystemLogEntry> {
    SYSTEM_LOG.lock().map(|l| l.clone()).unwrap_or_default()
}

/// Clear the system log. Used by tests and by the host on workspace reset.
pub fn clear_system_log() {
    if let Ok(mut log) = SYSTEM_LOG.lock() {
        log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_log_appends_in_order() {
        // Other tests append to the global log concurrently, so locate our
        // own entries by content rather than by position.
        system_log("order-check first");
        system_log("order-check second");
        let entries = system_log_entries();
        let first = entries
            .iter()
            .position(|e| e.message == "order-check first")
            .expect("first entry present");
        let second = entries
            .iter()
            .position(|e| e.message == "order-check second")
            .expect("second entry present");
        assert!(first < second);
        assert!(entries[second].timestamp_us >= entries[first].timestamp_us);
    }
}
