//! Debug logging for tracing which backend served or received state.
//!
//! Enable with `HABITGRID_DEBUG_LOG=1` or `debug_mode = true` in the config.
//! Logs are written to `<temp dir>/habitgrid-debug.log`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

static ENABLED: AtomicBool = AtomicBool::new(false);
static START_TIME: OnceLock<Instant> = OnceLock::new();
static LOG_FILE: OnceLock<Option<Mutex<File>>> = OnceLock::new();

pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("habitgrid-debug.log")
}

/// Initialize debug logging. Call once at startup.
pub fn init(debug_mode: bool) {
    if !debug_mode && std::env::var("HABITGRID_DEBUG_LOG").is_err() {
        return;
    }

    START_TIME.get_or_init(Instant::now);
    let opened = LOG_FILE.get_or_init(|| {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_path())
        {
            Ok(file) => Some(Mutex::new(file)),
            Err(e) => {
                eprintln!("Could not open debug log {}: {e}", log_path().display());
                None
            }
        }
    });

    if opened.is_some() {
        ENABLED.store(true, Ordering::SeqCst);
        log("DEBUG", "init", "Debug logging initialized");
    }
}

#[inline]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Log a debug message with timestamp and thread ID.
pub fn log(category: &str, action: &str, detail: &str) {
    if !is_enabled() {
        return;
    }

    let elapsed = START_TIME
        .get()
        .map(|s| s.elapsed().as_millis())
        .unwrap_or(0);
    let thread_id = std::thread::current().id();

    let msg = format!(
        "[{:>8}ms] [{:?}] [{}] {} - {}\n",
        elapsed, thread_id, category, action, detail
    );

    if let Some(Some(file)) = LOG_FILE.get() {
        let mut file = file.lock();
        let _ = file.write_all(msg.as_bytes());
        let _ = file.flush();
    }
}
