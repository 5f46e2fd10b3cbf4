//! Opt-in diagnostics.
//!
//! The UI owns the terminal, so nothing is ever logged to stdout or stderr
//! while it runs. When a log file is configured, a `tracing` subscriber writes
//! plain-text events there; otherwise tracing stays uninstalled and every
//! event is dropped.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Installs a global subscriber appending to `path`.
///
/// `filter` uses `EnvFilter` directive syntax (`info`, `standin=debug`, ...);
/// an invalid directive falls back to `info`.
pub fn init_file_logging(path: &Path, filter: &str) -> io::Result<()> {
    let file = open_log_file(path)?;
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    // A second install (tests, repeated startup) leaves the first one in place.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init();
    Ok(())
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
