//! Run-scoped logging sink.
//!
//! The sink is constructed explicitly once per run and passed around as a
//! guard value: it opens a timestamped log file, and flushing happens when
//! the guard is dropped at the end of the run. No hidden global
//! initialization beyond installing the subscriber.

use crate::error::Result;
use chrono::Local;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

/// Handle to the run's log file; dropping it flushes pending records
pub struct LogHandle {
    path: PathBuf,
    _guard: WorkerGuard,
}

impl LogHandle {
    /// Path of the log file for this run
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Open a timestamped log file under `log_dir` and install it as the
/// tracing subscriber. A second call in the same process keeps the first
/// subscriber and only opens the file.
pub fn init(log_dir: &Path) -> Result<LogHandle> {
    std::fs::create_dir_all(log_dir)?;
    let path = log_dir.join(format!(
        "pipeline_{}.log",
        Local::now().format("%Y-%m-%d_%H-%M-%S")
    ));
    let file = File::create(&path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let _ = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    Ok(LogHandle {
        path,
        _guard: guard,
    })
}
