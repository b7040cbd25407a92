use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Log file written beside the library
pub const LOG_FILE_NAME: &str = "MHUD2.log";

const DEFAULT_FILTER: &str = "mhud=info,mhud2=info";

pub fn log_path(dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) => dir.join(LOG_FILE_NAME),
        None => PathBuf::from(LOG_FILE_NAME),
    }
}

/// Install the file subscriber. The game owns no console, so a log file that
/// cannot be opened means running without logs.
pub fn init(dir: Option<&Path>) -> bool {
    let path = log_path(dir);
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(_) => return false,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_ids(true)
        .try_init()
        .is_ok()
}
