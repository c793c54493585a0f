//! Process settings - database location and logging setup

use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DATABASE_ENV: &str = "WAKE_SCHEDULER_DB";
const APP_DIR: &str = "wake-scheduler";
const DATABASE_FILE: &str = "wake-scheduler.db";

/// `<data dir>/wake-scheduler/wake-scheduler.db`, or the working directory
/// when the platform reports no data dir
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(DATABASE_FILE)
}

/// Create the parent directory of `path` if needed
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Install the fmt subscriber; RUST_LOG overrides the `info` default
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_shape() {
        let path = default_database_path();
        assert!(path.ends_with("wake-scheduler/wake-scheduler.db"));
    }

    #[test]
    fn test_ensure_parent_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("rules.db");
        ensure_parent_dir(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
        ensure_parent_dir(Path::new("bare.db")).unwrap();
    }
}
