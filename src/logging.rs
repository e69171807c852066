//! Logging setup

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "mountdrone=info";
const VERBOSE_FILTER: &str = "mountdrone=debug";

/// Open the persistent log file for appending, creating its directory if needed
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global tracing subscriber
///
/// Console output goes to stderr. When `log_file` is given, records are also
/// appended to it without ANSI colours. `RUST_LOG` overrides the level.
///
/// # Returns
///
/// An error if the filter is invalid. A log file that cannot be opened is
/// reported on stderr and skipped.
pub fn init(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let default_filter = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| anyhow::anyhow!("Invalid log filter: {}", e))?;

    let file_layer = match log_file.map(|path| (path, open_log_file(path))) {
        Some((_, Ok(file))) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
        Some((path, Err(e))) => {
            eprintln!("WARNING: cannot open log file {}: {}", path.display(), e);
            None
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_file_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mountdrone.log");

        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "first").unwrap();
        drop(file);

        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "second").unwrap();
        drop(file);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_bare_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.log");
        assert!(open_log_file(&path).is_ok());
    }
}
