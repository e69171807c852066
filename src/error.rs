//! # Error types
//!
//! Every failure the mounting process can end with, and the process exit code
//! each of them maps to.

use thiserror::Error;

/// Errors returned by the mounting process
#[derive(Debug, Error)]
pub enum Error {
    /// The host operating system is not one this tool knows how to drive
    #[error("unsupported platform '{0}', only linux and bsd hosts are supported")]
    UnsupportedPlatform(String),

    /// No new USB device showed up between the two captures
    #[error("device not found after {attempts} attempt(s), check the cable and re-run")]
    DeviceNotFound {
        /// Number of disconnect/connect cycles that were run
        attempts: usize,
    },

    /// The USB device was found but the kernel log has no tty node for it
    #[error("no tty device node found in the kernel log")]
    DeviceNodeNotFound,

    /// A command was refused by the operating system
    #[error("permission denied running '{command}': {detail}")]
    PermissionDenied {
        /// Command line that was refused
        command: String,
        /// What the OS or the command reported
        detail: String,
    },

    /// A command ran but exited with a failure status
    #[error("'{command}' failed with {status}: {stderr}")]
    CommandFailed {
        /// Command line that failed
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// A command could not be started
    #[error("failed to run '{command}': {source}")]
    Spawn {
        /// Command line that could not be started
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Terminal or other I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

// Process exit codes, one per failure class
const EXIT_OTHER: u8 = 1;
const EXIT_UNSUPPORTED_PLATFORM: u8 = 2;
const EXIT_DEVICE_NOT_FOUND: u8 = 3;
const EXIT_PERMISSION_DENIED: u8 = 4;
const EXIT_NODE_NOT_FOUND: u8 = 5;

impl Error {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::UnsupportedPlatform(_) => EXIT_UNSUPPORTED_PLATFORM,
            Error::DeviceNotFound { .. } => EXIT_DEVICE_NOT_FOUND,
            Error::PermissionDenied { .. } => EXIT_PERMISSION_DENIED,
            Error::DeviceNodeNotFound => EXIT_NODE_NOT_FOUND,
            Error::CommandFailed { .. } | Error::Spawn { .. } | Error::Io(_) => EXIT_OTHER,
        }
    }

    /// True for errors that end the run on purpose rather than by accident
    ///
    /// Permission errors are caught and logged; everything outside the taxonomy
    /// (missing commands, failing commands, I/O) is unexpected.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Error::CommandFailed { .. } | Error::Spawn { .. } | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let errors = [
            Error::UnsupportedPlatform("windows".into()),
            Error::DeviceNotFound { attempts: 2 },
            Error::PermissionDenied {
                command: "chmod 777 /dev/ttyUSB0".into(),
                detail: "Operation not permitted".into(),
            },
            Error::DeviceNodeNotFound,
        ];
        let mut codes: Vec<u8> = errors.iter().map(Error::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_unexpected_errors_share_generic_code() {
        let io = Error::Io(std::io::Error::other("boom"));
        let failed = Error::CommandFailed {
            command: "lsusb".into(),
            status: "exit status: 1".into(),
            stderr: String::new(),
        };
        assert_eq!(io.exit_code(), 1);
        assert_eq!(failed.exit_code(), 1);
        assert!(!io.is_expected());
        assert!(Error::DeviceNodeNotFound.is_expected());
    }

    #[test]
    fn test_display_mentions_command() {
        let err = Error::PermissionDenied {
            command: "modprobe usbserial vendor=0xdead product=0xbeef".into(),
            detail: "Operation not permitted".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("modprobe usbserial"));
        assert!(msg.contains("Operation not permitted"));
    }
}
