//! Runtime settings

use std::path::PathBuf;

/// Kernel module that provides generic USB serial support
pub const DEFAULT_DRIVER_MODULE: &str = "usbserial";
/// Permission bits applied to the device node
pub const DEFAULT_DEVICE_MODE: &str = "777";

/// Settings for one run of the tool
#[derive(Debug, Clone)]
pub struct Settings {
    /// Kernel module loaded with the discovered vendor/product pair
    pub driver_module: String,
    /// Mode passed to `chmod` for the device node
    pub device_mode: String,
    /// Prefix privileged commands (`dmesg`, `modprobe`, `chmod`) with `sudo`
    pub use_sudo: bool,
    /// Persistent log file, `None` to log to the console only
    pub log_file: Option<PathBuf>,
    /// Debug-level logging
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            driver_module: DEFAULT_DRIVER_MODULE.to_string(),
            device_mode: DEFAULT_DEVICE_MODE.to_string(),
            use_sudo: false,
            log_file: Some(Self::default_log_file()),
            verbose: false,
        }
    }
}

impl Settings {
    /// Default persistent log location
    ///
    /// `<data_local_dir>/mountdrone/mountdrone.log`, or `/var/log/mountdrone.log`
    /// when the platform has no per-user data directory.
    pub fn default_log_file() -> PathBuf {
        if let Some(data_dir) = dirs::data_local_dir() {
            data_dir.join("mountdrone").join("mountdrone.log")
        } else {
            PathBuf::from("/var/log/mountdrone.log")
        }
    }
}
