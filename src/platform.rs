//! Host platform gate

use std::fmt::Display;

/// Operating system the tool is running on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    os: String,
}

impl Platform {
    /// Platform of the running host
    pub fn current() -> Self {
        Platform::from_os(std::env::consts::OS)
    }

    /// Platform with an explicit OS name, as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Self {
        Platform { os: os.to_string() }
    }

    /// OS name
    pub fn name(&self) -> &str {
        &self.os
    }

    /// Linux and the BSD family have `lsusb`, `dmesg` and loadable usbserial drivers
    pub fn is_supported(&self) -> bool {
        self.os == "linux" || self.os.ends_with("bsd") || self.os == "dragonfly"
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.os)
    }
}
