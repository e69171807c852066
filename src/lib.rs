//! # Mount a flight controller on a Linux host
//!
//! This crate finds the USB serial device of a freshly connected flight
//! controller, loads the kernel serial driver for it and opens up the device
//! node so a flight-control application such as BetaFlight Configurator can
//! use it.
//!
//! # How the drone is found
//!
//! The operator is asked to unplug the drone, the USB device list is captured
//! (`lsusb`), then the operator plugs the drone in and the list is captured
//! again. The line that differs between the two captures carries the drone's
//! `vendor:product` identifier. If nothing differs the cycle is run once more.
//!
//! With the identifier known:
//! - the kernel log (`dmesg`) is scanned for the `ttyXXXN` node the drone got,
//! - `modprobe usbserial vendor=0x.. product=0x..` binds the generic driver,
//! - `chmod 777 /dev/ttyXXXN` makes the node accessible.
//!
//! All host interaction goes through the [`System`] and [`Operator`] traits so
//! the process can be exercised without hardware.

#![deny(missing_docs)]

pub mod config;
pub mod diff;
pub mod dmesg;
pub mod error;
pub mod logging;
mod mounter;
pub mod platform;
pub mod system;

pub use config::Settings;
pub use diff::{UsbId, diff_listings};
pub use error::Error;
pub use mounter::{DEVICE_DIR, DroneMounter, MAX_CAPTURE_ATTEMPTS, MountReport, MountState};
pub use platform::Platform;
pub use system::{ConsoleOperator, HostSystem, Operator, System};
