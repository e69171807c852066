// High-level mounting process
// Walks the operator through unplug/replug, identifies the drone from the USB
// listing diff, then loads the serial driver and opens up the device node

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::diff::{PresenceTable, UsbId};
use crate::dmesg;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::system::{Operator, System};

/// Number of disconnect/connect cycles before giving up (one retry)
pub const MAX_CAPTURE_ATTEMPTS: usize = 2;

/// Directory holding the tty device nodes
pub const DEVICE_DIR: &str = "/dev";

const DISCONNECT_PROMPT: &str = "Please disconnect drone from USB cable";
const CONNECT_PROMPT: &str = "Please connect drone to USB";
const RETRY_WARNING: &str = "Device not found. Let's try once again.";

/// Progress of a mounting run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    /// Waiting for the operator to unplug the drone
    AwaitDisconnect,
    /// Listing without the drone captured
    CapturedBefore,
    /// Waiting for the operator to plug the drone in
    AwaitConnect,
    /// Listing with the drone captured
    CapturedAfter,
    /// First diff computed
    Diffed,
    /// Diff of the retry cycle computed
    RetryDiffed,
    /// Drone identified
    Found,
    /// Drone not identified after the retry
    NotFound,
    /// Driver loaded and permissions fixed
    Loaded,
    /// Loading or permission fixing failed
    Failed,
    /// Host platform not supported, nothing was attempted
    Unsupported,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountReport {
    /// Identifier of the drone's USB device
    pub usb_id: UsbId,
    /// Device node the driver created, with permissions fixed
    pub device_path: PathBuf,
    /// Number of disconnect/connect cycles used
    pub attempts: usize,
}

impl MountReport {
    /// Message shown to the operator after a successful run
    pub fn summary(&self) -> String {
        format!(
            "Successfully loaded USB module for {} and set permissions on {}\n\
            It may take a few seconds for BetaFlight to recognize the newly mounted device",
            self.usb_id,
            self.device_path.display()
        )
    }
}

/// Drives one mounting run
///
/// # Example
///
/// ```no_run
/// # async fn example() -> mountdrone::error::Result<()> {
/// use mountdrone::{ConsoleOperator, DroneMounter, HostSystem, Platform, Settings};
///
/// let system = HostSystem::new(&Settings::default());
/// let mut mounter = DroneMounter::new(system, ConsoleOperator::new(), Platform::current());
/// let report = mounter.run().await?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
pub struct DroneMounter<S, O> {
    system: S,
    operator: O,
    platform: Platform,
    state: MountState,
}

impl<S: System, O: Operator> DroneMounter<S, O> {
    /// Create a mounter
    ///
    /// # Arguments
    ///
    /// * `system` - External commands (lsusb, dmesg, modprobe, chmod)
    /// * `operator` - Prompts and warnings for the person plugging the drone in
    /// * `platform` - Host platform, checked before anything else runs
    pub fn new(system: S, operator: O, platform: Platform) -> Self {
        DroneMounter {
            system,
            operator,
            platform,
            state: MountState::AwaitDisconnect,
        }
    }

    /// Current state of the run
    pub fn state(&self) -> MountState {
        self.state
    }

    fn enter(&mut self, state: MountState) {
        debug!(from = ?self.state, to = ?state, "state transition");
        self.state = state;
    }

    /// Run the whole process
    ///
    /// # Returns
    ///
    /// A [`MountReport`] once the driver is loaded and the device node is
    /// accessible
    ///
    /// # Errors
    ///
    /// * [`Error::UnsupportedPlatform`] before anything is attempted
    /// * [`Error::DeviceNotFound`] when both capture cycles show no new device
    /// * [`Error::DeviceNodeNotFound`] when the kernel log names no tty node
    /// * [`Error::PermissionDenied`] and command errors from the host
    pub async fn run(&mut self) -> Result<MountReport> {
        if !self.platform.is_supported() {
            self.enter(MountState::Unsupported);
            return Err(Error::UnsupportedPlatform(self.platform.name().to_string()));
        }

        let (usb_id, attempts) = self.identify().await?;

        match self.mount(&usb_id).await {
            Ok(device_path) => {
                self.enter(MountState::Loaded);
                info!(usb_id = %usb_id, path = %device_path.display(),
                      "Successfully loaded USB module and ensured correct permissions");
                Ok(MountReport { usb_id, device_path, attempts })
            }
            Err(e) => {
                self.enter(MountState::Failed);
                Err(e)
            }
        }
    }

    // Capture/diff cycles until the drone shows up, retrying once
    async fn identify(&mut self) -> Result<(UsbId, usize)> {
        for attempt in 1..=MAX_CAPTURE_ATTEMPTS {
            let (before, after) = self.capture_listings().await?;

            let table = PresenceTable::build(&before, &after);
            self.enter(if attempt == 1 { MountState::Diffed } else { MountState::RetryDiffed });

            if table.is_empty() {
                warn!(attempt, "lsusb listed no devices");
            }
            let changed = table.unique_lines().count();
            debug!(lines = table.len(), changed, "listings diffed");
            if changed > 1 {
                let added: Vec<&str> = table.added_lines().collect();
                let removed: Vec<&str> = table.removed_lines().collect();
                warn!(?added, ?removed, "more than one USB device changed between captures");
            }

            if let Some(usb_id) = table.first_usb_id() {
                self.enter(MountState::Found);
                info!(usb_id = %usb_id, attempt, "drone identified");
                return Ok((usb_id, attempt));
            }

            if attempt < MAX_CAPTURE_ATTEMPTS {
                warn!(attempt, "device not found, retrying");
                self.operator.warn(RETRY_WARNING);
            }
        }

        self.enter(MountState::NotFound);
        error!(attempts = MAX_CAPTURE_ATTEMPTS, "device not found");
        Err(Error::DeviceNotFound { attempts: MAX_CAPTURE_ATTEMPTS })
    }

    // One disconnect/connect cycle
    async fn capture_listings(&mut self) -> Result<(String, String)> {
        self.enter(MountState::AwaitDisconnect);
        self.operator.confirm(DISCONNECT_PROMPT).await?;
        let before = self.system.list_usb_devices().await?;
        self.enter(MountState::CapturedBefore);

        self.enter(MountState::AwaitConnect);
        self.operator.confirm(CONNECT_PROMPT).await?;
        let after = self.system.list_usb_devices().await?;
        self.enter(MountState::CapturedAfter);

        debug!(before_lines = before.lines().count(), after_lines = after.lines().count(), "listings captured");
        Ok((before, after))
    }

    // Load the driver and fix permissions, returning the device path
    async fn mount(&mut self, usb_id: &UsbId) -> Result<PathBuf> {
        let before_load = dmesg::find_tty_node(&self.system.query_kernel_log().await?);

        self.system.load_driver(usb_id).await?;

        // usbserial logs the ttyUSBn attach line only once it is bound, so the
        // newest node after loading beats anything already in the log
        let after_load = dmesg::find_tty_node(&self.system.query_kernel_log().await?);
        debug!(?before_load, ?after_load, "kernel log scanned");
        let node = after_load.or(before_load).ok_or(Error::DeviceNodeNotFound)?;

        let device_path = PathBuf::from(DEVICE_DIR).join(&node);
        self.system.set_permissions(&device_path).await?;
        Ok(device_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_mentions_device_and_delay() {
        let report = MountReport {
            usb_id: UsbId::new("0483", "5740").unwrap(),
            device_path: PathBuf::from("/dev/ttyACM0"),
            attempts: 1,
        };
        let summary = report.summary();
        assert!(summary.contains("0483:5740"));
        assert!(summary.contains("/dev/ttyACM0"));
        assert!(summary.contains("few seconds"));
    }
}
