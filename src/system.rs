//! # Host collaborators
//!
//! Everything the mounting process needs from the outside world goes through
//! two traits: [`System`] for the external commands and [`Operator`] for the
//! person plugging the drone in. [`HostSystem`] and [`ConsoleOperator`] are the
//! real implementations; tests drive the mounter with scripted fakes.

use std::io::Write;
use std::path::Path;
use std::process::Output;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::process::Command;
use tracing::debug;

use crate::config::Settings;
use crate::diff::UsbId;
use crate::dmesg;
use crate::error::{Error, Result};

// Exit status of a shell-like launcher when the target is not executable
const EXIT_NOT_EXECUTABLE: i32 = 126;

/// External commands used to find and mount the drone
#[allow(async_fn_in_trait)]
pub trait System {
    /// Raw `lsusb` output
    async fn list_usb_devices(&mut self) -> Result<String>;

    /// Kernel log lines mentioning both `USB` and `tty`
    async fn query_kernel_log(&mut self) -> Result<String>;

    /// Load the USB serial driver for a vendor/product pair
    async fn load_driver(&mut self, id: &UsbId) -> Result<()>;

    /// Open up the permissions of a device node
    async fn set_permissions(&mut self, path: &Path) -> Result<()>;
}

/// The person at the keyboard
#[allow(async_fn_in_trait)]
pub trait Operator {
    /// Show a prompt and wait until the operator confirms it
    async fn confirm(&mut self, prompt: &str) -> Result<()>;

    /// Show a warning
    fn warn(&mut self, message: &str);
}

impl<S: System> System for &mut S {
    async fn list_usb_devices(&mut self) -> Result<String> {
        (**self).list_usb_devices().await
    }

    async fn query_kernel_log(&mut self) -> Result<String> {
        (**self).query_kernel_log().await
    }

    async fn load_driver(&mut self, id: &UsbId) -> Result<()> {
        (**self).load_driver(id).await
    }

    async fn set_permissions(&mut self, path: &Path) -> Result<()> {
        (**self).set_permissions(path).await
    }
}

impl<O: Operator> Operator for &mut O {
    async fn confirm(&mut self, prompt: &str) -> Result<()> {
        (**self).confirm(prompt).await
    }

    fn warn(&mut self, message: &str) {
        (**self).warn(message)
    }
}

/// [`System`] implementation running the real host commands
pub struct HostSystem {
    driver_module: String,
    device_mode: String,
    use_sudo: bool,
}

impl HostSystem {
    /// Create a HostSystem from the run settings
    pub fn new(settings: &Settings) -> Self {
        HostSystem {
            driver_module: settings.driver_module.clone(),
            device_mode: settings.device_mode.clone(),
            use_sudo: settings.use_sudo,
        }
    }

    // Full command line; only privileged commands go through sudo
    fn argv(&self, program: &str, args: &[String], privileged: bool) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if privileged && self.use_sudo {
            argv.push("sudo".to_string());
        }
        argv.push(program.to_string());
        argv.extend(args.iter().cloned());
        argv
    }

    fn driver_args(&self, id: &UsbId) -> Vec<String> {
        vec![
            self.driver_module.clone(),
            format!("vendor=0x{}", id.vendor()),
            format!("product=0x{}", id.product()),
        ]
    }

    fn permission_args(&self, path: &Path) -> Vec<String> {
        vec![self.device_mode.clone(), path.display().to_string()]
    }

    // Run a command to completion, capturing its output
    async fn run(&self, program: &str, args: &[String], privileged: bool) -> Result<(String, Output)> {
        let argv = self.argv(program, args, privileged);
        let command_line = argv.join(" ");

        debug!(command = %command_line, "running");
        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .output()
            .await
            .map_err(|e| spawn_error(&command_line, e))?;

        Ok((command_line, output))
    }

    // Run a command and fail on a non-zero exit status
    async fn run_checked(&self, program: &str, args: &[String]) -> Result<String> {
        let (command_line, output) = self.run(program, args, true).await?;
        check_status(&command_line, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl System for HostSystem {
    async fn list_usb_devices(&mut self) -> Result<String> {
        // An empty or partial listing is as good as any other
        let (_, output) = self.run("lsusb", &[], false).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn query_kernel_log(&mut self) -> Result<String> {
        let log = self.run_checked("dmesg", &[]).await?;
        let lines: Vec<&str> = dmesg::usb_tty_lines(&log).collect();
        Ok(lines.join("\n"))
    }

    async fn load_driver(&mut self, id: &UsbId) -> Result<()> {
        self.run_checked("modprobe", &self.driver_args(id)).await?;
        Ok(())
    }

    async fn set_permissions(&mut self, path: &Path) -> Result<()> {
        self.run_checked("chmod", &self.permission_args(path)).await?;
        Ok(())
    }
}

fn spawn_error(command: &str, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        Error::PermissionDenied {
            command: command.to_string(),
            detail: e.to_string(),
        }
    } else {
        Error::Spawn {
            command: command.to_string(),
            source: e,
        }
    }
}

fn check_status(command: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(classify_failure(command, output.status.code(), &output.status.to_string(), stderr))
}

/// Turn a failed command into a permission error or a generic failure
///
/// `modprobe`, `chmod` and `dmesg` all report missing privileges on stderr
/// rather than with a dedicated exit status.
pub fn classify_failure(command: &str, code: Option<i32>, status: &str, stderr: String) -> Error {
    let lower = stderr.to_lowercase();
    if code == Some(EXIT_NOT_EXECUTABLE)
        || lower.contains("permission denied")
        || lower.contains("operation not permitted")
    {
        Error::PermissionDenied {
            command: command.to_string(),
            detail: if stderr.is_empty() { status.to_string() } else { stderr },
        }
    } else {
        Error::CommandFailed {
            command: command.to_string(),
            status: status.to_string(),
            stderr,
        }
    }
}

/// [`Operator`] on the controlling terminal
///
/// Prompts go to stdout, warnings to stderr, confirmations are read from
/// stdin unless another input is given.
pub struct ConsoleOperator<R = BufReader<Stdin>> {
    input: R,
}

impl ConsoleOperator {
    /// Create an operator reading from the process stdin
    pub fn new() -> Self {
        ConsoleOperator::with_input(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> ConsoleOperator<R> {
    /// Create an operator reading confirmations from `input`
    pub fn with_input(input: R) -> Self {
        ConsoleOperator { input }
    }
}

impl Default for ConsoleOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AsyncBufRead + Unpin> Operator for ConsoleOperator<R> {
    async fn confirm(&mut self, prompt: &str) -> Result<()> {
        println!("{}", prompt);
        println!("PRESS ENTER WHEN DONE");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stdin closed while waiting for confirmation",
            )));
        }
        Ok(())
    }

    fn warn(&mut self, message: &str) {
        eprintln!("ERROR: {}", message);
    }
}
