use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use mountdrone::config::{DEFAULT_DEVICE_MODE, DEFAULT_DRIVER_MODULE};
use mountdrone::{ConsoleOperator, DroneMounter, Error, HostSystem, Platform, Settings, logging};

/// Find a freshly connected drone, load its USB serial driver and make its
/// device node accessible to BetaFlight
#[derive(Parser, Debug)]
#[command(name = "mountdrone", version)]
struct Args {
    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,

    /// Persistent log file (defaults to the user data directory)
    #[arg(long, conflicts_with = "no_log_file")]
    log_file: Option<PathBuf>,

    /// Log to the console only
    #[arg(long)]
    no_log_file: bool,

    /// Kernel module to load for the drone
    #[arg(long, default_value = DEFAULT_DRIVER_MODULE)]
    driver_module: String,

    /// Permission bits for the device node
    #[arg(long, default_value = DEFAULT_DEVICE_MODE)]
    mode: String,

    /// Run dmesg, modprobe and chmod through sudo
    #[arg(long)]
    sudo: bool,
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        let log_file = if args.no_log_file {
            None
        } else {
            Some(args.log_file.unwrap_or_else(Settings::default_log_file))
        };
        Settings {
            driver_module: args.driver_module,
            device_mode: args.mode,
            use_sudo: args.sudo,
            log_file,
            verbose: args.verbose,
        }
    }
}

// Nothing is written to disk on a host the run will refuse
fn log_file_for<'a>(settings: &'a Settings, platform: &Platform) -> Option<&'a Path> {
    settings.log_file.as_deref().filter(|_| platform.is_supported())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let settings = Settings::from(Args::parse());
    let platform = Platform::current();

    logging::init(settings.verbose, log_file_for(&settings, &platform))
        .context("Failed to initialise logging")?;

    let system = HostSystem::new(&settings);
    let mut mounter = DroneMounter::new(system, ConsoleOperator::new(), platform);

    match mounter.run().await {
        Ok(report) => {
            println!("{}", report.summary());
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ Error::PermissionDenied { .. }) => {
            error!(error = %e, "Permission error while mounting the drone");
            eprintln!("ERROR: {}", e);
            eprintln!("Try again as root or with --sudo");
            Ok(ExitCode::from(e.exit_code()))
        }
        Err(e) => {
            if !e.is_expected() {
                error!(error = %e, "Mounting failed");
            }
            eprintln!("ERROR: {}", e);
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
