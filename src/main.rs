//! NU801 LED daemon
//!
//! Userspace driver for the NumEn NU801 3-channel 16-bit PWM LED controller
//! as found on some Cisco Meraki appliances. Each channel is exposed as a
//! regular LED class device through `uleds`, so triggers and sysfs writes
//! work as usual, and every brightness change is bit-banged to the chip over
//! GPIO lines.
//!
//! # Usage
//!
//! ```bash
//! # List supported boards
//! nu801 --list
//!
//! # Run in the foreground with debug output
//! nu801 -f -d cisco-mx100-hw
//!
//! # Run as a daemon with a board from an extra catalog
//! nu801 -c /etc/nu801.toml -p /run/nu801.pid my-board
//! ```

mod daemon;
mod devices;
mod error;
mod gpio;
mod leds;
mod protocol;
mod signals;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use daemon::Pidfile;
use devices::{get_profile, profile_names, HardwareProfile};
use leds::{Channel, Dispatcher, UledDevice};
use protocol::{FrameEncoder, SleepDelay};
use signals::{SignalPipe, SHUTDOWN_SIGNALS};

/// NU801 LED daemon
///
/// Exposes the NU801 channels as LED class devices
#[derive(Parser)]
#[command(name = "nu801")]
#[command(version = "0.1.0")]
#[command(about = "Userspace driver for the NumEn NU801 LED controller")]
struct Cli {
    /// Board identifier (see --list)
    #[arg(required_unless_present = "list")]
    device: Option<String>,

    /// Stay in the foreground
    #[arg(short, long)]
    foreground: bool,

    /// Pidfile path, empty to disable
    #[arg(short, long, default_value = daemon::DEFAULT_PIDFILE)]
    pidfile: String,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// User to run as once the hardware is claimed, empty to stay
    #[arg(short, long, default_value = "nobody")]
    user: String,

    /// Group to run as once the hardware is claimed
    #[arg(short, long, default_value = "nogroup")]
    group: String,

    /// Extra board definitions (TOML)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// List supported boards and exit
    #[arg(short, long)]
    list: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = if cli.list {
        handle_list(cli.catalog.as_deref())
    } else {
        run(&cli)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

impl Cli {
    /// Pidfile to write, `None` when disabled with an empty path
    fn pidfile(&self) -> Option<&Path> {
        if self.pidfile.is_empty() {
            None
        } else {
            Some(Path::new(&self.pidfile))
        }
    }
}

/// Exit status for a fatal error, by kind where the driver knows it
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<error::Error>()
        .map_or(1, |err| err.kind().exit_code())
}

fn load_extra(catalog: Option<&Path>) -> Result<Vec<HardwareProfile>> {
    match catalog {
        Some(path) => devices::load_catalog(path),
        None => Ok(Vec::new()),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let device = cli
        .device
        .as_deref()
        .ok_or_else(|| anyhow!("No device given"))?;

    // Everything that can be wrong with the configuration fails here,
    // before any hardware is touched
    let extra = load_extra(cli.catalog.as_deref())?;
    let profile = devices::resolve(device, &extra)?;
    info!("Found supported device: '{}'", profile.id);
    debug!(
        "gpiochip:{} cki:{} sdi:{} lei:{:?} ndelay:{}",
        profile.gpiochip, profile.lines.cki, profile.lines.sdi, profile.lines.lei, profile.ndelay
    );

    // Claim the hardware while the caller still sees our exit status; the
    // handles survive the fork
    let channels = register_leds(&profile)?;
    let bus = gpio::acquire(&profile)?;
    let mut dispatcher = Dispatcher::new(
        channels,
        bus,
        FrameEncoder::for_profile(&profile),
        SleepDelay,
    );

    if !cli.foreground {
        daemon::daemonize()?;
    }

    let pidfile = cli.pidfile().map(Pidfile::create).transpose()?;

    let signals =
        SignalPipe::install(&SHUTDOWN_SIGNALS).context("Failed to install signal handlers")?;

    daemon::drop_privileges(&cli.user, &cli.group)?;

    let signal = dispatcher.run(&signals)?;

    drop(pidfile);
    signals
        .resume_default(Some(signal))
        .context("Failed to restore signal dispositions")?;

    Ok(())
}

fn register_leds(profile: &HardwareProfile) -> error::Result<Vec<Channel<UledDevice>>> {
    profile
        .led_names()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let led = UledDevice::register(name)?;
            info!("Registered LED {}: {}", i, name);
            Ok(Channel::new(name, led))
        })
        .collect()
}

fn handle_list(catalog: Option<&Path>) -> Result<()> {
    let extra = load_extra(catalog)?;

    println!("{}", "=".repeat(60));
    println!("{}", "Supported Devices".cyan().bold());
    println!("{}", "=".repeat(60));

    for name in profile_names() {
        if extra.iter().any(|p| p.id == name) {
            continue;
        }
        if let Some(profile) = get_profile(name) {
            print_profile(profile, false);
        }
    }
    for profile in &extra {
        print_profile(profile, true);
    }

    println!("\n{}", "=".repeat(60));
    println!("Use {} to drive a board", "nu801 <device>".cyan());

    Ok(())
}

fn print_profile(profile: &HardwareProfile, from_catalog: bool) {
    let origin = if from_catalog {
        " (catalog)".dimmed().to_string()
    } else {
        String::new()
    };
    println!("\n  {}{}", profile.id.white().bold(), origin);
    println!("    GPIO chip: {}", profile.gpiochip);

    let latch = match profile.lines.lei {
        Some(lei) => lei.to_string(),
        None => "none (clock hold)".yellow().to_string(),
    };
    println!(
        "    Lines: cki {} sdi {} lei {}",
        profile.lines.cki, profile.lines.sdi, latch
    );
    println!("    Bit delay: {} ns", profile.ndelay);
    for (i, name) in profile.led_names().iter().enumerate() {
        println!("    LED {}: {}", i, name.green());
    }
}
