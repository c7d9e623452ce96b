use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fastboot_core::transport::duration_ms;
use fastboot_core::{Command, FastbootSession, NusbProvider, SessionConfig, Status};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fastboot USB Protocol Tool (Pure Rust)", long_about = None)]
struct Args {
    /// Path to a TOML session config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only talk to the device with this serial number
    #[arg(short, long)]
    serial: Option<String>,

    /// Per-transfer timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Wait for a device to appear before connecting
    #[arg(short, long)]
    wait: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List attached devices in bootloader mode
    Devices,
    /// Read a bootloader variable
    Getvar { name: String },
    /// Upload a file to the staging buffer
    Download { file: PathBuf },
    /// Flash a partition, uploading FILE first when given
    Flash {
        partition: String,
        file: Option<PathBuf>,
    },
    /// Erase a partition
    Erase { partition: String },
    /// Boot the staged image, uploading FILE first when given
    Boot { file: Option<PathBuf> },
    /// Continue the normal boot sequence
    Continue,
    /// Reboot the device
    Reboot,
    /// Reboot back into the bootloader
    RebootBootloader,
    /// Send an OEM command
    Oem {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Send arbitrary command text verbatim
    Raw { command: String },
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(serial) = &args.serial {
        config.serial = Some(serial.clone());
    }
    if let Some(timeout) = args.timeout {
        config.timeout_ms = timeout;
    }
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let mut session = FastbootSession::new(config);

    if let Cmd::Devices = args.command {
        for serial in session.discover()? {
            println!("{serial}\tfastboot");
        }
        return Ok(());
    }

    if args.wait {
        session.wait_default()?;
    }
    session.connect()?;
    info!(
        serial = session.serial_number().as_deref().unwrap_or("unknown"),
        timeout = ?session.timeout(),
        "Connected"
    );

    let result = dispatch(&mut session, args.command);
    session.disconnect();
    result
}

fn upload(session: &mut FastbootSession<NusbProvider>, path: &Path) -> Result<()> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let started = std::time::Instant::now();
    session.upload_data(&mut file)?;
    info!(file = %path.display(), elapsed = ?round_ms(started.elapsed()), "Upload finished");
    Ok(())
}

fn round_ms(d: Duration) -> Duration {
    Duration::from_millis(duration_ms(d))
}

fn dispatch(session: &mut FastbootSession<NusbProvider>, command: Cmd) -> Result<()> {
    let command = match command {
        Cmd::Devices => return Ok(()),
        Cmd::Getvar { name } => Command::GetVar(name),
        Cmd::Download { file } => return upload(session, &file),
        Cmd::Flash { partition, file } => {
            if let Some(file) = file {
                upload(session, &file)?;
            }
            Command::Flash(partition)
        }
        Cmd::Erase { partition } => Command::Erase(partition),
        Cmd::Boot { file } => {
            if let Some(file) = file {
                upload(session, &file)?;
            }
            Command::Boot
        }
        Cmd::Continue => Command::Continue,
        Cmd::Reboot => Command::Reboot,
        Cmd::RebootBootloader => Command::RebootBootloader,
        Cmd::Oem { args } => Command::Oem(args.join(" ")),
        Cmd::Raw { command } => Command::Raw(command),
    };

    let response = session.send(&command)?;
    let message = response.message();
    if !message.is_empty() {
        println!("{message}");
    }
    match response.status() {
        Status::Okay => Ok(()),
        status => bail!("{command} returned {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "fastboot-rs",
            "--serial",
            "ABC123",
            "--timeout",
            "1200",
            "getvar",
            "version",
        ])
        .unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.serial.as_deref(), Some("ABC123"));
        assert_eq!(config.timeout_ms, 1200);
        assert!(matches!(args.command, Cmd::Getvar { ref name } if name == "version"));
    }

    #[test]
    fn test_oem_collects_words() {
        let args = Args::try_parse_from(["fastboot-rs", "oem", "device-info", "--all"]).unwrap();
        match args.command {
            Cmd::Oem { args } => assert_eq!(args, vec!["device-info", "--all"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
