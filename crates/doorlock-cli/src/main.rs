//! Command-line driver for a serial door lock controller.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use doorlock_controller::DeviceController;
use doorlock_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_PORT, DEFAULT_RESPONSE_TIMEOUT_MS};
use doorlock_core::{ConnectionConfig, DeviceId, FramingMode, IoModel, LockStatus};
use doorlock_transport::{Transport, list_ports};
use std::time::Duration;
use tracing::debug;

/// Command framing on the wire
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Framing {
    /// Fixed 4-byte frames
    Legacy,
    /// DLE/STX envelope with device address
    Structured,
}

impl From<Framing> for FramingMode {
    fn from(framing: Framing) -> Self {
        match framing {
            Framing::Legacy => FramingMode::Legacy,
            Framing::Structured => FramingMode::Structured,
        }
    }
}

/// How the serial port is read
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Io {
    /// Synchronous port, readiness checked on a timer
    Polled,
    /// Async port with a background reader
    Event,
}

impl From<Io> for IoModel {
    fn from(io: Io) -> Self {
        match io {
            Io::Polled => IoModel::Polled,
            Io::Event => IoModel::EventDriven,
        }
    }
}

/// Door lock controller CLI
#[derive(Parser, Debug)]
#[command(name = "doorlock", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Serial port name (e.g., COM2, /dev/ttyUSB0)
    #[arg(short, long, env = "DOORLOCK_PORT", default_value = DEFAULT_PORT, global = true)]
    port: String,

    /// Baud rate
    #[arg(short, long, env = "DOORLOCK_BAUD", default_value_t = DEFAULT_BAUD_RATE, global = true)]
    baud: u32,

    /// Reply timeout in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_RESPONSE_TIMEOUT_MS, global = true)]
    timeout: u64,

    /// Command framing
    #[arg(long, value_enum, default_value_t = Framing::Structured, global = true)]
    framing: Framing,

    /// Append CR to legacy frames
    #[arg(long, global = true)]
    terminator: bool,

    /// Serial I/O model
    #[arg(long, value_enum, default_value_t = Io::Event, global = true)]
    io: Io,

    /// Device address (1-255)
    #[arg(short, long, default_value_t = DeviceId::default(), global = true)]
    device: DeviceId,

    /// Treat a missing reply to open/close as a failure
    #[arg(long, global = true)]
    require_reply: bool,
}

impl ConnectionArgs {
    fn to_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.port.as_str())
            .with_baud_rate(self.baud)
            .with_response_timeout(Duration::from_millis(self.timeout))
            .with_framing(self.framing.into())
            .with_append_terminator(self.terminator)
            .with_io_model(self.io.into())
            .with_device_id(self.device)
            .with_require_reply(self.require_reply)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Unlock the door
    Open {
        /// Re-lock after 5 seconds if the door is not opened
        #[arg(long)]
        auto_reclose: bool,
    },

    /// Lock the door
    Close,

    /// Query lock and door state
    Status,

    /// Send hex bytes unmodified (e.g. "10 02 01 1B 31 FF 10 03")
    Raw {
        /// Command bytes as hex
        hex: String,
    },

    /// Wait for a status the controller sends on its own
    Listen {
        /// How long to wait, in milliseconds
        #[arg(long, default_value_t = 5000)]
        wait: u64,
    },

    /// List available serial ports
    Ports,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(?cli, "Parsed arguments");

    if let Commands::Ports = cli.command {
        return print_ports(cli.json);
    }

    let config = cli.connection.to_config();
    let device = cli.connection.device;
    let mut controller = DeviceController::new(config).context("invalid connection settings")?;

    // Every operation opens the port on demand.
    let result = run_command(&mut controller, cli.command, device, cli.json).await;

    controller.disconnect().await;
    result
}

async fn run_command<T: Transport>(
    controller: &mut DeviceController<T>,
    command: Commands,
    device: DeviceId,
    json: bool,
) -> Result<()> {
    match command {
        Commands::Open { auto_reclose } => {
            let outcome = controller.try_open_lock(device, auto_reclose).await;
            report_command("open", outcome.map(|o| o.replied()), json)
        }
        Commands::Close => {
            let outcome = controller.try_close_lock(device).await;
            report_command("close", outcome.map(|o| o.replied()), json)
        }
        Commands::Raw { hex } => {
            let outcome = controller.try_send_raw(&hex).await;
            report_command("raw", outcome.map(|o| o.replied()), json)
        }
        Commands::Status => {
            let status = controller.query_status(device).await;
            print_status(&status, json)
        }
        Commands::Listen { wait } => {
            let status = controller.listen_status(Duration::from_millis(wait)).await;
            print_status(&status, json)
        }
        Commands::Ports => print_ports(json),
    }
}

fn report_command(
    name: &str,
    outcome: doorlock_controller::Result<bool>,
    json: bool,
) -> Result<()> {
    let replied = outcome.with_context(|| format!("{name} failed"))?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "command": name, "ok": true, "replied": replied })
        );
    } else if replied {
        println!("{name}: ok");
    } else {
        println!("{name}: sent (no reply)");
    }
    Ok(())
}

fn print_status(status: &LockStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
    } else {
        println!("{status}");
        if let Some(raw) = &status.raw_hex {
            println!("raw: {raw}");
        }
    }
    if !status.is_known() {
        bail!("lock state unknown");
    }
    Ok(())
}

fn print_ports(json: bool) -> Result<()> {
    let ports = list_ports().context("cannot enumerate serial ports")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
    } else if ports.is_empty() {
        println!("No serial ports found");
    } else {
        for port in &ports {
            println!("{port}");
        }
    }
    Ok(())
}
