use clap::{Parser, Subcommand};
use serial_binding::binding::{BindingConfig, CallbackBinding, DisconnectReceiver, SerialBinding};
use serial_binding::config::{Config, ConfigLoader, LogFormat, LoggingConfig};
use serial_binding::error::BindingError;
use serial_binding::platform::{NativePlatform, SerialPlatform};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-binding",
    version,
    about = "Drive serial devices through the async serial binding.",
    long_about = "Lists serial devices, sends bytes to a port, or waits for an expected number of bytes on a receiving port. Defaults come from serial-binding.toml and SERIAL_BINDING_* environment variables."
)]
struct Args {
    /// Explicit configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the serial devices the platform reports.
    List {
        /// Print the device list as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Open a port and wait for an expected number of bytes.
    Read {
        /// Receiving port; falls back to `testing.port_rx`.
        port: Option<String>,
        /// Bytes to wait for; falls back to `testing.expected_bytes`.
        #[arg(short, long)]
        expected: Option<usize>,
        /// Give up after this many milliseconds; falls back to `testing.timeout_ms`.
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },
    /// Open a port, write the given text and close it again.
    Send {
        port: String,
        data: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => ConfigLoader::load()?.into_config(),
    };
    init_tracing(&config.logging);

    let platform: Arc<dyn SerialPlatform> = Arc::new(NativePlatform::new());

    match args.command {
        Command::List { json } => list(platform.as_ref(), json).await,
        Command::Read {
            port,
            expected,
            timeout_ms,
        } => read(platform, &config, port, expected, timeout_ms).await,
        Command::Send { port, data } => send(platform, &config, &port, data.as_bytes()).await,
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

async fn list(
    platform: &dyn SerialPlatform,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let ports = CallbackBinding::list(platform).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(ExitCode::SUCCESS);
    }

    if ports.is_empty() {
        println!("No serial ports detected on this system");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Found {} serial port(s):", ports.len());
    for (idx, port) in ports.iter().enumerate() {
        println!("{}. {}", idx + 1, port.path);
        if !port.display_name.is_empty() {
            println!("   Name:         {}", port.display_name);
        }
        println!("   VID:          {}", port.vendor_id);
        println!("   PID:          {}", port.product_id);
    }
    Ok(ExitCode::SUCCESS)
}

async fn read(
    platform: Arc<dyn SerialPlatform>,
    config: &Config,
    port: Option<String>,
    expected: Option<usize>,
    timeout_ms: Option<u64>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let Some(port) = port.or_else(|| config.testing.port_rx.clone()) else {
        return Err("no receiving port given and testing.port_rx is unset".into());
    };
    let port = config.serial.resolve_port(&port);
    let expected = expected.unwrap_or(config.testing.expected_bytes);
    let deadline = Instant::now()
        + timeout_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or_else(|| config.testing.timeout());

    let (data_tx, mut data_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (binding_config, mut disconnects) = BindingConfig::new(move |bytes| {
        let _ = data_tx.send(bytes);
    });
    let binding = CallbackBinding::new(platform, binding_config);
    binding
        .open(&port, &config.serial.portable_options())
        .await?;
    info!(port = %port, expected, "waiting for data");

    let outcome = wait_for_bytes(&mut data_rx, &mut disconnects, expected, deadline).await;

    if binding.is_open() {
        if let Err(err) = binding.close().await {
            warn!(error = %err, "close after read failed");
        }
    }
    let received = outcome?;

    if received >= expected {
        println!("Successfully received data length: {} B", received);
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "Receive data timeout: {} B of {} B received",
            received, expected
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Count inbound bytes until `expected` arrive, the deadline passes or the
/// link is lost. Returns the byte count seen.
async fn wait_for_bytes(
    data_rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    disconnects: &mut DisconnectReceiver,
    expected: usize,
    deadline: Instant,
) -> Result<usize, BindingError> {
    if expected == 0 {
        return Ok(0);
    }

    let mut received = 0usize;
    let timeout = sleep_until(deadline);
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            Some(bytes) = data_rx.recv() => {
                received += bytes.len();
                if received >= expected {
                    return Ok(received);
                }
            }
            Some(event) = disconnects.recv() => {
                return Err(event.error);
            }
            _ = &mut timeout => {
                return Ok(received);
            }
        }
    }
}

async fn send(
    platform: Arc<dyn SerialPlatform>,
    config: &Config,
    port: &str,
    data: &[u8],
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let port = config.serial.resolve_port(port);
    let (binding_config, _disconnects) = BindingConfig::new(|_| {});
    let binding = CallbackBinding::new(platform, binding_config);

    binding
        .open(&port, &config.serial.portable_options())
        .await?;
    let written = binding.write(data).await;
    let closed = binding.close().await;
    written?;
    closed?;

    println!("Sent {} B to {}", data.len(), port);
    Ok(ExitCode::SUCCESS)
}
