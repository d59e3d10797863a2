use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use threadsafe_serial::config::{Config, ConfigLoader};
use threadsafe_serial::{
    logging, DeviceDirectory, Notification, SerialDirectory, SerialPortDriver, SerialSession,
    SessionError, SessionObserver,
};
use tracing::{info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-session",
    version,
    about = "Inspect and talk to serial devices through a thread-safe session."
)]
struct Cli {
    /// Configuration file (defaults to the standard resolution order).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for this crate.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial devices currently present.
    List {
        /// Print the list as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print lines from a device until it is removed or `--count` is reached.
    Monitor {
        /// Device path or configured alias.
        port: String,
        #[arg(long)]
        baud: Option<u32>,
        /// Per-line wait; 0 waits indefinitely.
        #[arg(long, default_value_t = 0)]
        timeout_ms: i64,
        /// Stop after this many lines.
        #[arg(long)]
        count: Option<usize>,
    },
    /// Write data to a device and print one reply line.
    Send {
        /// Device path or configured alias.
        port: String,
        /// Data to write; `\n` is appended.
        data: String,
        #[arg(long)]
        baud: Option<u32>,
        #[arg(long, default_value_t = 1000)]
        reply_timeout_ms: i64,
    },
}

/// Logs hot-plug transitions.
struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_connected(&self, notification: &Notification) {
        info!(device = %notification.device, "device connected");
    }

    fn on_disconnected(&self, notification: &Notification) {
        warn!(device = %notification.device, "device disconnected, session closed");
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let loader = match path {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(loader.into_config())
}

fn open_session(
    config: &Config,
    port: &str,
    baud: Option<u32>,
    observer: &Arc<LogObserver>,
) -> Result<SerialSession, Box<dyn std::error::Error>> {
    let mut settings = config.serial.port_settings();
    if let Some(baud) = baud {
        settings.baud_rate = baud;
    }

    let session = SerialSession::builder(
        SerialPortDriver,
        SerialDirectory::new(config.hotplug.poll_interval()),
    )
    .settings(settings)
    .hotplug(config.hotplug.enabled)
    .observer(observer)
    .build()?;

    let path = config.serial.resolve_port(port);
    session.try_open(&path)?;
    Ok(session)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    logging::init(&config.logging, cli.verbose);

    match cli.command {
        Command::List { json } => {
            let devices = SerialDirectory::new(config.hotplug.poll_interval())
                .list_devices()
                .map_err(SessionError::Directory)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No serial devices found.");
            } else {
                for device in devices {
                    println!("{}", device);
                }
            }
        }
        Command::Monitor {
            port,
            baud,
            timeout_ms,
            count,
        } => {
            let observer = Arc::new(LogObserver);
            let session = open_session(&config, &port, baud, &observer)?;
            info!(status = ?session.status(), "monitoring");

            let mut received = 0usize;
            while session.status().connected && count.map_or(true, |n| received < n) {
                if let Some(line) = session.read_line(timeout_ms) {
                    println!("{}", line);
                    received += 1;
                }
            }

            session.close();
            println!("{}", serde_json::to_string(&session.status())?);
        }
        Command::Send {
            port,
            data,
            baud,
            reply_timeout_ms,
        } => {
            let observer = Arc::new(LogObserver);
            let session = open_session(&config, &port, baud, &observer)?;

            session.try_write(&format!("{}\n", data))?;
            match session.read_line(reply_timeout_ms) {
                Some(reply) => println!("{}", reply),
                None => warn!(timeout_ms = reply_timeout_ms, "no reply"),
            }
            session.close();
        }
    }

    Ok(())
}
