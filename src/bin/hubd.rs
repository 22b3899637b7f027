// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! CLI tool for Sensor Hub (hubd)

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "hubd")]
#[command(about = "Sensor Hub: ingestion server and device registry for field sensor nodes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the storage directory from the configuration
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion server until Ctrl-C
    Run {
        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print a sample configuration file
    SampleConfig,
    /// Show persisted devices as JSON
    Devices {
        /// Only show this device
        #[arg(long)]
        id: Option<String>,
    },
    /// Adopt a device (or refresh its metadata) in the store
    Adopt {
        device_id: String,
        /// Friendly name shown by the host
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        model: String,
        #[arg(long, default_value = "")]
        sw_version: String,
    },
    /// Remove a device and all of its sensors from the store
    Forget { device_id: String },
    /// Act as a field device and send one request to a running hub
    Send {
        #[command(subcommand)]
        action: SendSubcommand,

        /// Hub address
        #[arg(short, long, default_value = "127.0.0.1:8901", global = true)]
        addr: SocketAddr,

        /// Seconds to wait for the acknowledgement
        #[arg(short, long, default_value = "5", global = true)]
        timeout: u64,
    },
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum SendSubcommand {
    /// Register (or re-register) a sensor
    Register {
        device_id: String,
        sensor_id: String,
        display_name: String,
        #[arg(long, default_value = "")]
        unit: String,
        #[arg(long, default_value = "measurement")]
        state_class: String,
        #[arg(long, default_value = "")]
        device_class: String,
    },
    /// Report a sensor value
    Update {
        device_id: String,
        sensor_id: String,
        value: String,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use hublib::{DaemonConfig, SensorHub};

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DaemonConfig::from_toml_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir = dir.clone();
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_filter()),
    )
    .init();

    match cli.command {
        Commands::Run { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            handle_run(config)?;
        }

        Commands::SampleConfig => {
            print!("{}", DaemonConfig::sample_toml());
        }

        Commands::Devices { id } => {
            let store = config.store();
            let json = match id {
                Some(id) => {
                    let device = store
                        .get_device(&id)
                        .ok_or(hublib::HubError::DeviceNotFound(id))?;
                    serde_json::to_string_pretty(&device)?
                }
                None => serde_json::to_string_pretty(&store.load().unwrap_or_default())?,
            };
            println!("{}", json);
        }

        Commands::Adopt {
            device_id,
            name,
            model,
            sw_version,
        } => {
            let store = hublib::PersistentStore::init(&config.storage_dir)?;
            let hub = SensorHub::open(store, Arc::new(hublib::NullNotifier));
            let outcome = hub.adopt_device(hublib::DeviceInfo {
                device_id: device_id.clone(),
                friendly_name: name,
                model,
                sw_version,
            });
            if !hub.persist() {
                return Err(format!("Could not write the device store for {}", device_id).into());
            }
            println!("[+] {}: {:?}", device_id, outcome);
        }

        Commands::Forget { device_id } => {
            let hub = SensorHub::open(config.store(), Arc::new(hublib::NullNotifier));
            if !hub.remove_device(&device_id) {
                return Err(hublib::HubError::DeviceNotFound(device_id).into());
            }
            println!("[+] {} removed", device_id);
        }

        Commands::Send {
            action,
            addr,
            timeout,
        } => {
            handle_send(action, addr, Duration::from_secs(timeout))?;
        }
    }

    Ok(())
}

/// Run the daemon on a multi-threaded runtime
#[cfg(feature = "cli")]
fn handle_run(config: hublib::DaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let mut daemon = hublib::HubDaemon::new(config);
    runtime.block_on(daemon.run(Arc::new(hublib::LogNotifier)))?;
    Ok(())
}

#[cfg(feature = "cli")]
fn handle_send(
    action: SendSubcommand,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    use hublib::{Registration, Request, Update};

    let request = match action {
        SendSubcommand::Register {
            device_id,
            sensor_id,
            display_name,
            unit,
            state_class,
            device_class,
        } => Request::Registration(Registration {
            device_id,
            sensor_id,
            display_name,
            unit_of_measurement: unit,
            state_class,
            device_class,
        }),
        SendSubcommand::Update {
            device_id,
            sensor_id,
            value,
        } => Request::Update(Update {
            device_id,
            sensor_id,
            value,
        }),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let acked = runtime.block_on(hublib::client::send_request(addr, &request, timeout))?;
    if acked {
        println!("[+] acknowledged");
        Ok(())
    } else {
        Err(format!("{} closed the connection without acknowledging", addr).into())
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}
