// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Ingestion daemon for headless operation
//!
//! Loads the device store, restores the registry, and runs the TCP ingestion
//! server until Ctrl-C.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::DEFAULT_MAX_FIELD_LEN;
use crate::error::{HubError, Result};
use crate::host::HostNotifier;
use crate::hub::SensorHub;
use crate::server::{IngestionServer, ServerConfig, DEFAULT_PORT};
use crate::storage::PersistentStore;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter string understood by `env_logger`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    /// Host config directory; the store lives in `<storage_dir>/.storage/`
    pub storage_dir: PathBuf,
    /// Per-request read deadline, 0 disables it
    pub read_timeout_secs: u64,
    pub max_field_len: usize,
    pub pid_file: Option<String>,
    pub log_level: LogLevel,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            storage_dir: PathBuf::from("."),
            read_timeout_secs: 30,
            max_field_len: DEFAULT_MAX_FIELD_LEN,
            pid_file: None,
            log_level: LogLevel::Info,
        }
    }
}

impl DaemonConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| HubError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| HubError::Config(format!("TOML parse error: {}", e)))
    }

    /// Generate sample config
    pub fn sample_toml() -> String {
        r#"# Sensor Hub Daemon Configuration
host = "0.0.0.0"
port = 8901

# Directory the device store is kept under (<storage_dir>/.storage/sensorhub.json)
storage_dir = "."

# Seconds a device may take to send one request; 0 waits forever
read_timeout_secs = 30

# Largest accepted string field in bytes
max_field_len = 65536

# pid_file = "/var/run/hubd.pid"
log_level = "Info"
"#
        .into()
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store(&self) -> PersistentStore {
        PersistentStore::in_dir(&self.storage_dir)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            read_timeout: match self.read_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_field_len: self.max_field_len,
        }
    }
}

/// Ingestion daemon
pub struct HubDaemon {
    config: DaemonConfig,
    owns_pid_file: bool,
}

impl HubDaemon {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            config,
            owns_pid_file: false,
        }
    }

    /// Load from config file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(DaemonConfig::from_toml_file(path)?))
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Write PID file, refusing if a non-empty one is already there
    pub fn write_pid_file(&mut self) -> Result<()> {
        if let Some(ref pid_path) = self.config.pid_file {
            if Path::new(pid_path).exists() {
                let existing = std::fs::read_to_string(pid_path).unwrap_or_default();
                if !existing.trim().is_empty() {
                    return Err(HubError::AlreadyRunning(pid_path.clone()));
                }
            }
            std::fs::write(pid_path, std::process::id().to_string())?;
            self.owns_pid_file = true;
        }
        Ok(())
    }

    /// Remove the PID file if this daemon wrote it
    pub fn remove_pid_file(&mut self) {
        if !self.owns_pid_file {
            return;
        }
        if let Some(ref pid_path) = self.config.pid_file {
            let _ = std::fs::remove_file(pid_path);
        }
        self.owns_pid_file = false;
    }

    /// Run until Ctrl-C
    pub async fn run(&mut self, notifier: Arc<dyn HostNotifier>) -> Result<()> {
        self.run_until(notifier, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves
    pub async fn run_until<F>(&mut self, notifier: Arc<dyn HostNotifier>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.write_pid_file()?;

        let storage_dir = self.config.storage_dir.clone();
        let hub = tokio::task::spawn_blocking(move || -> Result<SensorHub> {
            let store = PersistentStore::init(&storage_dir)?;
            log::info!("Using device store {}", store.path().display());
            Ok(SensorHub::open(store, notifier))
        })
        .await
        .map_err(|e| HubError::Other(format!("store restore task failed: {}", e)))??;

        let server = IngestionServer::bind(self.config.server_config(), Arc::new(hub)).await?;
        server.run_until(shutdown).await?;

        log::info!("Sensor hub stopped");
        Ok(())
    }
}

impl Drop for HubDaemon {
    fn drop(&mut self) {
        self.remove_pid_file();
    }
}
