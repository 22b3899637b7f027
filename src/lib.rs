// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Sensor Hub
//!
//! Ingestion server and device registry for network-attached field sensor
//! nodes. Devices open a TCP connection, send one length-prefixed request
//! (a sensor registration or a value update) and get a single `0x01` byte back
//! when the hub applied it. The registry is persisted to a JSON document after
//! every change and restored on startup; a [`host::HostNotifier`] tells the
//! embedding host when entities appear, change or go away.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use hublib::{DeviceInfo, IngestionServer, LogNotifier, PersistentStore, SensorHub, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> hublib::Result<()> {
//!     let store = PersistentStore::init(".")?;
//!     let hub = Arc::new(SensorHub::open(store, Arc::new(LogNotifier)));
//!     hub.adopt_device(DeviceInfo {
//!         device_id: "dev1".into(),
//!         friendly_name: "Kitchen".into(),
//!         model: "esp32".into(),
//!         sw_version: "1.0.0".into(),
//!     });
//!
//!     let server = IngestionServer::bind(ServerConfig::default(), hub).await?;
//!     server.run().await
//! }
//! ```

pub mod client;
pub mod codec;
pub mod daemon;
pub mod error;
pub mod host;
pub mod hub;
pub mod registry;
pub mod server;
pub mod storage;

pub use codec::{FrameError, MessageType, Registration, Request, Update, ACK};
pub use daemon::{DaemonConfig, HubDaemon, LogLevel};
pub use error::{HubError, Result};
pub use host::{HostNotifier, LogNotifier, NullNotifier};
pub use hub::SensorHub;
pub use registry::{Device, DeviceInfo, DeviceRegistry, Sensor, SensorInfo, StateClass};
pub use server::{IngestionServer, ServerConfig};
pub use storage::{DeviceRecord, PersistentStore, SensorRecord};
