// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Host collaborator interface
//!
//! The hub does not render or publish values itself. It tells the embedding
//! host (an observability platform or a bridge) when entities appear, change
//! or go away. Callbacks run while the registry lock is held, so they
//! are delivered for one sensor in the same order the mutations happened.
//! Implementations must return quickly and must not call back into the hub.

use std::sync::{Arc, Mutex};

use crate::registry::Sensor;

/// Notifications the hub sends to its host
pub trait HostNotifier: Send + Sync {
    /// A new sensor should be surfaced as an observable entity
    fn on_sensor_created(&self, device_id: &str, sensor: &Sensor);

    /// A sensor reported a new value
    fn on_sensor_value_changed(&self, device_id: &str, sensor_id: &str, value: &str);

    /// A re-registration replaced a sensor's metadata
    fn on_sensor_metadata_changed(&self, _device_id: &str, _sensor: &Sensor) {}

    /// The sensor's entity should be retracted (its device is being removed)
    fn on_sensor_removed(&self, _device_id: &str, _unique_id: &str) {}
}

/// Notifier that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl HostNotifier for NullNotifier {
    fn on_sensor_created(&self, _device_id: &str, _sensor: &Sensor) {}

    fn on_sensor_value_changed(&self, _device_id: &str, _sensor_id: &str, _value: &str) {}
}

/// Notifier that writes every event to the log; used by the standalone daemon
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl HostNotifier for LogNotifier {
    fn on_sensor_created(&self, device_id: &str, sensor: &Sensor) {
        log::info!(
            "Sensor {} on {} surfaced ({}, unit '{}', class '{}')",
            sensor.unique_id(),
            device_id,
            sensor.info().display_name,
            sensor.unit(),
            sensor.info().device_class
        );
    }

    fn on_sensor_value_changed(&self, device_id: &str, sensor_id: &str, value: &str) {
        log::info!("Device {} reported state {} for {}", device_id, value, sensor_id);
    }

    fn on_sensor_metadata_changed(&self, device_id: &str, sensor: &Sensor) {
        log::debug!("Sensor {} on {} metadata replaced", sensor.unique_id(), device_id);
    }

    fn on_sensor_removed(&self, device_id: &str, unique_id: &str) {
        log::info!("Sensor {} on {} retracted", unique_id, device_id);
    }
}

/// Event captured by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Created { device_id: String, unique_id: String },
    ValueChanged { device_id: String, sensor_id: String, value: String },
    MetadataChanged { device_id: String, unique_id: String },
    Removed { device_id: String, unique_id: String },
}

/// Notifier that keeps every event in memory, in delivery order
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<HostEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn push(&self, event: HostEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl HostNotifier for RecordingNotifier {
    fn on_sensor_created(&self, device_id: &str, sensor: &Sensor) {
        self.push(HostEvent::Created {
            device_id: device_id.to_string(),
            unique_id: sensor.unique_id().to_string(),
        });
    }

    fn on_sensor_value_changed(&self, device_id: &str, sensor_id: &str, value: &str) {
        self.push(HostEvent::ValueChanged {
            device_id: device_id.to_string(),
            sensor_id: sensor_id.to_string(),
            value: value.to_string(),
        });
    }

    fn on_sensor_metadata_changed(&self, device_id: &str, sensor: &Sensor) {
        self.push(HostEvent::MetadataChanged {
            device_id: device_id.to_string(),
            unique_id: sensor.unique_id().to_string(),
        });
    }

    fn on_sensor_removed(&self, device_id: &str, unique_id: &str) {
        self.push(HostEvent::Removed {
            device_id: device_id.to_string(),
            unique_id: unique_id.to_string(),
        });
    }
}
