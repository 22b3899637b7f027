// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Device model: a field node and the sensors it owns

use serde::{Deserialize, Serialize};

use super::sensor::{compound_id, Sensor};

/// Adoption metadata for a device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub friendly_name: String,
    pub model: String,
    pub sw_version: String,
}

/// A field device
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    info: DeviceInfo,
    sensors: Vec<Sensor>,
}

impl Device {
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            sensors: Vec::new(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.info.device_id
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn friendly_name(&self) -> &str {
        &self.info.friendly_name
    }

    pub fn model(&self) -> &str {
        &self.info.model
    }

    pub fn sw_version(&self) -> &str {
        &self.info.sw_version
    }

    /// Replace display metadata; the device id never changes
    pub(crate) fn set_metadata(&mut self, info: DeviceInfo) {
        self.info.friendly_name = info.friendly_name;
        self.info.model = info.model;
        self.info.sw_version = info.sw_version;
    }

    /// Sensors in registration order
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Find a sensor by compound id
    pub fn get_sensor(&self, unique_id: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.unique_id() == unique_id)
    }

    pub fn get_sensor_mut(&mut self, unique_id: &str) -> Option<&mut Sensor> {
        self.sensors.iter_mut().find(|s| s.unique_id() == unique_id)
    }

    /// Find a sensor by its device-local id
    pub fn sensor(&self, sensor_id: &str) -> Option<&Sensor> {
        self.get_sensor(&compound_id(self.device_id(), sensor_id))
    }

    /// Append a sensor.
    ///
    /// Returns `false` without modifying the device when the sensor belongs to
    /// another device or its compound id is already present.
    pub fn add_sensor(&mut self, sensor: Sensor) -> bool {
        if sensor.device_id() != self.device_id() || self.get_sensor(sensor.unique_id()).is_some()
        {
            return false;
        }
        self.sensors.push(sensor);
        true
    }
}
