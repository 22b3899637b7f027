// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! In-memory catalog of adopted devices and their sensors
//!
//! The registry owns every [`Device`], and each device owns its [`Sensor`]s.
//! Lookups are linear scans over small vectors; a deployment has tens of
//! devices, and insertion order is what gets persisted.
//!
//! Devices only enter the registry through [`DeviceRegistry::add`] (adoption
//! or restore). Sensor registration never creates a device.
//!
//! Compound sensor ids are unique across the whole registry, not just within a
//! device: `esp` + `kitchen_t1` and `esp_kitchen` + `t1` both spell
//! `esp_kitchen_t1`, and only the first one to claim it gets it.
//!
//! The registry itself is not synchronized. [`crate::hub::SensorHub`] wraps it
//! in a mutex and is the only place that mutates it at runtime.

pub mod device;
pub mod sensor;

pub use device::{Device, DeviceInfo};
pub use sensor::{compound_id, Sensor, SensorInfo, StateClass};

/// Result of [`DeviceRegistry::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdoptOutcome {
    /// New device inserted
    Added,
    /// Device already known; metadata replaced, sensors kept
    Readopted,
}

/// Result of [`DeviceRegistry::register_sensor`]
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// First registration for this compound id
    Created(Sensor),
    /// Existing sensor's metadata overwritten
    MetadataUpdated(Sensor),
    /// No such device; nothing changed
    UnknownDevice,
    /// Compound id already belongs to a sensor of another device; nothing changed
    IdConflict { owner: String },
}

impl RegistrationOutcome {
    /// Whether the registry was mutated
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            RegistrationOutcome::Created(_) | RegistrationOutcome::MetadataUpdated(_)
        )
    }
}

/// Result of [`DeviceRegistry::update_value`]
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Value stored
    Applied(Sensor),
    UnknownDevice,
    UnknownSensor,
}

impl UpdateOutcome {
    /// Whether the registry was mutated
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }
}

/// Device catalog keyed by device id
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Total number of sensors across all devices
    pub fn sensor_count(&self) -> usize {
        self.devices.iter().map(|d| d.sensors().len()).sum()
    }

    /// Insert a device, or re-adopt an existing one.
    ///
    /// Re-adoption replaces friendly name, model and software version, keeps
    /// the sensors already known, and appends any sensors of `device` that are
    /// not yet present. Sensors whose compound id is owned by another device
    /// are skipped.
    pub fn add(&mut self, device: Device) -> AdoptOutcome {
        let outcome = match self.get_mut(device.device_id()) {
            Some(existing) => {
                existing.set_metadata(device.info().clone());
                AdoptOutcome::Readopted
            }
            None => {
                self.devices.push(Device::new(device.info().clone()));
                AdoptOutcome::Added
            }
        };

        for sensor in device.sensors() {
            self.attach_sensor(sensor.clone());
        }
        outcome
    }

    fn attach_sensor(&mut self, sensor: Sensor) -> bool {
        if let Some(owner) = self.owner_of(sensor.unique_id()) {
            if owner != sensor.device_id() {
                log::warn!(
                    "Skipping sensor {} of device {}: id already used by device {}",
                    sensor.unique_id(),
                    sensor.device_id(),
                    owner
                );
                return false;
            }
        }
        match self.get_mut(sensor.device_id()) {
            Some(device) => device.add_sensor(sensor),
            None => false,
        }
    }

    /// Device that holds the sensor with this compound id
    pub fn owner_of(&self, unique_id: &str) -> Option<&str> {
        self.devices
            .iter()
            .find(|d| d.get_sensor(unique_id).is_some())
            .map(|d| d.device_id())
    }

    pub fn get(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_id() == device_id)
    }

    fn get_mut(&mut self, device_id: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.device_id() == device_id)
    }

    /// Remove a device together with its sensors. Unknown ids are a no-op.
    pub fn remove(&mut self, device_id: &str) -> Option<Device> {
        let idx = self.devices.iter().position(|d| d.device_id() == device_id)?;
        Some(self.devices.remove(idx))
    }

    /// Devices in adoption order
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Create a sensor on a known device, or overwrite its metadata
    pub fn register_sensor(
        &mut self,
        device_id: &str,
        sensor_id: &str,
        info: SensorInfo,
    ) -> RegistrationOutcome {
        if self.get(device_id).is_none() {
            return RegistrationOutcome::UnknownDevice;
        }

        let unique_id = compound_id(device_id, sensor_id);
        if let Some(owner) = self.owner_of(&unique_id) {
            if owner != device_id {
                return RegistrationOutcome::IdConflict {
                    owner: owner.to_string(),
                };
            }
        }

        let Some(device) = self.get_mut(device_id) else {
            return RegistrationOutcome::UnknownDevice;
        };
        if let Some(sensor) = device.get_sensor_mut(&unique_id) {
            sensor.set_info(info);
            return RegistrationOutcome::MetadataUpdated(sensor.clone());
        }

        let sensor = Sensor::new(device_id, sensor_id, info);
        device.add_sensor(sensor.clone());
        RegistrationOutcome::Created(sensor)
    }

    /// Store a new value on a known sensor
    pub fn update_value(&mut self, device_id: &str, sensor_id: &str, value: &str) -> UpdateOutcome {
        let Some(device) = self.get_mut(device_id) else {
            return UpdateOutcome::UnknownDevice;
        };
        let Some(sensor) = device.get_sensor_mut(&compound_id(device_id, sensor_id)) else {
            return UpdateOutcome::UnknownSensor;
        };

        sensor.set_value(value);
        UpdateOutcome::Applied(sensor.clone())
    }
}
