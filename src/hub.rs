// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Sensor hub: the composition root shared by every connection
//!
//! [`SensorHub`] owns the device registry behind a mutex, the persistent store
//! and the host notifier. Connection handlers receive an `Arc<SensorHub>`; no
//! state lives in globals.
//!
//! # Locking
//!
//! - `registry`: held for the duration of one mutation plus its host
//!   notifications. Readers get cloned snapshots, never a half-appended list.
//! - `persist_lock`: serializes file writes. The registry snapshot is taken
//!   while it is held, so snapshots reach disk in the order they were taken.
//!
//! Lock order is always `persist_lock` then `registry`; the mutation path
//! releases `registry` before persisting.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::codec::{Registration, Request, Update};
use crate::host::HostNotifier;
use crate::registry::{
    AdoptOutcome, Device, DeviceInfo, DeviceRegistry, RegistrationOutcome, Sensor, SensorInfo,
    UpdateOutcome,
};
use crate::storage::{DeviceRecord, PersistentStore};

/// Shared registry, store and host link
pub struct SensorHub {
    registry: Mutex<DeviceRegistry>,
    store: Option<PersistentStore>,
    persist_lock: Mutex<()>,
    notifier: Arc<dyn HostNotifier>,
}

impl SensorHub {
    /// Hub without persistence
    pub fn in_memory(notifier: Arc<dyn HostNotifier>) -> Self {
        Self {
            registry: Mutex::new(DeviceRegistry::new()),
            store: None,
            persist_lock: Mutex::new(()),
            notifier,
        }
    }

    /// Hub backed by `store`, pre-populated with every persisted device.
    ///
    /// Each restored sensor is announced through
    /// [`HostNotifier::on_sensor_created`] so the host can surface it again.
    pub fn open(store: PersistentStore, notifier: Arc<dyn HostNotifier>) -> Self {
        let hub = Self {
            registry: Mutex::new(DeviceRegistry::new()),
            store: Some(store),
            persist_lock: Mutex::new(()),
            notifier,
        };
        hub.restore();
        hub
    }

    fn restore(&self) {
        let Some(records) = self.store.as_ref().and_then(PersistentStore::load) else {
            log::info!("No persisted devices to restore");
            return;
        };

        let mut registry = self.registry();
        for record in records {
            let device = record.into_device();
            let device_id = device.device_id().to_string();
            let known = registry.get(&device_id).map_or(0, |d| d.sensors().len());
            if registry.add(device) == AdoptOutcome::Readopted {
                log::warn!("Persisted store lists device {} twice; merged", device_id);
            }

            // announce only what the registry accepted
            if let Some(device) = registry.get(&device_id) {
                for sensor in &device.sensors()[known..] {
                    self.notifier.on_sensor_created(&device_id, sensor);
                }
            }
        }
        log::info!(
            "Restored {} devices with {} sensors",
            registry.len(),
            registry.sensor_count()
        );
    }

    fn registry(&self) -> MutexGuard<'_, DeviceRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> Option<&PersistentStore> {
        self.store.as_ref()
    }

    /// Create a device, or refresh its metadata if it is already known.
    ///
    /// This is the only way a device enters the registry at runtime.
    pub fn adopt_device(&self, info: DeviceInfo) -> AdoptOutcome {
        let device_id = info.device_id.clone();
        let outcome = self.registry().add(Device::new(info));
        match outcome {
            AdoptOutcome::Added => log::info!("Adopted device {}", device_id),
            AdoptOutcome::Readopted => log::info!("Re-adopted device {}", device_id),
        }
        self.persist();
        outcome
    }

    /// Retract every sensor of a device from the host, then drop the device.
    ///
    /// Returns `false` if the device was not known.
    pub fn remove_device(&self, device_id: &str) -> bool {
        let removed = {
            let mut registry = self.registry();
            let Some(device) = registry.get(device_id) else {
                log::debug!("Remove for unknown device {} ignored", device_id);
                return false;
            };
            for sensor in device.sensors() {
                self.notifier.on_sensor_removed(device_id, sensor.unique_id());
            }
            registry.remove(device_id)
        };

        if let Some(device) = removed {
            log::info!(
                "Removed device {} and {} sensors",
                device_id,
                device.sensors().len()
            );
        }
        self.persist();
        true
    }

    /// Apply a registration message
    pub fn register_sensor(&self, registration: &Registration) -> RegistrationOutcome {
        let info = SensorInfo {
            display_name: registration.display_name.clone(),
            unit_of_measurement: registration.unit_of_measurement.clone(),
            device_class: registration.device_class.clone(),
            state_class: registration.state_class.clone(),
        };

        let outcome = {
            let mut registry = self.registry();
            let outcome =
                registry.register_sensor(&registration.device_id, &registration.sensor_id, info);
            match &outcome {
                RegistrationOutcome::Created(sensor) => {
                    self.notifier
                        .on_sensor_created(&registration.device_id, sensor);
                }
                RegistrationOutcome::MetadataUpdated(sensor) => {
                    self.notifier
                        .on_sensor_metadata_changed(&registration.device_id, sensor);
                }
                RegistrationOutcome::UnknownDevice | RegistrationOutcome::IdConflict { .. } => {}
            }
            outcome
        };

        match &outcome {
            RegistrationOutcome::UnknownDevice => {
                log::info!(
                    "Dropped registration of {} for unadopted device {}",
                    registration.sensor_id,
                    registration.device_id
                );
            }
            RegistrationOutcome::IdConflict { owner } => {
                log::info!(
                    "Dropped registration of {} for device {}: id {} already belongs to device {}",
                    registration.sensor_id,
                    registration.device_id,
                    crate::registry::compound_id(&registration.device_id, &registration.sensor_id),
                    owner
                );
            }
            RegistrationOutcome::Created(sensor) => {
                log::info!("Registered sensor {}", sensor.unique_id());
                self.persist();
            }
            RegistrationOutcome::MetadataUpdated(_) => {
                self.persist();
            }
        }
        outcome
    }

    /// Apply an update message
    pub fn update_sensor(&self, update: &Update) -> UpdateOutcome {
        let outcome = {
            let mut registry = self.registry();
            let outcome = registry.update_value(&update.device_id, &update.sensor_id, &update.value);
            if outcome.is_applied() {
                self.notifier
                    .on_sensor_value_changed(&update.device_id, &update.sensor_id, &update.value);
            }
            outcome
        };

        match &outcome {
            UpdateOutcome::Applied(_) => {
                log::debug!(
                    "Device {} reported state {} for {}",
                    update.device_id,
                    update.value,
                    update.sensor_id
                );
                self.persist();
            }
            UpdateOutcome::UnknownDevice => {
                log::info!("Dropped update for unadopted device {}", update.device_id);
            }
            UpdateOutcome::UnknownSensor => {
                log::info!(
                    "Dropped update for unregistered sensor {} on {}",
                    update.sensor_id,
                    update.device_id
                );
            }
        }
        outcome
    }

    /// Apply any decoded request. Returns `true` if the registry accepted it.
    pub fn dispatch(&self, request: &Request) -> bool {
        match request {
            Request::Registration(r) => self.register_sensor(r).is_applied(),
            Request::Update(u) => self.update_sensor(u).is_applied(),
        }
    }

    /// Write the full registry to the store. `true` when there is no store.
    pub fn persist(&self) -> bool {
        let Some(store) = &self.store else {
            return true;
        };

        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let records: Vec<DeviceRecord> = self
            .registry()
            .devices()
            .iter()
            .map(DeviceRecord::from)
            .collect();
        store.save(&records)
    }

    /// Snapshot of all devices
    pub fn devices(&self) -> Vec<Device> {
        self.registry().devices().to_vec()
    }

    pub fn device(&self, device_id: &str) -> Option<Device> {
        self.registry().get(device_id).cloned()
    }

    pub fn sensor(&self, device_id: &str, sensor_id: &str) -> Option<Sensor> {
        self.registry()
            .get(device_id)
            .and_then(|d| d.sensor(sensor_id))
            .cloned()
    }

    pub fn device_count(&self) -> usize {
        self.registry().len()
    }

    pub fn sensor_count(&self) -> usize {
        self.registry().sensor_count()
    }
}
