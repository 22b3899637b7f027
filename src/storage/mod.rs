// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! JSON document store for the device catalog
//!
//! The whole registry is persisted as one document:
//!
//! ```json
//! {
//!   "devices": [
//!     {
//!       "device_id": "dev1", "friendly_name": "Kitchen", "model": "esp32", "sw_version": "1.0.0",
//!       "sensors": [
//!         { "name": "Temp", "unique_id": "t1", "unit_of_measurement": "°C",
//!           "device_class": "temperature", "state_class": "measurement", "last_state": "21.5" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Writes are full-document replaces through a sibling temp file and a rename,
//! so a crash mid-write leaves the previous snapshot intact. Top-level keys
//! other than `devices` are carried over untouched.
//!
//! A document that cannot be parsed is reset to `{}`. This drops every
//! persisted device and is logged at error level.
//!
//! [`PersistentStore::load`] and [`PersistentStore::save`] never fail: I/O
//! problems are logged and reported as `None` / `false` so ingestion keeps
//! running without storage. The `try_*` variants return the error instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::registry::{Device, DeviceInfo, Sensor, SensorInfo};

/// Directory below the host config dir that holds the document
pub const STORAGE_SUBDIR: &str = ".storage";

/// Document file name
pub const STORAGE_FILE: &str = "sensorhub.json";

const DEVICES_KEY: &str = "devices";

/// Persisted sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    /// Display name as registered
    pub name: String,
    /// Device-local sensor id
    pub unique_id: String,
    #[serde(default)]
    pub unit_of_measurement: String,
    #[serde(default)]
    pub device_class: String,
    #[serde(default)]
    pub state_class: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Persisted device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub sw_version: String,
    #[serde(default)]
    pub sensors: Vec<SensorRecord>,
}

// Older documents stored numeric states as JSON numbers and unset ones as null.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl From<&Sensor> for SensorRecord {
    fn from(sensor: &Sensor) -> Self {
        let info = sensor.info();
        Self {
            name: info.display_name.clone(),
            unique_id: sensor.sensor_id().to_string(),
            unit_of_measurement: info.unit_of_measurement.clone(),
            device_class: info.device_class.clone(),
            state_class: info.state_class.clone(),
            last_state: sensor.last_value().to_string(),
            last_updated: sensor.last_updated(),
        }
    }
}

impl From<&Device> for DeviceRecord {
    fn from(device: &Device) -> Self {
        let info = device.info();
        Self {
            device_id: info.device_id.clone(),
            friendly_name: info.friendly_name.clone(),
            model: info.model.clone(),
            sw_version: info.sw_version.clone(),
            sensors: device.sensors().iter().map(SensorRecord::from).collect(),
        }
    }
}

impl DeviceRecord {
    /// Rebuild the live device, sensors and last values included
    pub fn into_device(self) -> Device {
        let mut device = Device::new(DeviceInfo {
            device_id: self.device_id,
            friendly_name: self.friendly_name,
            model: self.model,
            sw_version: self.sw_version,
        });

        for record in self.sensors {
            let sensor = Sensor::new(
                device.device_id().to_string(),
                record.unique_id,
                SensorInfo {
                    display_name: record.name,
                    unit_of_measurement: record.unit_of_measurement,
                    device_class: record.device_class,
                    state_class: record.state_class,
                },
            )
            .with_value(record.last_state, record.last_updated);

            if !device.add_sensor(sensor) {
                log::warn!(
                    "Skipping duplicate persisted sensor on device {}",
                    device.device_id()
                );
            }
        }

        device
    }
}

/// Raw state of the document on disk
enum Document {
    Missing,
    Corrupt(String),
    Parsed(Map<String, Value>),
}

/// File-backed device catalog snapshot
#[derive(Debug, Clone)]
pub struct PersistentStore {
    path: PathBuf,
}

impl PersistentStore {
    /// Store backed by an explicit file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at `<dir>/.storage/sensorhub.json`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(STORAGE_SUBDIR).join(STORAGE_FILE))
    }

    /// Open the store under `dir`, creating an empty document if none exists
    pub fn init<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let store = Self::in_dir(dir);
        if !store.path.exists() {
            store.write_document(&Map::new())?;
            log::info!("Created empty device store at {}", store.path.display());
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all persisted devices.
    ///
    /// `None` when the file is missing, unreadable, has no `devices` key, or is
    /// corrupted (in which case it has been reset to `{}`).
    pub fn load(&self) -> Option<Vec<DeviceRecord>> {
        match self.try_load() {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("Cannot read device store {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn try_load(&self) -> Result<Option<Vec<DeviceRecord>>> {
        let mut doc = match self.read_document()? {
            Document::Missing => return Ok(None),
            Document::Corrupt(reason) => {
                self.heal(&reason);
                return Ok(None);
            }
            Document::Parsed(doc) => doc,
        };

        let Some(devices) = doc.remove(DEVICES_KEY) else {
            return Ok(None);
        };

        match serde_json::from_value::<Vec<DeviceRecord>>(devices) {
            Ok(devices) => Ok(Some(devices)),
            Err(e) => {
                self.heal(&e.to_string());
                Ok(None)
            }
        }
    }

    /// Look up a single persisted device
    pub fn get_device(&self, device_id: &str) -> Option<DeviceRecord> {
        self.load()?
            .into_iter()
            .find(|d| d.device_id == device_id)
    }

    /// Replace the persisted device list. Returns `false` if nothing was written.
    pub fn save(&self, devices: &[DeviceRecord]) -> bool {
        match self.try_save(devices) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cannot write device store {}: {}", self.path.display(), e);
                false
            }
        }
    }

    pub fn try_save(&self, devices: &[DeviceRecord]) -> Result<()> {
        let mut doc = match self.read_document()? {
            Document::Parsed(doc) => doc,
            Document::Missing => Map::new(),
            Document::Corrupt(reason) => {
                log::error!(
                    "Device store {} is corrupted ({}); replacing it with the current registry",
                    self.path.display(),
                    reason
                );
                Map::new()
            }
        };

        doc.insert(DEVICES_KEY.to_string(), serde_json::to_value(devices)?);
        self.write_document(&doc)
    }

    /// Reset the document to `{}`
    pub fn wipe(&self) -> bool {
        match self.write_document(&Map::new()) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cannot wipe device store {}: {}", self.path.display(), e);
                false
            }
        }
    }

    fn heal(&self, reason: &str) {
        log::error!(
            "Device store {} is corrupted ({}); resetting to an empty document, persisted devices are lost",
            self.path.display(),
            reason
        );
        self.wipe();
    }

    fn read_document(&self) -> Result<Document> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Document::Missing),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Ok(Document::Corrupt(e.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Document::Parsed(map),
            Ok(_) => Document::Corrupt("top-level value is not an object".to_string()),
            Err(e) => Document::Corrupt(e.to_string()),
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| STORAGE_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_document(&self, doc: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        let written = (|| -> Result<()> {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, doc)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DeviceRegistry;
    use serde_json::json;

    fn sample_registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.add(Device::new(DeviceInfo {
            device_id: "dev1".into(),
            friendly_name: "Kitchen".into(),
            model: "esp32".into(),
            sw_version: "1.0.0".into(),
        }));
        registry.register_sensor(
            "dev1",
            "t1",
            SensorInfo {
                display_name: "Temp".into(),
                unit_of_measurement: "°C".into(),
                device_class: "temperature".into(),
                state_class: "measurement".into(),
            },
        );
        registry.register_sensor("dev1", "h1", SensorInfo::default());
        registry.update_value("dev1", "t1", "21.5");
        registry
    }

    fn records(registry: &DeviceRegistry) -> Vec<DeviceRecord> {
        registry.devices().iter().map(DeviceRecord::from).collect()
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_init_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        assert_eq!(
            store.path(),
            dir.path().join(".storage").join("sensorhub.json")
        );
        assert_eq!(read_json(store.path()), json!({}));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::in_dir(dir.path());
        assert!(store.load().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_then_load_reconstructs_registry() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        let registry = sample_registry();

        assert!(store.save(&records(&registry)));

        let loaded = store.load().unwrap();
        let restored: Vec<Device> = loaded.into_iter().map(DeviceRecord::into_device).collect();
        assert_eq!(restored, registry.devices().to_vec());
    }

    #[test]
    fn test_saved_document_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        store.save(&records(&sample_registry()));

        let doc = read_json(store.path());
        let sensor = &doc["devices"][0]["sensors"][0];
        assert_eq!(doc["devices"][0]["device_id"], "dev1");
        assert_eq!(sensor["unique_id"], "t1");
        assert_eq!(sensor["name"], "Temp");
        assert_eq!(sensor["last_state"], "21.5");
        // never-updated sensors carry no timestamp
        assert!(doc["devices"][0]["sensors"][1].get("last_updated").is_none());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_corrupt_file_self_heals() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        fs::write(store.path(), "{\"devices\": [ {\"device_id\": ").unwrap();

        assert!(store.load().is_none());
        assert_eq!(read_json(store.path()), json!({}));
        // a second load sees a valid, empty document
        assert!(store.load().is_none());
    }

    #[test]
    fn test_schema_mismatch_counts_as_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        fs::write(store.path(), r#"{"devices": "nope", "other": 1}"#).unwrap();

        assert!(store.load().is_none());
        assert_eq!(read_json(store.path()), json!({}));
    }

    #[test]
    fn test_non_object_document_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        fs::write(store.path(), "[1, 2, 3]").unwrap();

        assert!(store.load().is_none());
        assert_eq!(read_json(store.path()), json!({}));
    }

    #[test]
    fn test_save_preserves_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        fs::write(store.path(), r#"{"version": 3, "devices": []}"#).unwrap();

        store.save(&records(&sample_registry()));
        let doc = read_json(store.path());
        assert_eq!(doc["version"], 3);
        assert_eq!(doc["devices"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_save_over_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        fs::write(store.path(), "garbage").unwrap();

        assert!(store.save(&records(&sample_registry())));
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_lenient_last_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        let doc = json!({
            "devices": [{
                "device_id": "dev1",
                "friendly_name": "Kitchen",
                "model": "esp32",
                "sw_version": "1.0.0",
                "sensors": [
                    {"name": "Temp", "unique_id": "t1", "unit_of_measurement": "°C",
                     "device_class": "temperature", "state_class": "measurement", "last_state": 21.5},
                    {"name": "Door", "unique_id": "d1", "unit_of_measurement": "",
                     "device_class": "", "state_class": "", "last_state": null}
                ]
            }]
        });
        fs::write(store.path(), doc.to_string()).unwrap();

        let devices = store.load().unwrap();
        assert_eq!(devices[0].sensors[0].last_state, "21.5");
        assert_eq!(devices[0].sensors[1].last_state, "");
    }

    #[test]
    fn test_get_device() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        store.save(&records(&sample_registry()));

        assert_eq!(store.get_device("dev1").unwrap().sensors.len(), 2);
        assert!(store.get_device("dev2").is_none());
    }

    #[test]
    fn test_wipe() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::init(dir.path()).unwrap();
        store.save(&records(&sample_registry()));

        assert!(store.wipe());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_unwritable_location_fails_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        let store = PersistentStore::new(blocker.join("sensorhub.json"));

        assert!(!store.save(&records(&sample_registry())));
        assert!(store.load().is_none());
        assert!(!store.wipe());
    }
}
