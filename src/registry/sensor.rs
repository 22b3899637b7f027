// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Sensor model: one named measurement stream on a device

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Globally unique sensor key: `device_id + "_" + sensor_id`
pub fn compound_id(device_id: &str, sensor_id: &str) -> String {
    format!("{}_{}", device_id, sensor_id)
}

/// Descriptive metadata, last-write-wins on re-registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub display_name: String,
    pub unit_of_measurement: String,
    pub device_class: String,
    pub state_class: String,
}

/// State class vocabulary understood by observability hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

impl StateClass {
    /// Parse the wire spelling; unknown values are `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "measurement" => Some(StateClass::Measurement),
            "total" => Some(StateClass::Total),
            "total_increasing" => Some(StateClass::TotalIncreasing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateClass::Measurement => "measurement",
            StateClass::Total => "total",
            StateClass::TotalIncreasing => "total_increasing",
        }
    }
}

/// A sensor owned by exactly one device
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    device_id: String,
    sensor_id: String,
    unique_id: String,
    info: SensorInfo,
    last_value: String,
    last_updated: Option<DateTime<Utc>>,
}

impl Sensor {
    /// Create a sensor with no reported value yet
    pub fn new(device_id: impl Into<String>, sensor_id: impl Into<String>, info: SensorInfo) -> Self {
        let device_id = device_id.into();
        let sensor_id = sensor_id.into();
        let unique_id = compound_id(&device_id, &sensor_id);
        Self {
            device_id,
            sensor_id,
            unique_id,
            info,
            last_value: String::new(),
            last_updated: None,
        }
    }

    /// Attach a previously persisted value
    pub fn with_value(mut self, value: impl Into<String>, updated: Option<DateTime<Utc>>) -> Self {
        self.last_value = value.into();
        self.last_updated = updated;
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Compound identifier, unique across the registry
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn info(&self) -> &SensorInfo {
        &self.info
    }

    /// Most recent raw value, empty until the first update
    pub fn last_value(&self) -> &str {
        &self.last_value
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Overwrite all metadata fields
    pub fn set_info(&mut self, info: SensorInfo) {
        self.info = info;
    }

    /// Store a new raw value unconditionally
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.last_value = value.into();
        self.last_updated = Some(Utc::now());
    }

    /// Value as a number when it parses as one
    pub fn numeric_value(&self) -> Option<f64> {
        self.last_value.trim().parse::<f64>().ok()
    }

    /// Unit with surrounding whitespace removed
    pub fn unit(&self) -> &str {
        self.info.unit_of_measurement.trim()
    }

    pub fn state_class(&self) -> Option<StateClass> {
        StateClass::parse(&self.info.state_class)
    }

    /// Name shown by the host: device friendly name followed by the sensor's
    pub fn entity_name(&self, friendly_name: &str) -> String {
        format!("{} {}", friendly_name, self.info.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_info() -> SensorInfo {
        SensorInfo {
            display_name: "Temp".into(),
            unit_of_measurement: " °C ".into(),
            device_class: "temperature".into(),
            state_class: "measurement".into(),
        }
    }

    #[test]
    fn test_compound_id() {
        assert_eq!(compound_id("dev1", "t1"), "dev1_t1");
        let sensor = Sensor::new("dev1", "t1", temp_info());
        assert_eq!(sensor.unique_id(), "dev1_t1");
        assert_eq!(sensor.sensor_id(), "t1");
        assert_eq!(sensor.device_id(), "dev1");
    }

    #[test]
    fn test_new_sensor_has_no_value() {
        let sensor = Sensor::new("dev1", "t1", temp_info());
        assert_eq!(sensor.last_value(), "");
        assert!(sensor.last_updated().is_none());
        assert!(sensor.numeric_value().is_none());
    }

    #[test]
    fn test_set_value_is_permissive() {
        let mut sensor = Sensor::new("dev1", "t1", temp_info());
        sensor.set_value("21.5");
        assert_eq!(sensor.numeric_value(), Some(21.5));
        assert!(sensor.last_updated().is_some());

        sensor.set_value("open");
        assert_eq!(sensor.last_value(), "open");
        assert!(sensor.numeric_value().is_none());
    }

    #[test]
    fn test_presentation_helpers() {
        let sensor = Sensor::new("dev1", "t1", temp_info());
        assert_eq!(sensor.unit(), "°C");
        assert_eq!(sensor.state_class(), Some(StateClass::Measurement));
        assert_eq!(sensor.entity_name("Kitchen"), "Kitchen Temp");
    }

    #[test]
    fn test_state_class_parse() {
        assert_eq!(StateClass::parse("total"), Some(StateClass::Total));
        assert_eq!(
            StateClass::parse("total_increasing"),
            Some(StateClass::TotalIncreasing)
        );
        assert_eq!(StateClass::parse("bogus"), None);
        assert_eq!(StateClass::Measurement.as_str(), "measurement");
    }

    #[test]
    fn test_set_info_overwrites_everything() {
        let mut sensor = Sensor::new("dev1", "t1", temp_info());
        sensor.set_info(SensorInfo {
            display_name: "Outdoor".into(),
            unit_of_measurement: "°F".into(),
            device_class: "temperature".into(),
            state_class: "".into(),
        });
        assert_eq!(sensor.info().display_name, "Outdoor");
        assert_eq!(sensor.unit(), "°F");
        assert!(sensor.state_class().is_none());
    }
}
