// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Error types for Sensor Hub

use std::io;
use thiserror::Error;

use crate::codec::FrameError;

/// Result type alias for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

/// Main error type for Sensor Hub
#[derive(Error, Debug)]
pub enum HubError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wire protocol framing error
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Another daemon instance holds the PID file
    #[error("Already running (PID file exists): {0}")]
    AlreadyRunning(String),

    /// Device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_error_display_config() {
        let err = HubError::Config("bad port".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad port");
    }

    #[test]
    fn test_hub_error_display_device_not_found() {
        let err = HubError::DeviceNotFound("dev1".to_string());
        assert_eq!(err.to_string(), "Device not found: dev1");
    }

    #[test]
    fn test_hub_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only fs");
        let err: HubError = io_err.into();
        assert!(err.to_string().contains("read-only fs"));
    }

    #[test]
    fn test_hub_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: HubError = json_err.into();
        assert!(err.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_hub_error_from_frame() {
        let err: HubError = FrameError::UnknownMessageType(7).into();
        assert_eq!(err.to_string(), "Frame error: unknown message type 7");
    }

    #[test]
    fn test_hub_error_other() {
        let err = HubError::Other("misc".to_string());
        assert_eq!(err.to_string(), "misc");
    }
}
