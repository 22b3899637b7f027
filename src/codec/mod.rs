// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Field-device wire protocol
//!
//! Every request is a single frame sent on a fresh TCP connection:
//!
//! ```text
//! ┌──────────────┬───────────────────────────────────────────────┐
//! │ Type (1 byte)│ Fields: [len: u32 LE][len bytes UTF-8] ...     │
//! └──────────────┴───────────────────────────────────────────────┘
//! ```
//!
//! | Type | Message      | Fields (in order)                                                          |
//! |------|--------------|----------------------------------------------------------------------------|
//! | `0`  | Registration | device_id, sensor_id, display_name, unit_of_measurement, state_class, device_class |
//! | `1`  | Update       | device_id, sensor_id, value                                                |
//!
//! On success the server answers with the single byte [`ACK`]. There is no
//! error reply: a truncated, oversized or otherwise undecodable frame gets no
//! answer and the connection is closed.
//!
//! # Examples
//!
//! ```
//! use hublib::codec::{Request, Update};
//!
//! let frame = Request::Update(Update {
//!     device_id: "dev1".into(),
//!     sensor_id: "t1".into(),
//!     value: "21.5".into(),
//! })
//! .encode();
//! assert_eq!(frame[0], 1);
//! assert_eq!(&frame[1..5], &4u32.to_le_bytes());
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Byte written back to the client after a request was applied
pub const ACK: u8 = 0x01;

/// Default upper bound for a single string field (64 KiB)
pub const DEFAULT_MAX_FIELD_LEN: usize = 64 * 1024;

/// Size of a field length prefix
const LEN_PREFIX_SIZE: usize = 4;

/// Frame decoding failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Peer closed the connection mid-frame
    #[error("connection closed before the frame was complete")]
    Truncated,

    /// Leading type byte is neither registration nor update
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// Length prefix above the configured limit
    #[error("field length {len} exceeds limit of {max} bytes")]
    FieldTooLong { len: usize, max: usize },

    /// Field bytes are not UTF-8
    #[error("field is not valid UTF-8")]
    InvalidUtf8,

    /// Peer stalled longer than the idle-read timeout
    #[error("timed out waiting for frame data")]
    Timeout,

    /// Socket error other than end-of-stream
    #[error("I/O error while reading frame: {0}")]
    Io(io::ErrorKind),
}

impl FrameError {
    fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => FrameError::Truncated,
            kind => FrameError::Io(kind),
        }
    }
}

/// Message type byte
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Registration = 0,
    Update = 1,
}

impl TryFrom<u8> for MessageType {
    type Error = FrameError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(MessageType::Registration),
            1 => Ok(MessageType::Update),
            other => Err(FrameError::UnknownMessageType(other)),
        }
    }
}

/// Sensor registration (type 0)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub device_id: String,
    pub sensor_id: String,
    pub display_name: String,
    pub unit_of_measurement: String,
    pub state_class: String,
    pub device_class: String,
}

/// Sensor value update (type 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub device_id: String,
    pub sensor_id: String,
    pub value: String,
}

/// A fully decoded request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Registration(Registration),
    Update(Update),
}

impl Request {
    /// Type byte this request is sent with
    pub fn message_type(&self) -> MessageType {
        match self {
            Request::Registration(_) => MessageType::Registration,
            Request::Update(_) => MessageType::Update,
        }
    }

    /// Device the request targets
    pub fn device_id(&self) -> &str {
        match self {
            Request::Registration(r) => &r.device_id,
            Request::Update(u) => &u.device_id,
        }
    }

    /// Encode into a complete wire frame
    pub fn encode(&self) -> Vec<u8> {
        let fields: Vec<&str> = match self {
            Request::Registration(r) => vec![
                r.device_id.as_str(),
                r.sensor_id.as_str(),
                r.display_name.as_str(),
                r.unit_of_measurement.as_str(),
                r.state_class.as_str(),
                r.device_class.as_str(),
            ],
            Request::Update(u) => vec![u.device_id.as_str(), u.sensor_id.as_str(), u.value.as_str()],
        };

        let body_len: usize = fields.iter().map(|f| LEN_PREFIX_SIZE + f.len()).sum();
        let mut frame = Vec::with_capacity(1 + body_len);
        frame.push(self.message_type() as u8);
        for field in fields {
            put_field(&mut frame, field);
        }
        frame
    }
}

/// Append one length-prefixed string field
pub fn put_field(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

/// Read the leading message type byte
pub async fn read_message_type<R>(reader: &mut R) -> Result<MessageType, FrameError>
where
    R: AsyncRead + Unpin,
{
    let byte = reader.read_u8().await.map_err(FrameError::from_io)?;
    MessageType::try_from(byte)
}

/// Read one length-prefixed UTF-8 field
pub async fn read_field<R>(reader: &mut R, max_len: usize) -> Result<String, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32_le().await.map_err(FrameError::from_io)? as usize;
    if len > max_len {
        return Err(FrameError::FieldTooLong { len, max: max_len });
    }

    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(FrameError::from_io)?;

    String::from_utf8(buf).map_err(|_| FrameError::InvalidUtf8)
}

/// Read the message body for an already-decoded type byte
pub async fn read_body<R>(
    reader: &mut R,
    message_type: MessageType,
    max_field_len: usize,
) -> Result<Request, FrameError>
where
    R: AsyncRead + Unpin,
{
    match message_type {
        MessageType::Registration => {
            let device_id = read_field(reader, max_field_len).await?;
            let sensor_id = read_field(reader, max_field_len).await?;
            let display_name = read_field(reader, max_field_len).await?;
            let unit_of_measurement = read_field(reader, max_field_len).await?;
            let state_class = read_field(reader, max_field_len).await?;
            let device_class = read_field(reader, max_field_len).await?;
            Ok(Request::Registration(Registration {
                device_id,
                sensor_id,
                display_name,
                unit_of_measurement,
                state_class,
                device_class,
            }))
        }
        MessageType::Update => {
            let device_id = read_field(reader, max_field_len).await?;
            let sensor_id = read_field(reader, max_field_len).await?;
            let value = read_field(reader, max_field_len).await?;
            Ok(Request::Update(Update {
                device_id,
                sensor_id,
                value,
            }))
        }
    }
}

/// Read a complete request frame
pub async fn read_request<R>(reader: &mut R, max_field_len: usize) -> Result<Request, FrameError>
where
    R: AsyncRead + Unpin,
{
    let message_type = read_message_type(reader).await?;
    read_body(reader, message_type, max_field_len).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            device_id: "dev1".into(),
            sensor_id: "t1".into(),
            display_name: "Temp".into(),
            unit_of_measurement: "°C".into(),
            state_class: "measurement".into(),
            device_class: "temperature".into(),
        }
    }

    #[test]
    fn test_message_type_from_byte() {
        assert_eq!(MessageType::try_from(0).unwrap(), MessageType::Registration);
        assert_eq!(MessageType::try_from(1).unwrap(), MessageType::Update);
        assert_eq!(
            MessageType::try_from(2).unwrap_err(),
            FrameError::UnknownMessageType(2)
        );
    }

    #[test]
    fn test_encode_uses_byte_length_prefix() {
        let frame = Request::Registration(registration()).encode();
        assert_eq!(frame[0], 0);
        // "dev1"
        assert_eq!(&frame[1..5], &4u32.to_le_bytes());
        assert_eq!(&frame[5..9], b"dev1");
        // "°C" is three bytes of UTF-8
        let unit_prefix = 1 + (4 + 4) + (4 + 2) + (4 + 4);
        assert_eq!(&frame[unit_prefix..unit_prefix + 4], &3u32.to_le_bytes());
    }

    #[tokio::test]
    async fn test_read_registration_frame() {
        let frame = Request::Registration(registration()).encode();
        let mut reader: &[u8] = &frame;
        let request = read_request(&mut reader, DEFAULT_MAX_FIELD_LEN).await.unwrap();
        assert_eq!(request, Request::Registration(registration()));
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn test_read_update_frame_hand_built() {
        let mut frame = vec![1u8];
        put_field(&mut frame, "dev1");
        put_field(&mut frame, "t1");
        put_field(&mut frame, "21.5");

        let mut reader: &[u8] = &frame;
        let request = read_request(&mut reader, DEFAULT_MAX_FIELD_LEN).await.unwrap();
        match request {
            Request::Update(u) => {
                assert_eq!(u.device_id, "dev1");
                assert_eq!(u.sensor_id, "t1");
                assert_eq!(u.value, "21.5");
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_field_is_valid() {
        let mut frame = vec![1u8];
        put_field(&mut frame, "dev1");
        put_field(&mut frame, "t1");
        put_field(&mut frame, "");

        let mut reader: &[u8] = &frame;
        let request = read_request(&mut reader, DEFAULT_MAX_FIELD_LEN).await.unwrap();
        assert!(matches!(request, Request::Update(ref u) if u.value.is_empty()));
    }

    #[tokio::test]
    async fn test_truncated_length_prefix() {
        let mut frame = vec![1u8];
        put_field(&mut frame, "dev1");
        frame.extend_from_slice(&[2, 0]);

        let mut reader: &[u8] = &frame;
        let err = read_request(&mut reader, DEFAULT_MAX_FIELD_LEN).await.unwrap_err();
        assert_eq!(err, FrameError::Truncated);
    }

    #[tokio::test]
    async fn test_truncated_field_body() {
        let mut frame = vec![1u8];
        frame.extend_from_slice(&10u32.to_le_bytes());
        frame.extend_from_slice(b"dev");

        let mut reader: &[u8] = &frame;
        let err = read_request(&mut reader, DEFAULT_MAX_FIELD_LEN).await.unwrap_err();
        assert_eq!(err, FrameError::Truncated);
    }

    #[tokio::test]
    async fn test_missing_type_byte() {
        let mut reader: &[u8] = &[];
        let err = read_message_type(&mut reader).await.unwrap_err();
        assert_eq!(err, FrameError::Truncated);
    }

    #[tokio::test]
    async fn test_unknown_type_byte() {
        let mut reader: &[u8] = &[9, 0, 0, 0, 0];
        let err = read_request(&mut reader, DEFAULT_MAX_FIELD_LEN).await.unwrap_err();
        assert_eq!(err, FrameError::UnknownMessageType(9));
    }

    #[tokio::test]
    async fn test_field_over_limit() {
        let mut frame = vec![0u8];
        put_field(&mut frame, "a-rather-long-device-id");

        let mut reader: &[u8] = &frame;
        let err = read_request(&mut reader, 8).await.unwrap_err();
        assert_eq!(err, FrameError::FieldTooLong { len: 23, max: 8 });
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let mut frame = vec![1u8];
        frame.extend_from_slice(&2u32.to_le_bytes());
        frame.extend_from_slice(&[0xff, 0xfe]);

        let mut reader: &[u8] = &frame;
        let err = read_request(&mut reader, DEFAULT_MAX_FIELD_LEN).await.unwrap_err();
        assert_eq!(err, FrameError::InvalidUtf8);
    }

    #[test]
    fn test_request_device_id() {
        let req = Request::Registration(registration());
        assert_eq!(req.device_id(), "dev1");
        assert_eq!(req.message_type(), MessageType::Registration);
    }
}
