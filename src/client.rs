// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Minimal field-device client
//!
//! Sends one request per connection, like the firmware does, and reports
//! whether the hub acknowledged it.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::codec::{Request, ACK};
use crate::error::{HubError, Result};

/// Send `request` to the hub at `addr`.
///
/// Returns `Ok(true)` when the ACK byte came back and `Ok(false)` when the hub
/// closed the connection without replying. `timeout` bounds the whole exchange.
pub async fn send_request(addr: SocketAddr, request: &Request, timeout: Duration) -> Result<bool> {
    let frame = request.encode();
    tokio::time::timeout(timeout, exchange(addr, &frame))
        .await
        .map_err(|_| HubError::Other(format!("No answer from {} within {:?}", addr, timeout)))?
}

async fn exchange(addr: SocketAddr, frame: &[u8]) -> Result<bool> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(frame).await?;
    stream.flush().await?;

    let mut reply = [0u8; 1];
    match stream.read(&mut reply).await? {
        0 => Ok(false),
        _ => Ok(reply[0] == ACK),
    }
}
