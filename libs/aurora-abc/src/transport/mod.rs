//! Transport layer
//!
//! The client only needs a byte pipe that can send a request and wait a
//! bounded time for an exact number of reply bytes. Serial lines, raw TCP
//! bridges and the in-process [`MockDevice`] all sit behind [`Transport`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod mock;
pub mod stream;

pub use mock::MockDevice;
pub use stream::StreamTransport;

/// Transport layer error type
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection or port open failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Peer closed the connection
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Nothing (or not enough) arrived before the deadline
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Unusable endpoint description
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Byte-level duplex endpoint
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Short type tag for logging ("serial", "tcp", "mock")
    fn transport_type(&self) -> &str;

    /// Write a complete request frame
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Fill `buffer` completely or fail with [`TransportError::Timeout`]
    async fn receive_exact(
        &mut self,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<(), TransportError>;

    /// Drop any stale bytes left over from an abandoned exchange
    async fn clear_input(&mut self) -> Result<(), TransportError>;
}
