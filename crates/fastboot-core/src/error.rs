//! Errors raised by the protocol engine and session.

use thiserror::Error;

use crate::protocol::Status;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum FastbootError {
    #[error("No device appeared within {waited_ms}ms")]
    DiscoveryTimeout { waited_ms: u64 },

    #[error("No matching device available")]
    NoDeviceAvailable,

    #[error("Not connected to a device")]
    NotConnected,

    #[error("Short write: {written} of {requested} bytes")]
    ShortWrite { requested: usize, written: usize },

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Device refused download of {size} bytes (status {status})")]
    DownloadRejected { status: Status, size: u32 },

    #[error("Expected {expected}, got {actual}: {message}")]
    UnexpectedResponse {
        expected: Status,
        actual: Status,
        message: String,
    },

    #[error("Image of {len} bytes exceeds the 32-bit download size")]
    ImageTooLarge { len: u64 },

    #[error("Transport error: {0}")]
    Transport(TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransportError> for FastbootError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout { timeout_ms } => FastbootError::Timeout { timeout_ms },
            other => FastbootError::Transport(other),
        }
    }
}

impl FastbootError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FastbootError::Timeout { .. } | FastbootError::DiscoveryTimeout { .. }
        )
    }
}
