//! USB Transport layer abstraction.
//!
//! Defines the `UsbTransport` trait for bulk I/O on an opened device and
//! the `DeviceProvider` trait for enumerating and opening devices,
//! allowing different implementations (nusb, mock, etc.).

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: VID={vid:04X} PID={pid:04X}")]
    DeviceNotFound { vid: u16, pid: u16 },

    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(String),

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Whole milliseconds in `timeout`, saturating at `u64::MAX`.
pub fn duration_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// An attached device as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Serial number string descriptor, if the device reports one.
    pub serial: Option<String>,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Platform bus identifier.
    pub bus_id: String,
    pub device_address: u8,
}

impl DeviceDescriptor {
    /// Serial number for display, `"unknown"` when absent.
    pub fn display_serial(&self) -> &str {
        self.serial.as_deref().unwrap_or("unknown")
    }
}

/// Bulk I/O on an opened device with a claimed interface.
///
/// Every call takes the timeout to apply; implementations never cache it.
/// Dropping the transport releases the interface and closes the device.
pub trait UsbTransport: Send + Sync {
    /// Write raw bytes to the OUT endpoint, returning how many were accepted.
    fn write(&self, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Read one transfer of at most `max_len` bytes from the IN endpoint.
    fn read(&self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Serial number of the opened device.
    fn serial_number(&self) -> Option<String>;

    /// Get the current VID.
    fn vendor_id(&self) -> u16;

    /// Get the current PID.
    fn product_id(&self) -> u16;
}

/// Device enumeration and opening.
pub trait DeviceProvider {
    type Transport: UsbTransport;

    /// List attached devices matching `vid`/`pid`.
    fn discover(&self, vid: u16, pid: u16) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Open `device` and claim its first interface.
    fn open(&self, device: &DeviceDescriptor) -> Result<Self::Transport, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }
}
