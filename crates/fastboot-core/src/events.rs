//! Event system for UI decoupling.
//!
//! Allows CLI/GUI front ends to follow a session without tight coupling
//! to the protocol engine.

use std::fmt;

use crate::protocol::Status;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// USB packet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Transmit (Host -> Device)
    Rx, // Receive (Device -> Host)
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Events emitted by a Fastboot session.
#[derive(Debug, Clone)]
pub enum FastbootEvent {
    /// Device opened and interface claimed.
    DeviceConnected {
        vid: u16,
        pid: u16,
        serial: Option<String>,
    },
    /// Device released.
    DeviceDisconnected,
    /// Command written to the device.
    CommandSent { command: String },
    /// INFO text received mid-exchange.
    InfoReceived { text: String },
    /// Exchange finished with a terminal status.
    ResponseReceived { status: Status, message: String },
    /// Upload progress in bytes.
    Progress { current: u64, total: u64 },
    /// Log message.
    Log { level: LogLevel, message: String },
    /// USB packet sent/received.
    Packet {
        direction: PacketDirection,
        length: usize,
        data: Option<Vec<u8>>,
    },
}

/// Observer trait for receiving session events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait FastbootObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &FastbootEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl FastbootObserver for NullObserver {
    fn on_event(&self, _event: &FastbootEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl FastbootObserver for TracingObserver {
    fn on_event(&self, event: &FastbootEvent) {
        match event {
            FastbootEvent::DeviceConnected { vid, pid, serial } => {
                tracing::info!(
                    vid = %format!("{:04X}", vid),
                    pid = %format!("{:04X}", pid),
                    serial = serial.as_deref().unwrap_or("unknown"),
                    "Device connected"
                );
            }
            FastbootEvent::DeviceDisconnected => {
                tracing::info!("Device disconnected");
            }
            FastbootEvent::CommandSent { command } => {
                tracing::debug!(command = %command, "Command sent");
            }
            FastbootEvent::InfoReceived { text } => {
                tracing::info!("(bootloader) {}", text);
            }
            FastbootEvent::ResponseReceived { status, message } => match status {
                Status::Okay | Status::Data => {
                    tracing::debug!(status = %status, message = %message, "Response")
                }
                _ => tracing::warn!(status = %status, message = %message, "Response"),
            },
            FastbootEvent::Progress { current, total } => {
                let pct = if *total > 0 {
                    (*current * 100) / *total
                } else {
                    0
                };
                tracing::debug!(progress = %format!("{}%", pct), current, total, "Upload progress");
            }
            FastbootEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            FastbootEvent::Packet {
                direction, length, ..
            } => {
                tracing::trace!(dir = %direction, len = length, "USB Packet");
            }
        }
    }
}

/// Observer that keeps every event, for tests and scripted front ends.
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<FastbootEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FastbootEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl FastbootObserver for RecordingObserver {
    fn on_event(&self, event: &FastbootEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
