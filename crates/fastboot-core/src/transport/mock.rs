//! Mock USB transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{
    DeviceDescriptor, DeviceProvider, TransportError, UsbTransport, duration_ms,
};
use crate::protocol::Status;
use crate::protocol::constants::{FASTBOOT_PRODUCT_ID, FASTBOOT_VENDOR_ID};

/// A write captured by the mock, with the timeout it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub data: Vec<u8>,
    pub timeout: Duration,
}

/// Mock transport for unit testing protocol logic.
///
/// Clones share state, so a test can keep one handle while a session owns
/// another.
#[derive(Clone)]
pub struct MockTransport {
    /// Queued packets to return on read.
    packet_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// Captured writes.
    write_log: Arc<Mutex<Vec<RecordedWrite>>>,
    /// Timeouts passed to each read.
    read_timeouts: Arc<Mutex<Vec<Duration>>>,
    /// Injected short write: (write index, bytes reported written).
    short_write: Arc<Mutex<Option<(usize, usize)>>>,
    /// Simulated identity.
    serial: Option<String>,
    vid: u16,
    pid: u16,
    /// Whether device is "connected".
    connected: Arc<Mutex<bool>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            packet_queue: Arc::new(Mutex::new(VecDeque::new())),
            write_log: Arc::new(Mutex::new(Vec::new())),
            read_timeouts: Arc::new(Mutex::new(Vec::new())),
            short_write: Arc::new(Mutex::new(None)),
            serial: Some("MOCK0001".to_string()),
            vid: FASTBOOT_VENDOR_ID,
            pid: FASTBOOT_PRODUCT_ID,
            connected: Arc::new(Mutex::new(true)),
        }
    }

    /// Mock with a specific serial number.
    pub fn with_serial(serial: impl Into<String>) -> Self {
        Self {
            serial: Some(serial.into()),
            ..Self::new()
        }
    }

    /// Queue a raw packet to be returned on next read.
    pub fn queue_packet(&self, bytes: &[u8]) {
        self.packet_queue.lock().unwrap().push_back(bytes.to_vec());
    }

    /// Queue a packet made of a status header and body text.
    pub fn queue_response(&self, status: Status, body: &str) {
        let mut packet = status.header().map(|h| h.to_vec()).unwrap_or_default();
        packet.extend_from_slice(body.as_bytes());
        self.queue_packet(&packet);
    }

    /// Make the write at `index` (0-based, across all writes) report
    /// `written` bytes instead of the full length.
    pub fn short_write_at(&self, index: usize, written: usize) {
        *self.short_write.lock().unwrap() = Some((index, written));
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<RecordedWrite> {
        self.write_log.lock().unwrap().clone()
    }

    /// Lengths of all captured writes.
    pub fn write_lengths(&self) -> Vec<usize> {
        self.write_log
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.data.len())
            .collect()
    }

    /// Timeouts passed to each read so far.
    pub fn read_timeouts(&self) -> Vec<Duration> {
        self.read_timeouts.lock().unwrap().clone()
    }

    /// Number of packets still queued.
    pub fn pending_packets(&self) -> usize {
        self.packet_queue.lock().unwrap().len()
    }

    /// Simulate device disconnect.
    pub fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }

    /// Set VID/PID.
    pub fn set_ids(&mut self, vid: u16, pid: u16) {
        self.vid = vid;
        self.pid = pid;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbTransport for MockTransport {
    fn write(&self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let mut log = self.write_log.lock().unwrap();
        let index = log.len();
        log.push(RecordedWrite {
            data: data.to_vec(),
            timeout,
        });
        match *self.short_write.lock().unwrap() {
            Some((at, written)) if at == index => Ok(written.min(data.len())),
            _ => Ok(data.len()),
        }
    }

    fn read(&self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.read_timeouts.lock().unwrap().push(timeout);
        let mut packet = self
            .packet_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(TransportError::Timeout {
                timeout_ms: duration_ms(timeout),
            })?;
        packet.truncate(max_len);
        Ok(packet)
    }

    fn serial_number(&self) -> Option<String> {
        self.serial.clone()
    }

    fn vendor_id(&self) -> u16 {
        self.vid
    }

    fn product_id(&self) -> u16 {
        self.pid
    }
}

/// Mock provider that hands out clones of registered mock transports.
#[derive(Clone, Default)]
pub struct MockProvider {
    devices: Arc<Mutex<Vec<MockTransport>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device; it shows up on the next `discover`.
    pub fn attach(&self, transport: MockTransport) {
        self.devices.lock().unwrap().push(transport);
    }

    /// Remove every attached device.
    pub fn detach_all(&self) {
        self.devices.lock().unwrap().clear();
    }

    fn descriptor(index: usize, transport: &MockTransport) -> DeviceDescriptor {
        DeviceDescriptor {
            serial: transport.serial_number(),
            vendor_id: transport.vendor_id(),
            product_id: transport.product_id(),
            bus_id: "mock".to_string(),
            device_address: index as u8 + 1,
        }
    }
}

impl DeviceProvider for MockProvider {
    type Transport = MockTransport;

    fn discover(&self, vid: u16, pid: u16) -> Result<Vec<DeviceDescriptor>, TransportError> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.vendor_id() == vid && t.product_id() == pid)
            .map(|(i, t)| Self::descriptor(i, t))
            .collect())
    }

    fn open(&self, device: &DeviceDescriptor) -> Result<MockTransport, TransportError> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .find(|(i, t)| Self::descriptor(*i, t) == *device)
            .map(|(_, t)| t.clone())
            .ok_or(TransportError::DeviceNotFound {
                vid: device.vendor_id,
                pid: device.product_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(100);

    #[test]
    fn test_mock_packet_queue() {
        let mock = MockTransport::new();
        mock.queue_response(Status::Info, "hello");
        mock.queue_response(Status::Okay, "");

        assert_eq!(mock.read(64, T).unwrap(), b"INFOhello");
        assert_eq!(mock.read(64, T).unwrap(), b"OKAY");

        // Queue is empty now
        assert!(matches!(
            mock.read(64, T),
            Err(TransportError::Timeout { timeout_ms: 100 })
        ));
    }

    #[test]
    fn test_mock_write_capture() {
        let mock = MockTransport::new();
        mock.write(b"Hello", T).unwrap();
        mock.write(b"World", Duration::from_secs(1)).unwrap();

        let writes = mock.get_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].data, b"Hello");
        assert_eq!(writes[1].timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_mock_short_write() {
        let mock = MockTransport::new();
        mock.short_write_at(1, 2);
        assert_eq!(mock.write(b"abcd", T).unwrap(), 4);
        assert_eq!(mock.write(b"abcd", T).unwrap(), 2);
        assert_eq!(mock.write(b"abcd", T).unwrap(), 4);
    }

    #[test]
    fn test_mock_disconnect() {
        let mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.disconnect();
        assert!(!mock.is_connected());
        assert!(mock.write(b"test", T).is_err());
    }

    #[test]
    fn test_provider_filters_ids() {
        let provider = MockProvider::new();
        provider.attach(MockTransport::with_serial("A"));
        let mut other = MockTransport::with_serial("B");
        other.set_ids(0x1234, 0x5678);
        provider.attach(other);

        let found = provider
            .discover(FASTBOOT_VENDOR_ID, FASTBOOT_PRODUCT_ID)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_serial(), "A");

        let opened = provider.open(&found[0]).unwrap();
        assert_eq!(opened.serial_number().as_deref(), Some("A"));
    }
}
