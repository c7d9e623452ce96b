//! Fastboot Session - device lifecycle around the protocol engine.

use std::io::{Read, Seek};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::client::{FastbootClient, TimeoutHandle};
use crate::config::SessionConfig;
use crate::error::FastbootError;
use crate::events::{FastbootEvent, FastbootObserver, LogLevel, TracingObserver};
use crate::protocol::constants::DISCOVERY_POLL_INTERVAL_MS;
use crate::protocol::{Command, Response};
use crate::transport::{
    DeviceDescriptor, DeviceProvider, NusbProvider, UsbTransport, duration_ms,
};

type Result<T> = std::result::Result<T, FastbootError>;

/// A session owns at most one open device and serializes every exchange
/// against it.
pub struct FastbootSession<P: DeviceProvider, O: FastbootObserver = TracingObserver> {
    provider: P,
    config: SessionConfig,
    timeout: TimeoutHandle,
    observer: Arc<O>,
    client: Option<FastbootClient<P::Transport, O>>,
}

impl FastbootSession<NusbProvider, TracingObserver> {
    /// Create a session over real USB devices with the tracing observer.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_provider(NusbProvider, config, Arc::new(TracingObserver))
    }
}

impl<P: DeviceProvider, O: FastbootObserver> FastbootSession<P, O> {
    pub fn with_provider(provider: P, config: SessionConfig, observer: Arc<O>) -> Self {
        let timeout = TimeoutHandle::new(config.timeout());
        Self {
            provider,
            config,
            timeout,
            observer,
            client: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    /// Change the transport timeout; applies from the next read or write.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout.set(timeout);
        self.config.timeout_ms = duration_ms(timeout);
    }

    /// Devices matching the configured IDs and serial filter.
    pub fn devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let found = self
            .provider
            .discover(self.config.vendor_id, self.config.product_id)?;
        Ok(match &self.config.serial {
            Some(serial) => found
                .into_iter()
                .filter(|d| d.serial.as_deref() == Some(serial.as_str()))
                .collect(),
            None => found,
        })
    }

    /// Serial numbers of all matching devices.
    pub fn discover(&self) -> Result<Vec<String>> {
        Ok(self
            .devices()?
            .iter()
            .map(|d| d.display_serial().to_string())
            .collect())
    }

    /// Poll until a matching device appears or `budget` runs out.
    #[instrument(skip(self))]
    pub fn wait(&self, budget: Duration) -> Result<DeviceDescriptor> {
        let start = Instant::now();
        let poll = Duration::from_millis(DISCOVERY_POLL_INTERVAL_MS);
        let mut polls = 0u64;

        loop {
            polls += 1;
            if let Some(device) = self.devices()?.into_iter().next() {
                info!(
                    serial = device.display_serial(),
                    "Device found after {} polls", polls
                );
                return Ok(device);
            }

            let elapsed = start.elapsed();
            if elapsed >= budget {
                return Err(FastbootError::DiscoveryTimeout {
                    waited_ms: duration_ms(budget),
                });
            }
            debug!(polls, "No device yet");
            thread::sleep(poll.min(budget - elapsed));
        }
    }

    /// `wait` with the configured budget.
    pub fn wait_default(&self) -> Result<DeviceDescriptor> {
        self.wait(self.config.wait_timeout())
    }

    /// Open the first matching device and claim its interface.
    ///
    /// An existing connection is released first.
    #[instrument(skip(self))]
    pub fn connect(&mut self) -> Result<()> {
        let device = self
            .devices()?
            .into_iter()
            .next()
            .ok_or(FastbootError::NoDeviceAvailable)?;

        if self.is_connected() {
            let previous = self.serial_number();
            self.observer.on_event(&FastbootEvent::Log {
                level: LogLevel::Info,
                message: format!(
                    "Releasing {} before connecting",
                    previous.as_deref().unwrap_or("unknown")
                ),
            });
        }
        self.disconnect();
        let transport = self.provider.open(&device)?;

        self.observer.on_event(&FastbootEvent::DeviceConnected {
            vid: transport.vendor_id(),
            pid: transport.product_id(),
            serial: transport.serial_number(),
        });

        self.client = Some(FastbootClient::with_observer(
            transport,
            self.timeout.clone(),
            self.observer.clone(),
        ));
        Ok(())
    }

    /// Release the device, if any.
    pub fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            drop(client.into_transport());
            self.observer.on_event(&FastbootEvent::DeviceDisconnected);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Serial number of the connected device.
    pub fn serial_number(&self) -> Option<String> {
        self.client
            .as_ref()
            .and_then(|c| c.transport().serial_number())
    }

    /// The engine for the connected device.
    pub fn client(&mut self) -> Result<&mut FastbootClient<P::Transport, O>> {
        self.client.as_mut().ok_or(FastbootError::NotConnected)
    }

    pub fn execute(&mut self, command: impl AsRef<[u8]>) -> Result<Response> {
        self.client()?.execute(command)
    }

    pub fn send(&mut self, command: &Command) -> Result<Response> {
        self.client()?.send(command)
    }

    pub fn upload_data<R: Read + Seek>(&mut self, source: &mut R) -> Result<()> {
        self.client()?.upload_data(source)
    }
}

impl<P: DeviceProvider, O: FastbootObserver> Drop for FastbootSession<P, O> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NullObserver, RecordingObserver};
    use crate::protocol::Status;
    use crate::transport::{MockProvider, MockTransport};

    fn session(provider: &MockProvider, config: SessionConfig) -> FastbootSession<MockProvider, NullObserver> {
        FastbootSession::with_provider(provider.clone(), config, Arc::new(NullObserver))
    }

    #[test]
    fn test_connect_without_device() {
        let provider = MockProvider::new();
        let mut s = session(&provider, SessionConfig::default());
        assert!(matches!(s.connect(), Err(FastbootError::NoDeviceAvailable)));
        assert!(!s.is_connected());
    }

    #[test]
    fn test_execute_before_connect() {
        let provider = MockProvider::new();
        let mut s = session(&provider, SessionConfig::default());
        assert!(matches!(s.execute("getvar:version"), Err(FastbootError::NotConnected)));
    }

    #[test]
    fn test_wait_times_out() {
        let provider = MockProvider::new();
        let s = session(&provider, SessionConfig::default());
        let err = s.wait(Duration::ZERO).unwrap_err();
        assert!(matches!(err, FastbootError::DiscoveryTimeout { waited_ms: 0 }));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_wait_finds_device() {
        let provider = MockProvider::new();
        provider.attach(MockTransport::with_serial("DEV1"));
        let s = session(&provider, SessionConfig::default());
        let device = s.wait(Duration::from_millis(10)).unwrap();
        assert_eq!(device.serial.as_deref(), Some("DEV1"));
    }

    #[test]
    fn test_discover_and_serial_filter() {
        let provider = MockProvider::new();
        provider.attach(MockTransport::with_serial("AAA"));
        provider.attach(MockTransport::with_serial("BBB"));

        let s = session(&provider, SessionConfig::default());
        assert_eq!(s.discover().unwrap(), vec!["AAA", "BBB"]);

        let config = SessionConfig {
            serial: Some("BBB".into()),
            ..Default::default()
        };
        let mut s = session(&provider, config);
        assert_eq!(s.discover().unwrap(), vec!["BBB"]);
        s.connect().unwrap();
        assert_eq!(s.serial_number().as_deref(), Some("BBB"));
    }

    #[test]
    fn test_serial_filter_without_match() {
        let provider = MockProvider::new();
        provider.attach(MockTransport::with_serial("AAA"));
        let config = SessionConfig {
            serial: Some("ZZZ".into()),
            ..Default::default()
        };
        let mut s = session(&provider, config);
        assert!(matches!(s.connect(), Err(FastbootError::NoDeviceAvailable)));
    }

    #[test]
    fn test_connected_exchange_uses_session_timeout() {
        let provider = MockProvider::new();
        let mock = MockTransport::with_serial("DEV1");
        mock.queue_response(Status::Okay, "yes");
        mock.queue_response(Status::Okay, "");
        provider.attach(mock.clone());

        let config = SessionConfig {
            timeout_ms: 750,
            ..Default::default()
        };
        let mut s = session(&provider, config);
        s.connect().unwrap();

        let response = s.execute("getvar:unlocked").unwrap();
        assert_eq!(response.message(), "yes");

        s.set_timeout(Duration::from_millis(50));
        s.execute("reboot").unwrap();

        assert_eq!(
            mock.read_timeouts(),
            vec![Duration::from_millis(750), Duration::from_millis(50)]
        );
    }

    #[test]
    fn test_device_removed() {
        let provider = MockProvider::new();
        provider.attach(MockTransport::with_serial("DEV1"));
        let mut s = session(&provider, SessionConfig::default());
        s.connect().unwrap();

        provider.detach_all();
        assert!(s.discover().unwrap().is_empty());
        assert!(matches!(
            s.wait(Duration::ZERO),
            Err(FastbootError::DiscoveryTimeout { .. })
        ));
        assert!(matches!(s.connect(), Err(FastbootError::NoDeviceAvailable)));
        // the open device is kept when nothing replaces it
        assert_eq!(s.serial_number().as_deref(), Some("DEV1"));
    }

    #[test]
    fn test_reconnect_releases_previous() {
        let provider = MockProvider::new();
        provider.attach(MockTransport::with_serial("DEV1"));
        let observer = Arc::new(RecordingObserver::new());
        let mut s =
            FastbootSession::with_provider(provider.clone(), SessionConfig::default(), observer.clone());

        s.connect().unwrap();
        s.connect().unwrap();
        assert!(s.is_connected());

        let events = observer.events();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            &events[1],
            FastbootEvent::Log { level: LogLevel::Info, message } if message.contains("DEV1")
        ));
        assert!(matches!(events[2], FastbootEvent::DeviceDisconnected));
        assert!(matches!(events[3], FastbootEvent::DeviceConnected { .. }));
    }

    #[test]
    fn test_disconnect_events() {
        let provider = MockProvider::new();
        provider.attach(MockTransport::with_serial("DEV1"));
        let observer = Arc::new(RecordingObserver::new());
        let mut s =
            FastbootSession::with_provider(provider.clone(), SessionConfig::default(), observer.clone());

        s.connect().unwrap();
        assert!(s.is_connected());
        s.disconnect();
        assert!(!s.is_connected());
        assert!(s.serial_number().is_none());
        // second disconnect is a no-op
        s.disconnect();

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            FastbootEvent::DeviceConnected { serial: Some(s), .. } if s == "DEV1"
        ));
        assert!(matches!(events[1], FastbootEvent::DeviceDisconnected));
    }
}
