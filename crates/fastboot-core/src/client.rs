//! Fastboot protocol engine.
//!
//! `FastbootClient` drives one opened device: it writes commands, reads
//! response packets until a terminal status, and runs the chunked data
//! upload that precedes `flash` and `boot`. All calls block; taking
//! `&mut self` keeps at most one exchange in flight per device.

use std::io::{Read, Seek};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::error::FastbootError;
use crate::events::{FastbootEvent, FastbootObserver, PacketDirection, TracingObserver};
use crate::protocol::constants::{BLOCK_SIZE, DEFAULT_TIMEOUT_MS, PACKET_SIZE};
use crate::protocol::response::ResponseBuilder;
use crate::protocol::{Command, Response, Status};
use crate::transport::{UsbTransport, duration_ms};
use crate::upload::{BlockPlan, remaining_len};

type Result<T> = std::result::Result<T, FastbootError>;

/// Shared, live-adjustable transport timeout.
///
/// Clones refer to the same value. The engine reads it at every transport
/// call, so a change applies from the next read or write onward.
#[derive(Debug, Clone)]
pub struct TimeoutHandle(Arc<AtomicU64>);

impl TimeoutHandle {
    pub fn new(timeout: Duration) -> Self {
        Self(Arc::new(AtomicU64::new(duration_ms(timeout))))
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, timeout: Duration) {
        self.0.store(duration_ms(timeout), Ordering::Relaxed);
    }
}

impl Default for TimeoutHandle {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

/// Protocol engine bound to one opened transport.
pub struct FastbootClient<T: UsbTransport, O: FastbootObserver = TracingObserver> {
    transport: T,
    timeout: TimeoutHandle,
    observer: Arc<O>,
}

impl<T: UsbTransport> FastbootClient<T, TracingObserver> {
    /// Create a client with the default timeout and tracing observer.
    pub fn new(transport: T) -> Self {
        Self::with_observer(transport, TimeoutHandle::default(), Arc::new(TracingObserver))
    }
}

impl<T: UsbTransport, O: FastbootObserver> FastbootClient<T, O> {
    pub fn with_observer(transport: T, timeout: TimeoutHandle, observer: Arc<O>) -> Self {
        Self {
            transport,
            timeout,
            observer,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give the transport back, closing nothing.
    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout.set(timeout);
    }

    /// Handle sharing this client's timeout.
    pub fn timeout_handle(&self) -> TimeoutHandle {
        self.timeout.clone()
    }

    fn emit(&self, event: FastbootEvent) {
        self.observer.on_event(&event);
    }

    /// Write `data` in one transfer, failing unless every byte was taken.
    fn write_all(&self, data: &[u8]) -> Result<()> {
        let written = self.transport.write(data, self.timeout.get())?;
        self.emit(FastbootEvent::Packet {
            direction: PacketDirection::Tx,
            length: written,
            data: Some(data.iter().take(32).copied().collect()),
        });
        if written != data.len() {
            return Err(FastbootError::ShortWrite {
                requested: data.len(),
                written,
            });
        }
        Ok(())
    }

    fn read_packet(&self) -> Result<Vec<u8>> {
        let packet = self.transport.read(PACKET_SIZE, self.timeout.get())?;
        self.emit(FastbootEvent::Packet {
            direction: PacketDirection::Rx,
            length: packet.len(),
            data: Some(packet.clone()),
        });
        Ok(packet)
    }

    /// Send raw command bytes and collect the full response.
    ///
    /// INFO packets are accumulated until any other status arrives. An
    /// `Unknown` header also ends the exchange and is returned as-is.
    #[instrument(skip_all, fields(cmd = %String::from_utf8_lossy(command.as_ref())))]
    pub fn execute(&mut self, command: impl AsRef<[u8]>) -> Result<Response> {
        let command = command.as_ref();
        self.write_all(command)?;
        self.emit(FastbootEvent::CommandSent {
            command: String::from_utf8_lossy(command).into_owned(),
        });

        let mut builder = ResponseBuilder::new();
        let terminal = loop {
            let packet = self.read_packet()?;
            let status = builder.push(&packet);
            debug!(status = %status, len = packet.len(), "Packet received");
            if status.is_terminal() {
                break packet;
            }
            let text = String::from_utf8_lossy(&packet[4..]);
            self.emit(FastbootEvent::InfoReceived {
                text: text.trim_end_matches(['\0', '\r', '\n']).to_string(),
            });
        };

        let packets = builder.packets();
        let response = builder.finish(&terminal);
        debug!(status = %response.status(), packets, "Exchange complete");
        self.emit(FastbootEvent::ResponseReceived {
            status: response.status(),
            message: response.message().to_string(),
        });
        Ok(response)
    }

    /// Send a typed command.
    pub fn send(&mut self, command: &Command) -> Result<Response> {
        self.execute(command.to_bytes())
    }

    /// Upload everything from the source's current position to its end.
    ///
    /// Announces the size with `download:`, streams whole blocks through a
    /// reused buffer, sends any remainder from a buffer of exactly that
    /// size, then requires a single `OKAY` packet.
    #[instrument(skip(self, source))]
    pub fn upload_data<R: Read + Seek>(&mut self, source: &mut R) -> Result<()> {
        let len = remaining_len(source)?;
        let size = u32::try_from(len).map_err(|_| FastbootError::ImageTooLarge { len })?;

        let response = self.send(&Command::Download(size))?;
        if response.status() != Status::Data {
            warn!(status = %response.status(), size, "Download request refused");
            return Err(FastbootError::DownloadRejected {
                status: response.status(),
                size,
            });
        }

        let plan = BlockPlan::new(size as usize, BLOCK_SIZE);
        info!(size, blocks = plan.transfers(), "Uploading data");

        let total = u64::from(size);
        let mut sent: u64 = 0;

        if plan.full_blocks > 0 {
            let mut block = vec![0u8; BLOCK_SIZE];
            for index in 0..plan.full_blocks {
                source.read_exact(&mut block)?;
                self.write_all(&block)?;
                sent += block.len() as u64;
                debug!(block = index, sent, "Block sent");
                self.emit(FastbootEvent::Progress {
                    current: sent,
                    total,
                });
            }
        }

        if plan.remainder > 0 {
            let mut tail = vec![0u8; plan.remainder];
            source.read_exact(&mut tail)?;
            self.write_all(&tail)?;
            sent += tail.len() as u64;
            debug!(remainder = tail.len(), sent, "Final block sent");
            self.emit(FastbootEvent::Progress {
                current: sent,
                total,
            });
        }

        let packet = self.read_packet()?;
        let status = Status::from_header(&packet);
        if status != Status::Okay {
            let message: String = String::from_utf8_lossy(&packet)
                .chars()
                .filter(|&c| c != '\r' && c != '\0')
                .collect();
            warn!(status = %status, message = %message, "Upload not acknowledged");
            return Err(FastbootError::UnexpectedResponse {
                expected: Status::Okay,
                actual: status,
                message,
            });
        }

        info!(size, "Upload complete");
        Ok(())
    }

    /// Upload an in-memory image.
    pub fn upload_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.upload_data(&mut std::io::Cursor::new(data))
    }

    /// Send `command` and require `OKAY`.
    fn expect_okay(&mut self, command: &Command) -> Result<Response> {
        let response = self.send(command)?;
        if !response.is_okay() {
            return Err(FastbootError::UnexpectedResponse {
                expected: Status::Okay,
                actual: response.status(),
                message: response.message().to_string(),
            });
        }
        Ok(response)
    }

    /// Read a bootloader variable.
    pub fn getvar(&mut self, name: &str) -> Result<String> {
        let response = self.expect_okay(&Command::GetVar(name.to_string()))?;
        Ok(response.message().to_string())
    }

    /// Write the staged data to `partition`.
    pub fn flash(&mut self, partition: &str) -> Result<Response> {
        self.expect_okay(&Command::Flash(partition.to_string()))
    }

    pub fn erase(&mut self, partition: &str) -> Result<Response> {
        self.expect_okay(&Command::Erase(partition.to_string()))
    }

    pub fn set_active(&mut self, slot: &str) -> Result<Response> {
        self.expect_okay(&Command::SetActive(slot.to_string()))
    }

    /// Boot the staged image.
    pub fn boot(&mut self) -> Result<Response> {
        self.expect_okay(&Command::Boot)
    }

    pub fn continue_boot(&mut self) -> Result<Response> {
        self.expect_okay(&Command::Continue)
    }

    pub fn reboot(&mut self) -> Result<Response> {
        self.expect_okay(&Command::Reboot)
    }

    pub fn reboot_bootloader(&mut self) -> Result<Response> {
        self.expect_okay(&Command::RebootBootloader)
    }

    pub fn powerdown(&mut self) -> Result<Response> {
        self.expect_okay(&Command::Powerdown)
    }

    pub fn oem(&mut self, args: &str) -> Result<Response> {
        self.expect_okay(&Command::Oem(args.to_string()))
    }
}
