//! nusb-based USB transport implementation.

use std::time::Duration;

use nusb::transfer::{Buffer, Bulk, In, Out, TransferError};
use nusb::{Interface, MaybeFuture, list_devices};
use tracing::{debug, info, instrument, warn};

use super::traits::{
    DeviceDescriptor, DeviceProvider, TransportError, UsbTransport, duration_ms,
};
use crate::protocol::constants::{BULK_IN_ENDPOINT, BULK_OUT_ENDPOINT, FASTBOOT_INTERFACE};

/// nusb-based USB transport.
pub struct NusbTransport {
    interface: Interface,
    in_endpoint: u8,
    out_endpoint: u8,
    serial: Option<String>,
    vid: u16,
    pid: u16,
}

impl NusbTransport {
    fn open_device_info(device_info: nusb::DeviceInfo) -> Result<Self, TransportError> {
        let vid = device_info.vendor_id();
        let pid = device_info.product_id();
        let serial = device_info.serial_number().map(str::to_string);

        info!(
            vendor_id = %format!("{:04X}", vid),
            product_id = %format!("{:04X}", pid),
            serial = serial.as_deref().unwrap_or("unknown"),
            "Found device"
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let interface = device
            .claim_interface(FASTBOOT_INTERFACE)
            .wait()
            .map_err(|e| TransportError::ClaimInterfaceFailed {
                interface: FASTBOOT_INTERFACE,
                message: e.to_string(),
            })?;

        // Find BULK endpoints on the first configuration
        let mut in_endpoint: u8 = 0;
        let mut out_endpoint: u8 = 0;

        if let Some(config) = device.configurations().next() {
            for iface in config.interfaces() {
                if iface.interface_number() != FASTBOOT_INTERFACE {
                    continue;
                }
                for alt in iface.alt_settings() {
                    for ep in alt.endpoints() {
                        if ep.transfer_type() == nusb::descriptors::TransferType::Bulk {
                            if ep.direction() == nusb::transfer::Direction::In {
                                in_endpoint = ep.address();
                            } else {
                                out_endpoint = ep.address();
                            }
                        }
                    }
                }
            }
        }

        if in_endpoint == 0 {
            warn!("No bulk IN endpoint in descriptors, using endpoint 1");
            in_endpoint = BULK_IN_ENDPOINT;
        }
        if out_endpoint == 0 {
            warn!("No bulk OUT endpoint in descriptors, using endpoint 1");
            out_endpoint = BULK_OUT_ENDPOINT;
        }

        info!(
            in_ep = %format!("0x{:02X}", in_endpoint),
            out_ep = %format!("0x{:02X}", out_endpoint),
            "Device opened successfully"
        );

        Ok(Self {
            interface,
            in_endpoint,
            out_endpoint,
            serial,
            vid,
            pid,
        })
    }
}

fn map_transfer_error(e: TransferError, context: fn(String) -> TransportError) -> TransportError {
    match e {
        TransferError::Disconnected => TransportError::Disconnected,
        other => context(other.to_string()),
    }
}

impl UsbTransport for NusbTransport {
    #[instrument(skip(self, data), fields(len = data.len()))]
    fn write(&self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        let mut ep = self
            .interface
            .endpoint::<Bulk, Out>(self.out_endpoint)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        ep.submit(Buffer::from(data.to_vec()));
        let Some(completion) = ep.wait_next_complete(timeout) else {
            ep.cancel_all();
            return Err(TransportError::Timeout {
                timeout_ms: duration_ms(timeout),
            });
        };
        completion
            .status
            .map_err(|e| map_transfer_error(e, TransportError::WriteFailed))?;

        debug!(bytes_written = completion.actual_len, "Write complete");
        Ok(completion.actual_len)
    }

    #[instrument(skip(self), fields(max_len))]
    fn read(&self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut ep = self
            .interface
            .endpoint::<Bulk, In>(self.in_endpoint)
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;

        // IN requests must be a whole number of max-size packets
        let packet = ep.max_packet_size().max(1);
        let requested = max_len.div_ceil(packet) * packet;

        ep.submit(ep.allocate(requested));
        let Some(completion) = ep.wait_next_complete(timeout) else {
            ep.cancel_all();
            return Err(TransportError::Timeout {
                timeout_ms: duration_ms(timeout),
            });
        };
        completion
            .status
            .map_err(|e| map_transfer_error(e, TransportError::ReadFailed))?;

        let n = completion.actual_len.min(completion.buffer.len()).min(max_len);
        debug!(bytes_read = n, "Read complete");
        Ok(completion.buffer[..n].to_vec())
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

/// Enumerates and opens devices through nusb.
#[derive(Debug, Clone, Copy, Default)]
pub struct NusbProvider;

impl DeviceProvider for NusbProvider {
    type Transport = NusbTransport;

    #[instrument(level = "debug", fields(vid = format!("{:04X}", vid), pid = format!("{:04X}", pid)))]
    fn discover(&self, vid: u16, pid: u16) -> Result<Vec<DeviceDescriptor>, TransportError> {
        let devices = list_devices()
            .wait()
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?;

        Ok(devices
            .filter(|d| d.vendor_id() == vid && d.product_id() == pid)
            .map(|d| DeviceDescriptor {
                serial: d.serial_number().map(str::to_string),
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
                bus_id: d.bus_id().to_string(),
                device_address: d.device_address(),
            })
            .collect())
    }

    #[instrument(level = "info", skip(self), fields(serial = device.display_serial()))]
    fn open(&self, device: &DeviceDescriptor) -> Result<NusbTransport, TransportError> {
        let device_info = list_devices()
            .wait()
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?
            .find(|d| {
                d.bus_id() == device.bus_id && d.device_address() == device.device_address
            })
            .ok_or(TransportError::DeviceNotFound {
                vid: device.vendor_id,
                pid: device.product_id,
            })?;

        NusbTransport::open_device_info(device_info)
    }
}
