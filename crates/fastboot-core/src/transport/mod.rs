//! Transport layer module.

pub mod mock;
pub mod nusb;
pub mod traits;

pub use mock::{MockProvider, MockTransport, RecordedWrite};
pub use nusb::{NusbProvider, NusbTransport};
pub use traits::{DeviceDescriptor, DeviceProvider, TransportError, UsbTransport, duration_ms};
