//! Fastboot-Core: Fastboot USB protocol client in Rust.
//!
//! This crate implements the host side of the Fastboot bootloader
//! protocol: command/response framing over USB bulk endpoints, the
//! INFO-continuation response loop, and the chunked `download` upload used
//! before `flash` and `boot`.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Constants, status headers, command rendering, responses
//! - **Transport**: USB communication abstraction (nusb, mock)
//! - **Client**: The protocol engine over one opened transport
//! - **Session**: Device discovery, connect/disconnect, configuration
//! - **Events**: Observer pattern for UI decoupling
//!
//! # Example
//!
//! ```no_run
//! use fastboot_core::{FastbootSession, SessionConfig};
//!
//! let mut session = FastbootSession::new(SessionConfig::default());
//! session.wait_default().expect("no device");
//! session.connect().expect("connect failed");
//!
//! let version = session.client().unwrap().getvar("version").unwrap();
//! println!("bootloader version: {version}");
//!
//! let mut image = std::fs::File::open("boot.img").unwrap();
//! session.upload_data(&mut image).expect("upload failed");
//! session.client().unwrap().boot().expect("boot failed");
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod upload;

// Re-exports for convenience
pub use client::{FastbootClient, TimeoutHandle};
pub use config::SessionConfig;
pub use error::FastbootError;
pub use events::{FastbootEvent, FastbootObserver, LogLevel, NullObserver, TracingObserver};
pub use protocol::{Command, Response, Status};
pub use session::FastbootSession;
pub use transport::{
    DeviceDescriptor, DeviceProvider, MockProvider, MockTransport, NusbProvider, NusbTransport,
    TransportError, UsbTransport,
};
