//! Protocol module - Fastboot wire format definitions.

pub mod command;
pub mod constants;
pub mod response;
pub mod status;

pub use command::Command;
pub use constants::*;
pub use response::Response;
pub use status::Status;
