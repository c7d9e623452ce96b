//! Response status classification.
//!
//! Every response packet starts with a 4-byte ASCII header naming its
//! status. Classification is a pure lookup; anything unrecognized is
//! `Unknown` rather than an error.

use std::fmt;

use super::constants::{HEADER_DATA, HEADER_FAIL, HEADER_INFO, HEADER_OKAY, HEADER_SIZE};

/// Status carried by a response packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Command failed; the body holds the reason.
    Fail,
    /// Command completed; the body may hold a value.
    Okay,
    /// Device is ready to receive the announced number of bytes.
    Data,
    /// Informational text; more packets follow.
    Info,
    /// Header did not match any known status, or the packet was too short.
    Unknown,
}

impl Status {
    /// Classify a packet by its leading header bytes.
    pub fn from_header(packet: &[u8]) -> Self {
        if packet.len() < HEADER_SIZE {
            return Status::Unknown;
        }
        match &packet[..HEADER_SIZE] {
            h if h == HEADER_FAIL => Status::Fail,
            h if h == HEADER_OKAY => Status::Okay,
            h if h == HEADER_DATA => Status::Data,
            h if h == HEADER_INFO => Status::Info,
            _ => Status::Unknown,
        }
    }

    /// Wire header for this status, if it has one.
    pub fn header(&self) -> Option<&'static [u8; 4]> {
        match self {
            Status::Fail => Some(HEADER_FAIL),
            Status::Okay => Some(HEADER_OKAY),
            Status::Data => Some(HEADER_DATA),
            Status::Info => Some(HEADER_INFO),
            Status::Unknown => None,
        }
    }

    /// `true` for every status that ends a response loop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Info)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Fail => write!(f, "FAIL"),
            Status::Okay => write!(f, "OKAY"),
            Status::Data => write!(f, "DATA"),
            Status::Info => write!(f, "INFO"),
            Status::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
