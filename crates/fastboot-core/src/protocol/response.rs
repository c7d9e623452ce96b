//! Response assembly for a single command exchange.

use super::constants::{HEADER_SIZE, PACKET_SIZE};
use super::status::Status;

/// Result of one command exchange.
///
/// `payload` spans every packet of an INFO-chained exchange, while
/// `raw_data` holds only the terminal packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    payload: String,
    raw_data: Vec<u8>,
}

impl Response {
    pub fn status(&self) -> Status {
        self.status
    }

    /// Body text of all packets, newline separated, with `\r` and NUL removed.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Terminal packet as read: the fixed-size buffer, unstripped.
    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    pub fn is_okay(&self) -> bool {
        self.status == Status::Okay
    }

    /// Payload with the trailing separator and surrounding whitespace removed.
    pub fn message(&self) -> &str {
        self.payload.trim()
    }
}

/// Accumulates packets until a terminal status arrives.
#[derive(Debug, Default)]
pub(crate) struct ResponseBuilder {
    text: String,
    packets: usize,
}

impl ResponseBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one packet and return its status.
    pub(crate) fn push(&mut self, packet: &[u8]) -> Status {
        let status = Status::from_header(packet);
        if packet.len() > HEADER_SIZE {
            self.text
                .push_str(&String::from_utf8_lossy(&packet[HEADER_SIZE..]));
        }
        self.text.push('\n');
        self.packets += 1;
        status
    }

    pub(crate) fn packets(&self) -> usize {
        self.packets
    }

    /// Finish with `terminal` as the last packet received.
    pub(crate) fn finish(self, terminal: &[u8]) -> Response {
        let payload = self
            .text
            .chars()
            .filter(|&c| c != '\r' && c != '\0')
            .collect();
        Response {
            status: Status::from_header(terminal),
            payload,
            raw_data: packet_buffer(terminal),
        }
    }
}

/// Copy a read into the fixed-size packet buffer.
pub(crate) fn packet_buffer(bytes: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; PACKET_SIZE.max(bytes.len())];
    buf[..bytes.len()].copy_from_slice(bytes);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_packet() {
        let mut builder = ResponseBuilder::new();
        let status = builder.push(b"OKAY0.4");
        assert_eq!(status, Status::Okay);

        let response = builder.finish(b"OKAY0.4");
        assert_eq!(response.status(), Status::Okay);
        assert_eq!(response.payload(), "0.4\n");
        assert_eq!(response.message(), "0.4");
        assert_eq!(response.raw_data().len(), PACKET_SIZE);
        assert_eq!(&response.raw_data()[..7], b"OKAY0.4");
        assert!(response.raw_data()[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_strips_cr_and_nul() {
        let mut builder = ResponseBuilder::new();
        builder.push(b"INFOline one\r\0\0");
        builder.push(b"FAILno\r");
        let response = builder.finish(b"FAILno\r");
        assert_eq!(response.status(), Status::Fail);
        assert_eq!(response.payload(), "line one\nno\n");
        // raw data keeps the carriage return
        assert_eq!(response.raw_data()[6], b'\r');
    }

    #[test]
    fn test_short_packet_appends_empty_body() {
        let mut builder = ResponseBuilder::new();
        assert_eq!(builder.push(b"OK"), Status::Unknown);
        assert_eq!(builder.packets(), 1);

        let response = builder.finish(b"OK");
        assert_eq!(response.status(), Status::Unknown);
        assert_eq!(response.payload(), "\n");
        assert_eq!(&response.raw_data()[..2], b"OK");
    }
}
