//! Protocol constants for the Fastboot USB protocol.

// ============================================================================
// Device Identification
// ============================================================================

/// Google Inc. Vendor ID
pub const FASTBOOT_VENDOR_ID: u16 = 0x18D1;

/// Bootloader-mode Product ID
pub const FASTBOOT_PRODUCT_ID: u16 = 0xD00D;

/// Interface claimed on the first configuration
pub const FASTBOOT_INTERFACE: u8 = 0;

/// Bulk IN endpoint address (endpoint 1, device -> host)
pub const BULK_IN_ENDPOINT: u8 = 0x81;

/// Bulk OUT endpoint address (endpoint 1, host -> device)
pub const BULK_OUT_ENDPOINT: u8 = 0x01;

// ============================================================================
// Size Constants
// ============================================================================

/// Fixed size of every response read.
pub const PACKET_SIZE: usize = 64;

/// Length of the ASCII status header at the start of each response packet.
pub const HEADER_SIZE: usize = 4;

/// Upload block size (512 KiB).
pub const BLOCK_SIZE: usize = 512 * 1024;

// ============================================================================
// Response Headers (Device -> Host)
// ============================================================================

pub const HEADER_FAIL: &[u8; 4] = b"FAIL";
pub const HEADER_OKAY: &[u8; 4] = b"OKAY";
pub const HEADER_DATA: &[u8; 4] = b"DATA";
pub const HEADER_INFO: &[u8; 4] = b"INFO";

// ============================================================================
// Timing
// ============================================================================

/// Default per-operation transport timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default budget for `wait` before giving up on discovery.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 25_000;

/// Poll interval while waiting for a device to enumerate.
pub const DISCOVERY_POLL_INTERVAL_MS: u64 = 500;
