//! Session configuration.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::protocol::constants::{
    DEFAULT_TIMEOUT_MS, DEFAULT_WAIT_TIMEOUT_MS, FASTBOOT_PRODUCT_ID, FASTBOOT_VENDOR_ID,
};

/// Configuration for a Fastboot session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Timeout for every bulk read and write, in milliseconds.
    pub timeout_ms: u64,
    /// Budget for `wait`, in milliseconds.
    pub wait_timeout_ms: u64,
    /// USB vendor ID to match.
    pub vendor_id: u16,
    /// USB product ID to match.
    pub product_id: u16,
    /// Only use the device with this serial number.
    pub serial: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            vendor_id: FASTBOOT_VENDOR_ID,
            product_id: FASTBOOT_PRODUCT_ID,
            serial: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.vendor_id, 0x18D1);
        assert_eq!(config.product_id, 0xD00D);
        assert_eq!(config.wait_timeout(), Duration::from_secs(25));
        assert!(config.serial.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SessionConfig = toml::from_str("timeout_ms = 1500\nserial = \"ABC123\"").unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert_eq!(config.serial.as_deref(), Some("ABC123"));
        assert_eq!(config.wait_timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "fastboot-config-test-{}.toml",
            std::process::id()
        ));
        let config = SessionConfig {
            timeout_ms: 100,
            serial: Some("XYZ".into()),
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = SessionConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
