//! Command rendering.
//!
//! Commands are plain ASCII strings on the wire. No escaping, quoting or
//! length prefix is applied; the rendered text is the payload.

use std::fmt;

const DOWNLOAD_PREFIX: &str = "download:";

/// A bootloader command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `getvar:<name>`
    GetVar(String),
    /// `download:<size as 8 uppercase hex digits>`
    Download(u32),
    /// `flash:<partition>`
    Flash(String),
    /// `erase:<partition>`
    Erase(String),
    /// `set_active:<slot>`
    SetActive(String),
    /// `boot`
    Boot,
    /// `continue`
    Continue,
    /// `reboot`
    Reboot,
    /// `reboot-bootloader`
    RebootBootloader,
    /// `powerdown`
    Powerdown,
    /// `oem <args>`
    Oem(String),
    /// Any other command text, sent verbatim.
    Raw(String),
}

impl Command {
    /// Wire bytes for this command.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parse the size back out of a rendered `download:` command.
    ///
    /// Only the canonical form (exactly 8 hex digits) is accepted.
    pub fn parse_download(text: &str) -> Option<u32> {
        let digits = text.strip_prefix(DOWNLOAD_PREFIX)?;
        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(digits, 16).ok()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::GetVar(name) => write!(f, "getvar:{name}"),
            Command::Download(size) => write!(f, "{DOWNLOAD_PREFIX}{size:08X}"),
            Command::Flash(partition) => write!(f, "flash:{partition}"),
            Command::Erase(partition) => write!(f, "erase:{partition}"),
            Command::SetActive(slot) => write!(f, "set_active:{slot}"),
            Command::Boot => write!(f, "boot"),
            Command::Continue => write!(f, "continue"),
            Command::Reboot => write!(f, "reboot"),
            Command::RebootBootloader => write!(f, "reboot-bootloader"),
            Command::Powerdown => write!(f, "powerdown"),
            Command::Oem(args) => write!(f, "oem {args}"),
            Command::Raw(text) => write!(f, "{text}"),
        }
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Command::Raw(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_format() {
        assert_eq!(Command::Download(1024).to_string(), "download:00000400");
        assert_eq!(Command::Download(255).to_string(), "download:000000FF");
        assert_eq!(Command::Download(1_048_576).to_string(), "download:00100000");
        assert_eq!(Command::Download(0).to_string(), "download:00000000");
        assert_eq!(Command::Download(u32::MAX).to_string(), "download:FFFFFFFF");
    }

    #[test]
    fn test_download_parse_back() {
        for size in [0u32, 1, 255, 0xABCDEF, 524_288 * 2 + 100, u32::MAX] {
            let text = Command::Download(size).to_string();
            let digits = text.strip_prefix("download:").unwrap();
            assert_eq!(digits.len(), 8);
            assert_eq!(digits, digits.to_ascii_uppercase());
            assert_eq!(Command::parse_download(&text), Some(size));
        }
    }

    #[test]
    fn test_download_parse_rejects_noncanonical() {
        assert_eq!(Command::parse_download("download:FF"), None);
        assert_eq!(Command::parse_download("download:0000000G"), None);
        assert_eq!(Command::parse_download("flash:00000400"), None);
    }

    #[test]
    fn test_literal_commands() {
        assert_eq!(Command::GetVar("version".into()).to_bytes(), b"getvar:version");
        assert_eq!(Command::Flash("boot".into()).to_string(), "flash:boot");
        assert_eq!(Command::Erase("cache".into()).to_string(), "erase:cache");
        assert_eq!(Command::SetActive("b".into()).to_string(), "set_active:b");
        assert_eq!(Command::RebootBootloader.to_string(), "reboot-bootloader");
        assert_eq!(Command::Oem("unlock".into()).to_string(), "oem unlock");
    }

    #[test]
    fn test_raw_is_verbatim() {
        let cmd = Command::from("getvar:all \"quoted\"");
        assert_eq!(cmd.to_bytes(), b"getvar:all \"quoted\"");
    }
}
