use std::fmt;

/// Flash driver status, echoed to the host as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FlashStatus {
    #[default]
    Ok = 0x00,
    Fail = 0x01,
    UnsupportedOp = 0x02,
    UnrecognizedOp = 0x03,
    Timeout = 0x04,
    WriteProtected = 0x05,
    AddrOutOfRange = 0x06,
    CannotWriteEnable = 0x07,
    PresetNotFound = 0x08,
}

impl FlashStatus {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::Ok),
            0x01 => Some(Self::Fail),
            0x02 => Some(Self::UnsupportedOp),
            0x03 => Some(Self::UnrecognizedOp),
            0x04 => Some(Self::Timeout),
            0x05 => Some(Self::WriteProtected),
            0x06 => Some(Self::AddrOutOfRange),
            0x07 => Some(Self::CannotWriteEnable),
            0x08 => Some(Self::PresetNotFound),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for FlashStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "FLASH_OK",
            Self::Fail => "FLASH_FAIL",
            Self::UnsupportedOp => "FLASH_UNSUPPORTED_OP",
            Self::UnrecognizedOp => "FLASH_UNRECOGNIZED_OP",
            Self::Timeout => "FLASH_TIMEOUT",
            Self::WriteProtected => "FLASH_WRITE_PROTECTED",
            Self::AddrOutOfRange => "FLASH_ADDR_OUT_OF_RANGE",
            Self::CannotWriteEnable => "FLASH_CANNOT_WRITE_ENABLE",
            Self::PresetNotFound => "FLASH_PRESET_NOT_FOUND",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_byte_roundtrip() {
        for b in 0x00..=0x08u8 {
            let s = FlashStatus::from_byte(b).unwrap();
            assert_eq!(s.as_u8(), b);
        }
        assert_eq!(FlashStatus::from_byte(0x09), None);
    }

    #[test]
    fn display_uses_firmware_names() {
        assert_eq!(FlashStatus::PresetNotFound.to_string(), "FLASH_PRESET_NOT_FOUND");
    }
}
