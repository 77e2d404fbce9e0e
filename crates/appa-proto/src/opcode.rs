/// Top-level terminal opcodes, one byte each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Connect = 0x02,
    Sensor = 0x03,
    Flash = 0x22,
    Fin = 0x24,
    Preset = 0x25,
}

impl Opcode {
    /// `None` for bytes the idle terminal does not recognise.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x02 => Some(Self::Connect),
            0x03 => Some(Self::Sensor),
            0x22 => Some(Self::Flash),
            0x24 => Some(Self::Fin),
            0x25 => Some(Self::Preset),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PresetSubcommand {
    Upload = 0x01,
    Download = 0x02,
    Verify = 0x03,
}

impl PresetSubcommand {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Upload),
            0x02 => Some(Self::Download),
            0x03 => Some(Self::Verify),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Subcommands understood by the external flash driver behind `FLASH_OP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlashSubcommand {
    Read = 0x00,
    Enable = 0x01,
    Disable = 0x02,
    Write = 0x03,
    Erase = 0x04,
    Status = 0x05,
    Extract = 0x06,
}

impl FlashSubcommand {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::Read),
            0x01 => Some(Self::Enable),
            0x02 => Some(Self::Disable),
            0x03 => Some(Self::Write),
            0x04 => Some(Self::Erase),
            0x05 => Some(Self::Status),
            0x06 => Some(Self::Extract),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "read" => Some(Self::Read),
            "enable" => Some(Self::Enable),
            "disable" => Some(Self::Disable),
            "write" => Some(Self::Write),
            "erase" => Some(Self::Erase),
            "status" => Some(Self::Status),
            "extract" => Some(Self::Extract),
            _ => None,
        }
    }
}
