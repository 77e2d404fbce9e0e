//! Terminal protocol and preset record shared by the flight computer and the
//! host tool. Both sides must agree on every constant in this crate.

pub mod checksum;
pub mod features;
pub mod opcode;
pub mod preset;
pub mod status;

pub use checksum::crc32;
pub use features::FeatureFlags;
pub use opcode::{FlashSubcommand, Opcode, PresetSubcommand};
pub use preset::{ConfigSettings, DecodeError, PresetData, CONFIG_SETTINGS_LEN, PRESET_RECORD_LEN};
pub use status::FlashStatus;
