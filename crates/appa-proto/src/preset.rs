use thiserror::Error;

use crate::checksum::crc32;
use crate::features::FeatureFlags;

// Layout of ConfigSettings (little-endian, no padding):
// 0:      enabled_features            (u8)
// 1:      enabled_data                (u8)
// 2..4:   sensor_calibration_samples  (u16)
// 4..8:   servo_reference             (u8 x4)
// 8..10:  main_deploy_altitude_ft     (u16)
// 10..12: drogue_delay_ms             (u16)
// 12..16: reserved                    (carried verbatim)
pub const CONFIG_SETTINGS_LEN: usize = 16;

// PresetData = crc32 (u32 LE) over the settings bytes, then the settings.
pub const PRESET_CRC_LEN: usize = 4;
pub const PRESET_RECORD_LEN: usize = PRESET_CRC_LEN + CONFIG_SETTINGS_LEN;

const OFF_FEATURES: usize = 0;
const OFF_DATA: usize = 1;
const OFF_CAL_SAMPLES: usize = 2;
const OFF_SERVO: usize = 4;
const OFF_MAIN_ALT: usize = 8;
const OFF_DROGUE_DELAY: usize = 10;
const OFF_RESERVED: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSettings {
    pub enabled_features: FeatureFlags,
    pub enabled_data: u8,
    pub sensor_calibration_samples: u16,
    /// Fin servo reference positions, owned by the calibration routine.
    pub servo_reference: [u8; 4],
    pub main_deploy_altitude_ft: u16,
    pub drogue_delay_ms: u16,
    pub reserved: [u8; 4],
}

impl Default for ConfigSettings {
    fn default() -> Self {
        Self {
            enabled_features: FeatureFlags::LaunchDetect | FeatureFlags::DataStorage,
            enabled_data: 0xFF,
            sensor_calibration_samples: 1000,
            servo_reference: [45; 4],
            main_deploy_altitude_ft: 800,
            drogue_delay_ms: 0,
            reserved: [0; 4],
        }
    }
}

impl ConfigSettings {
    pub fn to_bytes(&self) -> [u8; CONFIG_SETTINGS_LEN] {
        let mut out = [0u8; CONFIG_SETTINGS_LEN];
        out[OFF_FEATURES] = self.enabled_features.bits();
        out[OFF_DATA] = self.enabled_data;
        out[OFF_CAL_SAMPLES..OFF_CAL_SAMPLES + 2]
            .copy_from_slice(&self.sensor_calibration_samples.to_le_bytes());
        out[OFF_SERVO..OFF_SERVO + 4].copy_from_slice(&self.servo_reference);
        out[OFF_MAIN_ALT..OFF_MAIN_ALT + 2]
            .copy_from_slice(&self.main_deploy_altitude_ft.to_le_bytes());
        out[OFF_DROGUE_DELAY..OFF_DROGUE_DELAY + 2]
            .copy_from_slice(&self.drogue_delay_ms.to_le_bytes());
        out[OFF_RESERVED..].copy_from_slice(&self.reserved);
        out
    }

    /// Every byte pattern is a valid settings block.
    pub fn from_bytes(bytes: &[u8; CONFIG_SETTINGS_LEN]) -> Self {
        let u16_at = |off: usize| u16::from_le_bytes([bytes[off], bytes[off + 1]]);
        let mut servo_reference = [0u8; 4];
        servo_reference.copy_from_slice(&bytes[OFF_SERVO..OFF_SERVO + 4]);
        let mut reserved = [0u8; 4];
        reserved.copy_from_slice(&bytes[OFF_RESERVED..]);
        Self {
            enabled_features: FeatureFlags::from(bytes[OFF_FEATURES]),
            enabled_data: bytes[OFF_DATA],
            sensor_calibration_samples: u16_at(OFF_CAL_SAMPLES),
            servo_reference,
            main_deploy_altitude_ft: u16_at(OFF_MAIN_ALT),
            drogue_delay_ms: u16_at(OFF_DROGUE_DELAY),
            reserved,
        }
    }

    pub fn crc(&self) -> u32 {
        crc32(&self.to_bytes())
    }
}

/// The persisted preset. Identical byte layout in RAM, in flash and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetData {
    /// CRC-32 of `config_settings`; zero marks an untrusted record.
    pub crc: u32,
    pub config_settings: ConfigSettings,
}

impl Default for PresetData {
    fn default() -> Self {
        Self::sealed(ConfigSettings::default())
    }
}

impl PresetData {
    /// Record whose stored CRC matches its payload.
    pub fn sealed(config_settings: ConfigSettings) -> Self {
        Self { crc: config_settings.crc(), config_settings }
    }

    pub fn computed_crc(&self) -> u32 {
        self.config_settings.crc()
    }

    /// Zero is the untrusted marker, so a payload whose CRC-32 happens to
    /// be zero can never be trusted.
    pub fn crc_valid(&self) -> bool {
        self.crc != 0 && self.crc == self.computed_crc()
    }

    pub fn reseal(&mut self) {
        self.crc = self.computed_crc();
    }

    pub fn to_bytes(&self) -> [u8; PRESET_RECORD_LEN] {
        let mut out = [0u8; PRESET_RECORD_LEN];
        out[..PRESET_CRC_LEN].copy_from_slice(&self.crc.to_le_bytes());
        out[PRESET_CRC_LEN..].copy_from_slice(&self.config_settings.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; PRESET_RECORD_LEN]) -> Self {
        let crc = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let mut settings = [0u8; CONFIG_SETTINGS_LEN];
        settings.copy_from_slice(&bytes[PRESET_CRC_LEN..]);
        Self { crc, config_settings: ConfigSettings::from_bytes(&settings) }
    }
}

impl TryFrom<&[u8]> for PresetData {
    type Error = DecodeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: &[u8; PRESET_RECORD_LEN] = bytes.try_into().map_err(|_| DecodeError::Length {
            expected: PRESET_RECORD_LEN,
            got: bytes.len(),
        })?;
        Ok(Self::from_bytes(arr))
    }
}
