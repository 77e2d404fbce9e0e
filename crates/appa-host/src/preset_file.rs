//! Operator-editable preset in TOML.
//!
//! ```toml
//! enabled_data = 255
//! sensor_calibration_samples = 1000
//! servo_reference = [45, 45, 45, 45]
//! main_deploy_altitude_ft = 800
//! drogue_delay_ms = 0
//!
//! [features]
//! launch_detect = true
//! dual_deploy = true
//! data_storage = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use appa_proto::{ConfigSettings, FeatureFlags};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Features {
    pub launch_detect: bool,
    pub dual_deploy: bool,
    pub active_roll_control: bool,
    pub active_pitch_yaw_control: bool,
    pub wireless_transmission: bool,
    pub data_storage: bool,
}

impl Features {
    fn table(&self) -> [(FeatureFlags, bool); 6] {
        [
            (FeatureFlags::LaunchDetect, self.launch_detect),
            (FeatureFlags::DualDeploy, self.dual_deploy),
            (FeatureFlags::ActiveRollControl, self.active_roll_control),
            (FeatureFlags::ActivePitchYawControl, self.active_pitch_yaw_control),
            (FeatureFlags::WirelessTransmission, self.wireless_transmission),
            (FeatureFlags::DataStorage, self.data_storage),
        ]
    }

    pub fn flags(&self) -> FeatureFlags {
        self.table()
            .into_iter()
            .filter(|(_, on)| *on)
            .fold(FeatureFlags::none(), |acc, (flag, _)| acc | flag)
    }

    pub fn from_flags(flags: FeatureFlags) -> Self {
        Self {
            launch_detect: flags.contains(FeatureFlags::LaunchDetect),
            dual_deploy: flags.contains(FeatureFlags::DualDeploy),
            active_roll_control: flags.contains(FeatureFlags::ActiveRollControl),
            active_pitch_yaw_control: flags.contains(FeatureFlags::ActivePitchYawControl),
            wireless_transmission: flags.contains(FeatureFlags::WirelessTransmission),
            data_storage: flags.contains(FeatureFlags::DataStorage),
        }
    }
}

/// Reserved bytes and unnamed feature bits are not represented and encode
/// as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetFile {
    pub enabled_data: u8,
    pub sensor_calibration_samples: u16,
    pub servo_reference: [u8; 4],
    pub main_deploy_altitude_ft: u16,
    pub drogue_delay_ms: u16,
    #[serde(default)]
    pub features: Features,
}

impl Default for PresetFile {
    fn default() -> Self {
        Self::from(&ConfigSettings::default())
    }
}

impl From<&ConfigSettings> for PresetFile {
    fn from(s: &ConfigSettings) -> Self {
        Self {
            enabled_data: s.enabled_data,
            sensor_calibration_samples: s.sensor_calibration_samples,
            servo_reference: s.servo_reference,
            main_deploy_altitude_ft: s.main_deploy_altitude_ft,
            drogue_delay_ms: s.drogue_delay_ms,
            features: Features::from_flags(s.enabled_features),
        }
    }
}

impl PresetFile {
    pub fn to_settings(&self) -> ConfigSettings {
        ConfigSettings {
            enabled_features: self.features.flags(),
            enabled_data: self.enabled_data,
            sensor_calibration_samples: self.sensor_calibration_samples,
            servo_reference: self.servo_reference,
            main_deploy_altitude_ft: self.main_deploy_altitude_ft,
            drogue_delay_ms: self.drogue_delay_ms,
            reserved: [0; 4],
        }
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse preset toml")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("encode preset toml")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read preset {}", path.display()))?;
        Self::from_toml(&s)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("write preset {}", path.display()))
    }
}
