use bitmask_enum::bitmask;

/// `enabled_features` bits of the preset. Bits without a name here are
/// carried through upload/download untouched.
#[bitmask(u8)]
pub enum FeatureFlags {
    LaunchDetect = 0x01,
    DualDeploy = 0x02,
    ActiveRollControl = 0x04,
    ActivePitchYawControl = 0x08,
    WirelessTransmission = 0x10,
    DataStorage = 0x20,
}

/// Flag names as they appear in preset files and operator output.
pub const FEATURE_NAMES: [(FeatureFlags, &str); 6] = [
    (FeatureFlags::LaunchDetect, "launch_detect"),
    (FeatureFlags::DualDeploy, "dual_deploy"),
    (FeatureFlags::ActiveRollControl, "active_roll_control"),
    (FeatureFlags::ActivePitchYawControl, "active_pitch_yaw_control"),
    (FeatureFlags::WirelessTransmission, "wireless_transmission"),
    (FeatureFlags::DataStorage, "data_storage"),
];

impl FeatureFlags {
    /// Features postponed or deprecated in this firmware revision. A preset
    /// enabling any of them must never arm.
    pub fn forbidden() -> Self {
        FeatureFlags::ActivePitchYawControl
            | FeatureFlags::WirelessTransmission
            | FeatureFlags::ActiveRollControl
    }

    /// Forbidden features present in `self`.
    pub fn forbidden_set(self) -> Self {
        self & Self::forbidden()
    }

    pub fn names(self) -> Vec<&'static str> {
        FEATURE_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}
