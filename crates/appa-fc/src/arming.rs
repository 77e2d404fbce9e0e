use thiserror::Error;
use tracing::{error, info, warn};

use appa_proto::{FeatureFlags, PresetData};

use crate::board::{FcState, FlightContext};
use crate::fault::Fault;
use crate::indicator::CONTINUITY_TONE_MS;
use crate::supervisor::IdleSupervisor;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigViolation {
    #[error("forbidden features enabled: {}", .0.names().join(", "))]
    ForbiddenFeatures(FeatureFlags),

    #[error("preset checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Flyability of a preset. Servo range limits are not checked yet.
pub fn check_config_validity(
    preset: &PresetData,
    require_valid_checksum: bool,
) -> Result<(), ConfigViolation> {
    let forbidden = preset.config_settings.enabled_features.forbidden_set();
    if !forbidden.is_none() {
        return Err(ConfigViolation::ForbiddenFeatures(forbidden));
    }

    if require_valid_checksum && !preset.crc_valid() {
        return Err(ConfigViolation::ChecksumMismatch {
            stored: preset.crc,
            computed: preset.computed_crc(),
        });
    }
    Ok(())
}

impl IdleSupervisor {
    /// Arming gate. With the ignition switch closed and every precondition
    /// met, control passes to the flight loop before this returns.
    pub(crate) fn arm_if_switched(&mut self) -> Result<(), Fault> {
        if !self.board.ignition.switch_continuity() {
            return Ok(());
        }
        info!("arming: ignition switch closed");

        if let Err(v) = check_config_validity(&self.preset, self.cfg.require_valid_checksum()) {
            error!("arming refused: {}", v);
            return Err(Fault::ConfigValidity);
        }

        let features = self.preset.config_settings.enabled_features;
        if features.contains(FeatureFlags::DualDeploy)
            && (!self.board.ignition.drogue_continuity() || !self.board.ignition.main_continuity())
        {
            warn!("arming refused: dual deploy without drogue/main continuity");
            self.board.indicator.beep(CONTINUITY_TONE_MS);
            return Err(Fault::IgnitionContinuity);
        }

        info!(features = features.bits(), "arming: handing off to flight loop");
        self.state = FcState::Flight;
        self.board.flight.run(FlightContext {
            preset: &mut self.preset,
            state: &mut self.state,
            flash: self.board.flash.as_mut(),
            flash_status: &mut self.flash_status,
            flash_address: &mut self.flash_address,
        });
        Ok(())
    }
}
