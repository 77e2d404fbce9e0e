use anyhow::Result;

use appa_fc::arming::check_config_validity;
use appa_proto::PresetData;

use crate::Identity;

/// The rule the FC applies when the ignition switch closes.
pub fn check_preset(preset: &PresetData, require_valid_checksum: bool) -> Result<()> {
    check_config_validity(preset, require_valid_checksum)
        .map_err(|v| anyhow::anyhow!("preset would be refused at arming: {}", v))
}

pub fn check_link(serial_dev: &str, baud: u32, timeout_ms: u64) -> Result<()> {
    anyhow::ensure!(!serial_dev.is_empty(), "link.serial_dev missing");
    anyhow::ensure!(baud > 0, "link.baud invalid");
    anyhow::ensure!(timeout_ms > 0, "link.timeout_ms must be > 0");
    Ok(())
}

pub fn check_identity(seen: Identity, board_id: Option<u8>, firmware_code: Option<u8>) -> Result<()> {
    if let Some(want) = board_id {
        anyhow::ensure!(
            seen.board_id == want,
            "board id {:#04x}, expected {:#04x}",
            seen.board_id,
            want
        );
    }
    if let Some(want) = firmware_code {
        anyhow::ensure!(
            seen.firmware_code == want,
            "firmware {:#04x}, expected {:#04x}",
            seen.firmware_code,
            want
        );
    }
    Ok(())
}
