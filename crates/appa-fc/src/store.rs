//! Preset store: the in-RAM preset, its flash copy, and the `PRESET_OP`
//! subcommands that move it between host, RAM and flash.

use std::time::Duration;
use tracing::{debug, info, warn};

use appa_proto::{FlashStatus, PresetData, PresetSubcommand, PRESET_RECORD_LEN};

use crate::board::FlashMemory;
use crate::fault::Fault;
use crate::transport::Transport;

/// Persist the whole record. RAM and flash agree once this returns `Ok`.
pub fn write_preset(flash: &mut dyn FlashMemory, preset: &PresetData, address: &mut u32) -> FlashStatus {
    let status = flash.write_preset(&preset.to_bytes(), address);
    if status.is_ok() {
        debug!(crc = preset.crc, next = *address, "preset written");
    } else {
        warn!("preset write failed: {}", status);
    }
    status
}

/// Boot-time load. Falls back to the default preset when flash holds none.
pub fn load_preset(flash: &mut dyn FlashMemory, address: &mut u32) -> (PresetData, FlashStatus) {
    match flash.read_preset(address) {
        Ok(bytes) => {
            let preset = PresetData::from_bytes(&bytes);
            if !preset.crc_valid() {
                warn!(stored = preset.crc, "loaded preset fails its checksum");
            }
            (preset, FlashStatus::Ok)
        }
        Err(status) => {
            warn!("no preset loaded ({}), using defaults", status);
            (PresetData::default(), status)
        }
    }
}

/// Host -> FC. The payload always lands in RAM; a CRC mismatch is recorded
/// by storing a zero CRC so the record stays untrusted.
pub fn upload(
    link: &mut dyn Transport,
    flash: &mut dyn FlashMemory,
    preset: &mut PresetData,
    address: &mut u32,
    timeout: Duration,
) -> Result<FlashStatus, Fault> {
    let mut buf = [0u8; PRESET_RECORD_LEN];
    link.receive(&mut buf, timeout).map_err(|e| {
        warn!("preset upload body not received: {}", e);
        Fault::FlashCmd
    })?;

    let incoming = PresetData::from_bytes(&buf);
    let computed = incoming.computed_crc();

    preset.config_settings = incoming.config_settings;
    preset.crc = if incoming.crc == computed { computed } else { 0 };
    if preset.crc_valid() {
        info!(crc = computed, "preset uploaded");
    } else {
        warn!(received = incoming.crc, computed, "preset uploaded untrusted");
    }

    Ok(write_preset(flash, preset, address))
}

/// FC -> host, the RAM record verbatim.
pub fn download(link: &mut dyn Transport, preset: &PresetData, timeout: Duration) -> FlashStatus {
    match link.transmit(&preset.to_bytes(), timeout) {
        Ok(()) => FlashStatus::Ok,
        Err(e) => {
            warn!("preset download not sent: {}", e);
            FlashStatus::Fail
        }
    }
}

/// Answers 1 when the stored CRC matches the payload, 0 otherwise.
pub fn verify(link: &mut dyn Transport, preset: &PresetData, timeout: Duration) -> Result<FlashStatus, Fault> {
    let valid = preset.crc_valid();
    debug!(valid, "preset verify");
    link.transmit(&[valid as u8], timeout).map_err(|_| Fault::UsbUart)?;
    Ok(FlashStatus::Ok)
}

pub fn execute(
    subcommand: u8,
    link: &mut dyn Transport,
    flash: &mut dyn FlashMemory,
    preset: &mut PresetData,
    address: &mut u32,
    timeout: Duration,
) -> Result<FlashStatus, Fault> {
    match PresetSubcommand::from_byte(subcommand) {
        Some(PresetSubcommand::Upload) => upload(link, flash, preset, address, timeout),
        Some(PresetSubcommand::Download) => Ok(download(link, preset, timeout)),
        Some(PresetSubcommand::Verify) => verify(link, preset, timeout),
        None => {
            warn!("unknown preset subcommand {:#04x}", subcommand);
            Err(Fault::UsbUart)
        }
    }
}
