//! One pass of the idle terminal: poll the host for an opcode, run it, then
//! give the arming gate its look at the ignition switch.

use tracing::{debug, info, warn};

use appa_proto::Opcode;

use crate::fault::Fault;
use crate::indicator::LedColor;
use crate::store;
use crate::supervisor::IdleSupervisor;
use crate::transport::{LinkStatus, TransportError};

impl IdleSupervisor {
    /// Dispatcher cycle. The returned status is `Fail` only when the host
    /// was present and the link itself broke while reading the opcode.
    pub fn cycle(&mut self) -> Result<LinkStatus, Fault> {
        let timeout = self.cfg.link_timeout();
        let mut status = LinkStatus::Ok;

        self.board.indicator.set_color(LedColor::Green);

        if self.board.link.detect() {
            match self.board.link.receive_byte(timeout) {
                Ok(byte) => self.execute_opcode(byte)?,
                // host connected but quiet
                Err(TransportError::Timeout) => {}
                Err(TransportError::Link) => {
                    warn!("terminal: link failure while polling for an opcode");
                    status = LinkStatus::Fail;
                }
            }
        }

        self.arm_if_switched()?;
        Ok(status)
    }

    fn execute_opcode(&mut self, byte: u8) -> Result<(), Fault> {
        let timeout = self.cfg.link_timeout();
        let link = self.board.link.as_mut();

        match Opcode::from_byte(byte) {
            Some(Opcode::Connect) => {
                debug!("terminal: connect");
                // Board id first (ping), then the firmware id.
                for id in [self.cfg.board_id(), self.cfg.firmware_code] {
                    if let Err(e) = link.transmit(&[id], timeout) {
                        warn!("terminal: connect reply not sent: {}", e);
                    }
                }
            }

            Some(Opcode::Sensor) => {
                let sub = link.receive_byte(timeout).map_err(|_| Fault::SensorCmd)?;
                debug!(sub, "terminal: sensor command");
                self.board.sensors.execute(sub, link);
            }

            Some(Opcode::Fin) => {
                let was_trusted = self.preset.crc_valid();
                self.board
                    .fins
                    .calibrate(link, &mut self.preset.config_settings)
                    .map_err(|e| {
                        warn!("terminal: fin calibration failed: {}", e);
                        Fault::ServoCmd
                    })?;
                // A trusted preset stays trusted across calibration.
                if was_trusted {
                    self.preset.reseal();
                }
                info!(servo = ?self.preset.config_settings.servo_reference, "terminal: fins calibrated");

                let status = store::write_preset(
                    self.board.flash.as_mut(),
                    &self.preset,
                    &mut self.flash_address,
                );
                if !status.is_ok() {
                    return Err(Fault::FlashCmd);
                }
            }

            Some(Opcode::Flash) => {
                let sub = link.receive_byte(timeout).map_err(|_| Fault::FlashCmd)?;
                debug!(sub, "terminal: flash command");
                self.flash_status = self.board.flash.execute(sub, link);
                link.transmit(&[self.flash_status.as_u8()], timeout)
                    .map_err(|_| Fault::FlashCmd)?;
            }

            Some(Opcode::Preset) => {
                let sub = link.receive_byte(timeout).map_err(|_| Fault::FlashCmd)?;
                debug!(sub, "terminal: preset command");
                self.flash_status = store::execute(
                    sub,
                    link,
                    self.board.flash.as_mut(),
                    &mut self.preset,
                    &mut self.flash_address,
                    timeout,
                )?;
                link.transmit(&[self.flash_status.as_u8()], timeout)
                    .map_err(|_| Fault::FlashCmd)?;
            }

            // TODO: surface unknown opcodes as a non-fatal warning once a
            // warning indication exists.
            None => debug!("terminal: ignoring unknown opcode {:#04x}", byte),
        }
        Ok(())
    }
}
