use tracing::{info, warn};

use appa_proto::{FlashStatus, PresetData};

use crate::board::{Board, FcState};
use crate::fault::{fail_fast, Fault};
use crate::indicator::{
    LedColor, NO_PRESET_BEEPS, NO_PRESET_BEEP_MS, READY_BEEPS, READY_BEEP_MS,
};
use crate::store;
use crate::transport::LinkStatus;
use crate::IdleConfig;

/// Owns the preset and the flight computer state for as long as the vehicle
/// sits on the pad.
pub struct IdleSupervisor {
    pub(crate) cfg: IdleConfig,
    pub(crate) board: Board,
    pub(crate) preset: PresetData,
    pub(crate) state: FcState,
    pub(crate) flash_status: FlashStatus,
    pub(crate) flash_address: u32,
}

impl IdleSupervisor {
    pub fn new(
        cfg: IdleConfig,
        board: Board,
        preset: PresetData,
        flash_status: FlashStatus,
        flash_address: u32,
    ) -> Self {
        Self {
            cfg,
            board,
            preset,
            state: FcState::Init,
            flash_status,
            flash_address,
        }
    }

    /// Load the latest preset from flash and take ownership of the board.
    pub fn boot(cfg: IdleConfig, mut board: Board) -> Self {
        let mut flash_address = 0;
        let (preset, flash_status) = store::load_preset(board.flash.as_mut(), &mut flash_address);
        Self::new(cfg, board, preset, flash_status, flash_address)
    }

    pub fn preset(&self) -> &PresetData {
        &self.preset
    }

    pub fn state(&self) -> FcState {
        self.state
    }

    pub fn flash_status(&self) -> FlashStatus {
        self.flash_status
    }

    pub fn flash_address(&self) -> u32 {
        self.flash_address
    }

    /// Entry actions: missing-preset advisory, then IDLE with the ready chime.
    pub fn enter_idle(&mut self) {
        let indicator = self.board.indicator.as_mut();
        if self.flash_status == FlashStatus::PresetNotFound {
            warn!("idle: no preset in flash, running on defaults");
            indicator.set_color(LedColor::Yellow);
            indicator.multi_beep(NO_PRESET_BEEP_MS, NO_PRESET_BEEP_MS, NO_PRESET_BEEPS);
        }

        self.state = FcState::Idle;
        indicator.set_color(LedColor::Green);
        indicator.multi_beep(READY_BEEP_MS, READY_BEEP_MS, READY_BEEPS);
        info!(
            firmware = self.cfg.firmware_code,
            board = self.cfg.board_id(),
            "idle: ready"
        );
    }

    /// Idle loop. Returns `Ok` only after the flight loop has taken over and
    /// given control back with the state at FLIGHT.
    pub fn run(&mut self) -> Result<(), Fault> {
        self.enter_idle();

        while self.state == FcState::Idle {
            if self.cycle()? == LinkStatus::Fail {
                return Err(Fault::UsbUart);
            }
        }

        if self.state != FcState::Flight {
            warn!("idle: loop left with state {:?}", self.state);
            return Err(Fault::InvalidState);
        }
        Ok(())
    }

    /// Firmware entry point. Faults never come back from here.
    pub fn pre_launch_loop(&mut self) {
        if let Err(fault) = self.run() {
            fail_fast(self.board.indicator.as_mut(), fault);
        }
    }
}
