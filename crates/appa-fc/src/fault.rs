use thiserror::Error;
use tracing::error;

use crate::indicator::{Indicator, LedColor, LOCKOUT_CADENCE_MS};

/// Fatal error kinds raised while idle. None of them is recovered from.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("host link failed while the host was present")]
    UsbUart,

    #[error("sensor subcommand not received")]
    SensorCmd,

    #[error("fin servo calibration failed")]
    ServoCmd,

    #[error("flash or preset command failed")]
    FlashCmd,

    #[error("preset configuration is not flyable")]
    ConfigValidity,

    #[error("drogue or main ignition channel lacks continuity")]
    IgnitionContinuity,

    #[error("idle loop exited without a flight transition")]
    InvalidState,
}

impl Fault {
    /// Number of beeps in the lockout burst.
    pub const fn code(self) -> u32 {
        match self {
            Fault::UsbUart => 1,
            Fault::SensorCmd => 2,
            Fault::ServoCmd => 3,
            Fault::FlashCmd => 4,
            Fault::ConfigValidity => 5,
            Fault::IgnitionContinuity => 6,
            Fault::InvalidState => 7,
        }
    }
}

const CODE_BEEP_MS: u32 = 100;
const CODE_PAUSE_MS: u32 = 1000;

/// Terminal indication pattern latched by [`fail_fast`]. One `step` is one
/// period of the pattern.
#[derive(Debug, Clone, Copy)]
pub struct Lockout {
    fault: Fault,
}

impl Lockout {
    pub fn new(fault: Fault) -> Self {
        Self { fault }
    }

    pub fn fault(&self) -> Fault {
        self.fault
    }

    pub fn step(&mut self, indicator: &mut dyn Indicator) {
        match self.fault {
            Fault::ConfigValidity => {
                indicator.set_color(LedColor::White);
                indicator.beep(LOCKOUT_CADENCE_MS);
                indicator.set_color(LedColor::Red);
                indicator.delay(LOCKOUT_CADENCE_MS);
            }
            other => {
                indicator.set_color(LedColor::Red);
                indicator.multi_beep(CODE_BEEP_MS, CODE_BEEP_MS, other.code());
                indicator.delay(CODE_PAUSE_MS);
            }
        }
    }
}

/// The only escalation path. Latches the lockout pattern until power cycle.
pub fn fail_fast(indicator: &mut dyn Indicator, fault: Fault) -> ! {
    error!(code = fault.code(), "fail fast: {}", fault);
    let mut lockout = Lockout::new(fault);
    loop {
        lockout.step(indicator);
    }
}
