/// Status LED colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Off,
    Red,
    Green,
    Blue,
    Yellow,
    Cyan,
    Purple,
    White,
}

/// LED + buzzer façade. Best effort, nothing to report back.
///
/// Operator-facing meaning:
/// - GREEN: idle and ready for host commands
/// - YELLOW + 3 long beeps: no preset in flash, running on defaults
/// - WHITE/RED alternation: invalid configuration lockout
/// - 3 s tone: recovery channel continuity missing
pub trait Indicator {
    fn set_color(&mut self, color: LedColor);

    /// Blocking tone of `ms` milliseconds.
    fn beep(&mut self, ms: u32);

    fn delay(&mut self, ms: u32);

    fn multi_beep(&mut self, on_ms: u32, off_ms: u32, count: u32) {
        for _ in 0..count {
            self.beep(on_ms);
            self.delay(off_ms);
        }
    }
}

pub const READY_BEEP_MS: u32 = 50;
pub const READY_BEEPS: u32 = 2;
pub const NO_PRESET_BEEP_MS: u32 = 500;
pub const NO_PRESET_BEEPS: u32 = 3;
pub const CONTINUITY_TONE_MS: u32 = 3000;
pub const LOCKOUT_CADENCE_MS: u32 = 400;
