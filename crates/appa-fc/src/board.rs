use appa_proto::{ConfigSettings, FlashStatus, PresetData, PRESET_RECORD_LEN};

use crate::indicator::Indicator;
use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FcState {
    #[default]
    Init,
    Idle,
    Flight,
}

/// Preset region of the external flash.
pub trait FlashMemory {
    /// Persist one record at `*address`, advancing it past the record when
    /// the driver appends.
    fn write_preset(&mut self, record: &[u8; PRESET_RECORD_LEN], address: &mut u32) -> FlashStatus;

    /// Latest record in the region. `address` is left at the next free slot.
    fn read_preset(&mut self, address: &mut u32) -> Result<[u8; PRESET_RECORD_LEN], FlashStatus>;

    /// `FLASH_OP` subcommand; may exchange further bytes with the host.
    fn execute(&mut self, subcommand: u8, link: &mut dyn Transport) -> FlashStatus;
}

pub trait SensorCommands {
    /// `SENSOR_OP` subcommand. Payload and response belong to the sensor driver.
    fn execute(&mut self, subcommand: u8, link: &mut dyn Transport);
}

pub trait FinCalibration {
    /// Interactive fin servo calibration. Updates the servo fields in place.
    fn calibrate(
        &mut self,
        link: &mut dyn Transport,
        settings: &mut ConfigSettings,
    ) -> Result<(), TransportError>;
}

/// Continuity sense lines.
pub trait Ignition {
    fn switch_continuity(&mut self) -> bool;
    fn drogue_continuity(&mut self) -> bool;
    fn main_continuity(&mut self) -> bool;
}

/// Handles released to the flight loop on arming.
pub struct FlightContext<'a> {
    pub preset: &'a mut PresetData,
    pub state: &'a mut FcState,
    pub flash: &'a mut dyn FlashMemory,
    pub flash_status: &'a mut FlashStatus,
    pub flash_address: &'a mut u32,
}

pub trait FlightLoop {
    /// Not expected to return on hardware.
    fn run(&mut self, ctx: FlightContext<'_>);
}

/// Everything the idle supervisor drives.
pub struct Board {
    pub link: Box<dyn Transport>,
    pub indicator: Box<dyn Indicator>,
    pub flash: Box<dyn FlashMemory>,
    pub sensors: Box<dyn SensorCommands>,
    pub fins: Box<dyn FinCalibration>,
    pub ignition: Box<dyn Ignition>,
    pub flight: Box<dyn FlightLoop>,
}
