//! In-memory board for running the idle loop off-target.
//!
//! Every handle is cheap to clone and clones share state, so a test (or the
//! `replay` command) keeps one copy for inspection while the supervisor owns
//! the other.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::warn;

use appa_proto::{ConfigSettings, FlashStatus, FlashSubcommand, PresetData, PRESET_RECORD_LEN};

use crate::board::{Board, FcState, FinCalibration, FlashMemory, FlightContext, FlightLoop, Ignition, SensorCommands};
use crate::indicator::{Indicator, LedColor};
use crate::transport::{Transport, TransportError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ----- Host link -----

#[derive(Debug, Default)]
struct LinkState {
    connected: bool,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    fail_rx: Option<TransportError>,
    fail_tx: Option<TransportError>,
}

/// Scripted host link. Bytes queued with `host_send` are what the host
/// wrote; everything the FC transmits accumulates for `take_tx`.
#[derive(Debug, Clone, Default)]
pub struct SimLink {
    inner: Arc<Mutex<LinkState>>,
}

impl SimLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        let link = Self::new();
        link.set_connected(true);
        link
    }

    pub fn set_connected(&self, connected: bool) {
        lock(&self.inner).connected = connected;
    }

    pub fn host_send(&self, bytes: &[u8]) {
        lock(&self.inner).rx.extend(bytes.iter().copied());
    }

    pub fn pending_rx(&self) -> usize {
        lock(&self.inner).rx.len()
    }

    pub fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.inner).tx)
    }

    pub fn fail_next_receive(&self, err: TransportError) {
        lock(&self.inner).fail_rx = Some(err);
    }

    pub fn fail_next_transmit(&self, err: TransportError) {
        lock(&self.inner).fail_tx = Some(err);
    }
}

impl Transport for SimLink {
    fn detect(&mut self) -> bool {
        lock(&self.inner).connected
    }

    fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<(), TransportError> {
        let mut st = lock(&self.inner);
        if let Some(err) = st.fail_rx.take() {
            return Err(err);
        }
        if st.rx.len() < buf.len() {
            return Err(TransportError::Timeout);
        }
        for b in buf.iter_mut() {
            *b = st.rx.pop_front().unwrap_or_default();
        }
        Ok(())
    }

    fn transmit(&mut self, buf: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        let mut st = lock(&self.inner);
        if let Some(err) = st.fail_tx.take() {
            return Err(err);
        }
        st.tx.extend_from_slice(buf);
        Ok(())
    }
}

// ----- Flash -----

const ERASED: u8 = 0xFF;
const STATUS_WRITE_PROTECTED: u8 = 0b10;

#[derive(Debug)]
struct FlashState {
    region: Vec<u8>,
    write_protected: bool,
    writes: usize,
}

/// Append-only preset region of `slots` records, erased to 0xFF.
#[derive(Debug, Clone)]
pub struct SimFlash {
    inner: Arc<Mutex<FlashState>>,
}

impl SimFlash {
    pub fn new(slots: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FlashState {
                region: vec![ERASED; slots * PRESET_RECORD_LEN],
                write_protected: false,
                writes: 0,
            })),
        }
    }

    pub fn set_write_protected(&self, on: bool) {
        lock(&self.inner).write_protected = on;
    }

    pub fn write_count(&self) -> usize {
        lock(&self.inner).writes
    }

    /// Last programmed slot, if any.
    pub fn latest(&self) -> Option<[u8; PRESET_RECORD_LEN]> {
        let st = lock(&self.inner);
        Self::scan(&st.region).map(|(rec, _)| rec)
    }

    fn scan(region: &[u8]) -> Option<([u8; PRESET_RECORD_LEN], usize)> {
        let mut found = None;
        for (i, slot) in region.chunks_exact(PRESET_RECORD_LEN).enumerate() {
            if slot.iter().any(|&b| b != ERASED) {
                let mut rec = [0u8; PRESET_RECORD_LEN];
                rec.copy_from_slice(slot);
                found = Some((rec, (i + 1) * PRESET_RECORD_LEN));
            }
        }
        found
    }
}

impl FlashMemory for SimFlash {
    fn write_preset(&mut self, record: &[u8; PRESET_RECORD_LEN], address: &mut u32) -> FlashStatus {
        let mut st = lock(&self.inner);
        if st.write_protected {
            return FlashStatus::WriteProtected;
        }
        let start = *address as usize;
        let end = start + PRESET_RECORD_LEN;
        if end > st.region.len() {
            return FlashStatus::AddrOutOfRange;
        }
        st.region[start..end].copy_from_slice(record);
        st.writes += 1;
        *address = end as u32;
        FlashStatus::Ok
    }

    fn read_preset(&mut self, address: &mut u32) -> Result<[u8; PRESET_RECORD_LEN], FlashStatus> {
        let st = lock(&self.inner);
        match Self::scan(&st.region) {
            Some((rec, next)) => {
                *address = next as u32;
                Ok(rec)
            }
            None => {
                *address = 0;
                Err(FlashStatus::PresetNotFound)
            }
        }
    }

    fn execute(&mut self, subcommand: u8, link: &mut dyn Transport) -> FlashStatus {
        let mut st = lock(&self.inner);
        match FlashSubcommand::from_byte(subcommand) {
            Some(FlashSubcommand::Enable) => {
                st.write_protected = false;
                FlashStatus::Ok
            }
            Some(FlashSubcommand::Disable) => {
                st.write_protected = true;
                FlashStatus::Ok
            }
            Some(FlashSubcommand::Erase) => {
                if st.write_protected {
                    return FlashStatus::WriteProtected;
                }
                st.region.fill(ERASED);
                FlashStatus::Ok
            }
            Some(FlashSubcommand::Status) => {
                let reg = if st.write_protected { STATUS_WRITE_PROTECTED } else { 0 };
                match link.transmit(&[reg], Duration::from_millis(10)) {
                    Ok(()) => FlashStatus::Ok,
                    Err(_) => FlashStatus::Timeout,
                }
            }
            Some(FlashSubcommand::Read | FlashSubcommand::Write | FlashSubcommand::Extract) => {
                FlashStatus::UnsupportedOp
            }
            None => FlashStatus::UnrecognizedOp,
        }
    }
}

// ----- Sensors -----

pub const SENSOR_DUMP: u8 = 0x01;

#[derive(Debug, Default)]
struct SensorState {
    frame: Vec<u8>,
    executed: Vec<u8>,
}

/// Answers `SENSOR_DUMP` with a fixed frame and records every subcommand.
#[derive(Debug, Clone, Default)]
pub struct SimSensors {
    inner: Arc<Mutex<SensorState>>,
}

impl SimSensors {
    pub fn with_frame(frame: &[u8]) -> Self {
        let s = Self::default();
        lock(&s.inner).frame = frame.to_vec();
        s
    }

    pub fn executed(&self) -> Vec<u8> {
        lock(&self.inner).executed.clone()
    }
}

impl SensorCommands for SimSensors {
    fn execute(&mut self, subcommand: u8, link: &mut dyn Transport) {
        let mut st = lock(&self.inner);
        st.executed.push(subcommand);
        if subcommand == SENSOR_DUMP {
            if let Err(e) = link.transmit(&st.frame, Duration::from_millis(10)) {
                warn!("sensor dump not sent: {}", e);
            }
        }
    }
}

// ----- Fin calibration -----

#[derive(Debug, Default)]
struct FinState {
    fail_with: Option<TransportError>,
    runs: usize,
}

/// Reads four new servo reference positions from the host.
#[derive(Debug, Clone, Default)]
pub struct SimFins {
    inner: Arc<Mutex<FinState>>,
}

impl SimFins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, err: TransportError) {
        lock(&self.inner).fail_with = Some(err);
    }

    pub fn runs(&self) -> usize {
        lock(&self.inner).runs
    }
}

impl FinCalibration for SimFins {
    fn calibrate(
        &mut self,
        link: &mut dyn Transport,
        settings: &mut ConfigSettings,
    ) -> Result<(), TransportError> {
        let mut st = lock(&self.inner);
        st.runs += 1;
        if let Some(err) = st.fail_with.take() {
            return Err(err);
        }
        let mut refs = [0u8; 4];
        link.receive(&mut refs, Duration::from_millis(10))?;
        settings.servo_reference = refs;
        Ok(())
    }
}

// ----- Ignition -----

#[derive(Debug, Default)]
struct IgnitionState {
    switch: bool,
    drogue: bool,
    main: bool,
    switch_after: Option<u32>,
    switch_polls: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SimIgnition {
    inner: Arc<Mutex<IgnitionState>>,
}

impl SimIgnition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_switch(&self, on: bool) {
        lock(&self.inner).switch = on;
    }

    pub fn set_drogue(&self, on: bool) {
        lock(&self.inner).drogue = on;
    }

    pub fn set_main(&self, on: bool) {
        lock(&self.inner).main = on;
    }

    /// Switch reads open for the first `polls` samples, then closed.
    pub fn switch_after(&self, polls: u32) {
        lock(&self.inner).switch_after = Some(polls);
    }

    pub fn switch_polls(&self) -> u32 {
        lock(&self.inner).switch_polls
    }
}

impl Ignition for SimIgnition {
    fn switch_continuity(&mut self) -> bool {
        let mut st = lock(&self.inner);
        st.switch_polls += 1;
        match st.switch_after {
            Some(n) => st.switch_polls > n,
            None => st.switch,
        }
    }

    fn drogue_continuity(&mut self) -> bool {
        lock(&self.inner).drogue
    }

    fn main_continuity(&mut self) -> bool {
        lock(&self.inner).main
    }
}

// ----- Indicator -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorEvent {
    Color(LedColor),
    Beep(u32),
    MultiBeep { on_ms: u32, off_ms: u32, count: u32 },
    Delay(u32),
}

/// Records every LED/buzzer call instead of blocking.
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    inner: Arc<Mutex<Vec<IndicatorEvent>>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<IndicatorEvent> {
        lock(&self.inner).clone()
    }

    pub fn clear(&self) {
        lock(&self.inner).clear();
    }
}

impl Indicator for RecordingIndicator {
    fn set_color(&mut self, color: LedColor) {
        lock(&self.inner).push(IndicatorEvent::Color(color));
    }

    fn beep(&mut self, ms: u32) {
        lock(&self.inner).push(IndicatorEvent::Beep(ms));
    }

    fn delay(&mut self, ms: u32) {
        lock(&self.inner).push(IndicatorEvent::Delay(ms));
    }

    fn multi_beep(&mut self, on_ms: u32, off_ms: u32, count: u32) {
        lock(&self.inner).push(IndicatorEvent::MultiBeep { on_ms, off_ms, count });
    }
}

// ----- Flight loop -----

#[derive(Debug, Default)]
struct FlightState {
    runs: usize,
    last_preset: Option<PresetData>,
    last_address: Option<u32>,
    state_on_return: Option<FcState>,
}

/// Counts hand-offs and snapshots what it was given.
#[derive(Debug, Clone, Default)]
pub struct RecordingFlight {
    inner: Arc<Mutex<FlightState>>,
}

impl RecordingFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> usize {
        lock(&self.inner).runs
    }

    pub fn last_preset(&self) -> Option<PresetData> {
        lock(&self.inner).last_preset
    }

    pub fn last_address(&self) -> Option<u32> {
        lock(&self.inner).last_address
    }

    /// State the flight loop leaves behind when it returns.
    pub fn leave_state(&self, state: FcState) {
        lock(&self.inner).state_on_return = Some(state);
    }
}

impl FlightLoop for RecordingFlight {
    fn run(&mut self, ctx: FlightContext<'_>) {
        let mut st = lock(&self.inner);
        st.runs += 1;
        st.last_preset = Some(*ctx.preset);
        st.last_address = Some(*ctx.flash_address);
        if let Some(state) = st.state_on_return {
            *ctx.state = state;
        }
    }
}

// ----- Bench -----

/// A full simulated board plus inspection handles.
#[derive(Debug, Clone)]
pub struct Bench {
    pub link: SimLink,
    pub indicator: RecordingIndicator,
    pub flash: SimFlash,
    pub sensors: SimSensors,
    pub fins: SimFins,
    pub ignition: SimIgnition,
    pub flight: RecordingFlight,
}

impl Bench {
    pub fn new(flash_slots: usize) -> Self {
        Self {
            link: SimLink::connected(),
            indicator: RecordingIndicator::new(),
            flash: SimFlash::new(flash_slots),
            sensors: SimSensors::with_frame(&[0x10, 0x20, 0x30, 0x40]),
            fins: SimFins::new(),
            ignition: SimIgnition::new(),
            flight: RecordingFlight::new(),
        }
    }

    pub fn board(&self) -> Board {
        Board {
            link: Box::new(self.link.clone()),
            indicator: Box::new(self.indicator.clone()),
            flash: Box::new(self.flash.clone()),
            sensors: Box::new(self.sensors.clone()),
            fins: Box::new(self.fins.clone()),
            ignition: Box::new(self.ignition.clone()),
            flight: Box::new(self.flight.clone()),
        }
    }
}
