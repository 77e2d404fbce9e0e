pub mod arming;
pub mod board;
pub mod dispatch;
pub mod fault;
pub mod indicator;
pub mod sim;
pub mod store;
pub mod supervisor;
pub mod transport;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

pub use board::{Board, FcState, FlightContext};
pub use fault::{fail_fast, Fault};
pub use supervisor::IdleSupervisor;

/// Settings the idle supervisor is started with.
#[derive(Debug, Clone, Deserialize)]
pub struct IdleConfig {
    /// Firmware identifier byte sent after the board id on CONNECT.
    pub firmware_code: u8,

    /// Board identifier byte answered by the ping primitive. Default 0x05.
    pub board_id: Option<u8>,

    /// Per-call host link timeout. Default 10 ms.
    pub link_timeout_ms: Option<u64>,

    /// Refuse to arm when the stored preset CRC does not match. Default true.
    pub require_valid_checksum: Option<bool>,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            firmware_code: 0xA0,
            board_id: None,
            link_timeout_ms: None,
            require_valid_checksum: None,
        }
    }
}

impl IdleConfig {
    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse idle config toml")
    }

    pub fn board_id(&self) -> u8 {
        self.board_id.unwrap_or(0x05)
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.link_timeout_ms.unwrap_or(10))
    }

    pub fn require_valid_checksum(&self) -> bool {
        self.require_valid_checksum.unwrap_or(true)
    }
}
