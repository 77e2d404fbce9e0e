use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Fewer than the requested bytes moved before the deadline.
    #[error("host link timed out")]
    Timeout,
    #[error("host link failure")]
    Link,
}

/// Terminal status the dispatcher hands back to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Ok,
    Fail,
}

/// Byte-oriented host link (USB CDC on the flight computer).
///
/// Calls are synchronous and all-or-nothing: either the whole buffer moved
/// or the call fails. Only one call is outstanding at a time.
pub trait Transport {
    /// Host cable/enumeration present.
    fn detect(&mut self) -> bool;

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), TransportError>;

    fn transmit(&mut self, buf: &[u8], timeout: Duration) -> Result<(), TransportError>;

    fn receive_byte(&mut self, timeout: Duration) -> Result<u8, TransportError> {
        let mut b = [0u8; 1];
        self.receive(&mut b, timeout)?;
        Ok(b[0])
    }
}
