pub mod doctor;
pub mod preset_file;

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use appa_proto::{
    ConfigSettings, FlashStatus, FlashSubcommand, Opcode, PresetData, PresetSubcommand,
    PRESET_RECORD_LEN,
};

/// What the FC answers to `CONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub board_id: u8,
    pub firmware_code: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashReply {
    /// Status register, only sent back for `STATUS`.
    pub register: Option<u8>,
    pub status: FlashStatus,
}

pub type SerialTerminal = Terminal<SerialStream>;

pub fn open_serial(dev: &str, baud: u32) -> Result<SerialStream> {
    tokio_serial::new(dev, baud)
        .open_native_async()
        .with_context(|| format!("open serial {}", dev))
}

/// Host end of the idle terminal. One request in flight at a time; every
/// read is bounded by `timeout`.
pub struct Terminal<S> {
    io: S,
    timeout: Duration,
}

impl Terminal<SerialStream> {
    pub fn open(dev: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let io = open_serial(dev, baud)?;
        info!("terminal: {} @ {}", dev, baud);
        Ok(Self::new(io, timeout))
    }
}

impl<S> Terminal<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: S, timeout: Duration) -> Self {
        Self { io, timeout }
    }

    pub fn into_inner(self) -> S {
        self.io
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        debug!(tx = %hex::encode(bytes), "terminal: send");
        self.io.write_all(bytes).await.context("write to FC")?;
        self.io.flush().await.context("flush to FC")
    }

    async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let want = buf.len();
        timeout(self.timeout, self.io.read_exact(buf))
            .await
            .with_context(|| format!("FC sent fewer than {} bytes within {:?}", want, self.timeout))?
            .context("read from FC")?;
        debug!(rx = %hex::encode(&buf[..]), "terminal: recv");
        Ok(())
    }

    async fn recv_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.recv_exact(&mut b).await?;
        Ok(b[0])
    }

    async fn recv_status(&mut self) -> Result<FlashStatus> {
        let b = self.recv_byte().await?;
        FlashStatus::from_byte(b).with_context(|| format!("unknown flash status {:#04x}", b))
    }

    /// Everything the FC sends until the line goes quiet for one timeout.
    async fn recv_until_quiet(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 64];
        loop {
            match timeout(self.timeout, self.io.read(&mut chunk)).await {
                Err(_) => break,
                Ok(read) => {
                    let n = read.context("read from FC")?;
                    if n == 0 {
                        break;
                    }
                    out.extend_from_slice(&chunk[..n]);
                }
            }
        }
        Ok(out)
    }

    pub async fn connect(&mut self) -> Result<Identity> {
        self.send(&[Opcode::Connect.as_u8()]).await?;
        let mut ids = [0u8; 2];
        self.recv_exact(&mut ids).await.context("connect")?;
        let id = Identity { board_id: ids[0], firmware_code: ids[1] };
        info!(board = id.board_id, firmware = id.firmware_code, "terminal: connected");
        Ok(id)
    }

    /// Raw sensor subcommand; the reply framing belongs to the sensor driver.
    pub async fn sensor(&mut self, subcommand: u8) -> Result<Vec<u8>> {
        self.send(&[Opcode::Sensor.as_u8(), subcommand]).await?;
        self.recv_until_quiet().await
    }

    /// Starts fin calibration and hands the driver its payload. The FC
    /// answers nothing; the new servo references land in the stored preset.
    pub async fn fin_calibrate(&mut self, payload: &[u8]) -> Result<()> {
        let mut req = Vec::with_capacity(1 + payload.len());
        req.push(Opcode::Fin.as_u8());
        req.extend_from_slice(payload);
        self.send(&req).await
    }

    pub async fn flash(&mut self, sub: FlashSubcommand) -> Result<FlashReply> {
        match sub {
            FlashSubcommand::Read | FlashSubcommand::Write | FlashSubcommand::Extract => {
                anyhow::bail!("flash {:?} streams data and is not driven from the terminal", sub)
            }
            _ => {}
        }
        self.send(&[Opcode::Flash.as_u8(), sub.as_u8()]).await?;
        let register = if sub == FlashSubcommand::Status {
            Some(self.recv_byte().await.context("flash status register")?)
        } else {
            None
        };
        let status = self.recv_status().await?;
        if !status.is_ok() {
            warn!(?sub, %status, "terminal: flash command not OK");
        }
        Ok(FlashReply { register, status })
    }

    /// Seal `settings` with its CRC and upload it.
    pub async fn preset_upload(&mut self, settings: &ConfigSettings) -> Result<FlashStatus> {
        self.upload_record(&PresetData::sealed(*settings).to_bytes()).await
    }

    /// Upload a record exactly as given, CRC included.
    pub async fn upload_record(&mut self, record: &[u8; PRESET_RECORD_LEN]) -> Result<FlashStatus> {
        let mut req = Vec::with_capacity(2 + PRESET_RECORD_LEN);
        req.extend_from_slice(&[Opcode::Preset.as_u8(), PresetSubcommand::Upload.as_u8()]);
        req.extend_from_slice(record);
        self.send(&req).await?;
        self.recv_status().await.context("preset upload")
    }

    pub async fn preset_download(&mut self) -> Result<(PresetData, FlashStatus)> {
        self.send(&[Opcode::Preset.as_u8(), PresetSubcommand::Download.as_u8()]).await?;
        let mut rec = [0u8; PRESET_RECORD_LEN];
        self.recv_exact(&mut rec).await.context("preset download")?;
        let status = self.recv_status().await?;
        Ok((PresetData::from_bytes(&rec), status))
    }

    /// Whether the FC's RAM preset carries a matching CRC.
    pub async fn preset_verify(&mut self) -> Result<(bool, FlashStatus)> {
        self.send(&[Opcode::Preset.as_u8(), PresetSubcommand::Verify.as_u8()]).await?;
        let valid = match self.recv_byte().await.context("preset verify")? {
            0x01 => true,
            0x00 => false,
            other => anyhow::bail!("unexpected verify result {:#04x}", other),
        };
        let status = self.recv_status().await?;
        Ok((valid, status))
    }
}
