use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{info, warn};

use appa_fc::fault::Lockout;
use appa_fc::sim::{Bench, RecordingIndicator};
use appa_fc::transport::LinkStatus;
use appa_fc::{FcState, Fault, IdleConfig, IdleSupervisor};
use appa_host::preset_file::PresetFile;
use appa_host::doctor as host_doctor;
use appa_host::SerialTerminal;
use appa_proto::{FlashSubcommand, PresetData};

#[derive(Debug, Parser)]
#[command(name = "appa", version, about = "APPA flight computer pad terminal")]
struct Cli {
    #[arg(long, default_value = "appa.toml")]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Handshake and print the board and firmware ids.
    Connect,
    /// Raw sensor subcommand; prints whatever the FC sends back.
    Sensor { sub: u8 },
    /// Start fin calibration with a hex payload for the servo driver.
    Fin { payload_hex: String },
    Preset { #[command(subcommand)] cmd: PresetCmd },
    /// enable | disable | erase | status
    Flash { sub: String },
    Doctor {
        /// Check a preset file instead of the one on the FC.
        #[arg(long)]
        preset: Option<String>,
    },
    /// Run the idle loop on a simulated board against a hex byte script.
    Replay {
        script_hex: String,
        /// Close the ignition switch after this many cycles.
        #[arg(long)]
        switch_after: Option<u32>,
        #[arg(long, default_value_t = 16)]
        flash_slots: usize,
    },
}

#[derive(Debug, Subcommand)]
enum PresetCmd {
    Upload {
        file: String,
        /// `file` holds a hex record (CRC included), sent verbatim.
        #[arg(long)]
        raw: bool,
    },
    Download {
        /// Also write the payload as a preset file.
        #[arg(long)]
        out: Option<String>,
    },
    Verify,
    /// Print the sealed record for a preset file as hex.
    Encode { file: String },
}

#[derive(Debug, Default, serde::Deserialize)]
struct Config {
    link: Option<LinkCfg>,
    fc: Option<IdleConfig>,
    expect: Option<ExpectCfg>,
}

#[derive(Debug, serde::Deserialize)]
struct LinkCfg {
    serial_dev: String,
    baud: u32,
    timeout_ms: Option<u64>,
}

impl LinkCfg {
    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(500))
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct ExpectCfg {
    board_id: Option<u8>,
    firmware_code: Option<u8>,
}

fn load_config(path: &str) -> Result<Config> {
    if !std::path::Path::new(path).exists() {
        warn!("config {} not found, using defaults", path);
        return Ok(Config::default());
    }
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Connect => connect(&cfg).await?,
        Command::Sensor { sub } => sensor(&cfg, sub).await?,
        Command::Fin { payload_hex } => fin(&cfg, &payload_hex).await?,
        Command::Preset { cmd } => preset_cmd(&cfg, cmd).await?,
        Command::Flash { sub } => flash_cmd(&cfg, &sub).await?,
        Command::Doctor { preset } => doctor(&cfg, preset.as_deref()).await?,
        Command::Replay { script_hex, switch_after, flash_slots } => {
            replay(&cfg, &script_hex, switch_after, flash_slots)?
        }
    }
    Ok(())
}

fn open_terminal(cfg: &Config) -> Result<SerialTerminal> {
    let link = cfg.link.as_ref().context("no [link] config section")?;
    SerialTerminal::open(&link.serial_dev, link.baud, link.timeout())
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let compact: String = s.split_whitespace().collect();
    hex::decode(compact).context("not a hex string")
}

async fn connect(cfg: &Config) -> Result<()> {
    let mut term = open_terminal(cfg)?;
    let id = term.connect().await?;
    println!("board_id={:#04x} firmware={:#04x}", id.board_id, id.firmware_code);
    Ok(())
}

async fn sensor(cfg: &Config, sub: u8) -> Result<()> {
    let mut term = open_terminal(cfg)?;
    let reply = term.sensor(sub).await?;
    println!("{}", hex::encode(reply));
    Ok(())
}

async fn fin(cfg: &Config, payload_hex: &str) -> Result<()> {
    let payload = decode_hex(payload_hex)?;
    let mut term = open_terminal(cfg)?;
    term.fin_calibrate(&payload).await?;
    info!("fin: calibration payload sent ({} bytes)", payload.len());
    Ok(())
}

async fn preset_cmd(cfg: &Config, cmd: PresetCmd) -> Result<()> {
    match cmd {
        PresetCmd::Upload { file, raw } => {
            let mut term = open_terminal(cfg)?;
            let status = if raw {
                let text = std::fs::read_to_string(&file).with_context(|| format!("read {}", file))?;
                let record = PresetData::try_from(decode_hex(&text)?.as_slice())
                    .with_context(|| format!("preset record in {}", file))?;
                term.upload_record(&record.to_bytes()).await?
            } else {
                let settings = PresetFile::load(&file)?.to_settings();
                term.preset_upload(&settings).await?
            };
            println!("{}", status);
            anyhow::ensure!(status.is_ok(), "upload not stored");
        }
        PresetCmd::Download { out } => {
            let mut term = open_terminal(cfg)?;
            let (preset, status) = term.preset_download().await?;
            println!("{}", hex::encode(preset.to_bytes()));
            println!("crc={:#010x} valid={} {}", preset.crc, preset.crc_valid(), status);
            println!("features={}", preset.config_settings.enabled_features.names().join(","));
            if let Some(path) = out {
                PresetFile::from(&preset.config_settings).save(&path)?;
                info!("preset: written to {}", path);
            }
        }
        PresetCmd::Verify => {
            let mut term = open_terminal(cfg)?;
            let (valid, status) = term.preset_verify().await?;
            println!("valid={} {}", valid, status);
        }
        PresetCmd::Encode { file } => {
            let sealed = PresetData::sealed(PresetFile::load(&file)?.to_settings());
            println!("{}", hex::encode(sealed.to_bytes()));
        }
    }
    Ok(())
}

async fn flash_cmd(cfg: &Config, sub: &str) -> Result<()> {
    let sub = FlashSubcommand::parse(sub).with_context(|| format!("unknown flash subcommand: {}", sub))?;
    let mut term = open_terminal(cfg)?;
    let reply = term.flash(sub).await?;
    if let Some(reg) = reply.register {
        println!("register={:#010b}", reg);
    }
    println!("{}", reply.status);
    Ok(())
}

async fn doctor(cfg: &Config, preset_path: Option<&str>) -> Result<()> {
    info!("doctor: starting");
    let require_crc = cfg.fc.as_ref().map(|f| f.require_valid_checksum()).unwrap_or(true);

    if let Some(path) = preset_path {
        let preset = PresetData::sealed(PresetFile::load(path)?.to_settings());
        host_doctor::check_preset(&preset, require_crc)?;
        info!("doctor: OK");
        return Ok(());
    }

    let link = cfg.link.as_ref().context("no [link] config section")?;
    host_doctor::check_link(&link.serial_dev, link.baud, link.timeout().as_millis() as u64)?;

    let mut term = open_terminal(cfg)?;
    let id = term.connect().await?;
    if let Some(expect) = &cfg.expect {
        host_doctor::check_identity(id, expect.board_id, expect.firmware_code)?;
    }

    let (preset, _) = term.preset_download().await?;
    host_doctor::check_preset(&preset, require_crc)?;

    info!("doctor: OK");
    Ok(())
}

fn replay(cfg: &Config, script_hex: &str, switch_after: Option<u32>, flash_slots: usize) -> Result<()> {
    let script = decode_hex(script_hex)?;
    let bench = Bench::new(flash_slots);
    if let Some(n) = switch_after {
        bench.ignition.switch_after(n);
    }
    bench.link.host_send(&script);

    let mut sup = IdleSupervisor::boot(cfg.fc.clone().unwrap_or_default(), bench.board());
    sup.enter_idle();

    let outcome = loop {
        if sup.state() != FcState::Idle {
            break Ok(());
        }
        if switch_after.is_none() && bench.link.pending_rx() == 0 {
            break Ok(());
        }
        match sup.cycle() {
            Ok(LinkStatus::Ok) => {}
            Ok(LinkStatus::Fail) => break Err(Fault::UsbUart),
            Err(fault) => break Err(fault),
        }
    };

    println!("tx: {}", hex::encode(bench.link.take_tx()));
    println!("state: {:?}", sup.state());
    println!("preset: {} valid={}", hex::encode(sup.preset().to_bytes()), sup.preset().crc_valid());
    println!("flash: {} writes, last status {}", bench.flash.write_count(), sup.flash_status());
    println!("flight runs: {}", bench.flight.runs());
    if let Err(fault) = outcome {
        let mut pattern = RecordingIndicator::new();
        Lockout::new(fault).step(&mut pattern);
        println!("fault: {} (code {})", fault, fault.code());
        println!("lockout: {:?}", pattern.events());
    }
    Ok(())
}
