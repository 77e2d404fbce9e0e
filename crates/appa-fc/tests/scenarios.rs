use appa_fc::fault::Lockout;
use appa_fc::indicator::LedColor;
use appa_fc::sim::{Bench, IndicatorEvent, RecordingIndicator, SENSOR_DUMP};
use appa_fc::transport::{LinkStatus, TransportError};
use appa_fc::{FcState, Fault, IdleConfig, IdleSupervisor};
use appa_proto::{
    crc32, ConfigSettings, FeatureFlags, FlashStatus, Opcode, PresetData, CONFIG_SETTINGS_LEN,
    PRESET_RECORD_LEN,
};

const CONNECT: u8 = Opcode::Connect.as_u8();
const SENSOR: u8 = Opcode::Sensor.as_u8();
const FLASH: u8 = Opcode::Flash.as_u8();
const FIN: u8 = Opcode::Fin.as_u8();
const PRESET: u8 = Opcode::Preset.as_u8();
const UPLOAD: u8 = 0x01;
const DOWNLOAD: u8 = 0x02;
const VERIFY: u8 = 0x03;
const OK: u8 = FlashStatus::Ok.as_u8();

fn idle_with(bench: &Bench, preset: PresetData) -> IdleSupervisor {
    let cfg = IdleConfig { firmware_code: 0xA7, ..IdleConfig::default() };
    let mut sup = IdleSupervisor::new(cfg, bench.board(), preset, FlashStatus::Ok, 0);
    sup.enter_idle();
    bench.indicator.clear();
    sup
}

fn idle(bench: &Bench) -> IdleSupervisor {
    idle_with(bench, PresetData::default())
}

/// Run one dispatcher cycle per queued command until the host is drained.
fn drain(sup: &mut IdleSupervisor, bench: &Bench) {
    while bench.link.pending_rx() > 0 {
        assert_eq!(sup.cycle(), Ok(LinkStatus::Ok));
    }
}

fn upload_frame(crc: u32, payload: &[u8; CONFIG_SETTINGS_LEN]) -> Vec<u8> {
    let mut v = vec![PRESET, UPLOAD];
    v.extend_from_slice(&crc.to_le_bytes());
    v.extend_from_slice(payload);
    v
}

fn preset_with(features: FeatureFlags) -> PresetData {
    PresetData::sealed(ConfigSettings { enabled_features: features, ..ConfigSettings::default() })
}

#[test]
fn s1_handshake_sends_board_then_firmware_id() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[CONNECT]);
    drain(&mut sup, &bench);
    assert_eq!(bench.link.take_tx(), vec![0x05, 0xA7]);
}

#[test]
fn s2_upload_then_verify_valid() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    let payload = [0u8; CONFIG_SETTINGS_LEN];

    bench.link.host_send(&upload_frame(crc32(&payload), &payload));
    drain(&mut sup, &bench);
    assert_eq!(bench.link.take_tx(), vec![OK]);

    bench.link.host_send(&[PRESET, VERIFY]);
    drain(&mut sup, &bench);
    assert_eq!(bench.link.take_tx(), vec![0x01, OK]);
}

#[test]
fn s3_bad_crc_upload_is_kept_but_untrusted() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    let payload = [0u8; CONFIG_SETTINGS_LEN];

    bench.link.host_send(&upload_frame(0xDEAD_BEEF, &payload));
    drain(&mut sup, &bench);
    assert_eq!(bench.link.take_tx(), vec![OK]);

    bench.link.host_send(&[PRESET, VERIFY]);
    drain(&mut sup, &bench);
    assert_eq!(bench.link.take_tx(), vec![0x00, OK]);

    bench.link.host_send(&[PRESET, DOWNLOAD]);
    drain(&mut sup, &bench);
    let mut expected = vec![0, 0, 0, 0];
    expected.extend_from_slice(&payload);
    expected.push(OK);
    assert_eq!(bench.link.take_tx(), expected);
}

#[test]
fn s4_unknown_opcode_is_silent() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[0xFF]);
    drain(&mut sup, &bench);
    assert!(bench.link.take_tx().is_empty());

    bench.link.host_send(&[CONNECT]);
    drain(&mut sup, &bench);
    assert_eq!(bench.link.take_tx(), vec![0x05, 0xA7]);
}

#[test]
fn s5_forbidden_feature_locks_out_without_flight() {
    let bench = Bench::new(4);
    bench.ignition.set_switch(true);
    let mut sup = IdleSupervisor::new(
        IdleConfig::default(),
        bench.board(),
        preset_with(FeatureFlags::WirelessTransmission),
        FlashStatus::Ok,
        0,
    );

    assert_eq!(sup.run(), Err(Fault::ConfigValidity));
    assert_eq!(bench.flight.runs(), 0);
    assert_eq!(sup.state(), FcState::Idle);

    // The latched pattern, as fail_fast would drive it.
    let mut ind = RecordingIndicator::new();
    let mut lockout = Lockout::new(Fault::ConfigValidity);
    for _ in 0..10 {
        lockout.step(&mut ind);
    }
    let events = ind.events();
    assert!(events.chunks(4).all(|p| p
        == [
            IndicatorEvent::Color(LedColor::White),
            IndicatorEvent::Beep(400),
            IndicatorEvent::Color(LedColor::Red),
            IndicatorEvent::Delay(400),
        ]));
}

#[test]
fn s6_valid_preset_hands_off_once() {
    let bench = Bench::new(4);
    bench.ignition.set_switch(true);
    let preset = preset_with(FeatureFlags::LaunchDetect);
    let mut sup = IdleSupervisor::new(IdleConfig::default(), bench.board(), preset, FlashStatus::Ok, 40);

    assert_eq!(sup.run(), Ok(()));
    assert_eq!(bench.flight.runs(), 1);
    assert_eq!(bench.flight.last_preset(), Some(preset));
    assert_eq!(bench.flight.last_address(), Some(40));
    assert_eq!(sup.state(), FcState::Flight);
}

#[test]
fn roundtrip_upload_download_returns_exact_bytes() {
    let bench = Bench::new(8);
    let mut sup = idle(&bench);
    let payload: [u8; CONFIG_SETTINGS_LEN] = core::array::from_fn(|i| (i as u8) * 13 + 1);
    let crc = crc32(&payload);

    bench.link.host_send(&upload_frame(crc, &payload));
    bench.link.host_send(&[PRESET, DOWNLOAD]);
    drain(&mut sup, &bench);

    let tx = bench.link.take_tx();
    assert_eq!(tx[0], OK);
    assert_eq!(&tx[1..5], &crc.to_le_bytes());
    assert_eq!(&tx[5..1 + PRESET_RECORD_LEN], &payload);
    assert_eq!(tx[1 + PRESET_RECORD_LEN], OK);
    assert_eq!(tx.len(), 2 + PRESET_RECORD_LEN);
}

#[test]
fn ram_and_flash_agree_after_upload() {
    let bench = Bench::new(8);
    let mut sup = idle(&bench);
    let settings = ConfigSettings { main_deploy_altitude_ft: 600, ..ConfigSettings::default() };
    bench.link.host_send(&upload_frame(settings.crc(), &settings.to_bytes()));
    drain(&mut sup, &bench);

    assert_eq!(bench.flash.latest(), Some(sup.preset().to_bytes()));
    assert_eq!(sup.flash_address() as usize, PRESET_RECORD_LEN);
}

#[test]
fn download_is_idempotent() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);

    bench.link.host_send(&[PRESET, DOWNLOAD]);
    drain(&mut sup, &bench);
    let first = bench.link.take_tx();

    bench.link.host_send(&[PRESET, DOWNLOAD]);
    drain(&mut sup, &bench);
    assert_eq!(bench.link.take_tx(), first);
    assert_eq!(first.len(), PRESET_RECORD_LEN + 1);
}

#[test]
fn quiet_cycles_transmit_nothing() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    for _ in 0..5 {
        assert_eq!(sup.cycle(), Ok(LinkStatus::Ok));
    }
    bench.link.set_connected(false);
    assert_eq!(sup.cycle(), Ok(LinkStatus::Ok));
    assert!(bench.link.take_tx().is_empty());
}

#[test]
fn every_cycle_starts_green() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    sup.cycle().unwrap();
    assert_eq!(bench.indicator.events(), vec![IndicatorEvent::Color(LedColor::Green)]);
}

#[test]
fn response_lengths_match_the_opcode_table() {
    let bench = Bench::new(8);
    let mut sup = idle(&bench);
    let cases: Vec<(Vec<u8>, usize)> = vec![
        (vec![CONNECT], 2),
        (vec![0x7E], 0),
        (vec![FLASH, 0x04], 1),
        (vec![PRESET, VERIFY], 2),
        (vec![PRESET, DOWNLOAD], PRESET_RECORD_LEN + 1),
        (upload_frame(0, &[0u8; CONFIG_SETTINGS_LEN]), 1),
        (vec![SENSOR, SENSOR_DUMP], 4),
        (vec![SENSOR, 0x7F], 0),
    ];
    for (request, len) in cases {
        bench.link.host_send(&request);
        drain(&mut sup, &bench);
        assert_eq!(bench.link.take_tx().len(), len, "request {:02x?}", request);
    }
    assert_eq!(bench.sensors.executed(), vec![SENSOR_DUMP, 0x7F]);
}

#[test]
fn dual_deploy_requires_both_channels() {
    let bench = Bench::new(4);
    bench.ignition.set_switch(true);
    bench.ignition.set_main(true);
    let mut sup = IdleSupervisor::new(
        IdleConfig::default(),
        bench.board(),
        preset_with(FeatureFlags::DualDeploy),
        FlashStatus::Ok,
        0,
    );

    assert_eq!(sup.run(), Err(Fault::IgnitionContinuity));
    assert_eq!(bench.flight.runs(), 0);
    assert!(bench.indicator.events().contains(&IndicatorEvent::Beep(3000)));
}

#[test]
fn dual_deploy_with_continuity_arms() {
    let bench = Bench::new(4);
    bench.ignition.set_switch(true);
    bench.ignition.set_drogue(true);
    bench.ignition.set_main(true);
    let mut sup = IdleSupervisor::new(
        IdleConfig::default(),
        bench.board(),
        preset_with(FeatureFlags::DualDeploy),
        FlashStatus::Ok,
        0,
    );

    assert_eq!(sup.run(), Ok(()));
    assert_eq!(bench.flight.runs(), 1);
}

#[test]
fn missing_continuity_is_ignored_without_dual_deploy() {
    let bench = Bench::new(4);
    bench.ignition.set_switch(true);
    let mut sup = IdleSupervisor::new(
        IdleConfig::default(),
        bench.board(),
        preset_with(FeatureFlags::LaunchDetect),
        FlashStatus::Ok,
        0,
    );
    assert_eq!(sup.run(), Ok(()));
    assert_eq!(bench.flight.runs(), 1);
}

#[test]
fn untrusted_preset_does_not_arm_by_default() {
    let bench = Bench::new(4);
    bench.ignition.set_switch(true);
    let mut preset = preset_with(FeatureFlags::LaunchDetect);
    preset.crc = 0;
    let mut sup = IdleSupervisor::new(IdleConfig::default(), bench.board(), preset, FlashStatus::Ok, 0);
    assert_eq!(sup.run(), Err(Fault::ConfigValidity));

    let bench = Bench::new(4);
    bench.ignition.set_switch(true);
    let cfg = IdleConfig { require_valid_checksum: Some(false), ..IdleConfig::default() };
    let mut sup = IdleSupervisor::new(cfg, bench.board(), preset, FlashStatus::Ok, 0);
    assert_eq!(sup.run(), Ok(()));
}

#[test]
fn commands_are_served_until_the_switch_closes() {
    let bench = Bench::new(4);
    bench.ignition.switch_after(3);
    bench.link.host_send(&[CONNECT, PRESET, VERIFY]);
    let mut sup = IdleSupervisor::new(
        IdleConfig::default(),
        bench.board(),
        PresetData::default(),
        FlashStatus::Ok,
        0,
    );

    assert_eq!(sup.run(), Ok(()));
    assert_eq!(bench.link.take_tx(), vec![0x05, 0xA0, 0x01, OK]);
    assert_eq!(bench.ignition.switch_polls(), 4);
    assert_eq!(bench.flight.runs(), 1);
}

#[test]
fn opcode_link_failure_escalates_usb_uart() {
    let bench = Bench::new(4);
    bench.link.fail_next_receive(TransportError::Link);
    let mut sup = idle(&bench);
    assert_eq!(sup.run(), Err(Fault::UsbUart));
}

#[test]
fn opcode_timeout_is_tolerated() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.fail_next_receive(TransportError::Timeout);
    assert_eq!(sup.cycle(), Ok(LinkStatus::Ok));
}

#[test]
fn missing_sensor_subcommand_is_fatal() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[SENSOR]);
    assert_eq!(sup.cycle(), Err(Fault::SensorCmd));
}

#[test]
fn missing_flash_subcommand_is_fatal() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[FLASH]);
    assert_eq!(sup.cycle(), Err(Fault::FlashCmd));
}

#[test]
fn flash_status_echo_failure_is_fatal() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[FLASH, 0x01]);
    bench.link.fail_next_transmit(TransportError::Timeout);
    assert_eq!(sup.cycle(), Err(Fault::FlashCmd));
}

#[test]
fn flash_subcommand_status_is_echoed() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[FLASH, 0x02, FLASH, 0x05, FLASH, 0x06, FLASH, 0x42]);
    drain(&mut sup, &bench);
    assert_eq!(
        bench.link.take_tx(),
        vec![
            OK,
            0b10, OK,
            FlashStatus::UnsupportedOp.as_u8(),
            FlashStatus::UnrecognizedOp.as_u8(),
        ]
    );
    assert_eq!(sup.flash_status(), FlashStatus::UnrecognizedOp);
}

#[test]
fn missing_preset_subcommand_is_fatal() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[PRESET]);
    assert_eq!(sup.cycle(), Err(Fault::FlashCmd));
}

#[test]
fn upload_to_protected_flash_echoes_status() {
    let bench = Bench::new(4);
    bench.flash.set_write_protected(true);
    let mut sup = idle(&bench);
    let payload = [7u8; CONFIG_SETTINGS_LEN];
    bench.link.host_send(&upload_frame(crc32(&payload), &payload));
    drain(&mut sup, &bench);
    assert_eq!(bench.link.take_tx(), vec![FlashStatus::WriteProtected.as_u8()]);
    assert_eq!(sup.flash_status(), FlashStatus::WriteProtected);
}

#[test]
fn fin_calibration_persists_and_keeps_trust() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[FIN, 11, 22, 33, 44]);
    drain(&mut sup, &bench);

    assert_eq!(sup.preset().config_settings.servo_reference, [11, 22, 33, 44]);
    assert!(sup.preset().crc_valid());
    assert_eq!(bench.flash.latest(), Some(sup.preset().to_bytes()));
    assert!(bench.link.take_tx().is_empty());
}

#[test]
fn fin_calibration_leaves_untrusted_preset_untrusted() {
    let bench = Bench::new(4);
    let mut preset = PresetData::default();
    preset.crc = 0;
    let mut sup = idle_with(&bench, preset);
    bench.link.host_send(&[FIN, 1, 2, 3, 4]);
    drain(&mut sup, &bench);
    assert_eq!(sup.preset().crc, 0);
}

#[test]
fn fin_calibration_failure_is_fatal() {
    let bench = Bench::new(4);
    bench.fins.fail_with(TransportError::Timeout);
    let mut sup = idle(&bench);
    bench.link.host_send(&[FIN]);
    assert_eq!(sup.cycle(), Err(Fault::ServoCmd));
    assert_eq!(bench.flash.write_count(), 0);
}

#[test]
fn fin_persist_failure_is_fatal() {
    let bench = Bench::new(4);
    bench.flash.set_write_protected(true);
    let mut sup = idle(&bench);
    bench.link.host_send(&[FIN, 1, 2, 3, 4]);
    assert_eq!(sup.cycle(), Err(Fault::FlashCmd));
}

#[test]
fn flight_loop_corrupting_state_is_invalid() {
    let bench = Bench::new(4);
    bench.ignition.set_switch(true);
    bench.flight.leave_state(FcState::Init);
    let mut sup = IdleSupervisor::new(
        IdleConfig::default(),
        bench.board(),
        PresetData::default(),
        FlashStatus::Ok,
        0,
    );
    assert_eq!(sup.run(), Err(Fault::InvalidState));
    assert_eq!(bench.flight.runs(), 1);
}

#[test]
fn mismatched_upload_of_zero_crc_payload_stays_untrusted() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    let mut payload = [0u8; CONFIG_SETTINGS_LEN];
    payload[12..].copy_from_slice(&[242, 204, 12, 22]);
    assert_eq!(crc32(&payload), 0);

    bench.link.host_send(&upload_frame(0xDEAD_BEEF, &payload));
    bench.link.host_send(&[PRESET, VERIFY]);
    drain(&mut sup, &bench);
    assert_eq!(bench.link.take_tx(), vec![OK, 0x00, OK]);

    bench.ignition.set_switch(true);
    assert_eq!(sup.cycle(), Err(Fault::ConfigValidity));
    assert_eq!(bench.flight.runs(), 0);
}

#[test]
fn connect_reply_failure_is_not_fatal() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[CONNECT]);
    bench.link.fail_next_transmit(TransportError::Link);
    assert_eq!(sup.cycle(), Ok(LinkStatus::Ok));
    assert_eq!(bench.link.take_tx(), vec![0xA7]);
}

#[test]
fn sensor_dump_send_failure_is_left_to_the_driver() {
    let bench = Bench::new(4);
    let mut sup = idle(&bench);
    bench.link.host_send(&[SENSOR, SENSOR_DUMP]);
    bench.link.fail_next_transmit(TransportError::Timeout);
    assert_eq!(sup.cycle(), Ok(LinkStatus::Ok));
    assert_eq!(bench.sensors.executed(), vec![SENSOR_DUMP]);
    assert!(bench.link.take_tx().is_empty());
}
