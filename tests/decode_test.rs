mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use ems_proto::{DecodeService, Engine, PacketQueue, Telegram, DEFAULT_CLIENT_ID};

fn send(queue: &PacketQueue, bytes: &[u8]) {
    queue
        .try_send(Telegram::from_bytes(&with_crc(bytes)).unwrap())
        .unwrap();
}

#[test]
fn service_decodes_a_boiler_fault_broadcast() {
    let queue = Arc::new(PacketQueue::default());
    let mut service = DecodeService::new(Arc::clone(&queue));
    let store = service.store();

    // UBA error message: a Condens 2500 (product id 95) reporting fault
    // "2A1" with service code 5.
    send(
        &queue,
        &[
            0x08, 0x00, 0xbf, 0x00, 0x00, 0x5f, 0x00, 0x00, 0x00, 0x32, 0x41, 0x31,
            0x00, 0x05,
        ],
    );
    assert!(service.poll_once(Duration::from_millis(10)));

    let readings = store.snapshot();
    assert_eq!(readings.model, Some(95));
    assert_eq!(readings.error1, Some(0x32));
    assert_eq!(readings.error2, Some(0x41));
    assert_eq!(readings.error3, Some(0x31));
    assert_eq!(readings.error_code, Some(5));
}

#[test]
fn service_accumulates_monitor_broadcasts() {
    let queue = Arc::new(PacketQueue::default());
    let mut service = DecodeService::new(Arc::clone(&queue));
    let store = service.store();

    // Fast monitor, page 0: set 55 °C, boiler 54.6 °C, 75 % power,
    // loading pump on, 16.4 µA flame current.
    let mut fast = vec![0x08, 0x00, 0xe4, 0x00];
    fast.resize(25, 0x00);
    fast[10] = 55;
    fast[11] = 0x02;
    fast[12] = 0x22;
    fast[14] = 75;
    fast[15] = 0x05;
    fast[23] = 0x00;
    fast[24] = 0xa4;
    send(&queue, &fast);

    // Slow monitor: burner, circulation and heating pumps on, 20000
    // starts, 60000 minutes of operation.
    let mut slow = vec![0x08, 0x00, 0xe5, 0x00];
    slow.resize(18, 0x00);
    slow[4] = 0xa4;
    slow[13] = 0x4e;
    slow[14] = 0x20;
    slow[16] = 0xea;
    slow[17] = 0x60;
    send(&queue, &slow);

    // Water monitor: set 48 °C, measured 47.0 °C.
    let mut water = vec![0x08, 0x00, 0xe9, 0x00];
    water.resize(18, 0x00);
    water[4] = 48;
    water[5] = 0x01;
    water[6] = 0xd6;
    water[17] = 0x04;
    send(&queue, &water);

    for _ in 0..3 {
        assert!(service.poll_once(Duration::from_millis(10)));
    }

    let readings = store.snapshot();
    assert_eq!(readings.set_temperature, Some(55.0));
    assert_eq!(readings.boiler_temp, Some(54.6));
    assert_eq!(readings.power, Some(75));
    assert_eq!(readings.loading_pump, Some(true));
    assert_eq!(readings.flame_current, Some(16.4));
    assert_eq!(readings.burner, Some(true));
    assert_eq!(readings.blower, Some(false));
    assert_eq!(readings.pump, Some(true));
    assert_eq!(readings.circ_pump, Some(true));
    assert_eq!(readings.starts, Some(20_000));
    assert_eq!(readings.op_time, Some(60_000));
    assert_eq!(readings.set_water_temp, Some(48.0));
    assert_eq!(readings.water_temp, Some(47.0));
}

#[test]
fn service_decodes_thermostat_settings() {
    let queue = Arc::new(PacketQueue::default());
    let mut service = DecodeService::new(Arc::clone(&queue));
    let store = service.store();

    // HC1 working mode: night 16 °C, day 20.5 °C, holiday 15 °C, auto
    // mode, summer operation below 17 °C.
    let mut mode = vec![0x10, 0x00, 0x3d, 0x00];
    mode.resize(27, 0x00);
    mode[5] = 32;
    mode[6] = 41;
    mode[7] = 30;
    mode[11] = 2;
    mode[26] = 17;
    send(&queue, &mode);
    assert!(service.poll_once(Duration::from_millis(10)));

    let readings = store.snapshot();
    assert_eq!(readings.night_temp, Some(16.0));
    assert_eq!(readings.day_temp, Some(20.5));
    assert_eq!(readings.holiday_temp, Some(15.0));
    assert_eq!(readings.hc_mode, Some(2));
    assert_eq!(readings.summer_threshold, Some(17));
}

#[test]
fn engine_and_service_share_the_inbound_queue() {
    let mut engine = Engine::new(SimPort::with_echo(), DEFAULT_CLIENT_ID);
    let mut service = DecodeService::new(engine.inbound());
    let store = service.store();

    // Outdoor temperature broadcast from the boiler, 10.0 °C.
    engine
        .port_mut()
        .feed_telegram(&with_crc(&[0x08, 0x00, 0xd1, 0x00, 0x00, 0x64]));
    for _ in 0..16 {
        engine.step();
    }
    assert!(service.poll_once(Duration::from_millis(10)));
    assert_eq!(store.snapshot().outdoor_temp, Some(10.0));
    assert!(service.heartbeat().last().is_some());
}
