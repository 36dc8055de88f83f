mod common;

use bodyscale::ble::error::AttError;
use bodyscale::ble::transport::{CccdFlags, Dispatch, TimerId};
use bodyscale::units::{BmiSource, MeasurementUnit};
use bodyscale::{Config, WriteOutcome};
use common::peripheral;

const INDICATE: [u8; 2] = [0x02, 0x00];
const NOTIFY: [u8; 2] = [0x01, 0x00];
const OFF: [u8; 2] = [0x00, 0x00];

#[test]
fn test_init_publishes_the_feature_values() {
    let mut platform = common::RecordingPlatform::default();
    let mut scale = bodyscale::Peripheral::<_, 1>::new(
        &Config::default(),
        bodyscale::sensor::FixedSource(common::BODY),
        0,
    );
    scale.init(&mut platform).unwrap();
    let handles = *scale.handles();

    let wss = platform.to(handles.weight_scale.feature);
    assert_eq!(wss[0].value, vec![0x8D, 0x00, 0x00, 0x00]);
    assert_eq!(wss[0].dispatch, Dispatch::Silent);

    let bcs = platform.to(handles.body_composition.feature);
    assert_eq!(bcs[0].value, vec![0x01, 0xBE, 0x01, 0x00]);

    assert_eq!(platform.to(handles.current_time.current_time)[0].value.len(), 10);
}

#[test]
fn test_weight_measurement_is_indicated_once_subscribed() {
    let (mut scale, mut platform) = peripheral(&Config::default());
    let handles = scale.handles().weight_scale;

    // Nothing runs until the collector subscribes
    assert!(scale.on_timer_expired(TimerId::WeightScale, 1_000));
    scale.run_pending(&mut platform);
    assert!(platform.to(handles.measurement).is_empty());

    scale.on_attribute_write(handles.measurement_cccd, &INDICATE, &mut platform);
    assert_eq!(platform.started, vec![TimerId::WeightScale]);

    scale.on_timer_expired(TimerId::WeightScale, 3_000);
    scale.run_pending(&mut platform);

    let sent = platform.transmitted(handles.measurement);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dispatch, Dispatch::Indicate);
    assert_eq!(
        sent[0].value,
        vec![
            0x0A, // time stamp, BMI and height
            140, 0, // 70 kg at 0.5 kg
            0xE6, 0x07, 7, 5, 0, 0, 3, // 2022-07-05 00:00:03
            242, 0, // BMI 24.2
            170, 0, // 1.70 m at 0.01 m
        ]
    );
}

#[test]
fn test_unsubscribing_stops_the_timer_on_the_next_tick() {
    let (mut scale, mut platform) = peripheral(&Config::default());
    let handles = scale.handles().body_composition;

    scale.on_attribute_write(handles.measurement_cccd, &INDICATE, &mut platform);
    scale.on_attribute_write(handles.measurement_cccd, &OFF, &mut platform);
    scale.on_timer_expired(TimerId::BodyComposition, 1_000);
    scale.run_pending(&mut platform);

    assert!(platform.to(handles.measurement).is_empty());
    assert_eq!(platform.stopped, vec![TimerId::BodyComposition]);
    assert!(!scale.body_composition().notifier().is_running());

    scale.on_attribute_write(handles.measurement_cccd, &INDICATE, &mut platform);
    assert_eq!(platform.started.len(), 2);
}

#[test]
fn test_body_composition_record_layout() {
    let (mut scale, mut platform) = peripheral(&Config::default());
    let handles = scale.handles().body_composition;

    scale.on_attribute_write(handles.measurement_cccd, &INDICATE, &mut platform);
    scale.on_timer_expired(TimerId::BodyComposition, 0);
    scale.run_pending(&mut platform);

    let sent = platform.transmitted(handles.measurement);
    assert_eq!(
        sent[0].value,
        vec![
            0x02, 0x0C, // time stamp, weight, height
            10, 0, // body fat
            0xE6, 0x07, 7, 5, 0, 0, 0,
            0xB0, 0x36, // 14000 x 0.005 kg
            0xA4, 0x06, // 1700 x 0.001 m
        ]
    );
}

#[test]
fn test_removed_weight_feature_drops_the_weight_field() {
    let (mut scale, mut platform) = peripheral(&Config::default());
    let handles = scale.handles().body_composition;

    scale
        .body_composition_mut()
        .remove_feature(bodyscale::services::bcs::BodyCompositionFeatureFlags::WEIGHT, &mut platform)
        .unwrap();
    assert_eq!(platform.to(handles.feature)[0].value, vec![0x01, 0xBC, 0x01, 0x00]);

    scale.on_attribute_write(handles.measurement_cccd, &INDICATE, &mut platform);
    scale.on_timer_expired(TimerId::BodyComposition, 0);
    scale.run_pending(&mut platform);

    let sent = platform.transmitted(handles.measurement);
    assert_eq!(&sent[0].value[..2], &[0x02, 0x08]);
    assert_eq!(sent[0].value.len(), 2 + 2 + 7 + 2);
}

#[test]
fn test_imperial_weights_and_bmi_source() {
    let config = Config {
        unit: MeasurementUnit::Imperial,
        ..Config::default()
    };
    let (mut scale, mut platform) = peripheral(&config);
    let handles = scale.handles().weight_scale;

    scale.on_attribute_write(handles.measurement_cccd, &INDICATE, &mut platform);
    scale.on_timer_expired(TimerId::WeightScale, 0);
    scale.run_pending(&mut platform);

    let value = &platform.transmitted(handles.measurement)[0].value;
    assert_eq!(value[0], 0x0B);
    assert_eq!(&value[1..3], &[154, 0]);
    // BMI is taken from the SI sample by default
    assert_eq!(&value[10..12], &[242, 0]);

    let config = Config {
        bmi_source: BmiSource::DisplayUnits,
        ..config
    };
    let (mut scale, mut platform) = peripheral(&config);
    scale.on_attribute_write(handles.measurement_cccd, &INDICATE, &mut platform);
    scale.on_timer_expired(TimerId::WeightScale, 0);
    scale.run_pending(&mut platform);

    let value = &platform.transmitted(handles.measurement)[0].value;
    assert_eq!(&value[10..12], &[209, 0]);
}

#[test]
fn test_current_time_notifies_and_refuses_writes() {
    let (mut scale, mut platform) = peripheral(&Config::default());
    let handles = scale.handles().current_time;

    assert_eq!(
        scale.on_attribute_write(handles.current_time, &[0; 10], &mut platform),
        WriteOutcome::Rejected(AttError::DataFieldIgnored)
    );

    scale.on_attribute_write(handles.current_time_cccd, &NOTIFY, &mut platform);
    scale.on_timer_expired(TimerId::CurrentTime, 86_400_000 + 1_000);
    scale.run_pending(&mut platform);

    let sent = platform.transmitted(handles.current_time);
    assert_eq!(sent[0].dispatch, Dispatch::Notify);
    // Saturday 2022-07-30 00:00:01, manual update
    assert_eq!(sent[0].value, vec![0xE6, 0x07, 7, 30, 0, 0, 1, 6, 0, 0x01]);
}

#[test]
fn test_measurements_carry_the_active_user() {
    let config = Config::default().with_multiple_users();
    let (mut scale, mut platform) = peripheral(&config);
    let handles = *scale.handles();

    scale.on_attribute_write(handles.user_data.control_point, &[0x01, 0x05, 0x00], &mut platform);
    scale.on_attribute_write(handles.weight_scale.measurement_cccd, &INDICATE, &mut platform);
    scale.on_timer_expired(TimerId::WeightScale, 0);
    scale.run_pending(&mut platform);

    let value = &platform.transmitted(handles.weight_scale.measurement)[0].value;
    assert_eq!(value[0], 0x0E);
    assert_eq!(value[10], 1);
}

#[test]
fn test_unknown_cccd_values_are_masked() {
    let (mut scale, mut platform) = peripheral(&Config::default());
    let handles = scale.handles().weight_scale;

    scale.on_attribute_write(handles.measurement_cccd, &[0xFE, 0xFF], &mut platform);
    assert!(scale.weight_scale().notifier().is_enabled());
    assert!(!scale.on_subscription_change(0x0001, CccdFlags::INDICATE, &mut platform));
}

#[test]
fn test_unrelated_handles_are_left_to_the_stack() {
    let (mut scale, mut platform) = peripheral(&Config::default());
    assert_eq!(
        scale.on_attribute_write(0x0001, &[1, 2, 3], &mut platform),
        WriteOutcome::Unhandled
    );
}
