//! Weight Scale Service: feature and measurement characteristics.

use bitflags::bitflags;

use crate::ble::config::{Config, WeightScaleHandles};
use crate::ble::error::TransportError;
use crate::ble::transport::{CccdFlags, Dispatch, GattTransport, Platform, TimerId};
use crate::clock::{DateTime, Uptime};
use crate::codec::{CodecError, Encode, RecordBuilder};
use crate::notifier::Notifier;
use crate::sensor::SensorSource;
use crate::units::{
    body_mass_index, convert_height, convert_weight, height_in_meters, weight_in_kilograms,
    BmiSource, HeightResolution, MeasurementUnit, WeightResolution,
};

bitflags! {
    /// Weight Measurement flags, one octet.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WssFlags: u8 {
        const IMPERIAL = 1 << 0;
        const TIME_STAMP = 1 << 1;
        const USER_ID = 1 << 2;
        const BMI_AND_HEIGHT = 1 << 3;
    }
}

bitflags! {
    /// Supported optional fields, the low bits of the Weight Scale Feature.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WeightScaleFeatureFlags: u32 {
        const TIME_STAMP = 1 << 0;
        const MULTIPLE_USERS = 1 << 1;
        const BMI = 1 << 2;
    }
}

const WEIGHT_RESOLUTION_SHIFT: u32 = 3;
const HEIGHT_RESOLUTION_SHIFT: u32 = 7;

/// Weight Scale Feature characteristic value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightScaleFeature {
    pub flags: WeightScaleFeatureFlags,
    pub weight_resolution: WeightResolution,
    pub height_resolution: HeightResolution,
}

impl WeightScaleFeature {
    pub const ENCODED_LEN: usize = 4;

    pub fn value(&self) -> u32 {
        self.flags.bits()
            | (self.weight_resolution.code() as u32) << WEIGHT_RESOLUTION_SHIFT
            | (self.height_resolution.code() as u32) << HEIGHT_RESOLUTION_SHIFT
    }

    pub fn from_value(value: u32) -> Self {
        Self {
            flags: WeightScaleFeatureFlags::from_bits_truncate(value),
            weight_resolution: WeightResolution::from_code((value >> WEIGHT_RESOLUTION_SHIFT) as u8),
            height_resolution: HeightResolution::from_code((value >> HEIGHT_RESOLUTION_SHIFT) as u8),
        }
    }

    /// Measurement flags matching what this feature advertises.
    pub fn measurement_flags(&self, unit: MeasurementUnit) -> WssFlags {
        let mut flags = WssFlags::empty();
        flags.set(WssFlags::IMPERIAL, unit == MeasurementUnit::Imperial);
        flags.set(
            WssFlags::TIME_STAMP,
            self.flags.contains(WeightScaleFeatureFlags::TIME_STAMP),
        );
        flags.set(
            WssFlags::USER_ID,
            self.flags.contains(WeightScaleFeatureFlags::MULTIPLE_USERS),
        );
        flags.set(
            WssFlags::BMI_AND_HEIGHT,
            self.flags.contains(WeightScaleFeatureFlags::BMI),
        );
        flags
    }
}

impl Default for WeightScaleFeature {
    fn default() -> Self {
        Self {
            flags: WeightScaleFeatureFlags::TIME_STAMP | WeightScaleFeatureFlags::BMI,
            weight_resolution: WeightResolution::KG_0_5,
            height_resolution: HeightResolution::M_0_01,
        }
    }
}

impl Encode for WeightScaleFeature {
    fn encoded_len(&self) -> usize {
        Self::ENCODED_LEN
    }

    fn encode_into(&self, builder: &mut RecordBuilder) -> Result<(), CodecError> {
        builder.put_u32_le(self.value())
    }
}

/// Weight Measurement characteristic value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightMeasurement {
    pub flags: WssFlags,
    pub weight: u16,
    pub time_stamp: DateTime,
    pub user_id: u8,
    pub bmi: u16,
    pub height: u16,
}

impl WeightMeasurement {
    /// Every optional field present
    pub const MAX_LEN: usize = 15;
}

impl Encode for WeightMeasurement {
    fn encoded_len(&self) -> usize {
        let mut len = 1 + 2;
        if self.flags.contains(WssFlags::TIME_STAMP) {
            len += DateTime::ENCODED_LEN;
        }
        if self.flags.contains(WssFlags::USER_ID) {
            len += 1;
        }
        if self.flags.contains(WssFlags::BMI_AND_HEIGHT) {
            len += 4;
        }
        len
    }

    fn encode_into(&self, builder: &mut RecordBuilder) -> Result<(), CodecError> {
        builder.put_u8(self.flags.bits())?;
        builder.put_u16_le(self.weight)?;

        if self.flags.contains(WssFlags::TIME_STAMP) {
            builder.put(&self.time_stamp)?;
        }
        if self.flags.contains(WssFlags::USER_ID) {
            builder.put_u8(self.user_id)?;
        }
        if self.flags.contains(WssFlags::BMI_AND_HEIGHT) {
            builder.put_u16_le(self.bmi)?;
            builder.put_u16_le(self.height)?;
        }

        Ok(())
    }
}

pub struct WeightScaleService<S> {
    handles: WeightScaleHandles,
    feature: WeightScaleFeature,
    unit: MeasurementUnit,
    bmi_source: BmiSource,
    start: DateTime,
    uptime: Uptime,
    source: S,
    notifier: Notifier,
}

impl<S: SensorSource> WeightScaleService<S> {
    pub fn new(config: &Config, source: S, now_ms: u64) -> Self {
        Self {
            handles: config.handles.weight_scale,
            feature: config.weight_scale_feature,
            unit: config.unit,
            bmi_source: config.bmi_source,
            start: config.measurement_start.into(),
            uptime: Uptime::starting_at(now_ms),
            source,
            notifier: Notifier::new(TimerId::WeightScale, Dispatch::Indicate),
        }
    }

    pub fn handles(&self) -> &WeightScaleHandles {
        &self.handles
    }

    pub fn feature(&self) -> WeightScaleFeature {
        self.feature
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Publish the feature value.
    pub fn init(&self, transport: &mut impl GattTransport) -> Result<(), TransportError> {
        info!("[wss] feature {:#x}", self.feature.value());
        transport.publish(self.handles.feature, &self.feature, Dispatch::Silent)
    }

    pub fn on_subscription_change(&mut self, cccd: CccdFlags, platform: &mut impl Platform) {
        debug!("[wss] measurement cccd {:#x}", cccd.bits());
        self.notifier.on_subscription_change(cccd, platform);
    }

    /// One timer period elapsed. `user_id` is the active user's index.
    pub fn on_tick<P: Platform>(
        &mut self,
        now_ms: u64,
        user_id: u8,
        platform: &mut P,
    ) -> Result<(), TransportError> {
        let Some(dispatch) = self.notifier.on_tick(platform) else {
            return Ok(());
        };

        let measurement = self.measure(now_ms, user_id);
        trace!("[wss] weight {} height {}", measurement.weight, measurement.height);
        platform.publish(self.handles.measurement, &measurement, dispatch)
    }

    /// Take a sample and build the record for it.
    pub fn measure(&mut self, now_ms: u64, user_id: u8) -> WeightMeasurement {
        let sample = self.source.sample();
        let weight_step = self.feature.weight_resolution.step(self.unit);
        let height_step = self.feature.height_resolution.step(self.unit);

        let weight = convert_weight(MeasurementUnit::Si, self.unit, sample.weight_kg, weight_step);
        let height = convert_height(MeasurementUnit::Si, self.unit, sample.height_m, height_step);

        let bmi = match self.bmi_source {
            BmiSource::Si => body_mass_index(sample.weight_kg, sample.height_m),
            BmiSource::DisplayUnits => body_mass_index(
                weight_in_kilograms(self.unit, weight, weight_step),
                height_in_meters(self.unit, height, height_step),
            ),
        };

        WeightMeasurement {
            flags: self.feature.measurement_flags(self.unit),
            weight,
            time_stamp: self.start.after(self.uptime.elapsed_secs(now_ms)),
            user_id,
            bmi,
            height,
        }
    }

    pub fn reset(&mut self) {
        self.notifier.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{FixedSource, Sample};

    fn service(config: &Config) -> WeightScaleService<FixedSource> {
        let source = FixedSource(Sample {
            weight_kg: 70.0,
            height_m: 1.7,
        });
        WeightScaleService::new(config, source, 0)
    }

    fn measurement(flags: WssFlags) -> WeightMeasurement {
        WeightMeasurement {
            flags,
            weight: 0x0102,
            time_stamp: DateTime::new(2022, 7, 5, 1, 2, 3),
            user_id: 9,
            bmi: 0x0304,
            height: 0x0506,
        }
    }

    #[test]
    fn test_default_feature_value() {
        let feature = WeightScaleFeature::default();
        // time stamp, BMI, 0.5 kg, 0.01 m
        assert_eq!(feature.value(), 0x8D);
        assert_eq!(WeightScaleFeature::from_value(0x8D), feature);
        assert_eq!(feature.encode().unwrap().as_slice(), &[0x8D, 0, 0, 0]);
    }

    #[test]
    fn test_weight_only_record() {
        let record = measurement(WssFlags::empty()).encode().unwrap();
        assert_eq!(record.as_slice(), &[0x00, 0x02, 0x01]);
    }

    #[test]
    fn test_time_stamp_only_record() {
        let record = measurement(WssFlags::TIME_STAMP).encode().unwrap();
        assert_eq!(record.len(), 1 + 2 + 7);
        assert_eq!(&record[3..5], &[0xE6, 0x07]);
    }

    #[test]
    fn test_length_matches_flags_for_every_combination() {
        for bits in 0..=0x0F {
            let flags = WssFlags::from_bits_truncate(bits);
            let record = measurement(flags).encode().unwrap();

            let mut expected = 3;
            if flags.contains(WssFlags::TIME_STAMP) {
                expected += 7;
            }
            if flags.contains(WssFlags::USER_ID) {
                expected += 1;
            }
            if flags.contains(WssFlags::BMI_AND_HEIGHT) {
                expected += 4;
            }
            assert_eq!(record.len(), expected, "flags {:#x}", bits);
        }
    }

    #[test]
    fn test_full_record_field_order() {
        let flags = WssFlags::all();
        let record = measurement(flags).encode().unwrap();

        assert_eq!(record.len(), WeightMeasurement::MAX_LEN);
        assert_eq!(
            record.as_slice(),
            &[0x0F, 0x02, 0x01, 0xE6, 0x07, 7, 5, 1, 2, 3, 9, 0x04, 0x03, 0x06, 0x05]
        );
    }

    #[test]
    fn test_si_measurement() {
        let config = Config::default();
        let mut wss = service(&config);
        let m = wss.measure(2_000, 1);

        assert_eq!(m.flags, WssFlags::TIME_STAMP | WssFlags::BMI_AND_HEIGHT);
        assert_eq!(m.weight, 140);
        assert_eq!(m.height, 170);
        assert_eq!(m.bmi, 242);
        assert_eq!(m.time_stamp, DateTime::new(2022, 7, 5, 0, 0, 2));
    }

    #[test]
    fn test_imperial_bmi_follows_the_configured_source() {
        let mut config = Config {
            unit: MeasurementUnit::Imperial,
            ..Config::default()
        };

        let m = service(&config).measure(0, 1);
        assert!(m.flags.contains(WssFlags::IMPERIAL));
        // 70 kg at 1 lb; 1.7 m at 1 in with the fixed length constant
        assert_eq!(m.weight, 154);
        assert_eq!(m.height, 6);
        // BMI from the raw SI sample
        assert_eq!(m.bmi, 242);

        config.bmi_source = BmiSource::DisplayUnits;
        let m = service(&config).measure(0, 1);
        // 154 lb = 69.85 kg, 6 in = 1.8288 m
        assert_eq!(m.bmi, 209);
    }

    #[test]
    fn test_multiple_users_adds_the_user_id() {
        let config = Config::default().with_multiple_users();
        let m = service(&config).measure(0, 3);

        assert!(m.flags.contains(WssFlags::USER_ID));
        assert_eq!(m.encode().unwrap()[10], 3);
    }
}
