//! Body Composition Service: feature and measurement characteristics.

use bitflags::bitflags;

use crate::ble::config::{BodyCompositionHandles, Config};
use crate::ble::error::TransportError;
use crate::ble::transport::{CccdFlags, Dispatch, GattTransport, Platform, TimerId};
use crate::clock::{DateTime, Uptime};
use crate::codec::{CodecError, Encode, RecordBuilder};
use crate::notifier::Notifier;
use crate::sensor::SensorSource;
use crate::units::{convert_height, convert_weight, HeightResolution, MeasurementUnit, WeightResolution};

bitflags! {
    /// Body Composition Measurement flags, two octets.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BcsFlags: u16 {
        const IMPERIAL = 1 << 0;
        const TIME_STAMP = 1 << 1;
        const USER_ID = 1 << 2;
        const BASAL_METABOLISM = 1 << 3;
        const MUSCLE_PERCENTAGE = 1 << 4;
        const MUSCLE_MASS = 1 << 5;
        const FAT_FREE_MASS = 1 << 6;
        const SOFT_LEAN_MASS = 1 << 7;
        const BODY_WATER_MASS = 1 << 8;
        const IMPEDANCE = 1 << 9;
        const WEIGHT = 1 << 10;
        const HEIGHT = 1 << 11;
        const MULTIPLE_PACKET = 1 << 12;
    }
}

bitflags! {
    /// Supported optional fields, the low bits of the Body Composition Feature.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BodyCompositionFeatureFlags: u32 {
        const TIME_STAMP = 1 << 0;
        const MULTIPLE_USERS = 1 << 1;
        const BASAL_METABOLISM = 1 << 2;
        const MUSCLE_PERCENTAGE = 1 << 3;
        const MUSCLE_MASS = 1 << 4;
        const FAT_FREE_MASS = 1 << 5;
        const SOFT_LEAN_MASS = 1 << 6;
        const BODY_WATER_MASS = 1 << 7;
        const IMPEDANCE = 1 << 8;
        const WEIGHT = 1 << 9;
        const HEIGHT = 1 << 10;
    }
}

const WEIGHT_RESOLUTION_SHIFT: u32 = 11;
const HEIGHT_RESOLUTION_SHIFT: u32 = 15;

/// Feature bit -> measurement flag it enables
const FIELD_FLAGS: [(BodyCompositionFeatureFlags, BcsFlags); 11] = [
    (BodyCompositionFeatureFlags::TIME_STAMP, BcsFlags::TIME_STAMP),
    (BodyCompositionFeatureFlags::MULTIPLE_USERS, BcsFlags::USER_ID),
    (BodyCompositionFeatureFlags::BASAL_METABOLISM, BcsFlags::BASAL_METABOLISM),
    (BodyCompositionFeatureFlags::MUSCLE_PERCENTAGE, BcsFlags::MUSCLE_PERCENTAGE),
    (BodyCompositionFeatureFlags::MUSCLE_MASS, BcsFlags::MUSCLE_MASS),
    (BodyCompositionFeatureFlags::FAT_FREE_MASS, BcsFlags::FAT_FREE_MASS),
    (BodyCompositionFeatureFlags::SOFT_LEAN_MASS, BcsFlags::SOFT_LEAN_MASS),
    (BodyCompositionFeatureFlags::BODY_WATER_MASS, BcsFlags::BODY_WATER_MASS),
    (BodyCompositionFeatureFlags::IMPEDANCE, BcsFlags::IMPEDANCE),
    (BodyCompositionFeatureFlags::WEIGHT, BcsFlags::WEIGHT),
    (BodyCompositionFeatureFlags::HEIGHT, BcsFlags::HEIGHT),
];

/// Body Composition Feature characteristic value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyCompositionFeature {
    pub flags: BodyCompositionFeatureFlags,
    pub weight_resolution: WeightResolution,
    pub height_resolution: HeightResolution,
}

impl BodyCompositionFeature {
    pub const ENCODED_LEN: usize = 4;

    pub fn value(&self) -> u32 {
        self.flags.bits()
            | (self.weight_resolution.code() as u32) << WEIGHT_RESOLUTION_SHIFT
            | (self.height_resolution.code() as u32) << HEIGHT_RESOLUTION_SHIFT
    }

    pub fn from_value(value: u32) -> Self {
        Self {
            flags: BodyCompositionFeatureFlags::from_bits_truncate(value),
            weight_resolution: WeightResolution::from_code((value >> WEIGHT_RESOLUTION_SHIFT) as u8),
            height_resolution: HeightResolution::from_code((value >> HEIGHT_RESOLUTION_SHIFT) as u8),
        }
    }

    /// Measurement flags matching what this feature advertises.
    pub fn measurement_flags(&self, unit: MeasurementUnit) -> BcsFlags {
        let mut flags = BcsFlags::empty();
        flags.set(BcsFlags::IMPERIAL, unit == MeasurementUnit::Imperial);
        for (feature, flag) in FIELD_FLAGS {
            flags.set(flag, self.flags.contains(feature));
        }
        flags
    }
}

impl Default for BodyCompositionFeature {
    fn default() -> Self {
        Self {
            flags: BodyCompositionFeatureFlags::TIME_STAMP
                | BodyCompositionFeatureFlags::WEIGHT
                | BodyCompositionFeatureFlags::HEIGHT,
            weight_resolution: WeightResolution::KG_0_005,
            height_resolution: HeightResolution::M_0_001,
        }
    }
}

impl Encode for BodyCompositionFeature {
    fn encoded_len(&self) -> usize {
        Self::ENCODED_LEN
    }

    fn encode_into(&self, builder: &mut RecordBuilder) -> Result<(), CodecError> {
        builder.put_u32_le(self.value())
    }
}

/// Body Composition Measurement characteristic value.
///
/// Body fat percentage is always present. The other fields are emitted in
/// declaration order when their flag is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BodyCompositionMeasurement {
    pub flags: BcsFlags,
    pub body_fat_percentage: u16,
    pub time_stamp: Option<DateTime>,
    pub user_id: u8,
    pub basal_metabolism: u16,
    pub muscle_percentage: u16,
    pub muscle_mass: u16,
    pub fat_free_mass: u16,
    pub soft_lean_mass: u16,
    pub body_water_mass: u16,
    pub impedance: u16,
    pub weight: u16,
    pub height: u16,
}

impl BodyCompositionMeasurement {
    /// Every optional field present
    pub const MAX_LEN: usize = 30;

    /// The two-octet fields after the user id, in wire order
    fn wide_fields(&self) -> [(BcsFlags, u16); 9] {
        [
            (BcsFlags::BASAL_METABOLISM, self.basal_metabolism),
            (BcsFlags::MUSCLE_PERCENTAGE, self.muscle_percentage),
            (BcsFlags::MUSCLE_MASS, self.muscle_mass),
            (BcsFlags::FAT_FREE_MASS, self.fat_free_mass),
            (BcsFlags::SOFT_LEAN_MASS, self.soft_lean_mass),
            (BcsFlags::BODY_WATER_MASS, self.body_water_mass),
            (BcsFlags::IMPEDANCE, self.impedance),
            (BcsFlags::WEIGHT, self.weight),
            (BcsFlags::HEIGHT, self.height),
        ]
    }
}

impl Encode for BodyCompositionMeasurement {
    fn encoded_len(&self) -> usize {
        let mut len = 2 + 2;
        if self.flags.contains(BcsFlags::TIME_STAMP) {
            len += DateTime::ENCODED_LEN;
        }
        if self.flags.contains(BcsFlags::USER_ID) {
            len += 1;
        }
        len + 2 * self
            .wide_fields()
            .iter()
            .filter(|(flag, _)| self.flags.contains(*flag))
            .count()
    }

    fn encode_into(&self, builder: &mut RecordBuilder) -> Result<(), CodecError> {
        builder.put_u16_le(self.flags.bits())?;
        builder.put_u16_le(self.body_fat_percentage)?;

        if self.flags.contains(BcsFlags::TIME_STAMP) {
            let Some(time_stamp) = self.time_stamp else {
                return Err(CodecError::InvalidValue);
            };
            builder.put(&time_stamp)?;
        }
        if self.flags.contains(BcsFlags::USER_ID) {
            builder.put_u8(self.user_id)?;
        }
        for (flag, value) in self.wide_fields() {
            if self.flags.contains(flag) {
                builder.put_u16_le(value)?;
            }
        }

        Ok(())
    }
}

pub struct BodyCompositionService<S> {
    handles: BodyCompositionHandles,
    feature: BodyCompositionFeature,
    flags: BcsFlags,
    unit: MeasurementUnit,
    body_fat_percentage: u16,
    start: DateTime,
    uptime: Uptime,
    source: S,
    notifier: Notifier,
}

impl<S: SensorSource> BodyCompositionService<S> {
    pub fn new(config: &Config, source: S, now_ms: u64) -> Self {
        let feature = config.body_composition_feature;

        Self {
            handles: config.handles.body_composition,
            feature,
            flags: feature.measurement_flags(config.unit),
            unit: config.unit,
            body_fat_percentage: config.body_fat_percentage,
            start: config.measurement_start.into(),
            uptime: Uptime::starting_at(now_ms),
            source,
            notifier: Notifier::new(TimerId::BodyComposition, Dispatch::Indicate),
        }
    }

    pub fn handles(&self) -> &BodyCompositionHandles {
        &self.handles
    }

    pub fn feature(&self) -> BodyCompositionFeature {
        self.feature
    }

    pub fn flags(&self) -> BcsFlags {
        self.flags
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn init(&self, transport: &mut impl GattTransport) -> Result<(), TransportError> {
        info!("[bcs] feature {:#x}", self.feature.value());
        transport.publish(self.handles.feature, &self.feature, Dispatch::Silent)
    }

    /// Stop advertising support for `removed` and stop sending the matching fields.
    pub fn remove_feature(
        &mut self,
        removed: BodyCompositionFeatureFlags,
        transport: &mut impl GattTransport,
    ) -> Result<(), TransportError> {
        self.feature.flags.remove(removed);

        for (feature, flag) in FIELD_FLAGS {
            if removed.contains(feature) {
                self.flags.remove(flag);
            }
        }

        self.init(transport)
    }

    pub fn on_subscription_change(&mut self, cccd: CccdFlags, platform: &mut impl Platform) {
        debug!("[bcs] measurement cccd {:#x}", cccd.bits());
        self.notifier.on_subscription_change(cccd, platform);
    }

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
        platform.publish(self.handles.measurement, &measurement, dispatch)
    }

    pub fn measure(&mut self, now_ms: u64, user_id: u8) -> BodyCompositionMeasurement {
        let sample = self.source.sample();
        let weight_step = self.feature.weight_resolution.step(self.unit);
        let height_step = self.feature.height_resolution.step(self.unit);

        BodyCompositionMeasurement {
            flags: self.flags,
            body_fat_percentage: self.body_fat_percentage,
            time_stamp: Some(self.start.after(self.uptime.elapsed_secs(now_ms))),
            user_id,
            weight: convert_weight(MeasurementUnit::Si, self.unit, sample.weight_kg, weight_step),
            height: convert_height(MeasurementUnit::Si, self.unit, sample.height_m, height_step),
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        self.notifier.reset();
    }
}
