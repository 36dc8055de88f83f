use chrono::{NaiveDate, NaiveDateTime};

use crate::sensor::Sample;
use crate::services::bcs::{BodyCompositionFeature, BodyCompositionFeatureFlags};
use crate::services::wss::{WeightScaleFeature, WeightScaleFeatureFlags};
use crate::units::{BmiSource, MeasurementUnit};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightScaleHandles {
    pub feature: u16,
    pub measurement: u16,
    pub measurement_cccd: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyCompositionHandles {
    pub feature: u16,
    pub measurement: u16,
    pub measurement_cccd: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentTimeHandles {
    pub current_time: u16,
    pub current_time_cccd: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserDataHandles {
    pub height: u16,
    pub weight: u16,
    pub database_change_increment: u16,
    pub database_change_increment_cccd: u16,
    pub user_index: u16,
    pub control_point: u16,
    pub control_point_cccd: u16,
}

/// Attribute handles of every value and CCCD the core routes on.
///
/// Filled in by the GATT layer once its table is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handles {
    pub weight_scale: WeightScaleHandles,
    pub body_composition: BodyCompositionHandles,
    pub current_time: CurrentTimeHandles,
    pub user_data: UserDataHandles,
}

impl Default for Handles {
    /// One service per 0x10 block: declaration, then characteristic
    /// declaration / value / CCCD triples.
    fn default() -> Self {
        Self {
            weight_scale: WeightScaleHandles {
                feature: 0x0012,
                measurement: 0x0014,
                measurement_cccd: 0x0015,
            },
            body_composition: BodyCompositionHandles {
                feature: 0x0022,
                measurement: 0x0024,
                measurement_cccd: 0x0025,
            },
            current_time: CurrentTimeHandles {
                current_time: 0x0032,
                current_time_cccd: 0x0033,
            },
            user_data: UserDataHandles {
                height: 0x0042,
                weight: 0x0044,
                database_change_increment: 0x0046,
                database_change_increment_cccd: 0x0047,
                user_index: 0x0049,
                control_point: 0x004B,
                control_point_cccd: 0x004C,
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Name of the BLE device
    pub name: &'static str,

    /// Period of the measurement timers
    pub measurement_interval_ms: u64,

    /// Reading the synthetic sensor jitters around
    pub body: Sample,

    /// Units the measurements are transmitted in
    pub unit: MeasurementUnit,

    /// Time stamp of the first weight and body composition measurement
    pub measurement_start: NaiveDateTime,

    /// Initial value of the current time characteristic
    pub current_time_start: NaiveDateTime,

    pub weight_scale_feature: WeightScaleFeature,
    pub body_composition_feature: BodyCompositionFeature,

    /// In steps of 0.1 %
    pub body_fat_percentage: u16,

    /// Registers users at increasing indices instead of the single index 1
    pub multiple_users: bool,

    /// Keep registered users across disconnects
    pub single_trusted_collector: bool,

    pub bmi_source: BmiSource,

    pub handles: Handles,
}

impl Config {
    /// Multi-user registry, advertised in both feature characteristics.
    pub fn with_multiple_users(mut self) -> Self {
        self.multiple_users = true;
        self.weight_scale_feature.flags |= WeightScaleFeatureFlags::MULTIPLE_USERS;
        self.body_composition_feature.flags |= BodyCompositionFeatureFlags::MULTIPLE_USERS;
        self
    }
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "Weight Scale",
            measurement_interval_ms: 1_000,
            body: Sample {
                weight_kg: 70.0,
                height_m: 1.7,
            },
            unit: MeasurementUnit::Si,
            measurement_start: midnight(2022, 7, 5),
            current_time_start: midnight(2022, 7, 29),
            weight_scale_feature: WeightScaleFeature::default(),
            body_composition_feature: BodyCompositionFeature::default(),
            body_fat_percentage: 10,
            multiple_users: false,
            single_trusted_collector: false,
            bmi_source: BmiSource::Si,
            handles: Handles::default(),
        }
    }
}
