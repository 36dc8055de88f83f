//! Conversion between SI and imperial measurement units at a declared resolution.
//!
//! Every transmitted mass or length is an unsigned count of resolution steps.
//! The feature characteristics select the step size through a small code
//! (0 = unspecified, which means a step of one whole unit).

/// 1 lb = 0.4536 kg
pub const POUNDS_TO_KILOGRAMS: f32 = 0.4536;

/// Length conversion constant used for meters <-> inches.
///
/// This is the feet-to-meters factor; it is kept as-is so transmitted heights match
/// the collectors this device was paired against.
pub const INCHES_TO_METERS: f32 = 0.3048;

/// BMI is always carried in steps of 0.1 kg/m²
pub const BMI_RESOLUTION: f32 = 0.1;

/// Unit system of a measurement, bit 0 of every measurement flags field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasurementUnit {
    /// Mass in kilograms, length in meters
    #[default]
    Si,
    /// Mass in pounds, length in inches
    Imperial,
}

/// Weight resolution code, four bits of a feature characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WeightResolution(u8);

impl WeightResolution {
    pub const UNSPECIFIED: Self = Self(0);
    pub const KG_0_5: Self = Self(1);
    pub const KG_0_2: Self = Self(2);
    pub const KG_0_1: Self = Self(3);
    pub const KG_0_05: Self = Self(4);
    pub const KG_0_02: Self = Self(5);
    pub const KG_0_01: Self = Self(6);
    pub const KG_0_005: Self = Self(7);

    /// Only the low four bits are kept
    pub const fn from_code(code: u8) -> Self {
        Self(code & 0x0F)
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    /// Size of one step in the given unit system. Codes 8-15 are reserved and
    /// behave as unspecified.
    pub fn step(self, unit: MeasurementUnit) -> f32 {
        let (si, imperial) = match self.0 {
            1 => (0.5, 1.0),
            2 => (0.2, 0.5),
            3 => (0.1, 0.2),
            4 => (0.05, 0.1),
            5 => (0.02, 0.05),
            6 => (0.01, 0.02),
            7 => (0.005, 0.01),
            _ => (1.0, 1.0),
        };

        match unit {
            MeasurementUnit::Si => si,
            MeasurementUnit::Imperial => imperial,
        }
    }
}

/// Height resolution code, three bits of a feature characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeightResolution(u8);

impl HeightResolution {
    pub const UNSPECIFIED: Self = Self(0);
    pub const M_0_01: Self = Self(1);
    pub const M_0_005: Self = Self(2);
    pub const M_0_001: Self = Self(3);

    /// Only the low three bits are kept
    pub const fn from_code(code: u8) -> Self {
        Self(code & 0x07)
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    pub fn step(self, unit: MeasurementUnit) -> f32 {
        let (si, imperial) = match self.0 {
            1 => (0.01, 1.0),
            2 => (0.005, 0.5),
            3 => (0.001, 0.1),
            _ => (1.0, 1.0),
        };

        match unit {
            MeasurementUnit::Si => si,
            MeasurementUnit::Imperial => imperial,
        }
    }
}

/// Quantize `value` to a count of `step`s, rounding half up at one decimal.
///
/// Values that do not fit 16 bits wrap; negative values clamp to zero.
pub fn quantize(value: f32, step: f32) -> u16 {
    let tenths = (value / step * 10.0) as u32;
    (tenths.wrapping_add(5) / 10) as u16
}

/// Convert a mass between unit systems and quantize it to `step`.
pub fn convert_weight(from: MeasurementUnit, to: MeasurementUnit, value: f32, step: f32) -> u16 {
    let value = match (from, to) {
        (MeasurementUnit::Si, MeasurementUnit::Imperial) => value / POUNDS_TO_KILOGRAMS,
        (MeasurementUnit::Imperial, MeasurementUnit::Si) => value * POUNDS_TO_KILOGRAMS,
        _ => value,
    };
    quantize(value, step)
}

/// Convert a length between unit systems and quantize it to `step`.
pub fn convert_height(from: MeasurementUnit, to: MeasurementUnit, value: f32, step: f32) -> u16 {
    let value = match (from, to) {
        (MeasurementUnit::Si, MeasurementUnit::Imperial) => value / INCHES_TO_METERS,
        (MeasurementUnit::Imperial, MeasurementUnit::Si) => value * INCHES_TO_METERS,
        _ => value,
    };
    quantize(value, step)
}

/// Body mass index from SI inputs, in steps of [`BMI_RESOLUTION`].
pub fn body_mass_index(weight_kg: f32, height_m: f32) -> u16 {
    quantize(weight_kg / (height_m * height_m), BMI_RESOLUTION)
}

/// A transmitted weight count read back as kilograms.
pub fn weight_in_kilograms(unit: MeasurementUnit, steps: u16, step: f32) -> f32 {
    let value = steps as f32 * step;
    match unit {
        MeasurementUnit::Si => value,
        MeasurementUnit::Imperial => value * POUNDS_TO_KILOGRAMS,
    }
}

/// A transmitted height count read back as meters.
pub fn height_in_meters(unit: MeasurementUnit, steps: u16, step: f32) -> f32 {
    let value = steps as f32 * step;
    match unit {
        MeasurementUnit::Si => value,
        MeasurementUnit::Imperial => value * INCHES_TO_METERS,
    }
}

/// Which values BMI is computed from when the measurement is in imperial units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BmiSource {
    /// The raw SI sample, whatever the display units are
    #[default]
    Si,
    /// The quantized values actually transmitted, converted back to SI
    DisplayUnits,
}
