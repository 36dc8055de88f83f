//! Date/time fields carried by the measurement and current-time characteristics,
//! and the simulated clock that advances them.
//!
//! The device has no calendar source. Its clock starts at a configured date and
//! counts forward on a simplified calendar where every month is 30 days long and
//! every year is 12 such months. Collectors only use the stamp to order samples.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use crate::codec::{CodecError, Encode, RecordBuilder};

const SECONDS_PER_MINUTE: u64 = 60;
const MINUTES_PER_HOUR: u64 = 60;
const HOURS_PER_DAY: u64 = 24;
const DAYS_PER_MONTH: u64 = 30;
const MONTHS_PER_YEAR: u64 = 12;

/// Date Time field: year (LE16), month, day, hours, minutes, seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl DateTime {
    pub const ENCODED_LEN: usize = 7;

    pub const fn new(year: u16, month: u8, day: u8, hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            year,
            month,
            day,
            hours,
            minutes,
            seconds,
        }
    }

    /// Move forward by `elapsed` seconds on the 30-day calendar.
    ///
    /// Returns the number of whole days that were crossed, which the current time
    /// service uses to roll its day of week.
    pub fn advance(&mut self, elapsed: u32) -> u32 {
        let total = self.seconds as u64 + elapsed as u64;
        self.seconds = (total % SECONDS_PER_MINUTE) as u8;

        let total = self.minutes as u64 + total / SECONDS_PER_MINUTE;
        self.minutes = (total % MINUTES_PER_HOUR) as u8;

        let total = self.hours as u64 + total / MINUTES_PER_HOUR;
        self.hours = (total % HOURS_PER_DAY) as u8;

        let days = total / HOURS_PER_DAY;

        // Day and month are 1-based
        let total = self.day.max(1) as u64 - 1 + days;
        self.day = (total % DAYS_PER_MONTH + 1) as u8;

        let total = self.month.max(1) as u64 - 1 + total / DAYS_PER_MONTH;
        self.month = (total % MONTHS_PER_YEAR + 1) as u8;

        self.year = self
            .year
            .wrapping_add((total / MONTHS_PER_YEAR).min(u16::MAX as u64) as u16);

        // At most u32::MAX / 86400 + 1
        days as u32
    }

    /// The stamp `elapsed` seconds after `self`
    pub fn after(mut self, elapsed: u32) -> Self {
        self.advance(elapsed);
        self
    }
}

impl From<NaiveDateTime> for DateTime {
    fn from(value: NaiveDateTime) -> Self {
        Self {
            year: value.year().clamp(0, u16::MAX as i32) as u16,
            month: value.month() as u8,
            day: value.day() as u8,
            hours: value.hour() as u8,
            minutes: value.minute() as u8,
            seconds: value.second() as u8,
        }
    }
}

impl Encode for DateTime {
    fn encoded_len(&self) -> usize {
        Self::ENCODED_LEN
    }

    fn encode_into(&self, builder: &mut RecordBuilder) -> Result<(), CodecError> {
        builder.put_u16_le(self.year)?;
        builder.put_u8(self.month)?;
        builder.put_u8(self.day)?;
        builder.put_u8(self.hours)?;
        builder.put_u8(self.minutes)?;
        builder.put_u8(self.seconds)
    }
}

/// Day of week field, 1 = Monday through 7 = Sunday, 0 = unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub const UNKNOWN: Self = Self(0);

    pub const fn code(self) -> u8 {
        self.0
    }

    /// Roll forward by `days`; an unknown day stays unknown
    pub fn advance(self, days: u32) -> Self {
        if self.0 == 0 {
            return self;
        }
        Self(((self.0 as u32 - 1 + days) % 7 + 1) as u8)
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(value: Weekday) -> Self {
        Self(value.number_from_monday() as u8)
    }
}

/// Seconds elapsed since a fixed start tick, fed from the timer callbacks.
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    start_ms: u64,
}

impl Uptime {
    pub const fn starting_at(start_ms: u64) -> Self {
        Self { start_ms }
    }

    pub fn elapsed_secs(&self, now_ms: u64) -> u32 {
        (now_ms.saturating_sub(self.start_ms) / 1000).min(u32::MAX as u64) as u32
    }
}
