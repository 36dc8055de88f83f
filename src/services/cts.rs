//! Current Time Service.

use bitflags::bitflags;
use chrono::Datelike;

use crate::ble::config::{Config, CurrentTimeHandles};
use crate::ble::error::{AttError, TransportError};
use crate::ble::transport::{CccdFlags, Dispatch, GattTransport, Platform, TimerId};
use crate::clock::{DateTime, DayOfWeek, Uptime};
use crate::codec::{CodecError, Encode, RecordBuilder};
use crate::notifier::Notifier;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AdjustReason: u8 {
        const MANUAL_TIME_UPDATE = 1 << 0;
        const EXTERNAL_REFERENCE_TIME_UPDATE = 1 << 1;
        const CHANGE_OF_TIME_ZONE = 1 << 2;
        const CHANGE_OF_DST = 1 << 3;
    }
}

/// Current Time characteristic value (Exact Time 256 + Adjust Reason).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentTime {
    pub date_time: DateTime,
    pub day_of_week: DayOfWeek,
    pub fractions256: u8,
    pub adjust_reason: AdjustReason,
}

impl CurrentTime {
    pub const ENCODED_LEN: usize = 10;
}

impl Encode for CurrentTime {
    fn encoded_len(&self) -> usize {
        Self::ENCODED_LEN
    }

    fn encode_into(&self, builder: &mut RecordBuilder) -> Result<(), CodecError> {
        builder.put(&self.date_time)?;
        builder.put_u8(self.day_of_week.code())?;
        builder.put_u8(self.fractions256)?;
        builder.put_u8(self.adjust_reason.bits())
    }
}

pub struct CurrentTimeService {
    handles: CurrentTimeHandles,
    start: DateTime,
    start_day: DayOfWeek,
    uptime: Uptime,
    current: CurrentTime,
    notifier: Notifier,
}

impl CurrentTimeService {
    pub fn new(config: &Config, now_ms: u64) -> Self {
        let start = DateTime::from(config.current_time_start);
        let start_day = DayOfWeek::from(config.current_time_start.weekday());

        Self {
            handles: config.handles.current_time,
            start,
            start_day,
            uptime: Uptime::starting_at(now_ms),
            current: CurrentTime {
                date_time: start,
                day_of_week: start_day,
                fractions256: 0,
                adjust_reason: AdjustReason::empty(),
            },
            notifier: Notifier::new(TimerId::CurrentTime, Dispatch::Notify),
        }
    }

    pub fn handles(&self) -> &CurrentTimeHandles {
        &self.handles
    }

    pub fn current(&self) -> CurrentTime {
        self.current
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Publish the initial time so reads succeed before the first tick.
    pub fn init(&self, transport: &mut impl GattTransport) -> Result<(), TransportError> {
        transport.publish(self.handles.current_time, &self.current, Dispatch::Silent)
    }

    /// The time is kept by the device; collectors cannot set it.
    pub fn on_write(&mut self, _data: &[u8]) -> Result<(), AttError> {
        warn!("[cts] rejected current time write");
        Err(AttError::DataFieldIgnored)
    }

    pub fn on_subscription_change(&mut self, cccd: CccdFlags, platform: &mut impl Platform) {
        debug!("[cts] current time cccd {:#x}", cccd.bits());
        self.notifier.on_subscription_change(cccd, platform);
    }

    pub fn on_tick<P: Platform>(&mut self, now_ms: u64, platform: &mut P) -> Result<(), TransportError> {
        let Some(dispatch) = self.notifier.on_tick(platform) else {
            return Ok(());
        };

        self.advance(now_ms);
        platform.publish(self.handles.current_time, &self.current, dispatch)
    }

    /// Move the clock to `now_ms`.
    pub fn advance(&mut self, now_ms: u64) {
        let mut date_time = self.start;
        let days = date_time.advance(self.uptime.elapsed_secs(now_ms));

        self.current = CurrentTime {
            date_time,
            day_of_week: self.start_day.advance(days),
            fractions256: 0,
            adjust_reason: AdjustReason::MANUAL_TIME_UPDATE,
        };
    }

    pub fn reset(&mut self) {
        self.notifier.reset();
    }
}
