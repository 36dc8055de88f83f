//! The narrow surface through which the services talk to the BLE stack.

use bitflags::bitflags;

use super::error::TransportError;
use crate::codec::Encode;

bitflags! {
    /// Client Characteristic Configuration descriptor value.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CccdFlags: u16 {
        const NOTIFY = 0x0001;
        const INDICATE = 0x0002;
    }
}

/// How an updated value should reach the connected central.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dispatch {
    /// Store and indicate; the next indication waits for the confirmation
    Indicate,
    /// Store and notify
    Notify,
    /// Store only. Used for readable values and for pushes whose
    /// subscription is currently off.
    Silent,
}

impl Dispatch {
    /// Pick `wanted` if the central subscribed to it, otherwise stay silent.
    pub fn gated(wanted: Dispatch, cccd: CccdFlags) -> Dispatch {
        let enabled = match wanted {
            Dispatch::Indicate => cccd.contains(CccdFlags::INDICATE),
            Dispatch::Notify => cccd.contains(CccdFlags::NOTIFY),
            Dispatch::Silent => true,
        };

        if enabled {
            wanted
        } else {
            Dispatch::Silent
        }
    }

    pub fn transmits(self) -> bool {
        !matches!(self, Dispatch::Silent)
    }
}

/// Outbound half of the GATT layer.
pub trait GattTransport {
    /// Replace the value of the characteristic at `handle` starting at `offset`.
    fn update_characteristic(
        &mut self,
        handle: u16,
        offset: u16,
        value: &[u8],
        dispatch: Dispatch,
    ) -> Result<(), TransportError>;

    /// Encode `value` and push it as a whole.
    fn publish<T: Encode>(
        &mut self,
        handle: u16,
        value: &T,
        dispatch: Dispatch,
    ) -> Result<(), TransportError>
    where
        Self: Sized,
    {
        let record = value.encode()?;
        self.update_characteristic(handle, 0, &record, dispatch)
    }
}

/// Periodic measurement timers, one per notifying service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    WeightScale,
    BodyComposition,
    CurrentTime,
}

pub trait TimerControl {
    fn start_timer(&mut self, timer: TimerId);
    fn stop_timer(&mut self, timer: TimerId);
}

/// Everything the services need from the platform.
pub trait Platform: GattTransport + TimerControl {}

impl<T: GattTransport + TimerControl> Platform for T {}
