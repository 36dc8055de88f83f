//! GATT profile services for a BLE body-composition scale.
//!
//! The crate carries the parts of the Weight Scale, Body Composition, Current Time and
//! User Data services that are independent of any particular BLE stack: measurement
//! record encoding, unit conversion, the User Control Point procedure engine and the
//! periodic measurement notifiers. The stack itself is reached through the narrow
//! traits in [`ble::transport`].
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// Must stay first so the log macros are visible to every other module
#[macro_use]
mod fmt;

pub mod ble;
pub mod clock;
pub mod codec;
pub mod notifier;
pub mod scheduler;
pub mod sensor;
pub mod services;
pub mod uds;
pub mod units;

pub use ble::config::Config;
pub use ble::{Peripheral, ReadOutcome, WriteOutcome};
