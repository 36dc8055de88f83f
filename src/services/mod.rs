//! Periodic measurement services.
//!
//! Each service owns its characteristic values and a [`Notifier`](crate::notifier::Notifier).
//! Values are pushed to the stack through [`Platform`](crate::ble::transport::Platform);
//! the services never talk to the stack directly.

pub mod bcs;
pub mod cts;
pub mod wss;

pub use bcs::BodyCompositionService;
pub use cts::CurrentTimeService;
pub use wss::WeightScaleService;
