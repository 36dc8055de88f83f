//! Stack-facing side of the services.
//!
//! [`Peripheral`] owns every service and the deferred task queue. The GATT layer
//! delivers reads, writes, subscription changes and timer expiries to it and
//! drains the queue on the same task. Everything the services send goes out
//! through the [`transport::Platform`] the layer passes in.

pub mod config;
pub mod error;
pub mod transport;

#[cfg(feature = "esp32")]
mod host;
#[cfg(feature = "esp32")]
mod service;

#[cfg(feature = "esp32")]
pub use host::start;

use config::{Config, Handles};
use error::{AttError, TransportError};
use transport::{CccdFlags, GattTransport, Platform, TimerId};

use crate::codec::Reader;
use crate::scheduler::{Task, TaskQueue};
use crate::sensor::SensorSource;
use crate::services::{BodyCompositionService, CurrentTimeService, WeightScaleService};
use crate::uds::UserDataService;

/// What the GATT layer should answer to a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOutcome {
    /// Acknowledge the write
    Accepted,
    /// Answer with an ATT error
    Rejected(AttError),
    /// Do not acknowledge; a procedure response was already sent instead
    NotAcknowledged,
    /// Not one of ours
    Unhandled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadOutcome {
    Allow,
    Deny(AttError),
}

/// All four services behind one set of entry points.
///
/// `USERS` sizes the user registry.
pub struct Peripheral<S, const USERS: usize = 1> {
    handles: Handles,
    weight_scale: WeightScaleService<S>,
    body_composition: BodyCompositionService<S>,
    current_time: CurrentTimeService,
    user_data: UserDataService<USERS>,
    queue: TaskQueue,
}

impl<S: SensorSource + Clone, const USERS: usize> Peripheral<S, USERS> {
    pub fn new(config: &Config, source: S, now_ms: u64) -> Self {
        Self {
            handles: config.handles,
            weight_scale: WeightScaleService::new(config, source.clone(), now_ms),
            body_composition: BodyCompositionService::new(config, source, now_ms),
            current_time: CurrentTimeService::new(config, now_ms),
            user_data: UserDataService::new(config),
            queue: TaskQueue::new(),
        }
    }

    /// Publish the initial characteristic values.
    pub fn init(&mut self, transport: &mut impl GattTransport) -> Result<(), TransportError> {
        self.weight_scale.init(transport)?;
        self.body_composition.init(transport)?;
        self.current_time.init(transport)?;
        self.user_data.init(transport)?;
        info!("[ble] services initialized");
        Ok(())
    }

    pub fn handles(&self) -> &Handles {
        &self.handles
    }

    pub fn weight_scale(&self) -> &WeightScaleService<S> {
        &self.weight_scale
    }

    pub fn body_composition(&self) -> &BodyCompositionService<S> {
        &self.body_composition
    }

    pub fn body_composition_mut(&mut self) -> &mut BodyCompositionService<S> {
        &mut self.body_composition
    }

    pub fn current_time(&self) -> &CurrentTimeService {
        &self.current_time
    }

    pub fn user_data(&self) -> &UserDataService<USERS> {
        &self.user_data
    }

    /// A collector wrote `data` to `handle`.
    pub fn on_attribute_write<P: Platform>(
        &mut self,
        handle: u16,
        data: &[u8],
        platform: &mut P,
    ) -> WriteOutcome {
        let outcome = if handle == self.handles.user_data.control_point {
            self.user_data
                .on_control_point_write(data, &self.queue, platform)
        } else if handle == self.handles.current_time.current_time {
            match self.current_time.on_write(data) {
                Ok(()) => WriteOutcome::Accepted,
                Err(err) => WriteOutcome::Rejected(err),
            }
        } else if self.is_cccd(handle) {
            match Reader::new(data).get_u16_le() {
                Ok(value) => {
                    self.on_subscription_change(handle, CccdFlags::from_bits_truncate(value), platform);
                    WriteOutcome::Accepted
                }
                Err(_) => WriteOutcome::Rejected(AttError::InvalidAttributeValueLength),
            }
        } else {
            self.user_data.on_write(handle, data)
        };

        if let WriteOutcome::Rejected(err) = outcome {
            warn!("[ble] rejected write to {:#x}: {:?}", handle, err);
        }
        outcome
    }

    /// The collector changed the CCCD at `handle`. Returns false for handles
    /// that are not one of the services' CCCDs.
    pub fn on_subscription_change<P: Platform>(
        &mut self,
        handle: u16,
        cccd: CccdFlags,
        platform: &mut P,
    ) -> bool {
        let handles = self.handles;

        if handle == handles.weight_scale.measurement_cccd {
            self.weight_scale.on_subscription_change(cccd, platform);
        } else if handle == handles.body_composition.measurement_cccd {
            self.body_composition.on_subscription_change(cccd, platform);
        } else if handle == handles.current_time.current_time_cccd {
            self.current_time.on_subscription_change(cccd, platform);
        } else if handle == handles.user_data.control_point_cccd {
            self.user_data.on_control_point_subscription(cccd);
        } else if handle == handles.user_data.database_change_increment_cccd {
            // Changes are never pushed; the subscription is only stored by the stack
        } else {
            return false;
        }

        true
    }

    pub fn on_read_request(&self, handle: u16) -> ReadOutcome {
        self.user_data.on_read(handle)
    }

    /// A measurement timer expired. Only enqueues; the measurement runs when
    /// the queue is drained.
    pub fn on_timer_expired(&self, timer: TimerId, now_ms: u64) -> bool {
        match self.queue.schedule(Task::Measure { timer, now_ms }) {
            Ok(()) => true,
            Err(_) => {
                // The next period brings a fresher sample anyway
                debug!("[ble] queue full, skipping {:?} tick", timer);
                false
            }
        }
    }

    /// Execute everything queued so far. Returns how many tasks ran.
    pub fn run_pending<P: Platform>(&mut self, platform: &mut P) -> usize {
        let mut executed = 0;
        while let Some(task) = self.queue.try_next() {
            self.execute(task, platform);
            executed += 1;
        }
        executed
    }

    /// Wait for the next deferred task.
    pub async fn next_task(&self) -> Task {
        self.queue.next().await
    }

    pub fn execute<P: Platform>(&mut self, task: Task, platform: &mut P) {
        trace!("[ble] executing {:?}", task);

        let result = match task {
            Task::Measure { timer, now_ms } => {
                let user_id = self.user_data.active_user_index();
                match timer {
                    TimerId::WeightScale => self.weight_scale.on_tick(now_ms, user_id, platform),
                    TimerId::BodyComposition => {
                        self.body_composition.on_tick(now_ms, user_id, platform)
                    }
                    TimerId::CurrentTime => self.current_time.on_tick(now_ms, platform),
                }
            }
            Task::Procedure(procedure) => {
                self.user_data.execute(procedure, platform);
                Ok(())
            }
            Task::Reject { opcode, result } => {
                self.user_data.reject(opcode, result, platform);
                Ok(())
            }
        };

        if let Err(err) = result {
            warn!("[ble] failed to send measurement: {:?}", err);
        }
    }

    /// The collector went away.
    pub fn on_disconnect(&mut self) {
        let mut dropped = 0;
        while self.queue.try_next().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("[ble] dropped {} pending tasks", dropped);
        }

        self.weight_scale.reset();
        self.body_composition.reset();
        self.current_time.reset();
        self.user_data.reset();
    }

    fn is_cccd(&self, handle: u16) -> bool {
        let handles = &self.handles;
        [
            handles.weight_scale.measurement_cccd,
            handles.body_composition.measurement_cccd,
            handles.current_time.current_time_cccd,
            handles.user_data.control_point_cccd,
            handles.user_data.database_change_increment_cccd,
        ]
        .contains(&handle)
    }
}
