#![allow(dead_code)]

use bodyscale::ble::error::TransportError;
use bodyscale::ble::transport::{Dispatch, GattTransport, TimerControl, TimerId};
use bodyscale::codec::{Reader, Record};
use bodyscale::sensor::{FixedSource, Sample};
use bodyscale::uds::control_point::ProcedureResponse;
use bodyscale::{Config, Peripheral};

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub handle: u16,
    pub value: Vec<u8>,
    pub dispatch: Dispatch,
}

/// Records everything the services hand to the stack.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    pub updates: Vec<Update>,
    pub started: Vec<TimerId>,
    pub stopped: Vec<TimerId>,
}

impl RecordingPlatform {
    pub fn to(&self, handle: u16) -> Vec<&Update> {
        self.updates.iter().filter(|u| u.handle == handle).collect()
    }

    /// Updates that would have reached the collector
    pub fn transmitted(&self, handle: u16) -> Vec<&Update> {
        self.to(handle)
            .into_iter()
            .filter(|u| u.dispatch.transmits())
            .collect()
    }

    pub fn responses(&self, control_point: u16) -> Vec<ProcedureResponse> {
        self.to(control_point)
            .into_iter()
            .map(|u| Reader::new(&u.value).get().unwrap())
            .collect()
    }

    pub fn last_response(&self, control_point: u16) -> ProcedureResponse {
        self.responses(control_point).pop().unwrap()
    }
}

impl GattTransport for RecordingPlatform {
    fn update_characteristic(
        &mut self,
        handle: u16,
        offset: u16,
        value: &[u8],
        dispatch: Dispatch,
    ) -> Result<(), TransportError> {
        assert_eq!(offset, 0);
        assert!(value.len() <= Record::new().capacity());

        self.updates.push(Update {
            handle,
            value: value.to_vec(),
            dispatch,
        });
        Ok(())
    }
}

impl TimerControl for RecordingPlatform {
    fn start_timer(&mut self, timer: TimerId) {
        self.started.push(timer);
    }

    fn stop_timer(&mut self, timer: TimerId) {
        self.stopped.push(timer);
    }
}

pub const BODY: Sample = Sample {
    weight_kg: 70.0,
    height_m: 1.7,
};

pub fn peripheral(config: &Config) -> (Peripheral<FixedSource>, RecordingPlatform) {
    let mut platform = RecordingPlatform::default();
    let mut peripheral = Peripheral::new(config, FixedSource(BODY), 0);
    peripheral.init(&mut platform).unwrap();
    platform.updates.clear();
    (peripheral, platform)
}
