//! Subscription gating and timer lifecycle shared by the periodic measurement services.

use crate::ble::transport::{CccdFlags, Dispatch, TimerControl, TimerId};

/// Tracks whether a measurement characteristic is subscribed and whether its
/// periodic timer is running.
///
/// The timer is started by the subscription event and stopped by the first tick
/// that finds the subscription gone. A re-subscription restarts it.
#[derive(Debug)]
pub struct Notifier {
    timer: TimerId,
    kind: Dispatch,
    cccd: CccdFlags,
    running: bool,
}

impl Notifier {
    /// `kind` is how the characteristic pushes values, notify or indicate.
    pub const fn new(timer: TimerId, kind: Dispatch) -> Self {
        Self {
            timer,
            kind,
            cccd: CccdFlags::empty(),
            running: false,
        }
    }

    pub fn timer(&self) -> TimerId {
        self.timer
    }

    pub fn dispatch(&self) -> Dispatch {
        Dispatch::gated(self.kind, self.cccd)
    }

    pub fn is_enabled(&self) -> bool {
        self.dispatch().transmits()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn on_subscription_change(&mut self, cccd: CccdFlags, timers: &mut impl TimerControl) {
        self.cccd = cccd;

        if self.is_enabled() && !self.running {
            info!("[notifier] starting {:?} timer", self.timer);
            timers.start_timer(self.timer);
            self.running = true;
        }
    }

    /// Returns how to push this tick's measurement, or `None` when nothing
    /// should be sent. A tick without a subscription stops the timer.
    pub fn on_tick(&mut self, timers: &mut impl TimerControl) -> Option<Dispatch> {
        if !self.running {
            // Queued before the timer was stopped
            return None;
        }

        if self.is_enabled() {
            return Some(self.kind);
        }

        info!("[notifier] stopping {:?} timer", self.timer);
        timers.stop_timer(self.timer);
        self.running = false;
        None
    }

    /// Forget the subscription; the timer stops on its next tick.
    pub fn reset(&mut self) {
        self.cccd = CccdFlags::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Timers {
        started: usize,
        stopped: usize,
    }

    impl TimerControl for Timers {
        fn start_timer(&mut self, _timer: TimerId) {
            self.started += 1;
        }

        fn stop_timer(&mut self, _timer: TimerId) {
            self.stopped += 1;
        }
    }

    #[test]
    fn test_subscription_starts_the_timer_once() {
        let mut timers = Timers::default();
        let mut notifier = Notifier::new(TimerId::WeightScale, Dispatch::Indicate);

        notifier.on_subscription_change(CccdFlags::INDICATE, &mut timers);
        notifier.on_subscription_change(CccdFlags::INDICATE, &mut timers);

        assert_eq!(timers.started, 1);
        assert!(notifier.is_running());
        assert_eq!(notifier.on_tick(&mut timers), Some(Dispatch::Indicate));
    }

    #[test]
    fn test_wrong_subscription_kind_does_not_start() {
        let mut timers = Timers::default();
        let mut notifier = Notifier::new(TimerId::WeightScale, Dispatch::Indicate);

        notifier.on_subscription_change(CccdFlags::NOTIFY, &mut timers);

        assert_eq!(timers.started, 0);
        assert!(!notifier.is_enabled());
    }

    #[test]
    fn test_unsubscribed_tick_stops_the_timer() {
        let mut timers = Timers::default();
        let mut notifier = Notifier::new(TimerId::CurrentTime, Dispatch::Notify);

        notifier.on_subscription_change(CccdFlags::NOTIFY, &mut timers);
        notifier.on_subscription_change(CccdFlags::empty(), &mut timers);

        assert_eq!(notifier.on_tick(&mut timers), None);
        assert_eq!(timers.stopped, 1);
        assert!(!notifier.is_running());

        // Stale ticks after the stop are ignored
        assert_eq!(notifier.on_tick(&mut timers), None);
        assert_eq!(timers.stopped, 1);

        notifier.on_subscription_change(CccdFlags::NOTIFY, &mut timers);
        assert_eq!(timers.started, 2);
    }

    #[test]
    fn test_reset_lets_the_next_tick_stop() {
        let mut timers = Timers::default();
        let mut notifier = Notifier::new(TimerId::BodyComposition, Dispatch::Indicate);

        notifier.on_subscription_change(CccdFlags::INDICATE, &mut timers);
        notifier.reset();

        assert_eq!(notifier.on_tick(&mut timers), None);
        assert_eq!(timers.stopped, 1);
    }
}
