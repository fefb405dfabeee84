use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// A cancelable repeating timer that posts an event into the controller's queue.
///
/// Only one task runs per timer: `start` cancels the previous one first. Cancelling a
/// timer that is not running does nothing. Late ticks are delayed, never replayed.
#[derive(Debug)]
pub struct RepeatingTimer {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
    period: Option<Duration>,
}

impl RepeatingTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: None,
            period: None,
        }
    }

    /// Must be called inside a tokio runtime. With `immediate`, one event is queued
    /// right away; the timer then fires every `period`.
    pub fn start<T>(&mut self, period: Duration, immediate: bool, tx: UnboundedSender<T>, event: T)
    where
        T: Clone + Send + 'static,
    {
        self.cancel();

        if immediate && tx.send(event.clone()).is_err() {
            debug!(timer = self.name, "receiver dropped, not arming timer");
            return;
        }

        let name = self.name;
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(event.clone()).is_err() {
                    debug!(timer = name, "receiver dropped, stopping timer");
                    break;
                }
            }
        }));
        self.period = Some(period);
        debug!(timer = self.name, period_ms = period.as_millis() as u64, "timer armed");
    }

    /// `start` with a new period.
    pub fn restart<T>(&mut self, period: Duration, tx: UnboundedSender<T>, event: T)
    where
        T: Clone + Send + 'static,
    {
        self.start(period, true, tx, event);
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(timer = self.name, "timer cancelled");
        }
        self.period = None;
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> usize {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_event_then_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RepeatingTimer::new("status");

        timer.start(Duration::from_secs(1), true, tx, ());
        assert_eq!(drain(&mut rx), 1);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(drain(&mut rx), 3);
        assert!(timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_immediate_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RepeatingTimer::new("drag");

        timer.start(Duration::from_millis(16), false, tx, ());
        assert_eq!(drain(&mut rx), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(drain(&mut rx), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RepeatingTimer::new("status");

        timer.cancel();
        timer.start(Duration::from_secs(1), true, tx, ());
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_running());
        assert_eq!(timer.period(), None);

        drain(&mut rx);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(drain(&mut rx), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RepeatingTimer::new("status");

        timer.start(Duration::from_secs(1), true, tx.clone(), ());
        timer.restart(Duration::from_secs(2), tx, ());
        assert_eq!(drain(&mut rx), 2);
        assert_eq!(timer.period(), Some(Duration::from_secs(2)));

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        // only the new 2s timer is ticking
        assert_eq!(drain(&mut rx), 2);
    }
}
