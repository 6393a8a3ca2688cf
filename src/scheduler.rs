use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::Local;
use tokio::{
    sync::Mutex,
    time::{MissedTickBehavior, interval},
};

use crate::{planner::Planner, prelude::*};

/// Drives the planner at the two cadences until Ctrl+C.
#[derive(Clone)]
pub struct Scheduler {
    planner: Arc<Mutex<Planner>>,
    hourly_in_flight: Arc<AtomicBool>,
}

/// Held while an hourly pass runs.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new(planner: Planner) -> Self {
        Self {
            planner: Arc::new(Mutex::new(planner)),
            hourly_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn start(&self) {
        self.planner.lock().await.start(Local::now()).await;
    }

    pub async fn run(self, telemetry_interval: Duration, hourly_check_interval: Duration) -> Result {
        let telemetry = tokio::spawn(self.clone().telemetry_loop(telemetry_interval));
        let hourly = tokio::spawn(self.clone().hourly_loop(hourly_check_interval));

        tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;
        info!("shutting down…");

        // Let an ongoing pass complete before cancelling the loops:
        let _planner = self.planner.lock().await;
        telemetry.abort();
        hourly.abort();
        Ok(())
    }

    async fn telemetry_loop(self, period: Duration) {
        let mut interval = interval(period);
        interval.reset_after(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.planner.lock().await.refresh_telemetry(Local::now()).await;
        }
    }

    async fn hourly_loop(self, period: Duration) {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.trigger_hourly().await;
        }
    }

    /// Runs the hourly update unless another one is still in progress.
    ///
    /// Returns whether the pass has run.
    pub async fn trigger_hourly(&self) -> bool {
        let Some(_in_flight) = InFlight::try_acquire(&self.hourly_in_flight) else {
            warn!("the previous hourly pass is still running, skipping");
            return false;
        };
        self.planner.lock().await.hourly_update(Local::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_is_exclusive() {
        let flag = Arc::new(AtomicBool::new(false));
        let first = InFlight::try_acquire(&flag);
        assert!(first.is_some());
        assert!(InFlight::try_acquire(&flag).is_none());
        drop(first);
        assert!(InFlight::try_acquire(&flag).is_some());
    }
}
