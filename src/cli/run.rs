use clap::Parser;

use crate::{cli::PlannerArgs, prelude::*, scheduler::Scheduler};

#[derive(Parser)]
pub struct RunArgs {
    #[clap(flatten)]
    planner: PlannerArgs,

    /// How often the live telemetry is refreshed.
    #[clap(long, env = "TELEMETRY_INTERVAL", default_value = "5min")]
    telemetry_interval: humantime::Duration,

    /// How often the hourly pass checks whether it is due.
    #[clap(long, env = "HOURLY_CHECK_INTERVAL", default_value = "1min")]
    hourly_check_interval: humantime::Duration,
}

impl RunArgs {
    pub async fn run(self) -> Result {
        let scheduler = Scheduler::new(self.planner.into_planner(None)?);
        scheduler.start().await;
        scheduler.run(self.telemetry_interval.into(), self.hourly_check_interval.into()).await
    }
}
