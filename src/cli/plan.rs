use chrono::Local;
use clap::Parser;

use crate::{
    cli::PlannerArgs,
    core::boost_mode::BoostMode,
    prelude::*,
    tables::{build_boost_table, build_profiles_table, build_status_table},
};

#[derive(Parser)]
pub struct PlanArgs {
    #[clap(flatten)]
    planner: PlannerArgs,

    /// Only plan, never write the boost setting regardless of the configured mode.
    #[clap(long)]
    scout: bool,
}

impl PlanArgs {
    pub async fn run(self) -> Result {
        let boost_mode = self.scout.then_some(BoostMode::Testing);
        let mut planner = self.planner.into_planner(boost_mode)?;

        let now = Local::now();
        planner.start(now).await;
        planner.hourly_pass(now, true).await;

        info!(n_forecast_hours = planner.forecast().len(), "forecast");
        println!("{}", build_profiles_table(planner.load_profile(), planner.shading()));
        match planner.boost_plan() {
            Some(plan) => {
                println!("{}", build_boost_table(plan));
                info!(
                    date = %plan.date,
                    target = plan.target_state_of_charge,
                    mode = %planner.settings().boost_mode,
                    "planned",
                );
            }
            None => {
                warn!("no boost plan, see the errors above");
            }
        }
        if let Some(runtime) = planner.runtime() {
            info!(%runtime, "estimated battery runtime");
        }
        println!("{}", build_status_table(planner.status()));
        println!("{}", serde_json::to_string_pretty(&planner.summary(now))?);
        Ok(())
    }
}
