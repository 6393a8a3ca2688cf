mod plan;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::Url;

pub use self::{plan::PlanArgs, run::RunArgs};
use crate::{
    api::{home_assistant, solark, solcast},
    core::{
        boost_mode::BoostMode,
        efficiency::Efficiency,
        forecast::Percentile,
        settings::Settings,
        shading::ShadingLearner,
    },
    planner::{Collaborators, Planner},
    prelude::*,
    quantity::{power::Watts, proportions::Percent},
    store::FileStore,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: keep the profiles fresh and plan the boost every night.
    #[clap(name = "run")]
    Run(Box<RunArgs>),

    /// Run a single pass right now and print the plan.
    #[clap(name = "plan")]
    Plan(Box<PlanArgs>),
}

/// Everything needed to build a planner.
#[derive(Parser)]
pub struct PlannerArgs {
    #[clap(flatten)]
    pub settings: SettingsArgs,

    #[clap(flatten)]
    pub solcast: SolcastArgs,

    #[clap(flatten)]
    pub solark: SolarkArgs,

    #[clap(flatten)]
    pub home_assistant: HomeAssistantArgs,

    /// Directory for the learned shading and the cached forecast.
    #[clap(long, env = "STATE_DIRECTORY", default_value = ".sunboost")]
    pub state_directory: PathBuf,
}

impl PlannerArgs {
    pub fn into_planner(self, boost_mode: Option<BoostMode>) -> Result<Planner> {
        let mut settings = self.settings.build();
        if let Some(boost_mode) = boost_mode {
            settings.boost_mode = boost_mode;
        }
        settings.validate()?;
        info!(?settings, "configured");
        let collaborators = Collaborators {
            inverter: Box::new(solark::Api::try_new(
                self.solark.base_url,
                solark::Credentials {
                    username: self.solark.username,
                    password: self.solark.password,
                },
            )?),
            feed: Box::new(solcast::Api::try_new(
                &self.solcast.api_key,
                &self.solcast.resource_id,
            )?),
            statistics: Box::new(home_assistant::Api::try_new(
                &self.home_assistant.access_token,
                self.home_assistant.base_url,
                home_assistant::Entities {
                    load: self.home_assistant.load_entity_id,
                    solar: self.home_assistant.solar_entity_id,
                },
            )?),
            store: Box::new(FileStore::try_new(self.state_directory)?),
        };
        Ok(Planner::new(settings, collaborators))
    }
}

#[derive(Parser)]
pub struct SettingsArgs {
    /// Solar forecast percentile to plan against, lower is more pessimistic.
    #[clap(long, env = "FORECAST_PERCENTILE", default_value = "15")]
    pub percentile: Percentile,

    /// Hour of day at which the forecast is refreshed for the next day.
    #[clap(long, env = "FORECAST_REFRESH_HOUR", default_value = "23")]
    pub forecast_refresh_hour: u32,

    /// How many past days the load profile is averaged over.
    #[clap(long, env = "HISTORY_DAYS", default_value = "3")]
    pub history_days: u32,

    /// The boost keeps the battery above this state of charge.
    #[clap(long, env = "MIN_STATE_OF_CHARGE", default_value = "10")]
    pub min_state_of_charge: Percent,

    #[clap(long, env = "BOOST_MODE", value_enum, default_value = "testing")]
    pub boost_mode: BoostMode,

    /// Boost target in the manual mode.
    #[clap(long, env = "MANUAL_BOOST", default_value = "50")]
    pub manual_boost: Percent,

    /// First hour after the off-peak window.
    #[clap(long, env = "DAY_START_HOUR", default_value = "6")]
    pub day_start_hour: u32,

    /// Shading is only learned from hours forecast to be at least this clear.
    #[clap(long, env = "SHADING_MIN_CLARITY", default_value = "0.95")]
    pub shading_min_clarity: f64,

    /// Shading is only learned while the battery is below this state of charge.
    #[clap(long, env = "SHADING_MAX_STATE_OF_CHARGE", default_value = "96")]
    pub shading_max_state_of_charge: Percent,

    /// Assumed consumption for hours without any history.
    #[clap(long, env = "FALLBACK_LOAD_WATTS", default_value = "1000")]
    pub fallback_load: Watts,

    /// System efficiency until it can be estimated from the inverter totals.
    #[clap(long, env = "DEFAULT_EFFICIENCY", default_value = "0.85")]
    pub default_efficiency: Efficiency,
}

impl SettingsArgs {
    pub fn build(self) -> Settings {
        Settings::builder()
            .percentile(self.percentile)
            .forecast_refresh_hour(self.forecast_refresh_hour)
            .history_days(self.history_days)
            .min_state_of_charge(self.min_state_of_charge)
            .boost_mode(self.boost_mode)
            .manual_boost(self.manual_boost)
            .day_start_hour(self.day_start_hour)
            .shading(
                ShadingLearner::builder()
                    .min_clarity(self.shading_min_clarity)
                    .max_state_of_charge(self.shading_max_state_of_charge)
                    .build(),
            )
            .fallback_load(self.fallback_load)
            .default_efficiency(self.default_efficiency)
            .build()
    }
}

#[derive(Parser)]
pub struct SolcastArgs {
    #[clap(long = "solcast-api-key", env = "SOLCAST_API_KEY")]
    pub api_key: String,

    /// Rooftop site resource ID.
    #[clap(long = "solcast-resource-id", env = "SOLCAST_RESOURCE_ID")]
    pub resource_id: String,
}

#[derive(Parser)]
pub struct SolarkArgs {
    #[clap(long = "solark-username", env = "SOLARK_USERNAME")]
    pub username: String,

    #[clap(long = "solark-password", env = "SOLARK_PASSWORD")]
    pub password: String,

    #[clap(
        long = "solark-base-url",
        env = "SOLARK_BASE_URL",
        default_value = "https://solarkcloud.com/"
    )]
    pub base_url: Url,
}

#[derive(Parser)]
pub struct HomeAssistantArgs {
    #[clap(long = "home-assistant-access-token", env = "HOME_ASSISTANT_ACCESS_TOKEN")]
    pub access_token: String,

    /// Base API URL, for example: `https://example.com/api`.
    #[clap(long = "home-assistant-api-base-url", env = "HOME_ASSISTANT_API_BASE_URL")]
    pub base_url: Url,

    /// Household load power sensor.
    #[clap(long = "home-assistant-load-entity-id", env = "HOME_ASSISTANT_LOAD_ENTITY_ID")]
    pub load_entity_id: String,

    /// Solar power sensor.
    #[clap(long = "home-assistant-solar-entity-id", env = "HOME_ASSISTANT_SOLAR_ENTITY_ID")]
    pub solar_entity_id: String,
}
