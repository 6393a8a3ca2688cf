//! External collaborators of the planner.

mod client;
pub mod home_assistant;
pub mod solark;
pub mod solcast;

use async_trait::async_trait;

use crate::{
    core::{
        battery::Telemetry,
        boost_mode::BoostSetting,
        efficiency::LifetimeTotals,
        forecast::ForecastRow,
        interval::Interval,
        load::HourlyMean,
    },
    prelude::*,
};

/// Inverter cloud: live readings, lifetime counters and the boost window setting.
#[async_trait]
pub trait InverterTelemetry: Send + Sync {
    async fn fetch_telemetry(&mut self) -> Result<Telemetry>;

    async fn fetch_lifetime_totals(&mut self) -> Result<LifetimeTotals>;

    async fn write_boost(&mut self, setting: BoostSetting) -> Result;
}

/// Solar production forecast provider.
#[async_trait]
pub trait ForecastFeed: Send + Sync {
    /// Fetches the raw forecast rows in the native resolution of the feed.
    async fn fetch(&self) -> Result<Vec<ForecastRow>>;
}

/// Recorded sensor streams the planner learns from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum Stream {
    #[display("load")]
    Load,

    #[display("solar")]
    Solar,
}

/// Long-term statistics backend.
#[async_trait]
pub trait HistoricalStats: Send + Sync {
    /// Hourly means of the stream within the interval.
    async fn hourly_means(&self, stream: Stream, interval: Interval) -> Result<Vec<HourlyMean>>;
}
