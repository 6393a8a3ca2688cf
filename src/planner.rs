use chrono::{DateTime, Datelike, Days, DurationRound, Local, NaiveDate, TimeDelta, Timelike};
use serde::Serialize;

use crate::{
    api::{ForecastFeed, HistoricalStats, InverterTelemetry, Stream},
    core::{
        battery::{BatteryState, Telemetry},
        boost::{BoostPlan, GridBoostPlanner},
        depletion::{DepletionSimulator, Runtime},
        efficiency::Efficiency,
        energy_model::EnergyModel,
        forecast::{Forecast, is_refresh_due},
        hour::HourStamp,
        interval::Interval,
        load::{HourlyMean, LoadProfile, LoadProfileEstimator},
        settings::Settings,
        shading::{Observation, ShadingProfile},
        status::{LinkStatus, Status},
    },
    prelude::*,
    quantity::{
        energy::{KilowattHours, WattHours},
        power::Watts,
        proportions::{Percent, WattHoursPerPercent},
    },
    store::DurableStore,
};

/// External collaborators of the planner.
pub struct Collaborators {
    pub inverter: Box<dyn InverterTelemetry>,
    pub feed: Box<dyn ForecastFeed>,
    pub statistics: Box<dyn HistoricalStats>,
    pub store: Box<dyn DurableStore>,
}

/// Owns all the learned and fetched state, and runs the periodic passes over it.
///
/// Every failure of a collaborator is logged and reflected in [`Status`],
/// the state then stays as it was before the failed stage.
pub struct Planner {
    settings: Settings,
    collaborators: Collaborators,

    forecast: Forecast,
    forecast_refreshed_at: Option<DateTime<Local>>,
    shading: ShadingProfile,
    load: LoadProfileEstimator,
    telemetry: Option<Telemetry>,
    battery: Option<BatteryState>,
    efficiency: Efficiency,

    /// `(year, month)` of the last efficiency estimate.
    efficiency_month: Option<(i32, u32)>,

    boost_plan: Option<BoostPlan>,
    runtime: Option<Runtime>,
    next_hourly_update_at: Option<DateTime<Local>>,
    status: Status,
}

/// Snapshot of the planner for display.
#[derive(Serialize)]
pub struct Summary {
    pub state_of_charge: Option<Percent>,
    pub usable_energy: Option<WattHours>,
    pub telemetry: Option<TelemetrySummary>,
    pub runtime: Option<Runtime>,
    pub runtime_hours: Option<f64>,
    pub exhausted_at: Option<DateTime<Local>>,
    pub efficiency: Efficiency,
    pub current_pv_estimate: KilowattHours,
    pub tomorrow_pv_total: KilowattHours,
    pub boost_mode: String,
    pub boost_target: Option<u8>,
    pub boost_date: Option<NaiveDate>,
    pub load_profile_computed_on: Option<NaiveDate>,
    pub forecast_refreshed_at: Option<DateTime<Local>>,
    pub status: Status,
    pub load: Vec<Watts>,
    pub shading: Vec<f64>,
}

/// Latest raw inverter readings.
#[derive(Serialize)]
pub struct TelemetrySummary {
    pub battery_power: Watts,
    pub pv_power: Watts,
    pub grid_power: Watts,
    pub load_power: Watts,
    pub shutdown: Percent,
    pub low_warning: Percent,

    /// Boost target currently configured in the inverter.
    pub configured_boost: Percent,
}

impl From<&Telemetry> for TelemetrySummary {
    fn from(telemetry: &Telemetry) -> Self {
        Self {
            battery_power: telemetry.battery_power,
            pv_power: telemetry.pv_power,
            grid_power: telemetry.grid_power,
            load_power: telemetry.load_power,
            shutdown: telemetry.parameters.shutdown,
            low_warning: telemetry.parameters.low_warning,
            configured_boost: telemetry.parameters.boost_state_of_charge,
        }
    }
}

impl Planner {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        Self {
            load: LoadProfileEstimator::new(settings.fallback_load),
            efficiency: settings.default_efficiency,
            settings,
            collaborators,
            forecast: Forecast::default(),
            forecast_refreshed_at: None,
            shading: ShadingProfile::default(),
            telemetry: None,
            battery: None,
            efficiency_month: None,
            boost_plan: None,
            runtime: None,
            next_hourly_update_at: None,
            status: Status::default(),
        }
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn shading(&self) -> &ShadingProfile {
        &self.shading
    }

    pub const fn load_profile(&self) -> &LoadProfile {
        self.load.profile()
    }

    pub const fn forecast(&self) -> &Forecast {
        &self.forecast
    }

    pub const fn boost_plan(&self) -> Option<&BoostPlan> {
        self.boost_plan.as_ref()
    }

    pub const fn runtime(&self) -> Option<Runtime> {
        self.runtime
    }

    pub const fn status(&self) -> &Status {
        &self.status
    }

    /// Restores the persisted state and primes the profiles.
    #[instrument(skip_all)]
    pub async fn start(&mut self, now: DateTime<Local>) {
        info!("starting…");
        self.restore();
        if let Some(first_hour) = self.forecast.first_hour() {
            // Pretend the cache has just been fetched, so that the daily gating is honored:
            self.forecast_refreshed_at =
                first_hour.start().map(|start| start - TimeDelta::hours(1));
        }
        self.update_load_profile(now).await;
        self.refresh_telemetry(now).await;
        self.next_hourly_update_at = Some(top_of_hour(now) + TimeDelta::minutes(10));
    }

    fn restore(&mut self) {
        let store = &self.collaborators.store;
        match store.load_shading() {
            Ok(shading) => self.shading = shading.unwrap_or_default(),
            Err(error) => {
                error!("failed to load the shading profile: {error:#}");
                self.status.store = LinkStatus::Fault;
            }
        }
        match store.load_forecast() {
            Ok(forecast) => self.forecast = forecast.unwrap_or_default(),
            Err(error) => {
                error!("failed to load the cached forecast: {error:#}");
                self.status.store = LinkStatus::Fault;
            }
        }
        info!(n_forecast_hours = self.forecast.len(), "restored the state");
    }

    /// Fast cadence: fetch the live readings and re-estimate the runtime.
    #[instrument(skip_all)]
    pub async fn refresh_telemetry(&mut self, now: DateTime<Local>) {
        self.update_efficiency(now).await;
        let outcome = self.collaborators.inverter.fetch_telemetry().await;
        self.status.inverter = LinkStatus::from_outcome(&outcome);
        match outcome {
            Ok(telemetry) => {
                self.status.plant = telemetry.plant_status;
                self.status.device = telemetry.inverter_status;
                self.battery = BatteryState::accept(self.battery, &telemetry);
                self.telemetry = Some(telemetry);
            }
            Err(error) => {
                error!("failed to fetch the telemetry: {error:#}");
            }
        }
        self.update_runtime(now);
    }

    /// Slow cadence: runs the hourly pass, unless it is not due yet.
    ///
    /// Returns whether the pass has run.
    pub async fn hourly_update(&mut self, now: DateTime<Local>) -> bool {
        if self.next_hourly_update_at.is_some_and(|due_at| now < due_at) {
            debug!(next_hourly_update_at = ?self.next_hourly_update_at, "not due yet");
            return false;
        }
        self.hourly_pass(now, false).await;
        self.next_hourly_update_at = Some(top_of_hour(now) + TimeDelta::minutes(70));
        true
    }

    /// Runs the hourly stages in order, optionally forcing the forecast refresh.
    #[instrument(skip_all, fields(now = %now.format("%H:%M")))]
    pub async fn hourly_pass(&mut self, now: DateTime<Local>, force_refresh: bool) {
        info!("running…");
        self.update_load_profile(now).await;
        self.update_shading(now).await;
        if self.refresh_forecast(now, force_refresh).await {
            self.save_forecast();
            self.plan_boost(now);
            self.write_boost().await;
        }
        self.update_runtime(now);
        info!("completed");
    }

    async fn update_load_profile(&mut self, now: DateTime<Local>) {
        let today = now.date_naive();
        if !self.load.is_due(today) {
            return;
        }
        let Some(midnight) = HourStamp::new(today, 0).start() else {
            warn!(%today, "midnight does not exist locally, skipping the load profile");
            return;
        };
        let interval = Interval::trailing(midnight, self.settings.history_window());
        let outcome = self.collaborators.statistics.hourly_means(Stream::Load, interval).await;
        self.status.statistics = LinkStatus::from_outcome(&outcome);
        match outcome {
            Ok(samples) => {
                self.load.update(today, &samples);
            }
            Err(error) => {
                error!("failed to fetch the load history: {error:#}");
            }
        }
    }

    /// Learns shading from the hour that has just ended.
    async fn update_shading(&mut self, now: DateTime<Local>) {
        let Some(battery) = self.battery else {
            debug!("no battery reading yet, skipping shading");
            return;
        };
        let stamp = HourStamp::from(now).previous();
        let forecast = self.forecast.target(stamp, self.settings.percentile);
        if forecast.estimate <= KilowattHours::ZERO {
            debug!(%stamp, "no production was forecast, skipping shading");
            return;
        }
        let Some(interval) = Interval::of_hour(stamp) else {
            return;
        };
        let outcome = self.collaborators.statistics.hourly_means(Stream::Solar, interval).await;
        self.status.statistics = LinkStatus::from_outcome(&outcome);
        let samples = match outcome {
            Ok(samples) => samples,
            Err(error) => {
                error!("failed to fetch the solar history: {error:#}");
                return;
            }
        };
        let Some(realized) = mean_power(&samples) else {
            debug!(%stamp, "no solar history, skipping shading");
            return;
        };
        let observation = Observation {
            hour: stamp.hour,
            realized,
            forecast,
            state_of_charge: battery.state_of_charge,
        };
        if self.settings.shading.learn(&mut self.shading, &observation).is_some() {
            let outcome = self.collaborators.store.save_shading(&self.shading);
            self.status.store = LinkStatus::from_outcome(&outcome);
            if let Err(error) = outcome {
                error!("failed to save the shading profile: {error:#}");
            }
        }
    }

    /// Replaces the forecast wholesale if the refresh is due and succeeds.
    async fn refresh_forecast(&mut self, now: DateTime<Local>, force: bool) -> bool {
        if !force
            && !is_refresh_due(self.forecast_refreshed_at, now, self.settings.forecast_refresh_hour)
        {
            debug!(refreshed_at = ?self.forecast_refreshed_at, "forecast is up to date");
            return false;
        }
        self.forecast_refreshed_at = Some(now);
        let outcome = self.collaborators.feed.fetch().await;
        self.status.forecast = LinkStatus::from_outcome(&outcome);
        let rows = match outcome {
            Ok(rows) => rows,
            Err(error) => {
                error!("failed to fetch the forecast: {error:#}");
                return false;
            }
        };
        let forecast = Forecast::resample(rows);
        if forecast.is_empty() {
            error!("the forecast is empty, keeping the previous one");
            self.status.forecast = LinkStatus::Fault;
            return false;
        }
        info!(n_hours = forecast.len(), first_hour = ?forecast.first_hour(), "refreshed the forecast");
        self.forecast = forecast;
        true
    }

    fn save_forecast(&mut self) {
        let outcome = self.collaborators.store.save_forecast(&self.forecast);
        self.status.store = LinkStatus::from_outcome(&outcome);
        if let Err(error) = outcome {
            error!("failed to save the forecast: {error:#}");
        }
    }

    /// Sizes the boost for the upcoming off-peak window.
    ///
    /// The capacity comes from the latest telemetry, even if its state of charge was rejected.
    fn plan_boost(&mut self, now: DateTime<Local>) {
        let capacity = match &self.telemetry {
            Some(telemetry) => telemetry.parameters.capacity.or_unit(),
            None => {
                warn!("no telemetry yet, assuming one watt-hour per percent");
                WattHoursPerPercent::ZERO.or_unit()
            }
        };
        let Some(date) = boost_date(now, self.settings.day_start_hour) else {
            return;
        };
        let plan = GridBoostPlanner::builder()
            .model(self.energy_model())
            .efficiency(self.efficiency)
            .capacity(capacity)
            .min_state_of_charge(self.settings.min_state_of_charge)
            .day_start_hour(self.settings.day_start_hour)
            .build()
            .plan(date);
        for step in &plan.steps {
            debug!(
                hour = step.hour,
                pv = %step.pv,
                shading = step.shading,
                load = %step.load,
                net = %step.net,
                delta = ?step.delta,
                state_of_charge = %step.state_of_charge,
                "replay",
            );
        }
        self.boost_plan = Some(plan);
    }

    /// Writes the boost setting through to the inverter according to the boost mode.
    async fn write_boost(&mut self) {
        let Some(plan) = &self.boost_plan else {
            return;
        };
        let Some(setting) =
            self.settings.boost_mode.setting(plan.target_state_of_charge, self.settings.manual_boost)
        else {
            info!(target = plan.target_state_of_charge, "testing mode, not writing the boost");
            return;
        };
        let outcome = self.collaborators.inverter.write_boost(setting).await;
        self.status.inverter = LinkStatus::from_outcome(&outcome);
        if let Err(error) = outcome {
            error!("failed to write the boost setting: {error:#}");
        }
    }

    async fn update_efficiency(&mut self, now: DateTime<Local>) {
        let month = (now.year(), now.month());
        if self.efficiency_month == Some(month) {
            return;
        }
        match self.collaborators.inverter.fetch_lifetime_totals().await {
            Ok(totals) => {
                self.efficiency = Efficiency::estimate(&totals, self.settings.default_efficiency);
                self.efficiency_month = Some(month);
                info!(efficiency = self.efficiency.0, "estimated the efficiency");
            }
            Err(error) => {
                warn!("failed to fetch the lifetime totals: {error:#}");
            }
        }
    }

    fn update_runtime(&mut self, now: DateTime<Local>) {
        let Some(battery) = self.battery else {
            return;
        };
        let runtime = DepletionSimulator::builder()
            .model(self.energy_model())
            .efficiency(self.efficiency)
            .build()
            .run(battery.usable_energy(), HourStamp::from(now));
        debug!(%runtime, "estimated the runtime");
        self.runtime = Some(runtime);
    }

    fn energy_model(&self) -> EnergyModel<'_> {
        EnergyModel::builder()
            .forecast(&self.forecast)
            .percentile(self.settings.percentile)
            .shading(&self.shading)
            .load(self.load.profile())
            .build()
    }

    pub fn summary(&self, now: DateTime<Local>) -> Summary {
        let tomorrow = now.date_naive().checked_add_days(Days::new(1));
        Summary {
            state_of_charge: self.battery.map(|battery| battery.state_of_charge),
            usable_energy: self.battery.map(|battery| battery.usable_energy()),
            telemetry: self.telemetry.as_ref().map(TelemetrySummary::from),
            runtime: self.runtime,
            runtime_hours: self.runtime.and_then(Runtime::hours),
            exhausted_at: self.runtime.and_then(|runtime| runtime.exhausted_at(now)),
            efficiency: self.efficiency,
            current_pv_estimate: self
                .forecast
                .target(HourStamp::from(now), self.settings.percentile)
                .estimate,
            tomorrow_pv_total: tomorrow.map_or(KilowattHours::ZERO, |tomorrow| {
                self.forecast.total_on(tomorrow, self.settings.percentile)
            }),
            boost_mode: self.settings.boost_mode.to_string(),
            boost_target: self.boost_plan.as_ref().map(|plan| plan.target_state_of_charge),
            boost_date: self.boost_plan.as_ref().map(|plan| plan.date),
            load_profile_computed_on: self.load.computed_on(),
            forecast_refreshed_at: self.forecast_refreshed_at,
            status: self.status,
            load: self.load.profile().iter().collect(),
            shading: self.shading.iter().collect(),
        }
    }
}

/// Day of the upcoming off-peak window.
fn boost_date(now: DateTime<Local>, day_start_hour: u32) -> Option<NaiveDate> {
    let today = now.date_naive();
    if now.hour() < day_start_hour { Some(today) } else { today.checked_add_days(Days::new(1)) }
}

fn top_of_hour(now: DateTime<Local>) -> DateTime<Local> {
    now.duration_trunc(TimeDelta::hours(1)).unwrap_or(now)
}

fn mean_power(samples: &[HourlyMean]) -> Option<Watts> {
    if samples.is_empty() {
        return None;
    }
    #[expect(clippy::cast_precision_loss)]
    let n_samples = samples.len() as f64;
    Some(samples.iter().map(|sample| sample.mean).sum::<Watts>() / n_samples)
}
