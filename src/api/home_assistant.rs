//! [Home Assistant](https://www.home-assistant.io) history client.

use std::{collections::BTreeMap, iter};

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, Local, TimeDelta};
use itertools::Itertools;
use reqwest::{
    Client,
    Url,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use serde_with::serde_as;

use crate::{
    api::{HistoricalStats, Stream},
    core::{interval::Interval, load::HourlyMean},
    prelude::*,
    quantity::{energy::WattHours, power::Watts},
};

pub struct Entities {
    pub load: String,
    pub solar: String,
}

pub struct Api {
    client: Client,
    base_url: Url,
    entities: Entities,
}

impl Api {
    pub fn try_new(access_token: &str, base_url: Url, entities: Entities) -> Result<Self> {
        let headers = HeaderMap::from_iter([(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}"))?,
        )]);
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .default_headers(headers)
            .build()?;
        Ok(Self { client, base_url, entities })
    }

    fn entity_id(&self, stream: Stream) -> &str {
        match stream {
            Stream::Load => self.entities.load.as_str(),
            Stream::Solar => self.entities.solar.as_str(),
        }
    }

    #[instrument(skip_all, fields(entity_id = entity_id))]
    async fn get_history(&self, entity_id: &str, interval: Interval) -> Result<EntitiesHistory> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("invalid base URL"))?
            .push("history")
            .push("period")
            .push(&interval.start.to_rfc3339());
        url.query_pairs_mut()
            .append_pair("filter_entity_id", entity_id)
            .append_pair("end_time", &interval.end.to_rfc3339())
            .append_pair("no_attributes", "true");
        info!("fetching…");
        let history = self
            .client
            .get(url)
            .send()
            .await
            .context("failed to call Home Assistant")?
            .error_for_status()?
            .json::<EntitiesHistory>()
            .await
            .context("failed to deserialize the history")?;
        info!(n_entities = history.0.len(), "fetched");
        Ok(history)
    }
}

#[async_trait]
impl HistoricalStats for Api {
    async fn hourly_means(&self, stream: Stream, interval: Interval) -> Result<Vec<HourlyMean>> {
        let history = self.get_history(self.entity_id(stream), interval).await?;
        Ok(history.hourly_means(interval))
    }
}

#[must_use]
#[derive(Deserialize)]
struct EntitiesHistory(Vec<EntityHistory>);

#[must_use]
#[serde_as]
#[derive(Deserialize)]
struct EntityHistory(#[serde_as(as = "serde_with::VecSkipError<_>")] Vec<State>);

#[must_use]
#[serde_as]
#[derive(Copy, Clone, Deserialize)]
struct State {
    #[serde(rename = "last_changed")]
    last_changed_at: DateTime<Local>,

    #[serde_as(as = "serde_with::DisplayFromStr")]
    #[serde(rename = "state")]
    value: Watts,
}

impl EntitiesHistory {
    /// Time-weighted mean power within each local hour of the interval.
    ///
    /// Each state holds until the next change or the end of the interval,
    /// so a steady sensor still covers every hour after its last change.
    fn hourly_means(self, interval: Interval) -> Vec<HourlyMean> {
        let mut hours: BTreeMap<DateTime<Local>, (WattHours, TimeDelta)> = BTreeMap::new();
        for entity in self.0 {
            let segments = entity
                .0
                .into_iter()
                .sorted_by_key(|state| state.last_changed_at)
                .map(|state| (state.last_changed_at, state.value))
                .chain(iter::once((interval.end, Watts::ZERO)))
                .tuple_windows();
            for ((since, value), (until, _)) in segments {
                let mut from = since.max(interval.start);
                let until = until.min(interval.end);
                while from < until {
                    let Ok(hour_start) = from.duration_trunc(TimeDelta::hours(1)) else {
                        break;
                    };
                    let to = (hour_start + TimeDelta::hours(1)).min(until);
                    if to <= from {
                        break;
                    }
                    let (energy, duration) =
                        hours.entry(hour_start).or_insert((WattHours::ZERO, TimeDelta::zero()));
                    *energy += value * (to - from);
                    *duration += to - from;
                    from = to;
                }
            }
        }
        hours
            .into_iter()
            .filter(|(_, (_, duration))| *duration > TimeDelta::zero())
            .map(|(start, (energy, duration))| HourlyMean { start, mean: energy / duration })
            .collect()
    }
}
