//! [Solcast](https://solcast.com) rooftop site forecast client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    api::{ForecastFeed, client},
    core::forecast::{ForecastPoint, ForecastRow},
    prelude::*,
    quantity::energy::KilowattHours,
};

pub struct Api {
    client: Client,
    api_key: String,
    url: Url,
}

impl Api {
    pub fn try_new(api_key: &str, resource_id: &str) -> Result<Self> {
        let mut url = Url::parse("https://api.solcast.com.au/rooftop_sites")?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("invalid base URL"))?
            .push(resource_id)
            .push("forecasts");
        url.query_pairs_mut().append_pair("format", "json");
        Ok(Self { client: client::try_new()?, api_key: api_key.to_owned(), url })
    }
}

#[async_trait]
impl ForecastFeed for Api {
    #[instrument(skip_all)]
    async fn fetch(&self) -> Result<Vec<ForecastRow>> {
        info!("fetching…");
        let response = self
            .client
            .get(self.url.clone())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("failed to call Solcast")?
            .error_for_status()
            .context("Solcast request failed")?
            .json::<ForecastsResponse>()
            .await
            .context("failed to deserialize the Solcast response")?;
        ensure!(!response.forecasts.is_empty(), "Solcast returned an empty forecast");
        info!(n_rows = response.forecasts.len(), "fetched");
        Ok(response.forecasts.into_iter().map(ForecastRow::from).collect())
    }
}

#[derive(Deserialize)]
struct ForecastsResponse {
    forecasts: Vec<Forecast>,
}

/// Mean power over the period, which ends at `period_end`.
#[derive(Deserialize)]
struct Forecast {
    #[serde(rename = "pv_estimate10")]
    low: KilowattHours,

    #[serde(rename = "pv_estimate")]
    mid: KilowattHours,

    #[serde(rename = "pv_estimate90")]
    high: KilowattHours,

    period_end: DateTime<Utc>,
}

impl From<Forecast> for ForecastRow {
    fn from(forecast: Forecast) -> Self {
        Self {
            period_end: forecast.period_end,
            point: ForecastPoint { low: forecast.low, mid: forecast.mid, high: forecast.high },
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_deserialize_forecasts_ok() -> Result {
        // language=JSON
        const RESPONSE: &str = r#"
            {
                "forecasts": [
                    {
                        "pv_estimate": 1.2544,
                        "pv_estimate10": 0.4515,
                        "pv_estimate90": 1.6103,
                        "period_end": "2025-06-01T11:30:00.0000000Z",
                        "period": "PT30M"
                    },
                    {
                        "pv_estimate": 0,
                        "pv_estimate10": 0,
                        "pv_estimate90": 0,
                        "period_end": "2025-06-01T21:00:00.0000000Z",
                        "period": "PT30M"
                    }
                ]
            }
        "#;
        let response = serde_json::from_str::<ForecastsResponse>(RESPONSE)?;
        let rows: Vec<ForecastRow> = response.forecasts.into_iter().map(ForecastRow::from).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].period_end, Utc.with_ymd_and_hms(2025, 6, 1, 11, 30, 0).unwrap());
        assert_abs_diff_eq!(rows[0].point.low, KilowattHours(0.4515));
        assert_abs_diff_eq!(rows[0].point.mid, KilowattHours(1.2544));
        assert_abs_diff_eq!(rows[0].point.high, KilowattHours(1.6103));
        assert_abs_diff_eq!(rows[1].point.high, KilowattHours::ZERO);
        Ok(())
    }

    #[test]
    fn url_includes_resource() -> Result {
        let api = Api::try_new("secret", "abcd-1234")?;
        assert_eq!(api.url.path(), "/rooftop_sites/abcd-1234/forecasts");
        assert_eq!(api.url.query(), Some("format=json"));
        Ok(())
    }
}
