//! [Sol-Ark cloud](https://solarkcloud.com) client.

mod models;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta};
use reqwest::{Client, Url};
use serde::{Serialize, de::DeserializeOwned};

use self::models::{
    BatteryTotals,
    Flow,
    GridTotals,
    InputTotals,
    InverterInfo,
    LoadTotals,
    Page,
    PlantInfo,
    Response,
    Settings,
    Token,
    TokenRequest,
    WriteBoostRequest,
};
use crate::{
    api::{InverterTelemetry, client},
    core::{
        battery::{BatteryParameters, Telemetry},
        boost_mode::BoostSetting,
        efficiency::LifetimeTotals,
        status::{InverterStatus, PlantStatus},
    },
    prelude::*,
    quantity::{
        energy::KilowattHours,
        power::Watts,
        proportions::{Percent, WattHoursPerPercent},
    },
};

const CLIENT_ID: &str = "csp-web";

/// Fallback start of the boost window, until the settings have been read.
const DEFAULT_BOOST_START: &str = "00:03";

pub struct Credentials {
    pub username: String,
    pub password: String,
}

struct Session {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Local>,
}

impl Session {
    /// Renew an hour ahead, so that the token does not expire in the middle of a pass.
    fn needs_renewal(&self, now: DateTime<Local>) -> bool {
        now + TimeDelta::hours(1) >= self.expires_at
    }
}

impl From<Token> for Session {
    fn from(token: Token) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Local::now() + TimeDelta::seconds(token.expires_in),
        }
    }
}

/// The plant and its master inverter, discovered once per session.
#[derive(Clone)]
struct Device {
    plant_id: i64,
    serial_number: String,
    plant_status: PlantStatus,
    inverter_status: InverterStatus,
}

pub struct Api {
    client: Client,
    base_url: Url,
    credentials: Credentials,
    session: Option<Session>,
    device: Option<Device>,
    boost_start: String,
}

impl Api {
    pub fn try_new(base_url: Url, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            client: client::try_new()?,
            base_url,
            credentials,
            session: None,
            device: None,
            boost_start: DEFAULT_BOOST_START.to_owned(),
        })
    }

    /// Returns a valid access token, renewing or re-establishing the session when needed.
    async fn access_token(&mut self) -> Result<String> {
        let refresh_token = match &self.session {
            Some(session) if !session.needs_renewal(Local::now()) => {
                return Ok(session.access_token.clone());
            }
            Some(session) => Some(session.refresh_token.clone()),
            None => None,
        };
        if let Some(refresh_token) = refresh_token {
            let request = TokenRequest::RefreshToken { refresh_token: &refresh_token };
            match self.request_token(&request).await {
                Ok(token) => {
                    info!("renewed the session");
                    let session = self.session.insert(token.into());
                    return Ok(session.access_token.clone());
                }
                Err(error) => {
                    warn!("failed to renew the session, signing in again: {error:#}");
                }
            }
        }
        let request = TokenRequest::Password {
            username: &self.credentials.username,
            password: &self.credentials.password,
            client_id: CLIENT_ID,
        };
        let token = self.request_token(&request).await.context("failed to sign in")?;
        info!("signed in");
        self.device = None;
        let session = self.session.insert(token.into());
        Ok(session.access_token.clone())
    }

    #[instrument(skip_all, level = Level::DEBUG)]
    async fn request_token(&self, request: &TokenRequest<'_>) -> Result<Token> {
        self.client
            .post(self.base_url.join("oauth/token")?)
            .json(request)
            .send()
            .await
            .context("failed to call the token endpoint")?
            .error_for_status()?
            .json::<Response<Token>>()
            .await
            .context("failed to deserialize the token response")?
            .into_data()
    }

    /// Finds the first plant and its first (master) inverter.
    async fn device(&mut self) -> Result<Device> {
        if let Some(device) = &self.device {
            return Ok(device.clone());
        }
        let plant = self
            .get::<Page<PlantInfo>>("api/v1/plants?page=1&limit=10&name=&status=")
            .await?
            .infos
            .into_iter()
            .next()
            .context("no plants found")?;
        let inverter = self
            .get::<Page<InverterInfo>>("api/v1/inverters?page=1&limit=10&type=-1&status=1")
            .await?
            .infos
            .into_iter()
            .next()
            .context("no inverters found")?;
        info!(
            plant.id,
            plant.name = %plant.name,
            inverter.serial_number = %inverter.serial_number,
            inverter.model = %inverter.model,
            "discovered the device",
        );
        let device = Device {
            plant_id: plant.id,
            serial_number: inverter.serial_number,
            plant_status: PlantStatus::from(plant.status),
            inverter_status: InverterStatus::from(inverter.status),
        };
        self.device = Some(device.clone());
        Ok(device)
    }

    #[instrument(skip_all, level = Level::DEBUG, fields(path = path))]
    async fn get<R: DeserializeOwned>(&mut self, path: &str) -> Result<R> {
        let access_token = self.access_token().await?;
        self.client
            .get(self.base_url.join(path)?)
            .bearer_auth(access_token)
            .send()
            .await
            .with_context(|| format!("failed to call `{path}`"))?
            .error_for_status()?
            .json::<Response<R>>()
            .await
            .with_context(|| format!("failed to deserialize `{path}` response JSON"))?
            .into_data()
    }

    #[instrument(skip_all, level = Level::DEBUG, fields(path = path))]
    async fn post<B: Serialize + Sync>(&mut self, path: &str, body: &B) -> Result {
        let access_token = self.access_token().await?;
        self.client
            .post(self.base_url.join(path)?)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to call `{path}`"))?
            .error_for_status()?
            .json::<Response<serde_json::Value>>()
            .await
            .with_context(|| format!("failed to deserialize `{path}` response JSON"))?
            .ensure_success()
    }
}

#[async_trait]
impl InverterTelemetry for Api {
    #[instrument(skip_all)]
    async fn fetch_telemetry(&mut self) -> Result<Telemetry> {
        let device = self.device().await?;
        let settings: Settings =
            self.get(&format!("api/v1/common/setting/{}/read", device.serial_number)).await?;
        self.boost_start.clone_from(&settings.boost_start);
        let flow: Flow = self.get(&format!("api/v1/plant/energy/{}/flow", device.plant_id)).await?;
        let telemetry = Telemetry {
            state_of_charge: Percent(flow.soc),
            battery_power: Watts(flow.battery_power),
            pv_power: Watts(flow.pv_power),
            grid_power: Watts(flow.grid_power),
            load_power: Watts(flow.load_power),
            parameters: BatteryParameters {
                capacity: WattHoursPerPercent::from_capacity(
                    settings.battery_capacity,
                    settings.float_voltage,
                ),
                shutdown: Percent(settings.shutdown),
                low_warning: Percent(settings.low_warning),
                boost_state_of_charge: Percent(settings.boost_state_of_charge),
            },
            plant_status: device.plant_status,
            inverter_status: device.inverter_status,
        };
        debug!(
            state_of_charge = %telemetry.state_of_charge,
            pv = %telemetry.pv_power,
            load = %telemetry.load_power,
            "fetched",
        );
        Ok(telemetry)
    }

    #[instrument(skip_all)]
    async fn fetch_lifetime_totals(&mut self) -> Result<LifetimeTotals> {
        let serial_number = self.device().await?.serial_number;
        info!("fetching…");
        let battery: BatteryTotals = self
            .get(&format!(
                "api/v1/inverter/battery/{serial_number}/realtime?sn={serial_number}&lan=en"
            ))
            .await?;
        let input: InputTotals =
            self.get(&format!("api/v1/inverter/{serial_number}/realtime/input")).await?;
        let grid: GridTotals = self
            .get(&format!("api/v1/inverter/grid/{serial_number}/realtime?sn={serial_number}&lan=en"))
            .await?;
        let load: LoadTotals =
            self.get(&format!("api/v1/inverter/load/{serial_number}/realtime")).await?;
        Ok(LifetimeTotals {
            pv: KilowattHours(input.pv),
            grid_import: KilowattHours(grid.import),
            battery_charge: KilowattHours(battery.charge),
            battery_discharge: KilowattHours(battery.discharge),
            load: KilowattHours(load.used),
        })
    }

    #[instrument(skip_all, fields(state_of_charge = setting.state_of_charge, is_enabled = setting.is_enabled))]
    async fn write_boost(&mut self, setting: BoostSetting) -> Result {
        let serial_number = self.device().await?.serial_number;
        let boost_start = self.boost_start.clone();
        let request = WriteBoostRequest {
            boost_start: &boost_start,
            state_of_charge: setting.state_of_charge.to_string(),
            is_enabled: setting.is_enabled,
        };
        info!("writing…");
        self.post(&format!("api/v1/common/setting/{serial_number}/set"), &request).await?;
        info!("written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_renews_an_hour_ahead() {
        let now = Local::now();
        let session = Session {
            access_token: String::new(),
            refresh_token: String::new(),
            expires_at: now + TimeDelta::minutes(90),
        };
        assert!(!session.needs_renewal(now));
        assert!(session.needs_renewal(now + TimeDelta::minutes(30)));
    }

    #[test]
    fn endpoints_resolve_against_base() -> Result {
        let base_url = Url::parse("https://solarkcloud.com/")?;
        let url = base_url.join("api/v1/inverters?page=1&limit=10&type=-1&status=1")?;
        assert_eq!(url.path(), "/api/v1/inverters");
        assert_eq!(url.query(), Some("page=1&limit=10&type=-1&status=1"));
        Ok(())
    }
}
