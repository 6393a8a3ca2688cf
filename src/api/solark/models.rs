use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::prelude::*;

/// Generic Sol-Ark cloud response envelope.
#[derive(Deserialize)]
pub struct Response<R> {
    /// Non-zero when the request failed.
    pub code: i64,

    #[serde(rename = "msg", default)]
    pub message: String,

    pub data: Option<R>,
}

impl<R> Response<R> {
    pub fn into_data(self) -> Result<R> {
        if self.code != 0 {
            bail!("Sol-Ark cloud error #{}: {}", self.code, self.message);
        }
        self.data.ok_or_else(|| anyhow!("Sol-Ark cloud returned no data: {}", self.message))
    }

    /// Setting writes report success only via the message.
    pub fn ensure_success(&self) -> Result {
        ensure!(self.message == "Success", "Sol-Ark cloud refused: `{}`", self.message);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum TokenRequest<'a> {
    Password { username: &'a str, password: &'a str, client_id: &'a str },
    RefreshToken { refresh_token: &'a str },
}

#[derive(Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,

    /// Seconds.
    pub expires_in: i64,
}

#[derive(Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub infos: Vec<T>,
}

#[derive(Deserialize)]
pub struct PlantInfo {
    pub id: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default = "unknown_status")]
    pub status: i64,
}

#[derive(Deserialize)]
pub struct InverterInfo {
    #[serde(rename = "sn")]
    pub serial_number: String,

    #[serde(default)]
    pub model: String,

    #[serde(default = "unknown_status")]
    pub status: i64,
}

const fn unknown_status() -> i64 {
    -1
}

/// Real-time power flow of the plant, in watts and percent.
#[serde_as]
#[derive(Deserialize)]
pub struct Flow {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub soc: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "battPower", default)]
    pub battery_power: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "pvPower", default)]
    pub pv_power: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "gridOrMeterPower", default)]
    pub grid_power: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "loadOrEpsPower", default)]
    pub load_power: f64,
}

/// Subset of the inverter settings the planner cares about.
#[serde_as]
#[derive(Deserialize)]
pub struct Settings {
    /// Boost target of the first time-of-use block.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "cap1")]
    pub boost_state_of_charge: f64,

    /// Start of the first time-of-use block, `HH:MM`.
    #[serde(rename = "sellTime1")]
    pub boost_start: String,

    /// Amp-hours.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "batteryCap")]
    pub battery_capacity: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "floatVolt")]
    pub float_voltage: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "batteryShutdownCap")]
    pub shutdown: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "batteryLowCap")]
    pub low_warning: f64,
}

#[derive(Serialize)]
pub struct WriteBoostRequest<'a> {
    #[serde(rename = "sellTime1")]
    pub boost_start: &'a str,

    #[serde(rename = "cap1")]
    pub state_of_charge: String,

    #[serde(rename = "time1on")]
    pub is_enabled: bool,
}

/// Lifetime counters are in kilowatt-hours.
#[serde_as]
#[derive(Deserialize)]
pub struct BatteryTotals {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "etotalChg", default)]
    pub charge: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "etotalDischg", default)]
    pub discharge: f64,
}

#[serde_as]
#[derive(Deserialize)]
pub struct InputTotals {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "etotal", default)]
    pub pv: f64,
}

#[serde_as]
#[derive(Deserialize)]
pub struct GridTotals {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "etotalFrom", default)]
    pub import: f64,
}

#[serde_as]
#[derive(Deserialize)]
pub struct LoadTotals {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "totalUsed", default)]
    pub used: f64,
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_deserialize_flow_ok() -> Result {
        // language=JSON
        const RESPONSE: &str = r#"
            {
                "code": 0,
                "msg": "Success",
                "data": {
                    "pvPower": 2310,
                    "battPower": -1200,
                    "gridOrMeterPower": 12,
                    "loadOrEpsPower": 1122,
                    "soc": 57.0,
                    "pvTo": true,
                    "toBat": true
                },
                "success": true
            }
        "#;
        let flow = serde_json::from_str::<Response<Flow>>(RESPONSE)?.into_data()?;
        assert_abs_diff_eq!(flow.soc, 57.0);
        assert_abs_diff_eq!(flow.battery_power, -1200.0);
        assert_abs_diff_eq!(flow.pv_power, 2310.0);
        assert_abs_diff_eq!(flow.load_power, 1122.0);
        Ok(())
    }

    #[test]
    fn test_deserialize_settings_ok() -> Result {
        // language=JSON
        const RESPONSE: &str = r#"
            {
                "code": 0,
                "msg": "Success",
                "data": {
                    "cap1": "35",
                    "sellTime1": "00:03",
                    "sellTime2": "06:00",
                    "batteryCap": "400",
                    "floatVolt": "55.2",
                    "batteryShutdownCap": "1",
                    "batteryLowCap": "20"
                }
            }
        "#;
        let settings = serde_json::from_str::<Response<Settings>>(RESPONSE)?.into_data()?;
        assert_abs_diff_eq!(settings.boost_state_of_charge, 35.0);
        assert_eq!(settings.boost_start, "00:03");
        assert_abs_diff_eq!(settings.battery_capacity, 400.0);
        assert_abs_diff_eq!(settings.float_voltage, 55.2);
        assert_abs_diff_eq!(settings.shutdown, 1.0);
        Ok(())
    }

    #[test]
    fn error_code_fails() -> Result {
        // language=JSON
        const RESPONSE: &str = r#"{"code": 102, "msg": "token expired", "data": null}"#;
        let response = serde_json::from_str::<Response<Flow>>(RESPONSE)?;
        assert!(response.into_data().is_err());
        Ok(())
    }

    #[test]
    fn write_requires_success_message() -> Result {
        let response =
            serde_json::from_str::<Response<serde_json::Value>>(r#"{"code": 0, "msg": "Failed"}"#)?;
        assert!(response.ensure_success().is_err());
        let response =
            serde_json::from_str::<Response<serde_json::Value>>(r#"{"code": 0, "msg": "Success"}"#)?;
        response.ensure_success()?;
        Ok(())
    }

    #[test]
    fn test_serialize_token_requests() -> Result {
        let request =
            TokenRequest::Password { username: "user", password: "secret", client_id: "csp-web" };
        assert_eq!(
            serde_json::to_value(&request)?,
            serde_json::json!({
                "grant_type": "password",
                "username": "user",
                "password": "secret",
                "client_id": "csp-web",
            }),
        );
        let request = TokenRequest::RefreshToken { refresh_token: "refresh" };
        assert_eq!(
            serde_json::to_value(&request)?,
            serde_json::json!({"grant_type": "refresh_token", "refresh_token": "refresh"}),
        );
        Ok(())
    }
}
