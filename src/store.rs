use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    core::{
        forecast::{Forecast, ForecastPoint},
        hour::HourStamp,
        shading::ShadingProfile,
    },
    prelude::*,
    quantity::energy::KilowattHours,
};

/// State that must survive restarts.
///
/// Loading returns [`None`] when nothing has been saved yet.
pub trait DurableStore: Send + Sync {
    fn load_shading(&self) -> Result<Option<ShadingProfile>>;

    fn save_shading(&self, shading: &ShadingProfile) -> Result;

    fn load_forecast(&self) -> Result<Option<Forecast>>;

    fn save_forecast(&self, forecast: &Forecast) -> Result;
}

/// TOML files in a state directory.
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn try_new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)
            .with_context(|| format!("failed to create `{}`", directory.display()))?;
        Ok(Self { directory })
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        read_from(self.directory.join(name))
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result {
        write_to(self.directory.join(name), value)
    }
}

#[instrument(level = Level::DEBUG)]
fn read_from<T: DeserializeOwned, P: AsRef<Path> + Debug>(path: P) -> Result<Option<T>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Ok(None);
    }
    let contents = fs::read(path).with_context(|| format!("failed to read `{}`", path.display()))?;
    Ok(Some(
        toml::from_slice(&contents)
            .with_context(|| format!("failed to parse `{}`", path.display()))?,
    ))
}

#[instrument(skip(value), level = Level::DEBUG)]
fn write_to<T: Serialize, P: AsRef<Path> + Debug>(path: P, value: &T) -> Result {
    let path = path.as_ref();
    fs::write(path, toml::to_string(value)?)
        .with_context(|| format!("failed to write `{}`", path.display()))
}

impl DurableStore for FileStore {
    fn load_shading(&self) -> Result<Option<ShadingProfile>> {
        self.read("shading.toml")
    }

    fn save_shading(&self, shading: &ShadingProfile) -> Result {
        self.write("shading.toml", shading)
    }

    fn load_forecast(&self) -> Result<Option<Forecast>> {
        Ok(self.read::<ForecastCache>("forecast.toml")?.map(Forecast::from))
    }

    fn save_forecast(&self, forecast: &Forecast) -> Result {
        self.write("forecast.toml", &ForecastCache::from(forecast))
    }
}

/// TOML tables must be keyed by strings, so the forecast is stored as a flat list.
#[derive(Serialize, Deserialize)]
struct ForecastCache {
    #[serde(default, rename = "point")]
    points: Vec<CachedPoint>,
}

#[derive(Serialize, Deserialize)]
struct CachedPoint {
    date: NaiveDate,
    hour: u32,
    low: KilowattHours,
    mid: KilowattHours,
    high: KilowattHours,
}

impl From<&Forecast> for ForecastCache {
    fn from(forecast: &Forecast) -> Self {
        let points = forecast
            .iter()
            .map(|(stamp, point)| CachedPoint {
                date: stamp.date,
                hour: stamp.hour,
                low: point.low,
                mid: point.mid,
                high: point.high,
            })
            .collect();
        Self { points }
    }
}

impl From<ForecastCache> for Forecast {
    fn from(cache: ForecastCache) -> Self {
        cache
            .points
            .into_iter()
            .filter(|point| point.hour < 24)
            .map(|point| {
                (
                    HourStamp::new(point.date, point.hour),
                    ForecastPoint { low: point.low, mid: point.mid, high: point.high },
                )
            })
            .collect()
    }
}
