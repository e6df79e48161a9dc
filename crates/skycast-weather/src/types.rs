//! Raw provider shapes.
//!
//! Every field defaults so a response missing optional data still decodes;
//! the mapper treats the zero value as "absent".

use serde::{Deserialize, Serialize};

/// What to ask the provider about.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Coordinates(Coordinates),
    Place(String),
}

impl Query {
    pub fn place(name: impl Into<String>) -> Self {
        Self::Place(name.into())
    }

    /// Value of the provider's `q` parameter
    pub fn as_param(&self) -> String {
        match self {
            Self::Place(name) => name.clone(),
            Self::Coordinates(c) => format!("{},{}", c.latitude, c.longitude),
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_param())
    }
}

/// Geographic location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConditionDto {
    pub text: String,
    pub icon: String,
    pub code: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocationDto {
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub tz_id: String,
    pub localtime_epoch: i64,
    /// Provider local time, `YYYY-MM-DD HH:MM` (24-hour)
    pub localtime: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CurrentDto {
    pub last_updated_epoch: i64,
    pub temp_c: f64,
    pub temp_f: f64,
    pub is_day: i32,
    pub condition: ConditionDto,
    pub wind_mph: f64,
    pub wind_kph: f64,
    pub wind_dir: String,
    pub pressure_mb: f64,
    pub pressure_in: f64,
    pub precip_mm: f64,
    pub precip_in: f64,
    pub humidity: i32,
    pub feelslike_c: f64,
    pub feelslike_f: f64,
    pub uv: f64,
}

/// `current.json`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CurrentResponse {
    pub location: LocationDto,
    pub current: CurrentDto,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DayDto {
    pub maxtemp_c: f64,
    pub maxtemp_f: f64,
    pub mintemp_c: f64,
    pub mintemp_f: f64,
    pub avgtemp_c: f64,
    pub avgtemp_f: f64,
    pub maxwind_mph: f64,
    pub maxwind_kph: f64,
    pub totalprecip_mm: f64,
    pub totalprecip_in: f64,
    pub totalsnow_cm: f64,
    pub avghumidity: f64,
    pub daily_will_it_rain: i32,
    pub daily_chance_of_rain: i32,
    pub daily_will_it_snow: i32,
    pub daily_chance_of_snow: i32,
    pub condition: ConditionDto,
    pub uv: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AstroDto {
    /// `hh:mm AM`
    pub sunrise: String,
    pub sunset: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HourDto {
    pub time_epoch: i64,
    /// `YYYY-MM-DD HH:MM` (24-hour)
    pub time: String,
    pub temp_c: f64,
    pub temp_f: f64,
    pub is_day: i32,
    pub condition: ConditionDto,
    pub wind_mph: f64,
    pub wind_kph: f64,
    pub pressure_mb: f64,
    pub pressure_in: f64,
    pub precip_mm: f64,
    pub precip_in: f64,
    pub humidity: i32,
    pub will_it_rain: i32,
    pub chance_of_rain: i32,
    pub will_it_snow: i32,
    pub chance_of_snow: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForecastDayDto {
    /// `YYYY-MM-DD`
    pub date: String,
    pub date_epoch: i64,
    pub day: DayDto,
    pub astro: AstroDto,
    pub hour: Vec<HourDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForecastDto {
    pub forecastday: Vec<ForecastDayDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertDto {
    pub headline: String,
    pub category: String,
    pub severity: String,
    pub event: String,
    pub areas: String,
    pub desc: String,
    pub instruction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertsDto {
    pub alert: Vec<AlertDto>,
}

/// `forecast.json`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForecastResponse {
    pub location: LocationDto,
    pub current: CurrentDto,
    pub forecast: ForecastDto,
    pub alerts: AlertsDto,
}

/// One `search.json` match
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaceDto {
    pub id: i64,
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub url: String,
}

/// Error envelope returned with non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Location service errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location error: {0}")]
    Other(String),
}
