//! Display-ready domain objects produced by the mapper.
//!
//! Nothing here is mutated after mapping; a new fetch produces new values.

use serde::Serialize;

use crate::theme::{Color, Gradient};

/// Current conditions for one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub location: String,
    pub region: String,
    pub country: String,
    /// Local time rendered with the chosen clock format
    pub local_time: String,
    /// Unit-selected, truncated
    pub temp: String,
    pub condition_code: i32,
    pub is_day: bool,
    pub condition_text: String,
    pub condition_icon: String,
    pub wind_speed: String,
    pub wind_dir: String,
    pub humidity: i32,
    pub feels_like: String,
    pub gradient: Gradient,
    pub text_color: Color,
    /// Secondary facts rotated by the list screen ticker
    pub ticker: Vec<String>,
}

/// Aggregates for one forecast day, both units kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayStats {
    pub max_temp_f: f64,
    pub max_temp_c: f64,
    pub min_temp_f: f64,
    pub min_temp_c: f64,
    pub avg_temp_f: f64,
    pub avg_temp_c: f64,
    pub chance_of_rain: i32,
    pub chance_of_snow: i32,
    pub avg_humidity: f64,
    pub total_precip_in: f64,
    pub total_precip_mm: f64,
    pub condition_code: i32,
    pub condition_text: String,
    pub condition_icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDay {
    /// "Today" for the first day, else the weekday name
    pub date: String,
    /// Calendar date in the chosen date format
    pub calendar_date: String,
    pub stats: DayStats,
    /// Unit-selected, truncated
    pub high: String,
    pub low: String,
    /// Unit-selected total precipitation, truncated
    pub precipitation: String,
    pub sunrise: String,
    pub sunset: String,
    pub gradient: Gradient,
    pub text_color: Color,
    pub ticker: Vec<String>,
    /// Never contains an hour that started more than an hour before mapping
    pub hours: Vec<ForecastHour>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastHour {
    pub epoch: i64,
    pub temp_f: f64,
    pub temp_c: f64,
    pub wind_mph: f64,
    pub wind_kph: f64,
    pub pressure_in: f64,
    pub pressure_mb: f64,
    pub precip_in: f64,
    pub precip_mm: f64,
    /// 0 or 1
    pub will_it_rain: u8,
    /// 0 or 1
    pub will_it_snow: u8,
    pub chance_of_rain: i32,
    pub chance_of_snow: i32,
    pub condition_code: i32,
    pub condition_text: String,
    pub condition_icon: String,
    /// Unit-selected, truncated
    pub temp: String,
    pub wind: String,
    pub precipitation: String,
    /// Time of day in the chosen clock format
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub headline: String,
    pub category: String,
    pub severity: String,
    pub event: String,
    pub areas: String,
    pub desc: String,
    pub instruction: String,
}

/// Payload of the daily screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub current: WeatherSnapshot,
    pub days: Vec<ForecastDay>,
    pub alerts: Vec<Alert>,
}

/// Search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub id: i64,
    pub name: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    /// Identifier under which the place is tracked
    pub fn identifier(&self) -> String {
        if self.region.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.region)
        }
    }
}
