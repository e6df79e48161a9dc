//! Weather data for Skycast
//!
//! Provider DTOs, the `Outcome` wrapper used at every network boundary, the
//! HTTP client, and the pure mapping layer that turns provider data into
//! unit-resolved, themed domain objects.

pub mod client;
pub mod domain;
pub mod location;
pub mod mapper;
pub mod outcome;
pub mod theme;
pub mod types;

pub use client::{WeatherApi, WeatherApiClient};
pub use domain::{Alert, DailyForecast, DayStats, ForecastDay, ForecastHour, Place, WeatherSnapshot};
pub use location::{DeviceLocation, FixedLocation};
pub use mapper::{MapOptions, Mapper};
pub use outcome::Outcome;
pub use theme::{Color, Theme};
pub use types::*;
