//! Scheduled notification workers.

pub mod local_forecast;
pub mod precipitation;

pub use local_forecast::LocalForecastWorker;
pub use precipitation::{decide, Precipitation, PrecipitationMessage, PrecipitationWorker};
