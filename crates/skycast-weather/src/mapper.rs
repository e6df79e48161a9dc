//! Provider DTOs to domain objects.
//!
//! Pure and total: the same `(dto, preferences, options)` always gives the
//! same result, and malformed fields degrade to empty strings or zeros.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use skycast_core::{ClockFormat, MeasurementUnit, Preferences, TemperatureUnit, WindUnit};

use crate::domain::{
    Alert, DailyForecast, DayStats, ForecastDay, ForecastHour, Place, WeatherSnapshot,
};
use crate::theme::theme_for;
use crate::types::{
    AlertDto, CurrentDto, CurrentResponse, ForecastDayDto, ForecastResponse, HourDto, LocationDto,
    PlaceDto,
};

const PROVIDER_DATETIME: &str = "%Y-%m-%d %H:%M";
const PROVIDER_DATE: &str = "%Y-%m-%d";
const PROVIDER_ASTRO: &str = "%I:%M %p";

/// Hours that started up to this long ago are still shown.
pub const HOUR_RETENTION_SECS: i64 = 3600;

pub const TODAY: &str = "Today";

/// Inputs that are not preferences but still shape the output.
#[derive(Debug, Clone, Copy)]
pub struct MapOptions {
    /// Fetch time; hour pruning is relative to this
    pub now: DateTime<Utc>,
    /// Whether the host supports dynamic text theming
    pub platform_dynamic_theme: bool,
}

impl MapOptions {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            platform_dynamic_theme: true,
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

pub struct Mapper<'a> {
    prefs: &'a Preferences,
    options: MapOptions,
}

impl<'a> Mapper<'a> {
    pub fn new(prefs: &'a Preferences, options: MapOptions) -> Self {
        Self { prefs, options }
    }

    pub fn current(&self, dto: &CurrentResponse) -> WeatherSnapshot {
        self.snapshot(&dto.location, &dto.current)
    }

    pub fn forecast(&self, dto: &ForecastResponse) -> DailyForecast {
        let cutoff = self.options.now.timestamp() - HOUR_RETENTION_SECS;

        DailyForecast {
            current: self.snapshot(&dto.location, &dto.current),
            days: dto
                .forecast
                .forecastday
                .iter()
                .enumerate()
                .map(|(index, day)| self.day(index, day, cutoff))
                .collect(),
            alerts: dto.alerts.alert.iter().map(alert).collect(),
        }
    }

    fn snapshot(&self, location: &LocationDto, current: &CurrentDto) -> WeatherSnapshot {
        let is_day = current.is_day == 1;
        let theme = theme_for(
            current.condition.code,
            is_day,
            self.prefs.dynamic_colors,
            self.options.platform_dynamic_theme,
        );

        let local_time = render_datetime(&location.localtime, self.prefs.clock_format);
        let temp = self.temperature(current.temp_f, current.temp_c);
        let wind_speed = self.wind(current.wind_mph, current.wind_kph);
        let feels_like = self.temperature(current.feelslike_f, current.feelslike_c);

        let ticker = [
            fact(!local_time.is_empty(), || local_time.clone()),
            fact(wind_speed != "0", || {
                format!("Wind {} {} {}", wind_speed, self.prefs.wind_unit.label(), current.wind_dir)
                    .trim_end()
                    .to_string()
            }),
            fact(feels_like != "0", || format!("Feels like {}°", feels_like)),
            fact(current.humidity != 0, || format!("Humidity {}%", current.humidity)),
        ]
        .into_iter()
        .flatten()
        .collect();

        WeatherSnapshot {
            location: location.name.clone(),
            region: location.region.clone(),
            country: location.country.clone(),
            local_time,
            temp,
            condition_code: current.condition.code,
            is_day,
            condition_text: current.condition.text.clone(),
            condition_icon: icon_url(&current.condition.icon),
            wind_speed,
            wind_dir: current.wind_dir.clone(),
            humidity: current.humidity,
            feels_like,
            gradient: theme.gradient,
            text_color: theme.text_color,
            ticker,
        }
    }

    fn day(&self, index: usize, dto: &ForecastDayDto, cutoff: i64) -> ForecastDay {
        let d = &dto.day;
        let theme = theme_for(
            d.condition.code,
            true,
            self.prefs.dynamic_colors,
            self.options.platform_dynamic_theme,
        );

        let stats = DayStats {
            max_temp_f: d.maxtemp_f,
            max_temp_c: d.maxtemp_c,
            min_temp_f: d.mintemp_f,
            min_temp_c: d.mintemp_c,
            avg_temp_f: d.avgtemp_f,
            avg_temp_c: d.avgtemp_c,
            chance_of_rain: d.daily_chance_of_rain,
            chance_of_snow: d.daily_chance_of_snow,
            avg_humidity: d.avghumidity,
            total_precip_in: d.totalprecip_in,
            total_precip_mm: d.totalprecip_mm,
            condition_code: d.condition.code,
            condition_text: d.condition.text.clone(),
            condition_icon: icon_url(&d.condition.icon),
        };

        let sunrise = render_astro(&dto.astro.sunrise, self.prefs.clock_format);
        let sunset = render_astro(&dto.astro.sunset, self.prefs.clock_format);
        let avg = self.temperature(d.avgtemp_f, d.avgtemp_c);
        let humidity = truncate(d.avghumidity);

        let ticker = [
            fact(d.daily_chance_of_rain != 0, || format!("Rain {}%", d.daily_chance_of_rain)),
            fact(d.daily_chance_of_snow != 0, || format!("Snow {}%", d.daily_chance_of_snow)),
            fact(avg != "0", || format!("Avg {}°", avg)),
            fact(humidity != "0", || format!("Humidity {}%", humidity)),
            fact(!sunrise.is_empty(), || format!("Sunrise {}", sunrise)),
            fact(!sunset.is_empty(), || format!("Sunset {}", sunset)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let hours = dto
            .hour
            .iter()
            .filter(|h| h.time_epoch >= cutoff)
            .map(|h| self.hour(h))
            .collect();

        ForecastDay {
            date: day_label(index, &dto.date),
            calendar_date: NaiveDate::parse_from_str(&dto.date, PROVIDER_DATE)
                .map(|date| date.format(self.prefs.date_format.pattern()).to_string())
                .unwrap_or_default(),
            high: self.temperature(d.maxtemp_f, d.maxtemp_c),
            low: self.temperature(d.mintemp_f, d.mintemp_c),
            precipitation: self.measurement(d.totalprecip_in, d.totalprecip_mm),
            stats,
            sunrise,
            sunset,
            gradient: theme.gradient,
            text_color: theme.text_color,
            ticker,
            hours,
        }
    }

    fn hour(&self, dto: &HourDto) -> ForecastHour {
        ForecastHour {
            epoch: dto.time_epoch,
            temp_f: dto.temp_f,
            temp_c: dto.temp_c,
            wind_mph: dto.wind_mph,
            wind_kph: dto.wind_kph,
            pressure_in: dto.pressure_in,
            pressure_mb: dto.pressure_mb,
            precip_in: dto.precip_in,
            precip_mm: dto.precip_mm,
            will_it_rain: flag(dto.will_it_rain),
            will_it_snow: flag(dto.will_it_snow),
            chance_of_rain: dto.chance_of_rain,
            chance_of_snow: dto.chance_of_snow,
            condition_code: dto.condition.code,
            condition_text: dto.condition.text.clone(),
            condition_icon: icon_url(&dto.condition.icon),
            temp: self.temperature(dto.temp_f, dto.temp_c),
            wind: self.wind(dto.wind_mph, dto.wind_kph),
            precipitation: self.measurement(dto.precip_in, dto.precip_mm),
            time: render_datetime(&dto.time, self.prefs.clock_format),
        }
    }

    fn temperature(&self, fahrenheit: f64, celsius: f64) -> String {
        truncate(match self.prefs.temperature_unit {
            TemperatureUnit::Fahrenheit => fahrenheit,
            TemperatureUnit::Celsius => celsius,
        })
    }

    fn wind(&self, mph: f64, kph: f64) -> String {
        truncate(match self.prefs.wind_unit {
            WindUnit::Mph => mph,
            WindUnit::Kph => kph,
        })
    }

    fn measurement(&self, inches: f64, millimeters: f64) -> String {
        truncate(match self.prefs.measurement_unit {
            MeasurementUnit::Inches => inches,
            MeasurementUnit::Millimeters => millimeters,
        })
    }
}

pub fn alert(dto: &AlertDto) -> Alert {
    Alert {
        headline: dto.headline.clone(),
        category: dto.category.clone(),
        severity: dto.severity.clone(),
        event: dto.event.clone(),
        areas: dto.areas.clone(),
        desc: normalize_alert_text(&dto.desc),
        instruction: dto.instruction.clone(),
    }
}

pub fn places(dtos: &[PlaceDto]) -> Vec<Place> {
    dtos.iter()
        .map(|p| Place {
            id: p.id,
            name: p.name.clone(),
            region: p.region.clone(),
            country: p.country.clone(),
            latitude: p.lat,
            longitude: p.lon,
        })
        .collect()
}

/// Flatten provider line breaks and turn `*` markers into bullets.
pub fn normalize_alert_text(text: &str) -> String {
    text.replace('\n', " ").replace('*', "\n**")
}

/// Integer part only, no rounding.
pub fn truncate(value: f64) -> String {
    (value.trunc() as i64).to_string()
}

/// Render a provider `YYYY-MM-DD HH:MM` timestamp as a time of day.
pub fn render_datetime(raw: &str, clock: ClockFormat) -> String {
    NaiveDateTime::parse_from_str(raw.trim(), PROVIDER_DATETIME)
        .map(|dt| render_clock(dt.time(), clock))
        .unwrap_or_default()
}

/// Render a provider `hh:mm AM` sunrise/sunset.
pub fn render_astro(raw: &str, clock: ClockFormat) -> String {
    NaiveTime::parse_from_str(raw.trim(), PROVIDER_ASTRO)
        .map(|t| render_clock(t, clock))
        .unwrap_or_default()
}

pub fn render_clock(time: NaiveTime, clock: ClockFormat) -> String {
    let rendered = time.format(clock.pattern()).to_string();
    match clock {
        ClockFormat::TwelveHour => match rendered.strip_prefix('0') {
            Some(stripped) => stripped.to_string(),
            None => rendered,
        },
        ClockFormat::TwentyFourHour => rendered,
    }
}

/// "Today" for the first day, English weekday name otherwise.
pub fn day_label(index: usize, date: &str) -> String {
    if index == 0 {
        return TODAY.to_string();
    }
    NaiveDate::parse_from_str(date, PROVIDER_DATE)
        .map(|d| d.format("%A").to_string())
        .unwrap_or_default()
}

fn icon_url(raw: &str) -> String {
    if raw.starts_with("//") {
        format!("https:{}", raw)
    } else {
        raw.to_string()
    }
}

fn flag(value: i32) -> u8 {
    u8::from(value == 1)
}

fn fact(show: bool, text: impl FnOnce() -> String) -> Option<String> {
    show.then(text)
}
