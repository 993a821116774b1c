use std::fmt;

use async_trait::async_trait;
use mediarelay_core::ForecastEntry;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{decode_error, ensure_success, request_error, UpstreamError, WeatherForecast};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Forecast entries per day at the provider's 3-hour resolution.
pub const STEPS_PER_DAY: u32 = 8;

pub const MAX_DAYS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "metric" => Some(Units::Metric),
            "imperial" => Some(Units::Imperial),
            "standard" => Some(Units::Standard),
            _ => None,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reshaped forecast plus the provider payload it came from.
#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub city: String,
    pub entries: Vec<ForecastEntry>,
    pub raw: Value,
}

pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(client: Client, base_url: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastItem>,
    city: Option<CityInfo>,
}

#[derive(Deserialize)]
struct CityInfo {
    name: String,
}

#[derive(Deserialize)]
struct ForecastItem {
    dt_txt: String,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
    wind: Option<Wind>,
}

#[derive(Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
}

#[derive(Deserialize)]
struct Wind {
    speed: f64,
}

fn reshape(requested_city: &str, raw: Value) -> Result<WeatherReport, UpstreamError> {
    let parsed: ForecastResponse =
        serde_json::from_value(raw.clone()).map_err(|e| UpstreamError::Decode(e.to_string()))?;
    let entries = parsed
        .list
        .into_iter()
        .map(|item| ForecastEntry {
            time: item.dt_txt,
            temperature: item.main.temp,
            feels_like: item.main.feels_like,
            humidity: item.main.humidity,
            description: item
                .weather
                .into_iter()
                .next()
                .map(|c| c.description)
                .unwrap_or_default(),
            wind_speed: item.wind.map(|w| w.speed).unwrap_or_default(),
        })
        .collect();
    Ok(WeatherReport {
        city: parsed
            .city
            .map(|c| c.name)
            .unwrap_or_else(|| requested_city.to_string()),
        entries,
        raw,
    })
}

#[async_trait]
impl WeatherForecast for OpenWeatherClient {
    async fn forecast(
        &self,
        city: &str,
        units: Units,
        days: u32,
    ) -> Result<WeatherReport, UpstreamError> {
        let count = (days.clamp(1, MAX_DAYS) * STEPS_PER_DAY).to_string();
        let resp = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("q", city),
                ("units", units.as_str()),
                ("cnt", count.as_str()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(request_error)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound(format!("city {city:?}")));
        }
        let resp = ensure_success(resp, &self.api_key).await?;
        let raw: Value = resp.json().await.map_err(decode_error)?;
        reshape(city, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn units_parse_str() {
        assert_eq!(Units::parse_str("metric"), Some(Units::Metric));
        assert_eq!(Units::parse_str("imperial"), Some(Units::Imperial));
        assert_eq!(Units::parse_str("standard"), Some(Units::Standard));
        assert_eq!(Units::parse_str("kelvin"), None);
        assert_eq!(Units::parse_str(""), None);
    }

    #[test]
    fn reshape_extracts_entries() {
        let raw = json!({
            "cod": "200",
            "list": [{
                "dt": 1700000000,
                "dt_txt": "2024-11-14 21:00:00",
                "main": {"temp": 24.5, "feels_like": 25.1, "humidity": 78},
                "weather": [{"description": "light rain"}],
                "wind": {"speed": 3.2}
            }],
            "city": {"name": "Maputo"}
        });
        let report = reshape("maputo", raw.clone()).unwrap();
        assert_eq!(report.city, "Maputo");
        assert_eq!(report.entries.len(), 1);
        let e = &report.entries[0];
        assert_eq!(e.time, "2024-11-14 21:00:00");
        assert_eq!(e.temperature, 24.5);
        assert_eq!(e.humidity, 78);
        assert_eq!(e.description, "light rain");
        assert_eq!(e.wind_speed, 3.2);
        assert_eq!(report.raw, raw);
    }

    #[test]
    fn reshape_tolerates_missing_city_and_wind() {
        let raw = json!({
            "list": [{
                "dt_txt": "2024-11-14 21:00:00",
                "main": {"temp": 1.0, "feels_like": -2.0, "humidity": 50},
                "weather": []
            }]
        });
        let report = reshape("Oslo", raw).unwrap();
        assert_eq!(report.city, "Oslo");
        assert_eq!(report.entries[0].wind_speed, 0.0);
        assert_eq!(report.entries[0].description, "");
    }
}
