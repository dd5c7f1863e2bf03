//! Weather lookup tool.
//!
//! Queries OpenWeatherMap when an API key is configured. Without a key it
//! returns deterministic offline data derived from the location name, so
//! the agent loop can be exercised end-to-end without network access.
//!
//! Emits one progress frame before the lookup and completes with the report.

use async_trait::async_trait;
use librarian_core::error::ToolError;
use librarian_core::progress::ToolProgress;
use librarian_core::tool::Tool;
use serde::Deserialize;
use tracing::debug;

const OPENWEATHERMAP_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

enum Source {
    OpenWeatherMap {
        api_key: String,
        client: reqwest::Client,
    },
    Offline,
}

pub struct WeatherLookupTool {
    source: Source,
}

impl WeatherLookupTool {
    /// Live lookups through OpenWeatherMap.
    pub fn openweathermap(api_key: impl Into<String>) -> Self {
        Self {
            source: Source::OpenWeatherMap {
                api_key: api_key.into(),
                client: reqwest::Client::new(),
            },
        }
    }

    /// Deterministic data, no network.
    pub fn offline() -> Self {
        Self {
            source: Source::Offline,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.source, Source::Offline)
    }

    async fn fetch(&self, location: &str) -> Result<WeatherReport, ToolError> {
        match &self.source {
            Source::Offline => Ok(offline_weather(location)),
            Source::OpenWeatherMap { api_key, client } => {
                let response = client
                    .get(OPENWEATHERMAP_URL)
                    .query(&[("q", location), ("appid", api_key.as_str()), ("units", "metric")])
                    .send()
                    .await
                    .map_err(|e| failed(format!("request failed: {e}")))?;

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(failed(format!("OpenWeatherMap returned {status}: {body}")));
                }

                let body: OwmResponse = response
                    .json()
                    .await
                    .map_err(|e| failed(format!("unreadable response: {e}")))?;
                Ok(body.into_report(location))
            }
        }
    }
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "weather_lookup".into(),
        reason,
    }
}

#[async_trait]
impl Tool for WeatherLookupTool {
    fn name(&self) -> &str {
        "weather_lookup"
    }

    fn description(&self) -> &str {
        "Look up current weather conditions for a location. Returns conditions, temperature, humidity, and wind speed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The location to get the weather for."
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Map<String, serde_json::Value>,
        progress: &ToolProgress,
    ) -> Result<String, ToolError> {
        let location = arguments
            .get("location")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'location' argument".into()))?;

        let mut metadata = serde_json::Map::new();
        metadata.insert("location".into(), serde_json::json!(location));
        progress.send_progress(format!("Looking up weather for {location}"), metadata.clone())?;

        debug!(location, offline = self.is_offline(), "Weather lookup");
        let output = self.fetch(location).await?.render();

        progress.send_complete(Some(output.clone()), metadata)?;
        Ok(output)
    }
}

struct WeatherReport {
    location: String,
    status: String,
    temperature_c: f64,
    feels_like_c: f64,
    humidity: u32,
    wind_speed: f64,
}

impl WeatherReport {
    fn render(&self) -> String {
        format!(
            "In {}, the current weather is as follows:\n\
             Detailed status: {}\n\
             Wind speed: {} m/s\n\
             Humidity: {}%\n\
             Temperature: {}°C (feels like {}°C)",
            self.location,
            self.status,
            self.wind_speed,
            self.humidity,
            self.temperature_c,
            self.feels_like_c,
        )
    }
}

#[derive(Deserialize)]
struct OwmResponse {
    #[serde(default)]
    weather: Vec<OwmCondition>,
    main: OwmMain,
    #[serde(default)]
    wind: OwmWind,
}

#[derive(Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    humidity: u32,
}

#[derive(Default, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
}

impl OwmResponse {
    fn into_report(self, location: &str) -> WeatherReport {
        WeatherReport {
            location: location.to_string(),
            status: self
                .weather
                .into_iter()
                .next()
                .map(|c| c.description)
                .unwrap_or_else(|| "unknown".into()),
            temperature_c: self.main.temp,
            feels_like_c: self.main.feels_like,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
        }
    }
}

/// Deterministic weather keyed on the location name.
fn offline_weather(location: &str) -> WeatherReport {
    let hash: u32 = location
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    let conditions = [
        "clear sky",
        "few clouds",
        "overcast clouds",
        "light rain",
        "moderate rain",
        "thunderstorm",
        "snow",
        "mist",
    ];

    let temperature = ((hash % 40) as f64) - 5.0;
    WeatherReport {
        location: location.to_string(),
        status: conditions[(hash as usize / 7) % conditions.len()].to_string(),
        temperature_c: temperature,
        feels_like_c: temperature - ((hash % 4) as f64),
        humidity: 30 + (hash % 60),
        wind_speed: ((hash % 15) as f64) + 0.5,
    }
}
