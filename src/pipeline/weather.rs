use crate::error::{EtlError, Result};
use crate::pipeline::normalize::NameNormalizer;
use crate::table::{cell_str, Table};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

/// One weather observation as reported by the provider.
#[derive(Debug, Clone, Default)]
pub struct WeatherReading {
    pub description: Option<String>,
    pub temp_c: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    weather: Vec<WeatherCondition>,
    main: Option<MainReadings>,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: Option<f64>,
}

/// External weather lookup, one call per (city, country-code) pair.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, city: &str, country_code: &str) -> Result<WeatherReading>;
}

/// OpenWeather-backed provider. Queries `?q=<city>,<code>&units=metric`.
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch(&self, city: &str, country_code: &str) -> Result<WeatherReading> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", format!("{},{}", city, country_code)),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let parsed: WeatherResponse = response.json().await?;
        Ok(WeatherReading {
            description: parsed
                .weather
                .into_iter()
                .next()
                .and_then(|c| c.description),
            temp_c: parsed.main.and_then(|m| m.temp),
        })
    }
}

/// Cooperative throttle invoked after every batch of successful lookups.
/// Injectable so tests can observe the pause boundary without wall-clock
/// delay.
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn pause(&self);
}

/// Blocks the enrichment stage for a fixed duration, respecting the
/// provider's per-minute quota.
pub struct FixedPause {
    duration: Duration,
}

impl FixedPause {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Throttle for FixedPause {
    async fn pause(&self) {
        info!(
            "API rate limit reached -- waiting {} seconds",
            self.duration.as_secs()
        );
        tokio::time::sleep(self.duration).await;
    }
}

/// Result of the weather enrichment stage. The table always has exactly as
/// many rows as the input; pairs that could not be resolved or fetched
/// leave null weather fields on their customers.
#[derive(Debug)]
pub struct EnrichOutcome {
    pub table: Table,
    /// Distinct (city, country) pairs seen in the input
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: Vec<(String, String)>,
}

/// Enriches a customer record set with one weather observation per distinct
/// (city, country) pair, bounding external call volume to the number of
/// distinct cities rather than the number of customers.
pub struct WeatherEnricher<'a> {
    normalizer: &'a NameNormalizer<'a>,
    provider: &'a dyn WeatherProvider,
    throttle: &'a dyn Throttle,
    calls_per_pause: usize,
}

impl<'a> WeatherEnricher<'a> {
    pub fn new(
        normalizer: &'a NameNormalizer<'a>,
        provider: &'a dyn WeatherProvider,
        throttle: &'a dyn Throttle,
        calls_per_pause: usize,
    ) -> Self {
        Self {
            normalizer,
            provider,
            throttle,
            calls_per_pause: calls_per_pause.max(1),
        }
    }

    pub async fn enrich(&self, customers: &Table) -> Result<EnrichOutcome> {
        if customers.is_empty() {
            warn!("Input record set is empty, skipping weather enrichment");
            return Ok(EnrichOutcome {
                table: customers.clone(),
                attempted: 0,
                succeeded: 0,
                failed: 0,
                skipped: Vec::new(),
            });
        }

        let city_col = customers.column_index("City").ok_or_else(|| {
            EtlError::Schema("input record set must contain 'City' and 'Country' columns".into())
        })?;
        let country_col = customers.column_index("Country").ok_or_else(|| {
            EtlError::Schema("input record set must contain 'City' and 'Country' columns".into())
        })?;

        let trimmed = customers.trimmed(&[city_col, country_col]);
        let pairs = trimmed.distinct(&[city_col, country_col]);
        info!(
            "Enriching {} customers across {} distinct (city, country) pairs",
            trimmed.len(),
            pairs.len()
        );

        let mut observations = Table::new(vec![
            "City".into(),
            "Country".into(),
            "Weather".into(),
            "Temperature".into(),
        ]);
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut skipped: Vec<(String, String)> = Vec::new();

        for pair in &pairs {
            let city = cell_str(&pair[0]);
            let country = cell_str(&pair[1]);
            let (city, country) = match (city, country) {
                (Some(city), Some(country)) => (city, country),
                _ => {
                    skipped.push((display(&pair[0]), display(&pair[1])));
                    continue;
                }
            };

            let code = match self.normalizer.resolve_country_code(country) {
                Some(code) => code,
                None => {
                    skipped.push((city.to_string(), country.to_string()));
                    continue;
                }
            };

            let city_api = self.normalizer.normalize_city_name(city);
            match self.provider.fetch(&city_api, code).await {
                Ok(reading) => {
                    observations.push_row(vec![
                        Value::String(city.to_string()),
                        Value::String(country.to_string()),
                        reading.description.map(Value::String).unwrap_or(Value::Null),
                        reading
                            .temp_c
                            .and_then(serde_json::Number::from_f64)
                            .map(Value::Number)
                            .unwrap_or(Value::Null),
                    ])?;
                    succeeded += 1;
                    if succeeded % self.calls_per_pause == 0 {
                        self.throttle.pause().await;
                    }
                }
                Err(e) => {
                    // One bad pair never poisons the batch; its customers
                    // keep null weather fields after the merge.
                    error!("Error fetching weather for '{}' ({}): {}", city, code, e);
                    failed += 1;
                }
            }
        }

        if !skipped.is_empty() {
            warn!(
                "Skipped {} cities due to missing or invalid data: {:?}",
                skipped.len(),
                skipped
            );
        }
        if observations.is_empty() {
            warn!("No weather data collected -- check mappings and API responses");
        }

        let merged = trimmed.left_join(&observations, &["City", "Country"], &["City", "Country"])?;
        Ok(EnrichOutcome {
            table: merged,
            attempted: pairs.len(),
            succeeded,
            failed,
            skipped,
        })
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
