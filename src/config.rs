use crate::error::{EtlError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

fn default_source_db() -> PathBuf {
    PathBuf::from("data/northwind.db")
}

fn default_region_mapping() -> PathBuf {
    PathBuf::from("data/region_mapping.csv")
}

fn default_country_mapping() -> PathBuf {
    PathBuf::from("config/country_code_mapping.yaml")
}

fn default_city_mapping() -> PathBuf {
    PathBuf::from("config/city_name_mapping.yaml")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_base_url() -> String {
    "http://api.openweathermap.org/data/2.5/weather".to_string()
}

fn default_calls_per_pause() -> usize {
    60
}

fn default_pause_seconds() -> u64 {
    60
}

fn default_timeout_seconds() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_db")]
    pub northwind_db: PathBuf,
    #[serde(default = "default_region_mapping")]
    pub region_mapping_csv: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            northwind_db: default_source_db(),
            region_mapping_csv: default_region_mapping(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    #[serde(default = "default_country_mapping")]
    pub country_mapping_yaml: PathBuf,
    #[serde(default = "default_city_mapping")]
    pub city_mapping_yaml: PathBuf,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            country_mapping_yaml: default_country_mapping(),
            city_mapping_yaml: default_city_mapping(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Successful lookups allowed before the throttle pause kicks in
    #[serde(default = "default_calls_per_pause")]
    pub calls_per_pause: usize,
    #[serde(default = "default_pause_seconds")]
    pub pause_seconds: u64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            calls_per_pause: default_calls_per_pause(),
            pause_seconds: default_pause_seconds(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Pipeline configuration, read from `config.toml` with the OpenWeather
/// credential picked up separately from the environment (`.env` supported).
/// An absent credential is not an error here: it gates the weather stage
/// off at pipeline-composition level instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub mappings: MappingConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config: Config = toml::from_str(&content)?;
        config.api_key = read_api_key();
        Ok(config)
    }

    /// Load `config.toml` if present, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(
                "Config file '{}' not found, using defaults",
                path.display()
            );
            let mut config = Config::default();
            config.api_key = read_api_key();
            Ok(config)
        }
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.output.dir.join("staging")
    }

    pub fn dq_report_path(&self) -> PathBuf {
        self.output.dir.join("data_quality_report.log")
    }
}

fn read_api_key() -> Option<String> {
    dotenv::dotenv().ok();
    match std::env::var("OPENWEATHER_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => None,
    }
}
