pub mod aggregate;
pub mod normalize;
pub mod quality;
pub mod region;
pub mod weather;

use crate::config::Config;
use crate::error::Result;
use crate::mappings::{self, CityMapping, CountryMapping};
use crate::table::Table;
use crate::{extract, load};
use self::aggregate::RegionSummary;
use self::normalize::NameNormalizer;
use self::quality::DqReport;
use self::weather::{FixedPause, OpenWeatherClient, WeatherEnricher};
use rusqlite::Connection;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Force the weather stage off even when a credential is present
    pub skip_weather: bool,
    /// Append rows with null key fields to the DQ report for inspection
    pub log_null_rows: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WeatherStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Result of a complete pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    pub customers: usize,
    pub orders: usize,
    pub enriched_rows: usize,
    /// None when the weather stage was gated off
    pub weather: Option<WeatherStats>,
    pub reports: Vec<DqReport>,
    pub summaries: Vec<RegionSummary>,
    pub dq_passed: bool,
}

/// Run the full pipeline: extract, weather-enrich, region-join, check,
/// aggregate, load. Each stage's artifact is materialized under the
/// staging directory before the next stage runs. DQ errors gate the
/// dependent downstream stages but never unwind artifacts already written.
pub async fn run(config: &Config, options: &RunOptions) -> Result<RunSummary> {
    // Mapping tables are loaded once and shared read-only for the run;
    // a missing country mapping is fatal at startup.
    let countries = CountryMapping::from_yaml_file(&config.mappings.country_mapping_yaml)?;
    let cities = CityMapping::from_yaml_file(&config.mappings.city_mapping_yaml)?;
    let normalizer = NameNormalizer::new(&countries, &cities);

    let staging = config.staging_dir();
    let (customers, orders) = extract::extract_customers_orders(&config.source.northwind_db)?;
    load::write_table_csv(&customers, &staging.join("customers.csv"))?;
    load::write_table_csv(&orders, &staging.join("orders.csv"))?;

    let region_mapping = mappings::load_region_mapping(&config.source.region_mapping_csv)?;

    let mut reports: Vec<DqReport> = Vec::new();
    let sources_report = quality::check_source_schemas(&customers, &orders, &region_mapping);
    let sources_passed = sources_report.passed();
    reports.push(sources_report);
    if !sources_passed {
        warn!("Source schema checks failed; halting before enrichment");
        quality::write_report(&reports, &config.dq_report_path())?;
        return Ok(RunSummary {
            customers: customers.len(),
            orders: orders.len(),
            enriched_rows: 0,
            weather: None,
            reports,
            summaries: Vec::new(),
            dq_passed: false,
        });
    }

    // Weather stage gate: an absent credential disables the stage at
    // composition level and records pass through unchanged.
    let (weathered, weather_stats) = if options.skip_weather {
        info!("Weather enrichment disabled by flag; passing records through");
        (customers.clone(), None)
    } else if let Some(api_key) = &config.api_key {
        let provider = OpenWeatherClient::new(
            config.weather.base_url.clone(),
            api_key.clone(),
            Duration::from_secs(config.weather.timeout_seconds),
        )?;
        let throttle = FixedPause::new(Duration::from_secs(config.weather.pause_seconds));
        let enricher = WeatherEnricher::new(
            &normalizer,
            &provider,
            &throttle,
            config.weather.calls_per_pause,
        );
        let outcome = enricher.enrich(&customers).await?;
        let stats = WeatherStats {
            attempted: outcome.attempted,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            skipped: outcome.skipped.len(),
        };
        (outcome.table, Some(stats))
    } else {
        warn!("OPENWEATHER_API_KEY not set; passing records through unchanged");
        (customers.clone(), None)
    };
    load::write_table_csv(&weathered, &staging.join("customers_weather.csv"))?;

    let join = region::enrich_with_region(&weathered, &region_mapping)?;
    let enriched = join.table;
    reports.push(join.report);
    load::write_table_csv(&enriched, &staging.join("customers_enriched.csv"))?;

    let schema_report = quality::check_enriched_schema(&enriched);
    let null_log = options.log_null_rows.then(|| config.dq_report_path());
    let data_report = quality::check_enriched_data(&enriched, null_log.as_deref())?;
    let dq_passed = schema_report.passed() && data_report.passed();
    reports.push(schema_report);
    reports.push(data_report);
    quality::write_report(&reports, &config.dq_report_path())?;

    // The region mapping was validated at the sources gate; it loads
    // regardless of the enriched-data verdict.
    let target = Connection::open(config.output.dir.join("target.db"))?;
    load::load_region_mapping(&target, &region_mapping)?;

    let summaries = if dq_passed {
        load::load_enriched_customers(&target, &enriched)?;
        let summaries = aggregate::region_weather_summary(&enriched)?;
        let summary = aggregate::summary_table(&summaries);
        load::write_table_csv(&summary, &config.output.dir.join("region_weather_summary.csv"))?;
        summaries
    } else {
        warn!("Data-quality gate failed; skipping aggregation and target load");
        Vec::new()
    };

    Ok(RunSummary {
        customers: customers.len(),
        orders: orders.len(),
        enriched_rows: enriched.len(),
        weather: weather_stats,
        reports,
        summaries,
        dq_passed,
    })
}

/// Extract-only entry point: materialize the raw record sets into staging.
pub fn extract_to_staging(config: &Config) -> Result<(usize, usize)> {
    let staging = config.staging_dir();
    let (customers, orders) = extract::extract_customers_orders(&config.source.northwind_db)?;
    load::write_table_csv(&customers, &staging.join("customers.csv"))?;
    load::write_table_csv(&orders, &staging.join("orders.csv"))?;
    Ok((customers.len(), orders.len()))
}

/// Aggregate-only entry point: summarize a previously staged enriched
/// record set and write the summary artifact.
pub fn aggregate_from_staging(config: &Config) -> Result<Vec<RegionSummary>> {
    let enriched = load::read_table_csv(&config.staging_dir().join("customers_enriched.csv"))?;
    let summaries = aggregate::region_weather_summary(&enriched)?;
    let summary = aggregate::summary_table(&summaries);
    load::write_table_csv(&summary, &config.output.dir.join("region_weather_summary.csv"))?;
    Ok(summaries)
}
