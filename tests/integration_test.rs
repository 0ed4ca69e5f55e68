use async_trait::async_trait;
use northwind_weather_etl::error::Result;
use northwind_weather_etl::mappings::{CityMapping, CountryMapping};
use northwind_weather_etl::pipeline::aggregate::region_weather_summary;
use northwind_weather_etl::pipeline::normalize::NameNormalizer;
use northwind_weather_etl::pipeline::quality;
use northwind_weather_etl::pipeline::region::enrich_with_region;
use northwind_weather_etl::pipeline::weather::{
    Throttle, WeatherEnricher, WeatherProvider, WeatherReading,
};
use northwind_weather_etl::table::Table;
use serde_json::json;
use tempfile::tempdir;

struct CannedWeather;

#[async_trait]
impl WeatherProvider for CannedWeather {
    async fn fetch(&self, city: &str, _country_code: &str) -> Result<WeatherReading> {
        let temp_c = match city {
            "Berlin" => Some(10.0),
            "Munich" => Some(20.0),
            "Mexico City" => Some(30.0),
            _ => None,
        };
        Ok(WeatherReading {
            description: Some("clear sky".to_string()),
            temp_c,
        })
    }
}

struct NoPause;

#[async_trait]
impl Throttle for NoPause {
    async fn pause(&self) {}
}

fn customers() -> Table {
    let mut t = Table::new(vec![
        "CustomerID".into(),
        "CompanyName".into(),
        "City".into(),
        "Country".into(),
    ]);
    for (id, name, city, country) in [
        ("ALFKI", "Alfreds Futterkiste", "Berlin", "Germany"),
        ("FRANK", "Frankenversand", "Munich", "Germany"),
        ("ANATR", "Ana Trujillo", "México D.F.", "Mexico"),
    ] {
        t.push_row(vec![json!(id), json!(name), json!(city), json!(country)])
            .unwrap();
    }
    t
}

fn region_mapping() -> Table {
    let mut t = Table::new(vec!["Country".into(), "Region".into()]);
    t.push_row(vec![json!("Germany"), json!("Europe")]).unwrap();
    t.push_row(vec![json!("Mexico"), json!("Americas")]).unwrap();
    t
}

#[tokio::test]
async fn test_enrichment_stages_end_to_end() -> anyhow::Result<()> {
    let countries = CountryMapping::from_pairs(vec![
        ("Germany".to_string(), "DE".to_string()),
        ("Mexico".to_string(), "MX".to_string()),
    ]);
    let cities =
        CityMapping::from_pairs(vec![("méxico d.f.".to_string(), "Mexico City".to_string())]);
    let normalizer = NameNormalizer::new(&countries, &cities);

    let provider = CannedWeather;
    let throttle = NoPause;
    let enricher = WeatherEnricher::new(&normalizer, &provider, &throttle, 60);

    let input = customers();
    let weathered = enricher.enrich(&input).await?;
    assert_eq!(weathered.table.len(), input.len());
    assert_eq!(weathered.succeeded, 3);

    let joined = enrich_with_region(&weathered.table, &region_mapping())?;
    let enriched = joined.table;
    assert_eq!(enriched.len(), input.len());

    // DQ checkpoints accumulate into one report log
    let dir = tempdir()?;
    let log = dir.path().join("data_quality_report.log");
    let schema_report = quality::check_enriched_schema(&enriched);
    let data_report = quality::check_enriched_data(&enriched, Some(&log))?;
    assert!(schema_report.passed());
    assert!(data_report.passed());
    quality::write_report(&[schema_report, data_report], &log)?;
    let contents = std::fs::read_to_string(&log)?;
    assert!(contents.contains("== enriched_schema =="));
    assert!(contents.contains("== enriched_data =="));

    let summaries = region_weather_summary(&enriched)?;
    assert_eq!(summaries.len(), 2);
    let europe = summaries
        .iter()
        .find(|s| s.region.as_deref() == Some("Europe"))
        .unwrap();
    assert_eq!(europe.customers, 2);
    assert_eq!(europe.avg_temp_c, Some(15.0));
    assert_eq!(europe.min_temp_c, Some(10.0));
    assert_eq!(europe.max_temp_c, Some(20.0));
    let americas = summaries
        .iter()
        .find(|s| s.region.as_deref() == Some("Americas"))
        .unwrap();
    assert_eq!(americas.customers, 1);
    assert_eq!(americas.avg_temp_c, Some(30.0));

    Ok(())
}

#[tokio::test]
async fn test_failed_lookup_surfaces_as_dq_error_downstream() -> anyhow::Result<()> {
    struct AlwaysDown;

    #[async_trait]
    impl WeatherProvider for AlwaysDown {
        async fn fetch(&self, _city: &str, _country_code: &str) -> Result<WeatherReading> {
            Err(northwind_weather_etl::error::EtlError::Api {
                message: "provider unavailable".to_string(),
            })
        }
    }

    let countries = CountryMapping::from_pairs(vec![("Germany".to_string(), "DE".to_string())]);
    let cities = CityMapping::default();
    let normalizer = NameNormalizer::new(&countries, &cities);
    let provider = AlwaysDown;
    let throttle = NoPause;
    let enricher = WeatherEnricher::new(&normalizer, &provider, &throttle, 60);

    let mut input = Table::new(vec!["CustomerID".into(), "City".into(), "Country".into()]);
    input
        .push_row(vec![json!("ALFKI"), json!("Berlin"), json!("Germany")])
        .unwrap();

    let weathered = enricher.enrich(&input).await?;
    assert_eq!(weathered.failed, 1);
    // the run survives; the nulls surface at the data-quality checkpoint
    let joined = enrich_with_region(&weathered.table, &region_mapping())?;
    let report = quality::check_enriched_data(&joined.table, None)?;
    assert!(!report.passed());
    assert!(report
        .errors
        .iter()
        .any(|e| e.contains("temperature")));

    Ok(())
}
