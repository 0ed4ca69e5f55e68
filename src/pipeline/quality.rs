use crate::error::Result;
use crate::table::Table;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Accepted spellings for the temperature column, checked in order.
pub const TEMPERATURE_COLUMNS: &[&str] = &["temp_c", "temperature_c", "temperature", "temp"];

/// Structured findings from one data-quality checkpoint. Errors gate the
/// downstream stage; warnings are advisory. Whether to halt on errors is
/// the caller's decision, this module only reports.
#[derive(Debug, Clone, Serialize)]
pub struct DqReport {
    pub stage: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// When this checkpoint ran
    pub checked_at: DateTime<Utc>,
}

impl DqReport {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            errors: Vec::new(),
            warnings: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Verify the extracted source record sets carry the columns every
/// downstream stage depends on. Column-name matching is case-insensitive;
/// a missing column is always an error, never a warning.
pub fn check_source_schemas(customers: &Table, orders: &Table, mapping: &Table) -> DqReport {
    let mut report = DqReport::new("sources");

    for col in ["customerid", "city", "country"] {
        if customers.column_index(col).is_none() {
            report
                .errors
                .push(format!("Customers missing required column: {}", col));
        }
    }

    // Orders are accepted under either of two naming conventions
    let convention_a =
        orders.column_index("orderid").is_some() && orders.column_index("customerid").is_some();
    let convention_b =
        orders.column_index("id").is_some() && orders.column_index("customerid").is_some();
    if !convention_a && !convention_b {
        report.errors.push(
            "Orders missing required columns (need orderid/customerid or id/customerid)."
                .to_string(),
        );
    }

    if mapping.column_index("country").is_none() {
        report
            .errors
            .push("Region mapping missing column: country".to_string());
    }
    if !mapping
        .columns()
        .iter()
        .any(|c| c.to_lowercase().starts_with("region"))
    {
        report
            .errors
            .push("Region mapping does not contain any 'region*' columns.".to_string());
    }

    report
}

/// Verify the fully enriched record set exposes region, city, and a
/// temperature-like column (several accepted synonyms).
pub fn check_enriched_schema(enriched: &Table) -> DqReport {
    let mut report = DqReport::new("enriched_schema");

    if enriched.column_index("region").is_none() {
        report
            .errors
            .push("Enriched dataset missing 'region' column.".to_string());
    }
    if enriched.column_index("city").is_none() {
        report
            .errors
            .push("Enriched dataset missing 'city' column.".to_string());
    }
    if enriched.find_column(TEMPERATURE_COLUMNS).is_none() {
        report
            .errors
            .push("Enriched dataset missing temperature column.".to_string());
    }

    report
}

/// Count nulls in the key enriched fields. Any null is an error for that
/// field. When `null_row_log` is set, the offending rows are appended to
/// the side log for inspection; that is diagnostic only and does not
/// affect pass/fail.
pub fn check_enriched_data(enriched: &Table, null_row_log: Option<&Path>) -> Result<DqReport> {
    let mut report = DqReport::new("enriched_data");

    let checks: [(&str, Option<usize>); 3] = [
        ("city", enriched.column_index("city")),
        ("region", enriched.column_index("region")),
        ("temperature", enriched.find_column(TEMPERATURE_COLUMNS)),
    ];

    for (name, col) in checks {
        let Some(col) = col else { continue };
        let null_rows: Vec<usize> = enriched
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| row[col].is_null())
            .map(|(i, _)| i)
            .collect();
        if !null_rows.is_empty() {
            report
                .errors
                .push(format!("Nulls found in {}: {}", name, null_rows.len()));
            if let Some(path) = null_row_log {
                append_null_rows(path, enriched, name, &null_rows)?;
            }
        }
    }

    Ok(report)
}

/// Append the checkpoint reports to the run's data-quality log, one
/// section per checkpoint with `ERROR:`/`WARNING:` prefixed lines.
pub fn write_report(reports: &[DqReport], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for report in reports {
        writeln!(file, "== {} ==", report.stage)?;
        for error in &report.errors {
            writeln!(file, "ERROR: {}", error)?;
        }
        for warning in &report.warnings {
            writeln!(file, "WARNING: {}", warning)?;
        }
        writeln!(file)?;
    }
    Ok(())
}

fn append_null_rows(path: &Path, table: &Table, field: &str, rows: &[usize]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "\n--- Rows with null {} ---", field)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(table.columns())?;
    for &r in rows {
        let cells: Vec<String> = table.rows()[r].iter().map(render_cell).collect();
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn customers_table(with_country: bool) -> Table {
        let mut columns = vec!["CustomerID".to_string(), "City".to_string()];
        if with_country {
            columns.push("Country".to_string());
        }
        Table::new(columns)
    }

    fn orders_table(columns: &[&str]) -> Table {
        Table::new(columns.iter().map(|c| c.to_string()).collect())
    }

    fn mapping_table() -> Table {
        Table::new(vec!["Country".into(), "Region".into()])
    }

    #[test]
    fn test_missing_country_yields_exactly_one_error() {
        let report = check_source_schemas(
            &customers_table(false),
            &orders_table(&["OrderID", "CustomerID"]),
            &mapping_table(),
        );
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("country"));
        assert!(report.warnings.is_empty());
        assert!(!report.passed());
    }

    #[test]
    fn test_source_schemas_accept_both_order_conventions() {
        let good_a = check_source_schemas(
            &customers_table(true),
            &orders_table(&["OrderID", "CustomerID"]),
            &mapping_table(),
        );
        assert!(good_a.passed());

        let good_b = check_source_schemas(
            &customers_table(true),
            &orders_table(&["Id", "CustomerID"]),
            &mapping_table(),
        );
        assert!(good_b.passed());

        let bad = check_source_schemas(
            &customers_table(true),
            &orders_table(&["OrderID", "ShipCity"]),
            &mapping_table(),
        );
        assert_eq!(bad.errors.len(), 1);
        assert!(bad.errors[0].contains("Orders"));
    }

    #[test]
    fn test_source_schemas_require_region_prefixed_column() {
        let bare = Table::new(vec!["Country".into(), "Continent".into()]);
        let report = check_source_schemas(
            &customers_table(true),
            &orders_table(&["OrderID", "CustomerID"]),
            &bare,
        );
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("region"));

        let dated = Table::new(vec!["Country".into(), "Region_pre_1990".into()]);
        let report = check_source_schemas(
            &customers_table(true),
            &orders_table(&["OrderID", "CustomerID"]),
            &dated,
        );
        assert!(report.passed());
    }

    #[test]
    fn test_enriched_schema_accepts_temperature_synonyms() {
        let report = check_enriched_schema(&Table::new(vec![
            "Region".into(),
            "City".into(),
            "Temp_C".into(),
        ]));
        assert!(report.passed());

        let report = check_enriched_schema(&Table::new(vec!["Region".into(), "City".into()]));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("temperature"));
    }

    #[test]
    fn test_enriched_data_counts_single_null_and_logs_row() {
        let mut table = Table::new(vec![
            "CustomerID".into(),
            "City".into(),
            "Region".into(),
            "Temperature".into(),
        ]);
        for i in 0..5 {
            let temp = if i == 3 {
                Value::Null
            } else {
                json!(10.0 + i as f64)
            };
            table
                .push_row(vec![
                    json!(format!("C{}", i)),
                    json!("Berlin"),
                    json!("Europe"),
                    temp,
                ])
                .unwrap();
        }

        let dir = tempdir().unwrap();
        let log = dir.path().join("data_quality_report.log");
        let report = check_enriched_data(&table, Some(&log)).unwrap();

        assert_eq!(report.errors, vec!["Nulls found in temperature: 1".to_string()]);

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("--- Rows with null temperature ---"));
        // header plus exactly the one offending row
        let data_lines: Vec<&str> = contents.lines().filter(|l| l.starts_with("C3")).collect();
        assert_eq!(data_lines.len(), 1);
    }

    #[test]
    fn test_enriched_data_passes_when_no_nulls() {
        let mut table = Table::new(vec!["City".into(), "Region".into(), "Temperature".into()]);
        table
            .push_row(vec![json!("Berlin"), json!("Europe"), json!(12.0)])
            .unwrap();
        let report = check_enriched_data(&table, None).unwrap();
        assert!(report.passed());
    }

    #[test]
    fn test_write_report_appends_sections() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("data_quality_report.log");

        let mut first = DqReport::new("sources");
        first.errors.push("Customers missing required column: country".into());
        write_report(&[first], &log).unwrap();

        let mut second = DqReport::new("enriched_data");
        second.warnings.push("Region mapping is empty".into());
        write_report(&[second], &log).unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("== sources =="));
        assert!(contents.contains("ERROR: Customers missing required column: country"));
        assert!(contents.contains("== enriched_data =="));
        assert!(contents.contains("WARNING: Region mapping is empty"));
        // append-only: the first section survives the second write
        let first_pos = contents.find("== sources ==").unwrap();
        let second_pos = contents.find("== enriched_data ==").unwrap();
        assert!(first_pos < second_pos);
    }
}
