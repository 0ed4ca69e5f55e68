use crate::error::Result;
use crate::table::Table;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// Write a table into the target database with full-overwrite semantics:
/// drop and recreate, never an incremental upsert.
pub fn replace_table(conn: &Connection, name: &str, table: &Table) -> Result<()> {
    info!("Loading {} rows into table {}", table.len(), name);
    conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{}\";", name))?;

    let column_list = table
        .columns()
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute(&format!("CREATE TABLE \"{}\" ({})", name, column_list), [])?;

    let placeholders = vec!["?"; table.columns().len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO \"{}\" VALUES ({})",
        name, placeholders
    ))?;
    for row in table.rows() {
        stmt.execute(params_from_iter(row.iter().map(cell_to_sql)))?;
    }
    Ok(())
}

/// Load the region mapping table, skipping (with a warning) when empty.
pub fn load_region_mapping(conn: &Connection, mapping: &Table) -> Result<()> {
    if mapping.is_empty() {
        warn!("Region mapping is empty, skipping load");
        return Ok(());
    }
    replace_table(conn, "region_mapping", mapping)
}

/// Load the enriched customers table, skipping (with a warning) when empty.
pub fn load_enriched_customers(conn: &Connection, customers: &Table) -> Result<()> {
    if customers.is_empty() {
        warn!("Enriched customers record set is empty, skipping load");
        return Ok(());
    }
    replace_table(conn, "enriched_customers", customers)
}

fn cell_to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Sql::Integer(i)
            } else {
                Sql::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Sql::Text(s.clone()),
        other => Sql::Text(other.to_string()),
    }
}

/// Materialize a table as CSV so each stage's artifact can be inspected
/// and later stages can be re-run in isolation.
pub fn write_table_csv(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        let cells: Vec<String> = row.iter().map(render_cell).collect();
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    info!("CSV file written to {}", path.display());
    Ok(())
}

/// Read a staged CSV back into a table. Empty fields become nulls and
/// numeric-looking fields become numbers, mirroring what the writer emits.
pub fn read_table_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        let cells: Vec<Value> = record.iter().map(parse_cell).collect();
        table.push_row(cells)?;
    }
    Ok(table)
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_cell(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = field.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn enriched() -> Table {
        let mut t = Table::new(vec![
            "CustomerID".into(),
            "City".into(),
            "Temperature".into(),
        ]);
        t.push_row(vec![json!("ALFKI"), json!("Berlin"), json!(18.5)])
            .unwrap();
        t.push_row(vec![json!("ANATR"), json!("Mexico City"), Value::Null])
            .unwrap();
        t
    }

    #[test]
    fn test_replace_table_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        load_enriched_customers(&conn, &enriched()).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM enriched_customers", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let temp: f64 = conn
            .query_row(
                "SELECT Temperature FROM enriched_customers WHERE CustomerID = 'ALFKI'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert!((temp - 18.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_replace_table_overwrites_previous_contents() {
        let conn = Connection::open_in_memory().unwrap();
        load_enriched_customers(&conn, &enriched()).unwrap();

        let mut smaller = Table::new(vec!["CustomerID".into()]);
        smaller.push_row(vec![json!("BERGS")]).unwrap();
        replace_table(&conn, "enriched_customers", &smaller).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM enriched_customers", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_empty_table_load_is_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        load_region_mapping(&conn, &Table::new(vec!["Country".into()])).unwrap();
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'region_mapping'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(exists, 0);
    }

    #[test]
    fn test_csv_round_trip_preserves_nulls_and_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("staging").join("customers_enriched.csv");
        write_table_csv(&enriched(), &path).unwrap();

        let back = read_table_csv(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.value(0, 2), &json!(18.5));
        assert!(back.value(1, 2).is_null());
        assert_eq!(back.value(1, 1), &json!("Mexico City"));
    }
}
