use crate::error::Result;
use crate::table::Table;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Extract the Customers and Orders record sets from the source database.
/// The source is opened read-only; this stage has no schema-migration
/// responsibility.
pub fn extract_customers_orders(db_path: &Path) -> Result<(Table, Table)> {
    info!("Extracting Orders and Customers from {}", db_path.display());
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let customers = read_table(&conn, "Customers")?;
    let orders = read_table(&conn, "Orders")?;
    info!(
        "Extracted {} customers and {} orders",
        customers.len(),
        orders.len()
    );
    Ok((customers, orders))
}

fn read_table(conn: &Connection, name: &str) -> Result<Table> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", name))?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|c| c.to_string())
        .collect();
    let width = columns.len();
    let mut table = Table::new(columns);
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(cell_from_sql(row.get_ref(i)?));
        }
        table.push_row(cells)?;
    }
    Ok(table)
}

fn cell_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        // binary payloads (e.g. images) have no place in the pipeline
        ValueRef::Blob(_) => Value::Null,
    }
}
