use crate::error::{EtlError, Result};
use crate::pipeline::quality::TEMPERATURE_COLUMNS;
use crate::table::{cell_f64, Table};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Per-region rollup of the fully enriched record set. Recomputed in full
/// on every run; nothing incremental.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    /// None is the group of customers with no region label
    pub region: Option<String>,
    pub customers: usize,
    pub avg_temp_c: Option<f64>,
    pub min_temp_c: Option<f64>,
    pub max_temp_c: Option<f64>,
}

#[derive(Default)]
struct Group {
    customers: HashSet<String>,
    temps: Vec<f64>,
}

/// Summarize the enriched record set by region: distinct customer count
/// and mean/min/max temperature over the non-null observations. The null
/// region is its own group, not dropped. Output is sorted by region label
/// with the null group last, so results are deterministic regardless of
/// input row order.
pub fn region_weather_summary(enriched: &Table) -> Result<Vec<RegionSummary>> {
    let region_col = enriched
        .column_index("region")
        .ok_or_else(|| EtlError::Schema("enriched record set missing 'region' column".into()))?;
    let customer_col = enriched.column_index("customerid").ok_or_else(|| {
        EtlError::Schema("enriched record set missing 'customerid' column".into())
    })?;
    let temp_col = enriched.find_column(TEMPERATURE_COLUMNS).ok_or_else(|| {
        EtlError::Schema("enriched record set missing temperature column".into())
    })?;

    let mut groups: HashMap<Option<String>, Group> = HashMap::new();
    for row in enriched.rows() {
        let key = match &row[region_col] {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
        let group = groups.entry(key).or_default();
        match &row[customer_col] {
            Value::Null => {}
            Value::String(s) => {
                group.customers.insert(s.clone());
            }
            other => {
                group.customers.insert(other.to_string());
            }
        }
        if let Some(temp) = cell_f64(&row[temp_col]) {
            group.temps.push(temp);
        }
    }

    let mut summaries: Vec<RegionSummary> = groups
        .into_iter()
        .map(|(region, group)| {
            let n = group.temps.len();
            let (avg, min, max) = if n == 0 {
                // a group with zero observed temperatures has no aggregate,
                // not a zero
                (None, None, None)
            } else {
                let sum: f64 = group.temps.iter().sum();
                let min = group.temps.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = group
                    .temps
                    .iter()
                    .cloned()
                    .fold(f64::NEG_INFINITY, f64::max);
                (Some(sum / n as f64), Some(min), Some(max))
            };
            RegionSummary {
                region,
                customers: group.customers.len(),
                avg_temp_c: avg,
                min_temp_c: min,
                max_temp_c: max,
            }
        })
        .collect();

    summaries.sort_by(|a, b| match (&a.region, &b.region) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    Ok(summaries)
}

/// Render summaries as a table for persistence alongside the other
/// pipeline artifacts.
pub fn summary_table(summaries: &[RegionSummary]) -> Table {
    let mut table = Table::new(vec![
        "region".into(),
        "customers".into(),
        "avg_temp_c".into(),
        "min_temp_c".into(),
        "max_temp_c".into(),
    ]);
    for s in summaries {
        let cells = vec![
            s.region
                .as_ref()
                .map(|r| Value::String(r.clone()))
                .unwrap_or(Value::Null),
            Value::Number(s.customers.into()),
            to_number(s.avg_temp_c),
            to_number(s.min_temp_c),
            to_number(s.max_temp_c),
        ];
        // arity is fixed by construction
        table.push_row(cells).expect("summary row arity");
    }
    table
}

fn to_number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
