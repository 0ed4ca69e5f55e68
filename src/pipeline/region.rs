use crate::error::{EtlError, Result};
use crate::pipeline::quality::DqReport;
use crate::table::{cell_str, Table};
use std::collections::HashMap;
use tracing::{info, warn};

/// Result of the region join: the joined table plus a report carrying any
/// fan-out findings discovered in the mapping.
#[derive(Debug)]
pub struct RegionJoinOutcome {
    pub table: Table,
    pub report: DqReport,
}

/// Left-join enriched customers against the region mapping on country.
///
/// Join values match exactly as stored (case normalization is an upstream
/// concern). No customer row is ever dropped; an empty mapping simply
/// yields all-null region fields. Duplicate country keys in the mapping
/// necessarily fan the join out; that is surfaced as a warning rather than
/// silently deduplicated, since the duplicate is a defect in the mapping
/// source that its owners should see.
pub fn enrich_with_region(customers: &Table, mapping: &Table) -> Result<RegionJoinOutcome> {
    let mut report = DqReport::new("region_join");

    let key = mapping.column_index("Country").ok_or_else(|| {
        EtlError::Schema("region mapping must contain a 'Country' column".into())
    })?;
    if customers.column_index("Country").is_none() {
        return Err(EtlError::Schema(
            "customer record set must contain a 'Country' column".into(),
        ));
    }

    if mapping.is_empty() {
        warn!("Region mapping is empty; all region fields will be null");
        report
            .warnings
            .push("Region mapping is empty; all region fields are null.".to_string());
    }

    // Count duplicate country keys up front so the fan-out is attributable
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for row in mapping.rows() {
        if let Some(country) = cell_str(&row[key]) {
            *seen.entry(country).or_insert(0) += 1;
        }
    }
    let duplicates: Vec<&str> = seen
        .iter()
        .filter(|(_, &n)| n > 1)
        .map(|(&c, _)| c)
        .collect();
    for country in &duplicates {
        report.warnings.push(format!(
            "Region mapping contains {} rows for country '{}'; join will fan out.",
            seen[country], country
        ));
    }

    info!("Joining {} customers with region mapping", customers.len());
    let joined = customers.left_join(mapping, &["Country"], &["Country"])?;
    if joined.len() != customers.len() {
        warn!(
            "Region join changed row count from {} to {} (mapping fan-out)",
            customers.len(),
            joined.len()
        );
    }

    Ok(RegionJoinOutcome {
        table: joined,
        report,
    })
}
