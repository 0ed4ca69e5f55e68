use crate::error::{EtlError, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// An ordered record set with named columns and JSON-typed cells.
///
/// Every pipeline stage consumes a `Table` and produces a new one; stages
/// never mutate a table still referenced by an earlier stage, so a failure
/// downstream cannot corrupt an artifact already materialized upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. The row must have exactly one cell per column.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::Table(format!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a column by name, case-insensitively. Returns the index of the
    /// first match, preserving the stored spelling for callers that need it.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Find the first present column among several accepted synonyms.
    pub fn find_column(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|name| self.column_index(name))
    }

    pub fn value(&self, row: usize, col: usize) -> &Value {
        &self.rows[row][col]
    }

    /// The distinct combinations of the given columns, in first-seen order.
    pub fn distinct(&self, cols: &[usize]) -> Vec<Vec<Value>> {
        let mut seen: HashSet<Vec<Value>> = HashSet::new();
        let mut out = Vec::new();
        for row in &self.rows {
            let key: Vec<Value> = cols.iter().map(|&c| row[c].clone()).collect();
            if seen.insert(key.clone()) {
                out.push(key);
            }
        }
        out
    }

    /// Return a copy with string cells in the given columns trimmed of
    /// surrounding whitespace. Non-string cells pass through unchanged.
    pub fn trimmed(&self, cols: &[usize]) -> Table {
        let mut rows = self.rows.clone();
        for row in &mut rows {
            for &c in cols {
                if let Value::String(s) = &row[c] {
                    let t = s.trim();
                    if t.len() != s.len() {
                        row[c] = Value::String(t.to_string());
                    }
                }
            }
        }
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Left-join against `right` on the named key columns (resolved
    /// case-insensitively on both sides). Every left row is preserved;
    /// unmatched rows get null cells for the right-hand columns. Rows whose
    /// key contains a null never match. If the right table holds several
    /// rows for one key the join fans out, one output row per match --
    /// callers that consider that a defect must detect it themselves.
    pub fn left_join(&self, right: &Table, left_on: &[&str], right_on: &[&str]) -> Result<Table> {
        let left_keys = self.resolve_columns(left_on)?;
        let right_keys = right.resolve_columns(right_on)?;

        // Right-hand columns that are not join keys get appended to the output
        let carried: Vec<usize> = (0..right.columns.len())
            .filter(|i| !right_keys.contains(i))
            .collect();

        let mut columns = self.columns.clone();
        for &i in &carried {
            let name = &right.columns[i];
            if self.column_index(name).is_some() {
                columns.push(format!("{}_right", name));
            } else {
                columns.push(name.clone());
            }
        }

        // Index right rows by key; null keys are unmatchable
        let mut index: HashMap<Vec<&Value>, Vec<usize>> = HashMap::new();
        for (r, row) in right.rows.iter().enumerate() {
            let key: Vec<&Value> = right_keys.iter().map(|&c| &row[c]).collect();
            if key.iter().any(|v| v.is_null()) {
                continue;
            }
            index.entry(key).or_default().push(r);
        }

        let mut out = Table::new(columns);
        for row in &self.rows {
            let key: Vec<&Value> = left_keys.iter().map(|&c| &row[c]).collect();
            let matches = if key.iter().any(|v| v.is_null()) {
                None
            } else {
                index.get(&key)
            };
            match matches {
                Some(hits) => {
                    for &r in hits {
                        let mut cells = row.clone();
                        for &c in &carried {
                            cells.push(right.rows[r][c].clone());
                        }
                        out.push_row(cells)?;
                    }
                }
                None => {
                    let mut cells = row.clone();
                    cells.extend(carried.iter().map(|_| Value::Null));
                    out.push_row(cells)?;
                }
            }
        }
        Ok(out)
    }

    fn resolve_columns(&self, names: &[&str]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| EtlError::Schema(format!("missing column: {}", name)))
            })
            .collect()
    }
}

/// View a cell as a non-empty trimmed string, if it is one.
pub fn cell_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t)
            }
        }
        _ => None,
    }
}

/// View a cell as a float, accepting any JSON number.
pub fn cell_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}
