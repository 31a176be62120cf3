//! Record Store Adapter: loads the profiling questionnaire export (CSV) and
//! resolves a single company row by name.
//!
//! The dataset is supplied fresh with every request; nothing here is cached.

use serde::Serialize;
use tracing::debug;

use crate::errors::AppError;

/// Maximum number of candidate names returned with a failed lookup.
pub const MAX_SUGGESTIONS: usize = 10;

const UNNAMED_COMPANY: &str = "Unnamed Company";

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// A parsed tabular dataset: header row plus rows of optional cells.
/// An empty cell is treated as a missing value.
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

/// One field of a record, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordField {
    pub name: String,
    pub value: Option<String>,
}

/// A single dataset row, with the identifying column remembered so the
/// business name can be recovered without re-reading config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    identifying_field: String,
    fields: Vec<RecordField>,
}

impl Dataset {
    /// Parses a header-row CSV. Rows shorter than the header are padded with
    /// missing cells; surplus cells are ignored.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(strip_bom(bytes));

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::Validation(format!("Could not read CSV header: {e}")))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(AppError::Validation(
                "CSV file has no header row".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                AppError::Validation(format!("Malformed CSV at data row {}: {e}", index + 1))
            })?;
            let row = (0..headers.len())
                .map(|i| {
                    record
                        .get(i)
                        .filter(|cell| !cell.trim().is_empty())
                        .map(|cell| cell.to_string())
                })
                .collect();
            rows.push(row);
        }

        debug!(
            "Parsed dataset: {} columns, {} rows",
            headers.len(),
            rows.len()
        );
        Ok(Dataset { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn record_at(&self, row: usize, identifying_field: &str) -> Record {
        let fields = self
            .headers
            .iter()
            .zip(&self.rows[row])
            .map(|(name, value)| RecordField {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        Record {
            identifying_field: identifying_field.to_string(),
            fields,
        }
    }
}

impl Record {
    /// Builds a record directly from `(name, value)` pairs.
    #[cfg(test)]
    pub fn from_pairs<I, K>(identifying_field: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        Record {
            identifying_field: identifying_field.to_string(),
            fields: pairs
                .into_iter()
                .map(|(name, value)| RecordField {
                    name: name.into(),
                    value: value.filter(|v| !v.trim().is_empty()),
                })
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_deref())
    }

    /// Value of the identifying column, or a placeholder when it is empty.
    pub fn business_name(&self) -> &str {
        self.get(&self.identifying_field).unwrap_or(UNNAMED_COMPANY)
    }

    /// `name: value` lines for present fields only, in column order.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .filter_map(|f| f.value.as_ref().map(|v| format!("{}: {}", f.name, v)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lookup
// ────────────────────────────────────────────────────────────────────────────

/// Finds the row whose `identifying_field` equals `query_name`, ignoring case.
///
/// When several rows match, the first one in dataset order wins.
pub fn lookup(
    dataset: &Dataset,
    identifying_field: &str,
    query_name: &str,
) -> Result<Record, AppError> {
    let column = dataset.column_index(identifying_field).ok_or_else(|| {
        AppError::Schema(format!(
            "Column '{identifying_field}' not found in CSV"
        ))
    })?;

    let needle = query_name.to_lowercase();
    let mut matches = dataset.rows.iter().enumerate().filter(|(_, row)| {
        row[column]
            .as_deref()
            .is_some_and(|value| value.to_lowercase() == needle)
    });

    match matches.next() {
        Some((index, _)) => {
            let duplicates = matches.count();
            if duplicates > 0 {
                debug!(
                    "'{query_name}' matched {} rows; using row {}",
                    duplicates + 1,
                    index + 1
                );
            }
            Ok(dataset.record_at(index, identifying_field))
        }
        None => Err(AppError::NotFound {
            message: format!("No responses found for business '{query_name}'"),
            suggestions: suggestions(dataset, column),
        }),
    }
}

/// Distinct non-empty values of a column, first-seen order, capped.
fn suggestions(dataset: &Dataset, column: usize) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in dataset.rows.iter().filter_map(|row| row[column].as_ref()) {
        if seen.len() == MAX_SUGGESTIONS {
            break;
        }
        if !seen.contains(value) {
            seen.push(value.clone());
        }
    }
    seen
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
