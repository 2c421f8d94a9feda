use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

/// Possible errors to occur while reading account records
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("Malformed account record at line {line}: {source}")]
    Malformed {
        line: u64,
        source: csv::Error,
    },
}

/// One row of the account export
///
/// The export has no header row, so the field order below is the column
/// order of the file. Blank cells are read as `None`, and dates that can't
/// be parsed are read as `None` as well instead of failing the whole row.
/// Missing trailing columns are `None` too.
#[derive(Clone, Debug, Default, serde::Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AccountRecord {
    pub account_id: Option<String>,
    pub account_type: Option<String>,
    /// The legal name of the customer, used as the customer's identity
    pub legal_name: Option<String>,
    pub tax_id: Option<String>,
    pub tax_id_root: Option<String>,
    pub economic_group_id: Option<String>,
    pub economic_group_name: Option<String>,
    pub salesperson_id: Option<String>,
    pub salesperson: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub last_sale: Option<NaiveDate>,
    pub account_classification: Option<String>,
    pub person_classification: Option<String>,
    pub company_size: Option<String>,
    pub quote_id: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub last_quote: Option<NaiveDate>,
}

impl AccountRecord {
    /// Whether neither the last sale nor the last quote date is known
    pub fn has_no_activity(&self) -> bool {
        self.last_sale.is_none() && self.last_quote.is_none()
    }
}

/// Reads `;` separated account records without a header row
///
/// Text cells are kept as they are, padding included, so `"ACME "` and
/// `"ACME"` are different names. Rows may be shorter than the full set of
/// columns.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<AccountRecord>, RecordError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for record in reader.deserialize() {
        let record = record.map_err(|source| RecordError::Malformed {
            line: source.position().map(|p| p.line()).unwrap_or_default(),
            source,
        })?;
        records.push(record);
    }

    tracing::debug!(records = records.len(), "read account records");
    Ok(records)
}

/// Reads account records from the file at `path`
///
/// See [`read_records`] for the expected format.
pub fn read_records_from_path(path: impl AsRef<Path>) -> Result<Vec<AccountRecord>, RecordError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    read_records(file)
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parses a calendar date, dropping any time of day
///
/// Month-first is tried before day-first for slashed dates, so `05/01/2023`
/// is the first of May. Returns `None` for anything unrecognized.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|date_time| date_time.date())
        })
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where D: serde::Deserializer<'de>
{
    use serde::Deserialize;

    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(parse_date))
}
