pub use self::{
    aggregate::{aggregate, Aggregator, ResultRow, DEFAULT_CUTOFF_YEAR},
    export::{export_file_name, filter_by_salesperson, to_csv, to_xlsx, ExportError, ExportFormat, COLUMNS},
    record::{parse_date, read_records, read_records_from_path, AccountRecord, RecordError},
};

pub mod chart;

mod aggregate;
mod export;
mod record;
