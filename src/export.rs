use rust_xlsxwriter::{Format, Workbook};

use crate::ResultRow;

/// The header of exported reports, in column order
pub const COLUMNS: [&str; 6] = [
    "Nome_Vendedor",
    "Numero_de_Clientes",
    "Razao_Social_Pessoas",
    "Ultima_Venda",
    "Ultimo_Orcamento",
    "Dias_Sem_Compra",
];

/// Possible errors to occur while rendering a report
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("Failed to flush the report buffer: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// The file formats a report can be exported as
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// The file extension, without the leading dot
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    /// The media type the format is served as
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// Renders `rows` in this format
    pub fn render<'a, I>(self, rows: I) -> Result<Vec<u8>, ExportError>
        where I: IntoIterator<Item = &'a ResultRow>
    {
        match self {
            ExportFormat::Csv => to_csv(rows),
            ExportFormat::Xlsx => to_xlsx(rows),
        }
    }
}

/// The rows belonging to `salesperson`
///
/// Names are compared exactly, so an unknown name simply yields no rows.
pub fn filter_by_salesperson<'a>(rows: &'a [ResultRow], salesperson: &str) -> Vec<&'a ResultRow> {
    rows.iter()
        .filter(|row| row.salesperson == salesperson)
        .collect()
}

/// The file name a salesperson's report is offered under
///
/// Path separators in the name are replaced, so the result always names a
/// single file.
pub fn export_file_name(salesperson: &str, cutoff_year: i32, format: ExportFormat) -> String {
    let salesperson = salesperson.replace(['/', '\\'], "_");
    format!("{}_clientes_ate_{}.{}", salesperson, cutoff_year, format.extension())
}

/// Renders `rows` as comma separated values with a header row
///
/// The header is written even if there are no rows.
pub fn to_csv<'a, I>(rows: I) -> Result<Vec<u8>, ExportError>
    where I: IntoIterator<Item = &'a ResultRow>
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }

    writer.into_inner().map_err(|error| ExportError::Io(error.into_error()))
}

/// Renders `rows` as a single sheet XLSX workbook with a header row
pub fn to_xlsx<'a, I>(rows: I) -> Result<Vec<u8>, ExportError>
    where I: IntoIterator<Item = &'a ResultRow>
{
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let worksheet = workbook.add_worksheet();

    for (col, name) in COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (idx, row) in rows.into_iter().enumerate() {
        let line = idx as u32 + 1;
        worksheet.write_string(line, 0, &row.salesperson)?;
        worksheet.write_number(line, 1, row.customer_count as f64)?;
        worksheet.write_string(line, 2, &row.customer)?;
        worksheet.write_date_with_format(line, 3, row.last_sale, &date)?;
        if let Some(last_quote) = row.last_quote {
            worksheet.write_date_with_format(line, 4, last_quote, &date)?;
        }
        worksheet.write_number(line, 5, row.days_since_last_purchase as f64)?;
    }

    Ok(workbook.save_to_buffer()?)
}
