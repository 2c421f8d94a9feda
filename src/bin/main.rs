use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use churn_report::{chart, export_file_name, filter_by_salesperson, Aggregator, ExportFormat, ResultRow, DEFAULT_CUTOFF_YEAR};

/// Reports how recently the customers of each salesperson bought something
#[derive(Debug, Parser)]
#[clap(version)]
struct Args {
    /// The path to the `;` separated account CSV file
    filename: PathBuf,
    /// The date recency is measured against [default: today]
    #[clap(long, value_name = "YYYY-MM-DD")]
    as_of: Option<NaiveDate>,
    /// The last year of sales to take into account
    #[clap(long, value_name = "YEAR", env = "CHURN_CUTOFF_YEAR", default_value_t = DEFAULT_CUTOFF_YEAR)]
    cutoff_year: i32,
    /// Logs more details to stderr, can be repeated
    #[clap(short, long, parse(from_occurrences))]
    verbose: u64,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Writes every report row as CSV to stdout
    Report,
    /// Lists the salespeople present in the report
    Salespeople,
    /// Writes the series behind one of the report charts as CSV to stdout
    ChartData {
        #[clap(arg_enum)]
        series: Series,
        /// The number of histogram bins
        #[clap(long, default_value_t = 20)]
        bins: usize,
        /// The number of points the density curve is sampled at
        #[clap(long, default_value_t = 200)]
        points: usize,
    },
    /// Exports the report rows of a single salesperson
    Export {
        /// The exact name of the salesperson
        #[clap(short, long)]
        salesperson: String,
        /// The directory the report files are written to
        #[clap(short, long, default_value = ".")]
        output_dir: PathBuf,
        #[clap(short, long, arg_enum, default_value = "both")]
        format: FormatArg,
    },
}

#[derive(Clone, Copy, Debug, clap::ArgEnum)]
enum Series {
    /// Customers per salesperson, most customers first
    Customers,
    /// Histogram of the days since the last purchase
    Recency,
    /// Smoothed density of the days since the last purchase
    Density,
}

#[derive(Clone, Copy, Debug, clap::ArgEnum)]
enum FormatArg {
    Csv,
    Xlsx,
    Both,
}

impl FormatArg {
    fn formats(self) -> &'static [ExportFormat] {
        match self {
            FormatArg::Csv => &[ExportFormat::Csv],
            FormatArg::Xlsx => &[ExportFormat::Xlsx],
            FormatArg::Both => &[ExportFormat::Csv, ExportFormat::Xlsx],
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let records = churn_report::read_records_from_path(&args.filename)
        .with_context(|| format!("Failed to read account records from {}", args.filename.display()))?;
    let as_of = args.as_of.unwrap_or_else(|| chrono::Local::now().date_naive());
    let rows = Aggregator::with_cutoff_year(args.cutoff_year).aggregate(&records, as_of);
    tracing::info!(
        records = records.len(),
        rows = rows.len(),
        %as_of,
        cutoff_year = args.cutoff_year,
        "built churn report"
    );

    match args.command {
        Command::Report => {
            std::io::stdout().write_all(&churn_report::to_csv(&rows)?)?;
        }
        Command::Salespeople => {
            let mut stdout = std::io::stdout().lock();
            for salesperson in chart::salespeople(&rows) {
                writeln!(stdout, "{}", salesperson)?;
            }
        }
        Command::ChartData { series, bins, points } => write_series(&rows, series, bins, points)?,
        Command::Export { salesperson, output_dir, format: formats } => {
            let selected = filter_by_salesperson(&rows, &salesperson);
            if selected.is_empty() {
                tracing::warn!(%salesperson, "no report rows for salesperson, exporting an empty report");
            }

            for &format in formats.formats() {
                let path = output_dir.join(export_file_name(&salesperson, args.cutoff_year, format));
                let bytes = format.render(selected.iter().copied())?;
                std::fs::write(&path, bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), mime = format.mime_type(), "exported report");
            }
        }
    }

    Ok(())
}

fn write_series(rows: &[ResultRow], series: Series, bins: usize, points: usize) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(std::io::stdout());

    match series {
        Series::Customers => {
            writer.write_record(["Nome_Vendedor", "Quantidade_de_Clientes"])?;
            for (salesperson, count) in chart::rows_per_salesperson(rows) {
                writer.serialize((salesperson, count))?;
            }
        }
        Series::Recency => {
            writer.write_record(["lower", "upper", "count"])?;
            for bin in chart::recency_histogram(rows, bins) {
                writer.serialize(bin)?;
            }
        }
        Series::Density => {
            writer.write_record(["days", "density"])?;
            for point in chart::recency_density(rows, points) {
                writer.serialize(point)?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

fn init_logging(verbose: u64) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
