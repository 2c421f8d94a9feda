use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::AccountRecord;

/// The last year of sales taken into account unless configured otherwise
pub const DEFAULT_CUTOFF_YEAR: i32 = 2023;

/// One customer of one salesperson, together with the salesperson's totals
///
/// Serializes to the column layout of the exported reports.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResultRow {
    #[serde(rename = "Nome_Vendedor")]
    pub salesperson: String,
    /// The number of distinct customers of the salesperson
    #[serde(rename = "Numero_de_Clientes")]
    pub customer_count: usize,
    #[serde(rename = "Razao_Social_Pessoas")]
    pub customer: String,
    /// The most recent sale to the customer
    #[serde(rename = "Ultima_Venda")]
    pub last_sale: NaiveDate,
    /// The most recent quote issued to the customer, if any
    #[serde(rename = "Ultimo_Orcamento")]
    pub last_quote: Option<NaiveDate>,
    #[serde(rename = "Dias_Sem_Compra")]
    pub days_since_last_purchase: i64,
}

/// The latest activity of one customer with one salesperson
#[derive(Clone, Copy, Debug)]
struct LatestActivity {
    last_sale: NaiveDate,
    last_quote: Option<NaiveDate>,
}

impl LatestActivity {
    fn merge(&mut self, last_sale: NaiveDate, last_quote: Option<NaiveDate>) {
        self.last_sale = self.last_sale.max(last_sale);
        // `None` orders below every date, so absent quotes never win
        self.last_quote = self.last_quote.max(last_quote);
    }
}

/// Summarizes how recently the customers of each salesperson bought something
///
/// Only sales up to and including the cutoff year are considered.
#[derive(Clone, Copy, Debug)]
pub struct Aggregator {
    cutoff_year: i32,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::with_cutoff_year(DEFAULT_CUTOFF_YEAR)
    }
}

impl Aggregator {
    /// Creates an aggregator ignoring sales after `cutoff_year`
    pub fn with_cutoff_year(cutoff_year: i32) -> Self {
        Self { cutoff_year }
    }

    /// The last year of sales taken into account
    pub fn cutoff_year(&self) -> i32 {
        self.cutoff_year
    }

    /// Builds one row per salesperson and customer
    ///
    /// Records without any known activity are discarded first. Of the
    /// remaining ones, only records with a last sale in or before the cutoff
    /// year are grouped. Records lacking a salesperson or a customer name
    /// can't be grouped and are skipped as well.
    ///
    /// The rows are sorted by salesperson and customer, but callers shouldn't
    /// rely on that.
    pub fn aggregate(&self, records: &[AccountRecord], as_of: NaiveDate) -> Vec<ResultRow> {
        let mut customers: BTreeMap<&str, BTreeMap<&str, LatestActivity>> = BTreeMap::new();
        let mut discarded = 0usize;
        let mut after_cutoff = 0usize;
        let mut ungrouped = 0usize;

        for record in records {
            if record.has_no_activity() {
                discarded += 1;
                continue;
            }

            // the year filter also drops records without a last sale
            let last_sale = match record.last_sale {
                Some(last_sale) if last_sale.year() <= self.cutoff_year => last_sale,
                _ => {
                    after_cutoff += 1;
                    continue;
                }
            };

            let (salesperson, customer) = match (&record.salesperson, &record.legal_name) {
                (Some(salesperson), Some(customer)) => (salesperson.as_str(), customer.as_str()),
                _ => {
                    ungrouped += 1;
                    continue;
                }
            };

            customers
                .entry(salesperson)
                .or_default()
                .entry(customer)
                .and_modify(|activity| activity.merge(last_sale, record.last_quote))
                .or_insert(LatestActivity { last_sale, last_quote: record.last_quote });
        }

        tracing::debug!(
            records = records.len(),
            discarded,
            after_cutoff,
            ungrouped,
            salespeople = customers.len(),
            "aggregated account records"
        );

        customers
            .into_iter()
            .flat_map(|(salesperson, customers)| {
                let customer_count = customers.len();
                customers
                    .into_iter()
                    .map(move |(customer, activity)| ResultRow {
                        salesperson: salesperson.to_owned(),
                        customer_count,
                        customer: customer.to_owned(),
                        last_sale: activity.last_sale,
                        last_quote: activity.last_quote,
                        days_since_last_purchase: (as_of - activity.last_sale).num_days(),
                    })
            })
            .collect()
    }
}

/// Aggregates `records` with the default cutoff year
///
/// See [`Aggregator::aggregate`].
pub fn aggregate(records: &[AccountRecord], as_of: NaiveDate) -> Vec<ResultRow> {
    Aggregator::default().aggregate(records, as_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_records;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn sorted(mut rows: Vec<ResultRow>) -> Vec<ResultRow> {
        rows.sort();
        rows
    }

    macro_rules! aggregate_test {
        (
            $name:ident
            $records:literal
            $solution:literal
        ) => {
            #[test]
            fn $name() {
                let records = read_records($records.as_bytes()).unwrap();
                let rows = aggregate(&records, as_of());

                let mut solution = csv::ReaderBuilder::new()
                    .has_headers(true)
                    .trim(csv::Trim::All)
                    .from_reader($solution.as_bytes());
                let solution = solution
                    .deserialize::<ResultRow>()
                    .map(Result::unwrap)
                    .collect::<Vec<_>>();
                assert_eq!(
                    sorted(rows),
                    sorted(solution),
                );
            }
        };
    }

    aggregate_test!(single_customer
        r#"1;PJ;ACME;;;;;9;Bob;2023-05-01;;;;;2023-04-20"#
        r#"Nome_Vendedor,Numero_de_Clientes,Razao_Social_Pessoas,Ultima_Venda,Ultimo_Orcamento,Dias_Sem_Compra
                     Bob,                 1,                ACME,  2023-05-01,      2023-04-20,            245"#
    );
    aggregate_test!(latest_activity_wins
        r#"1;PJ;ACME;;;;;9;Bob;2023-05-01;;;;;2023-04-20
           2;PJ;ACME;;;;;9;Bob;2023-06-15;;;;;
           3;PJ;ACME;;;;;9;Bob;2022-12-31;;;;;2023-05-30"#
        r#"Nome_Vendedor,Numero_de_Clientes,Razao_Social_Pessoas,Ultima_Venda,Ultimo_Orcamento,Dias_Sem_Compra
                     Bob,                 1,                ACME,  2023-06-15,      2023-05-30,            200"#
    );
    aggregate_test!(sales_after_cutoff_are_ignored
        r#"1;PJ;ACME;;;;;9;Bob;2023-05-01;;;;;2023-04-20
           2;PJ;ACME;;;;;9;Bob;2023-06-15;;;;;
           3;PJ;CAROL CO;;;;;8;Carol;2022-01-01;;;;;2022-01-01
           4;PJ;BETA;;;;;9;Bob;2024-01-01;;;;;"#
        r#"Nome_Vendedor,Numero_de_Clientes,Razao_Social_Pessoas,Ultima_Venda,Ultimo_Orcamento,Dias_Sem_Compra
                     Bob,                 1,                ACME,  2023-06-15,      2023-04-20,            200
                   Carol,                 1,            CAROL CO,  2022-01-01,      2022-01-01,            730"#
    );
    aggregate_test!(quote_after_cutoff_is_kept
        r#"1;PJ;ACME;;;;;9;Bob;2023-12-31;;;;;2024-03-01"#
        r#"Nome_Vendedor,Numero_de_Clientes,Razao_Social_Pessoas,Ultima_Venda,Ultimo_Orcamento,Dias_Sem_Compra
                     Bob,                 1,                ACME,  2023-12-31,      2024-03-01,              1"#
    );
    aggregate_test!(distinct_customers_are_counted_once
        r#"1;PJ;ACME;;;;;9;Bob;2023-05-01;;;;;
           2;PJ;ACME;;;;;9;Bob;2023-02-01;;;;;
           3;PJ;BETA;;;;;9;Bob;2021-07-10;;;;;
           4;PJ;ACME;;;;;8;Carol;2020-01-01;;;;;"#
        r#"Nome_Vendedor,Numero_de_Clientes,Razao_Social_Pessoas,Ultima_Venda,Ultimo_Orcamento,Dias_Sem_Compra
                     Bob,                 2,                ACME,  2023-05-01,                ,            245
                     Bob,                 2,                BETA,  2021-07-10,                ,            905
                   Carol,                 1,                ACME,  2020-01-01,                ,           1461"#
    );
    aggregate_test!(records_without_sale_are_dropped
        r#"1;PJ;ACME;;;;;9;Bob;;;;;;2023-04-20
           2;PJ;BETA;;;;;9;Bob;garbage;;;;;garbage
           3;PJ;GAMMA;;;;;9;Bob;2023-01-01;;;;;"#
        r#"Nome_Vendedor,Numero_de_Clientes,Razao_Social_Pessoas,Ultima_Venda,Ultimo_Orcamento,Dias_Sem_Compra
                     Bob,                 1,               GAMMA,  2023-01-01,                ,            365"#
    );
    aggregate_test!(records_without_names_are_skipped
        r#"1;PJ;;;;;;9;Bob;2023-01-01;;;;;
           2;PJ;ACME;;;;;9;;2023-01-01;;;;;
           3;PJ;BETA;;;;;9;Bob;2023-01-01;;;;;"#
        r#"Nome_Vendedor,Numero_de_Clientes,Razao_Social_Pessoas,Ultima_Venda,Ultimo_Orcamento,Dias_Sem_Compra
                     Bob,                 1,                BETA,  2023-01-01,                ,            365"#
    );
    aggregate_test!(names_are_case_sensitive
        r#"1;PJ;ACME;;;;;9;Bob;2023-01-01;;;;;
           2;PJ;Acme;;;;;9;Bob;2023-01-02;;;;;
           3;PJ;ACME;;;;;9;bob;2023-01-03;;;;;"#
        r#"Nome_Vendedor,Numero_de_Clientes,Razao_Social_Pessoas,Ultima_Venda,Ultimo_Orcamento,Dias_Sem_Compra
                     Bob,                 2,                ACME,  2023-01-01,                ,            365
                     Bob,                 2,                Acme,  2023-01-02,                ,            364
                     bob,                 1,                ACME,  2023-01-03,                ,            363"#
    );

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(aggregate(&[], as_of()).is_empty());
    }

    #[test]
    fn everything_filtered_yields_no_rows() {
        let records = read_records(
            "1;PJ;ACME;;;;;9;Bob;2024-05-01;;;;;\n2;PJ;BETA;;;;;9;Bob;;;;;;\n".as_bytes()
        ).unwrap();
        assert!(aggregate(&records, as_of()).is_empty());
    }

    #[test]
    fn cutoff_year_is_configurable() {
        let records = read_records(
            "1;PJ;ACME;;;;;9;Bob;2024-05-01;;;;;\n2;PJ;BETA;;;;;9;Bob;2019-05-01;;;;;\n".as_bytes()
        ).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let rows = Aggregator::with_cutoff_year(2024).aggregate(&records, as_of);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.customer_count == 2));

        let rows = Aggregator::with_cutoff_year(2018).aggregate(&records, as_of);
        assert!(rows.is_empty());
    }

    #[test]
    fn aggregation_is_repeatable() {
        let records = read_records(
            "1;PJ;ACME;;;;;9;Bob;2023-05-01;;;;;2023-04-20\n\
             2;PJ;BETA;;;;;8;Carol;2022-01-01;;;;;\n\
             3;PJ;ACME;;;;;9;Bob;2021-03-01;;;;;\n".as_bytes()
        ).unwrap();

        assert_eq!(
            sorted(aggregate(&records, as_of())),
            sorted(aggregate(&records, as_of())),
        );
    }

    #[test]
    fn days_are_negative_before_the_last_sale() {
        let records = read_records("1;PJ;ACME;;;;;9;Bob;2023-05-01;;;;;\n".as_bytes()).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2023, 4, 30).unwrap();

        assert_eq!(aggregate(&records, as_of)[0].days_since_last_purchase, -1);
    }

    #[test]
    fn padded_names_are_distinct() {
        let records = read_records(
            "1;PJ;ACME ;;;;;9;Bob;2023-01-01;;;;;\n\
             2;PJ;ACME;;;;;9;Bob;2023-01-01;;;;;\n\
             3;PJ;X;;;;;9; Bob;2023-01-01;;;;;\n".as_bytes()
        ).unwrap();
        let rows = aggregate(&records, as_of());

        let customers = |salesperson: &str| rows
            .iter()
            .filter(|row| row.salesperson == salesperson)
            .map(|row| (row.customer.as_str(), row.customer_count))
            .collect::<Vec<_>>();
        assert_eq!(customers("Bob"), vec![("ACME", 2), ("ACME ", 2)]);
        assert_eq!(customers(" Bob"), vec![("X", 1)]);
        assert_eq!(crate::filter_by_salesperson(&rows, " Bob").len(), 1);
    }
}
