use crate::catalog::SelectedData;
use crate::frontier::{self, FrontierTable, SampleRecord};
use crate::session::Session;
use chrono::NaiveDate;
use serde::Serialize;

/// Normalized price-index series for one asset (first row = 100).
#[derive(Clone, Debug, Serialize)]
pub struct IndexSeries {
    pub symbol: String,
    pub values: Vec<f64>,
}

/// A max-Sharpe record with display formatting applied: weights, return,
/// and volatility as percentages, Sharpe as a plain ratio.
#[derive(Clone, Debug, Serialize)]
pub struct MaxSharpeRow {
    pub annual_return: String,
    pub annual_volatility: String,
    pub sharpe: String,
    pub weights: Vec<WeightCell>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WeightCell {
    pub symbol: String,
    pub weight: String,
}

/// Everything the presentation layer renders for one analysis rerun.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisReport {
    pub start_date: NaiveDate,
    pub symbols: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub normalized_index: Vec<IndexSeries>,
    pub frontier: Vec<SampleRecord>,
    pub max_sharpe: Vec<MaxSharpeRow>,
    pub correlation: Vec<Vec<f64>>,
    pub covariance: Vec<Vec<f64>>,
    /// Latest rolling annualized volatility per selected asset, if the
    /// window has filled.
    pub latest_volatility: Vec<(String, Option<f64>)>,
    pub trials: usize,
}

/// `0.1234` → `"12.34%"`. Plain fixed-point formatting; a weight of exactly
/// one renders as `"100.00%"`.
pub fn percent(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}

pub fn ratio(x: f64) -> String {
    format!("{:.2}", x)
}

impl AnalysisReport {
    pub fn build(
        session: &Session,
        selected: &SelectedData,
        table: FrontierTable,
        trials: usize,
    ) -> Self {
        let normalized_index = selected
            .symbols
            .iter()
            .zip(frontier::normalized_index(selected))
            .map(|(symbol, values)| IndexSeries {
                symbol: symbol.clone(),
                values,
            })
            .collect();

        let max_sharpe = table
            .max_sharpe
            .iter()
            .map(|&idx| format_max_sharpe(&table.records[idx], &selected.symbols))
            .collect();

        let latest_volatility = selected
            .symbols
            .iter()
            .map(|symbol| {
                let latest = session
                    .catalog
                    .get(symbol)
                    .and_then(|column| column.volatility.last().copied())
                    .flatten();
                (symbol.clone(), latest)
            })
            .collect();

        Self {
            start_date: session.start_date,
            symbols: selected.symbols.clone(),
            dates: selected.dates.clone(),
            normalized_index,
            max_sharpe,
            correlation: frontier::correlation_matrix(selected),
            covariance: frontier::covariance_matrix(selected),
            latest_volatility,
            frontier: table.records,
            trials,
        }
    }
}

fn format_max_sharpe(record: &SampleRecord, symbols: &[String]) -> MaxSharpeRow {
    MaxSharpeRow {
        annual_return: percent(record.annual_return),
        annual_volatility: percent(record.annual_volatility),
        sharpe: ratio(record.sharpe),
        weights: symbols
            .iter()
            .zip(record.weights.iter())
            .map(|(symbol, &w)| WeightCell {
                symbol: symbol.clone(),
                weight: percent(w),
            })
            .collect(),
    }
}

/// Terminal rendering of the report for the one-shot CLI mode.
pub fn print_report(report: &AnalysisReport) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║              Markowitz Efficient Frontier                  ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!(
        "║  Assets: {:<49} ║",
        truncate(&report.symbols.join(", "), 49)
    );
    println!(
        "║  Window: {} → {}   rows: {:<6} trials: {:<6}   ║",
        report.start_date,
        report.dates.last().map(|d| d.to_string()).unwrap_or_default(),
        report.dates.len(),
        report.trials
    );
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  Max-Sharpe Portfolio                                      ║");

    for row in &report.max_sharpe {
        println!(
            "║    Return {:>8}   Volatility {:>8}   Sharpe {:>6}    ║",
            row.annual_return, row.annual_volatility, row.sharpe
        );
        for cell in &row.weights {
            println!("║      {:<8} {:>8}                                   ║", cell.symbol, cell.weight);
        }
    }

    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  Correlation Matrix                                        ║");
    print_matrix(&report.symbols, &report.correlation);
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  Covariance Matrix                                         ║");
    print_matrix(&report.symbols, &report.covariance);
    println!("╚════════════════════════════════════════════════════════════╝");
}

fn print_matrix(symbols: &[String], matrix: &[Vec<f64>]) {
    for (symbol, row) in symbols.iter().zip(matrix.iter()) {
        let cells = row
            .iter()
            .map(|v| format!("{:>10.4}", v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("║    {:<8} {:<45} ║", symbol, truncate(&cells, 45));
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max.saturating_sub(1)).collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceSeries;
    use crate::frontier::sample_with_rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn percent_formatting_keeps_trailing_zeros() {
        assert_eq!(percent(0.12345), "12.35%");
        assert_eq!(percent(1.0), "100.00%");
        assert_eq!(percent(0.1), "10.00%");
        assert_eq!(percent(0.0), "0.00%");
        assert_eq!(ratio(1.2), "1.20");
    }

    #[test]
    fn report_carries_all_presentation_products() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut session = Session::new(start);
        session
            .catalog
            .insert_series(PriceSeries::new_mock("AAPL", 80, start, 1));
        session
            .catalog
            .insert_series(PriceSeries::new_mock("MSFT", 80, start, 2));

        let selected = crate::catalog::select(&[], &session.catalog).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let table = sample_with_rng(&selected, 250, &mut rng).unwrap();
        let report = AnalysisReport::build(&session, &selected, table, 250);

        assert_eq!(report.frontier.len(), 250);
        assert_eq!(report.normalized_index.len(), 2);
        for series in &report.normalized_index {
            assert!((series.values[0] - 100.0).abs() < 1e-12);
        }
        assert_eq!(report.correlation.len(), 2);
        assert_eq!(report.covariance.len(), 2);
        assert!(!report.max_sharpe.is_empty());
        for row in &report.max_sharpe {
            assert!(row.annual_volatility.ends_with('%'));
            assert!(!row.sharpe.ends_with('%'));
            assert_eq!(row.weights.len(), 2);
        }
        assert_eq!(report.latest_volatility.len(), 2);
        assert!(report.latest_volatility[0].1.is_some());
    }
}
