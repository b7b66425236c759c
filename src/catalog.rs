use crate::config;
use crate::data::{self, FetchOutcome, PriceSeries};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{info, warn};

/// Price history plus its derived rolling-volatility column. The volatility
/// column only exists alongside its source series and is recomputed whenever
/// the series is (re)loaded.
#[derive(Clone, Debug, Serialize)]
pub struct AssetColumn {
    pub prices: PriceSeries,
    pub volatility: Vec<Option<f64>>,
}

/// In-memory table of ticker → price series, in insertion order.
/// Append-only: duplicates are rejected at the add seam.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Catalog {
    assets: Vec<AssetColumn>,
}

/// What happened to each symbol during the initial load.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub no_data: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddStatus {
    Added,
    Duplicate,
    Invalid,
    NoData,
    FetchFailed,
}

/// Per-symbol outcome of an add-stock request.
#[derive(Clone, Debug, Serialize)]
pub struct AddOutcome {
    pub symbol: String,
    pub status: AddStatus,
    pub detail: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("selection outside portfolio: {0}")]
    OutsidePortfolio(String),
    #[error("no data for selection")]
    NoData,
}

/// The subset of catalog columns chosen for analysis, row-filtered so no
/// date has a missing value in any included column. Rebuilt on every
/// selection change, never cached.
#[derive(Clone, Debug, Serialize)]
pub struct SelectedData {
    pub dates: Vec<NaiveDate>,
    pub symbols: Vec<String>,
    /// Column-major, rectangular: `prices[c][r]` is symbol `c` on date `r`.
    pub prices: Vec<Vec<f64>>,
}

impl SelectedData {
    pub fn n_assets(&self) -> usize {
        self.symbols.len()
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.assets
            .iter()
            .map(|a| a.prices.symbol.clone())
            .collect()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn get(&self, symbol: &str) -> Option<&AssetColumn> {
        self.assets.iter().find(|a| a.prices.symbol == symbol)
    }

    /// Appends a series and its freshly computed volatility column.
    /// Caller is responsible for the duplicate check.
    pub fn insert_series(&mut self, series: PriceSeries) {
        let volatility = data::rolling_volatility(&series);
        self.assets.push(AssetColumn {
            prices: series,
            volatility,
        });
    }
}

/// Parses a comma-separated, whitespace-stripped ticker list into uppercase
/// symbols, de-duplicated in first-seen order.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(|s| {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Populates a fresh catalog from the given universe. Per-ticker failures
/// are contained in the loop: a symbol that errors or comes back empty is
/// excluded for the session and recorded in the report.
pub async fn load(
    client: &reqwest::Client,
    symbols: &[String],
    start: NaiveDate,
) -> (Catalog, LoadReport) {
    let mut catalog = Catalog::default();
    let mut report = LoadReport::default();
    let delay_ms = config::batch_fetch_delay_ms();

    for (idx, symbol) in symbols.iter().enumerate() {
        if catalog.contains(symbol) {
            continue;
        }
        match data::fetch_daily_adjusted(client, symbol, start).await {
            FetchOutcome::Loaded(series) => {
                report.loaded.push(symbol.clone());
                catalog.insert_series(series);
            }
            FetchOutcome::NoData => {
                warn!("No data for {}; excluding it for this session", symbol);
                report.no_data.push(symbol.clone());
            }
            FetchOutcome::Failed(reason) => {
                warn!("Fetch failed for {}: {}; excluding it", symbol, reason);
                report.failed.push((symbol.clone(), reason));
            }
        }

        if idx + 1 < symbols.len() && delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }
    }

    info!(
        "Catalog loaded: {} of {} symbols have data",
        catalog.len(),
        symbols.len()
    );
    (catalog, report)
}

/// Add-stock operation. The duplicate check runs first, before any network
/// call, so re-requesting a loaded ticker never triggers a second fetch.
/// Then the symbol is validated against the data source metadata; only a
/// validated, fetchable symbol is appended.
pub async fn add(
    client: &reqwest::Client,
    raw_input: &str,
    catalog: &mut Catalog,
    start: NaiveDate,
) -> Vec<AddOutcome> {
    let symbols = parse_symbols(raw_input);
    let mut outcomes = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        if catalog.contains(&symbol) {
            outcomes.push(AddOutcome {
                symbol,
                status: AddStatus::Duplicate,
                detail: Some("already in the portfolio".to_string()),
            });
            continue;
        }

        match data::lookup_symbol(client, &symbol).await {
            Ok(true) => {}
            Ok(false) => {
                outcomes.push(AddOutcome {
                    symbol,
                    status: AddStatus::Invalid,
                    detail: Some("unknown ticker symbol".to_string()),
                });
                continue;
            }
            Err(err) => {
                outcomes.push(AddOutcome {
                    symbol,
                    status: AddStatus::Invalid,
                    detail: Some(err.to_string()),
                });
                continue;
            }
        }

        match data::fetch_daily_adjusted(client, &symbol, start).await {
            FetchOutcome::Loaded(series) => {
                catalog.insert_series(series);
                info!("Stock {} added to the portfolio", symbol);
                outcomes.push(AddOutcome {
                    symbol,
                    status: AddStatus::Added,
                    detail: None,
                });
            }
            FetchOutcome::NoData => outcomes.push(AddOutcome {
                symbol,
                status: AddStatus::NoData,
                detail: Some("no price history in the requested range".to_string()),
            }),
            FetchOutcome::Failed(reason) => outcomes.push(AddOutcome {
                symbol,
                status: AddStatus::FetchFailed,
                detail: Some(reason),
            }),
        }
    }

    outcomes
}

/// Stock selector. An empty request means the full catalog. Any requested
/// symbol outside the catalog rejects the whole selection. Rows with a
/// missing value in any included column are dropped; an empty result after
/// the drop is reported rather than returned.
pub fn select(requested: &[String], catalog: &Catalog) -> Result<SelectedData, SelectError> {
    let symbols: Vec<String> = if requested.is_empty() {
        catalog.symbols()
    } else {
        for symbol in requested {
            if !catalog.contains(symbol) {
                return Err(SelectError::OutsidePortfolio(symbol.clone()));
            }
        }
        requested.to_vec()
    };

    if symbols.is_empty() {
        return Err(SelectError::NoData);
    }

    let by_date: Vec<BTreeMap<NaiveDate, f64>> = symbols
        .iter()
        .map(|symbol| {
            catalog
                .get(symbol)
                .expect("membership checked above")
                .prices
                .points
                .iter()
                .map(|p| (p.date, p.adj_close))
                .collect()
        })
        .collect();

    // Keep only the dates present in every selected column.
    let dates: Vec<NaiveDate> = by_date[0]
        .keys()
        .filter(|date| by_date[1..].iter().all(|m| m.contains_key(*date)))
        .copied()
        .collect();

    if dates.is_empty() {
        return Err(SelectError::NoData);
    }

    let prices: Vec<Vec<f64>> = by_date
        .iter()
        .map(|m| dates.iter().map(|d| m[d]).collect())
        .collect();

    Ok(SelectedData {
        dates,
        symbols,
        prices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    fn mock_catalog(specs: &[(&str, usize)]) -> Catalog {
        let mut catalog = Catalog::default();
        for (i, (symbol, days)) in specs.iter().enumerate() {
            catalog.insert_series(PriceSeries::new_mock(symbol, *days, mock_start(), i as u64));
        }
        catalog
    }

    #[test]
    fn parse_symbols_strips_and_deduplicates() {
        let parsed = parse_symbols("AAPL, aapl, MSFT");
        assert_eq!(parsed, vec!["AAPL".to_string(), "MSFT".to_string()]);

        let parsed = parse_symbols("  brk.b ,, TSLA , tsla ");
        assert_eq!(parsed, vec!["BRK.B".to_string(), "TSLA".to_string()]);

        assert!(parse_symbols(" , ,").is_empty());
    }

    #[tokio::test]
    async fn duplicate_is_rejected_before_any_fetch() {
        let mut catalog = mock_catalog(&[("AAPL", 40)]);
        let client = reqwest::Client::new();

        // The duplicate branch must resolve without touching the network;
        // a fetch here would hang or error, not return Duplicate.
        let outcomes = add(&client, "AAPL", &mut catalog, mock_start()).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, AddStatus::Duplicate);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn empty_selection_returns_full_catalog() {
        let catalog = mock_catalog(&[("AAPL", 40), ("MSFT", 40), ("SPY", 40)]);
        let selected = select(&[], &catalog).unwrap();

        assert_eq!(selected.symbols, vec!["AAPL", "MSFT", "SPY"]);
        assert_eq!(selected.n_rows(), 40);
    }

    #[test]
    fn selection_outside_portfolio_is_rejected() {
        let catalog = mock_catalog(&[("AAPL", 40)]);
        let err = select(&["AAPL".to_string(), "TSLA".to_string()], &catalog).unwrap_err();
        assert_eq!(err, SelectError::OutsidePortfolio("TSLA".to_string()));
    }

    #[test]
    fn selection_drops_rows_missing_in_any_column() {
        // AAPL has 40 days, MSFT only the first 25: the joint table must be
        // exactly the overlap, with no gaps in either column.
        let catalog = mock_catalog(&[("AAPL", 40), ("MSFT", 25)]);
        let selected =
            select(&["AAPL".to_string(), "MSFT".to_string()], &catalog).unwrap();

        assert_eq!(selected.n_assets(), 2);
        assert_eq!(selected.n_rows(), 25);
        for column in &selected.prices {
            assert_eq!(column.len(), 25);
            assert!(column.iter().all(|p| p.is_finite()));
        }
    }

    #[test]
    fn disjoint_histories_report_no_data() {
        let mut catalog = Catalog::default();
        catalog.insert_series(PriceSeries::new_mock("AAPL", 10, mock_start(), 1));
        let far_future = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        catalog.insert_series(PriceSeries::new_mock("MSFT", 10, far_future, 2));

        let err = select(&["AAPL".to_string(), "MSFT".to_string()], &catalog).unwrap_err();
        assert_eq!(err, SelectError::NoData);
    }

    #[test]
    fn insert_series_computes_volatility_column() {
        let catalog = mock_catalog(&[("AAPL", 40)]);
        let column = catalog.get("AAPL").unwrap();
        assert_eq!(column.volatility.len(), column.prices.points.len());
        assert!(column.volatility[config::ROLLING_VOL_WINDOW].is_some());
    }

    #[test]
    fn mock_point_dates_are_strictly_increasing() {
        let series = PriceSeries::new_mock("AAPL", 40, mock_start(), 1);
        for w in series.points.windows(2) {
            assert!(w[0].date < w[1].date);
        }
    }
}
