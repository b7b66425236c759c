use crate::config;
use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One daily observation: trading day and dividend/split-adjusted close.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub adj_close: f64,
}

/// Daily adjusted-close history for one symbol, strictly increasing by date.
/// Missing trading days are simply absent, never null-filled.
#[derive(Clone, Debug, Serialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

/// Per-symbol result of a history download. Replaces the silent
/// skip-on-error pattern: the caller sees exactly what happened.
#[derive(Debug)]
pub enum FetchOutcome {
    Loaded(PriceSeries),
    NoData,
    Failed(String),
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooIndicators {
    #[serde(default)]
    adjclose: Vec<YahooAdjClose>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooAdjClose {
    adjclose: Vec<Option<f64>>,
}

#[derive(Deserialize, Debug)]
struct YahooSearchResponse {
    #[serde(default)]
    quotes: Vec<YahooSearchQuote>,
}

#[derive(Deserialize, Debug)]
struct YahooSearchQuote {
    symbol: Option<String>,
}

fn chart_url(symbol: &str, start: NaiveDate) -> String {
    let period1 = start
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0);
    let period2 = Utc::now().timestamp();
    format!(
        "https://query1.finance.yahoo.com/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=div%2Csplit",
        symbol, period1, period2
    )
}

async fn fetch_chart(
    client: &reqwest::Client,
    symbol: &str,
    start: NaiveDate,
) -> Result<YahooChartResponse> {
    let url = chart_url(symbol, start);
    let attempts = config::fetch_retry_attempts();
    let mut last_err: Option<anyhow::Error> = None;

    for attempt in 1..=attempts {
        match client
            .get(&url)
            .header("User-Agent", "Mozilla/5.0")
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await
        {
            Ok(resp) => match resp.error_for_status() {
                Ok(ok_resp) => match ok_resp.json::<YahooChartResponse>().await {
                    Ok(parsed) => return Ok(parsed),
                    Err(err) => last_err = Some(err.into()),
                },
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }

        if attempt < attempts {
            warn!(
                "Chart fetch retry for {} ({}/{})",
                symbol, attempt, attempts
            );
            tokio::time::sleep(std::time::Duration::from_millis(500 * attempt as u64)).await;
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("chart fetch failed for {}", symbol)))
}

fn chart_to_series(symbol: &str, response: &YahooChartResponse) -> Option<PriceSeries> {
    let result = response.chart.result.as_ref()?.first()?;
    let closes = &result.indicators.adjclose.first()?.adjclose;

    let mut points: Vec<PricePoint> = Vec::with_capacity(result.timestamp.len());
    for (&ts, close) in result.timestamp.iter().zip(closes.iter()) {
        let Some(adj_close) = *close else { continue };
        let Some(date) = Utc.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive()) else {
            continue;
        };
        // Yahoo occasionally repeats the trailing day intraday; keep the index strict.
        if points.last().is_some_and(|p: &PricePoint| p.date >= date) {
            continue;
        }
        points.push(PricePoint { date, adj_close });
    }

    if points.is_empty() {
        return None;
    }
    Some(PriceSeries {
        symbol: symbol.to_uppercase(),
        points,
    })
}

/// Downloads the daily adjusted-close history for `symbol` from `start` to
/// now. Never panics on a bad symbol or flaky source; the outcome says
/// whether the series loaded, came back empty, or errored.
pub async fn fetch_daily_adjusted(
    client: &reqwest::Client,
    symbol: &str,
    start: NaiveDate,
) -> FetchOutcome {
    match fetch_chart(client, symbol, start).await {
        Ok(response) => match chart_to_series(symbol, &response) {
            Some(series) => {
                info!("Loaded {} ({} trading days)", symbol, series.points.len());
                FetchOutcome::Loaded(series)
            }
            None => FetchOutcome::NoData,
        },
        Err(err) => FetchOutcome::Failed(err.to_string()),
    }
}

/// Symbol metadata existence check against the data source.
pub async fn lookup_symbol(client: &reqwest::Client, symbol: &str) -> Result<bool> {
    let url = format!(
        "https://query1.finance.yahoo.com/v1/finance/search?q={}&quotesCount=5&newsCount=0",
        symbol
    );
    let response = client
        .get(&url)
        .header("User-Agent", "Mozilla/5.0")
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await?
        .error_for_status()?;

    let parsed = response.json::<YahooSearchResponse>().await?;
    Ok(parsed
        .quotes
        .iter()
        .filter_map(|q| q.symbol.as_deref())
        .any(|s| s.eq_ignore_ascii_case(symbol)))
}

/// Trailing rolling annualized volatility of the series, aligned to its
/// price index: sample std of the last `ROLLING_VOL_WINDOW` simple percentage
/// changes, scaled by √252. `None` until the window has filled.
pub fn rolling_volatility(series: &PriceSeries) -> Vec<Option<f64>> {
    let window = config::ROLLING_VOL_WINDOW;
    let prices = &series.points;
    let n = prices.len();

    let pct_changes: Vec<f64> = prices
        .windows(2)
        .map(|w| w[1].adj_close / w[0].adj_close - 1.0)
        .collect();

    let mut out = vec![None; n];
    for i in window..n {
        // Percentage change at return-index k is the move into price k+1,
        // so the window ending at price i covers returns [i-window, i).
        let slice = &pct_changes[i - window..i];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let variance =
            slice.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (window as f64 - 1.0);
        out[i] = Some(variance.sqrt() * config::VOL_ANNUALIZATION_DAYS.sqrt());
    }
    out
}

#[cfg(test)]
impl PriceSeries {
    /// Deterministic random-walk series for tests, one point per calendar day.
    pub fn new_mock(symbol: &str, days: usize, start: NaiveDate, seed: u64) -> Self {
        use rand::prelude::*;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = Vec::with_capacity(days);
        let mut price: f64 = 100.0;
        let mut date = start;

        for _ in 0..days {
            let change_pct: f64 = rng.gen_range(-0.02..0.02);
            price *= 1.0 + change_pct;
            points.push(PricePoint {
                date,
                adj_close: price,
            });
            date = date.succ_opt().expect("date in range");
        }

        Self {
            symbol: symbol.to_uppercase(),
            points,
        }
    }
}
