use chrono::NaiveDate;

/// Trailing observation count for the rolling volatility column.
pub const ROLLING_VOL_WINDOW: usize = 21;

/// Trading days used to annualize the rolling volatility column (√252).
pub const VOL_ANNUALIZATION_DAYS: f64 = 252.0;

/// Trading days used to annualize frontier returns and covariance (×250),
/// the convention of the underlying Markowitz model.
pub const RETURN_ANNUALIZATION_DAYS: f64 = 250.0;

/// Number of random portfolios drawn per frontier run.
pub const FRONTIER_TRIALS: usize = 1000;

/// Symbols loaded into the catalog when the caller supplies none.
pub const DEFAULT_UNIVERSE: &[&str] = &[
    "AAPL", "MSFT", "AMZN", "NVDA", "GOOG", "META", "JPM", "XOM", "SPY",
];

pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 10, 29).expect("valid built-in date")
}

pub fn fetch_retry_attempts() -> usize {
    std::env::var("FRONTIER_FETCH_RETRY_ATTEMPTS")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map(|v| v.clamp(1, 8))
        .unwrap_or(3)
}

pub fn batch_fetch_delay_ms() -> u64 {
    std::env::var("FRONTIER_FETCH_DELAY_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|v| v.clamp(0, 5_000))
        .unwrap_or(350)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_start_date_is_valid() {
        assert_eq!(default_start_date().to_string(), "2019-10-29");
    }

    #[test]
    fn default_universe_is_uppercase_and_nonempty() {
        assert!(!DEFAULT_UNIVERSE.is_empty());
        for s in DEFAULT_UNIVERSE {
            assert_eq!(**s, s.to_uppercase());
        }
    }
}
