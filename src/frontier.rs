use crate::catalog::SelectedData;
use crate::config;
use anyhow::Result;
use rand::Rng;
use serde::Serialize;

/// One Monte Carlo draw: a long-only, fully invested weight vector and its
/// annualized return, volatility, and Sharpe ratio (risk-free rate zero).
#[derive(Clone, Debug, Serialize)]
pub struct SampleRecord {
    pub weights: Vec<f64>,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe: f64,
}

/// All records of one frontier run plus the indices of every record tying
/// the maximum Sharpe ratio (the design does not force a unique winner).
/// Discarded after each rerun, never cached.
#[derive(Clone, Debug, Serialize)]
pub struct FrontierTable {
    pub records: Vec<SampleRecord>,
    pub max_sharpe: Vec<usize>,
}

/// Daily log-returns per column: ln(P_t / P_{t-1}).
pub fn log_returns(selected: &SelectedData) -> Vec<Vec<f64>> {
    selected
        .prices
        .iter()
        .map(|column| column.windows(2).map(|w| (w[1] / w[0]).ln()).collect())
        .collect()
}

fn column_means(columns: &[Vec<f64>]) -> Vec<f64> {
    columns
        .iter()
        .map(|c| c.iter().sum::<f64>() / c.len() as f64)
        .collect()
}

/// Sample covariance matrix (n−1) over column-major observations.
fn covariance_of(columns: &[Vec<f64>], means: &[f64]) -> Vec<Vec<f64>> {
    let n = columns.len();
    let rows = columns.first().map_or(0, |c| c.len());
    let mut cov = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in i..n {
            let mut sum = 0.0;
            for k in 0..rows {
                sum += (columns[i][k] - means[i]) * (columns[j][k] - means[j]);
            }
            let covariance = sum / (rows as f64 - 1.0);
            cov[i][j] = covariance;
            cov[j][i] = covariance;
        }
    }
    cov
}

/// Uniform random non-negative weights normalized to sum 1.
fn generate_random_weights(n: usize, rng: &mut impl Rng) -> Vec<f64> {
    let raw: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
    let sum: f64 = raw.iter().sum();
    raw.iter().map(|v| v / sum).collect()
}

fn portfolio_return(weights: &[f64], means: &[f64]) -> f64 {
    weights.iter().zip(means.iter()).map(|(w, r)| w * r).sum()
}

fn portfolio_variance(weights: &[f64], cov: &[Vec<f64>]) -> f64 {
    let n = weights.len();
    let mut var = 0.0;
    for i in 0..n {
        for j in 0..n {
            var += weights[i] * weights[j] * cov[i][j];
        }
    }
    var
}

/// Runs `trials` independent random draws over the selected price table.
///
/// Per draw: annualized return Σ(wᵢ·mean(Lᵢ))×250, annualized volatility
/// √(wᵗ·(cov(L)×250)·w), Sharpe = return / volatility. A zero-volatility
/// draw produces a non-finite Sharpe that flows into the table unhandled.
pub fn sample(selected: &SelectedData, trials: usize) -> Result<FrontierTable> {
    sample_with_rng(selected, trials, &mut rand::thread_rng())
}

pub fn sample_with_rng(
    selected: &SelectedData,
    trials: usize,
    rng: &mut impl Rng,
) -> Result<FrontierTable> {
    let n = selected.n_assets();
    if n == 0 {
        return Err(anyhow::anyhow!("no assets selected"));
    }
    if selected.n_rows() < 2 {
        return Err(anyhow::anyhow!(
            "need at least 2 rows to compute returns, got {}",
            selected.n_rows()
        ));
    }

    let returns = log_returns(selected);
    let means = column_means(&returns);
    let cov = covariance_of(&returns, &means);
    let annualize = config::RETURN_ANNUALIZATION_DAYS;

    let mut records = Vec::with_capacity(trials);
    let mut max_sharpe: Vec<usize> = Vec::new();
    let mut best = f64::NEG_INFINITY;

    for i in 0..trials {
        let weights = generate_random_weights(n, rng);
        let annual_return = portfolio_return(&weights, &means) * annualize;
        let annual_volatility = (portfolio_variance(&weights, &cov) * annualize).sqrt();
        let sharpe = annual_return / annual_volatility;

        if sharpe > best {
            best = sharpe;
            max_sharpe.clear();
            max_sharpe.push(i);
        } else if sharpe == best {
            max_sharpe.push(i);
        }

        records.push(SampleRecord {
            weights,
            annual_return,
            annual_volatility,
            sharpe,
        });
    }

    Ok(FrontierTable {
        records,
        max_sharpe,
    })
}

/// Each column rebased so its first row equals 100.
pub fn normalized_index(selected: &SelectedData) -> Vec<Vec<f64>> {
    selected
        .prices
        .iter()
        .map(|column| {
            let base = column[0];
            column.iter().map(|p| p / base * 100.0).collect()
        })
        .collect()
}

/// Sample covariance matrix of the selected price columns themselves,
/// matching the dashboard's displayed matrix (price levels, not returns).
pub fn covariance_matrix(selected: &SelectedData) -> Vec<Vec<f64>> {
    let means = column_means(&selected.prices);
    covariance_of(&selected.prices, &means)
}

/// Pearson correlation matrix of the selected price columns.
pub fn correlation_matrix(selected: &SelectedData) -> Vec<Vec<f64>> {
    let cov = covariance_matrix(selected);
    let n = cov.len();
    let mut corr = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            corr[i][j] = cov[i][j] / (cov[i][i].sqrt() * cov[j][j].sqrt());
        }
    }
    corr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, Catalog};
    use crate::data::PriceSeries;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mock_selected(n_assets: usize, days: usize) -> SelectedData {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut cat = Catalog::default();
        for i in 0..n_assets {
            cat.insert_series(PriceSeries::new_mock(
                &format!("AS{}", i),
                days,
                start,
                i as u64 + 1,
            ));
        }
        catalog::select(&[], &cat).unwrap()
    }

    #[test]
    fn weights_are_long_only_and_sum_to_one() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let w = generate_random_weights(5, &mut rng);
            let sum: f64 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-10, "weights sum {} != 1", sum);
            assert!(w.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn frontier_has_exactly_the_requested_trials() {
        let selected = mock_selected(2, 120);
        let mut rng = StdRng::seed_from_u64(11);
        let table = sample_with_rng(&selected, 1000, &mut rng).unwrap();

        assert_eq!(table.records.len(), 1000);
        assert!(!table.max_sharpe.is_empty());

        let best = table.records[table.max_sharpe[0]].sharpe;
        for record in &table.records {
            assert!(best >= record.sharpe);
        }
        for &idx in &table.max_sharpe {
            assert_eq!(table.records[idx].sharpe, best);
        }
    }

    #[test]
    fn sample_rejects_degenerate_input() {
        let selected = mock_selected(2, 120);
        let empty = SelectedData {
            dates: selected.dates[..1].to_vec(),
            symbols: selected.symbols.clone(),
            prices: selected.prices.iter().map(|c| c[..1].to_vec()).collect(),
        };
        assert!(sample(&empty, 10).is_err());
    }

    #[test]
    fn log_returns_have_one_fewer_row() {
        let selected = mock_selected(3, 50);
        let returns = log_returns(&selected);
        assert_eq!(returns.len(), 3);
        for column in &returns {
            assert_eq!(column.len(), 49);
        }
    }

    #[test]
    fn normalized_index_starts_at_100() {
        let selected = mock_selected(3, 50);
        let index = normalized_index(&selected);
        for column in &index {
            assert!((column[0] - 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn covariance_matrix_is_symmetric_with_positive_diagonal() {
        let selected = mock_selected(3, 80);
        let cov = covariance_matrix(&selected);
        for i in 0..3 {
            assert!(cov[i][i] > 0.0);
            for j in 0..3 {
                assert!((cov[i][j] - cov[j][i]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn correlation_diagonal_is_one_and_bounded() {
        let selected = mock_selected(3, 80);
        let corr = correlation_matrix(&selected);
        for i in 0..3 {
            assert!((corr[i][i] - 1.0).abs() < 1e-9);
            for j in 0..3 {
                assert!(corr[i][j] <= 1.0 + 1e-9 && corr[i][j] >= -1.0 - 1e-9);
            }
        }
    }

    #[test]
    fn perfectly_correlated_columns_have_unit_correlation() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let base = PriceSeries::new_mock("BASE", 60, start, 9);
        let mut doubled = base.clone();
        doubled.symbol = "TWICE".to_string();
        for p in &mut doubled.points {
            p.adj_close *= 2.0;
        }

        let mut cat = Catalog::default();
        cat.insert_series(base);
        cat.insert_series(doubled);
        let selected = catalog::select(&[], &cat).unwrap();

        let corr = correlation_matrix(&selected);
        assert!((corr[0][1] - 1.0).abs() < 1e-9);
    }
}
