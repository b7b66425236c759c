use crate::catalog::{self, AddOutcome, Catalog, LoadReport, SelectError};
use crate::report::AnalysisReport;
use chrono::NaiveDate;

/// All state owned by one user session: the starting date, the loaded
/// catalog, and the report of the last load. Passed by reference into every
/// operation; nothing about market data lives in process-wide state.
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub start_date: NaiveDate,
    pub catalog: Catalog,
    pub last_load: LoadReport,
}

impl Session {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            ..Self::default()
        }
    }

    /// Replaces the catalog with a fresh load of `symbols` from `start_date`.
    pub async fn load(&mut self, client: &reqwest::Client, symbols: &[String]) -> &LoadReport {
        let (catalog, report) = catalog::load(client, symbols, self.start_date).await;
        self.catalog = catalog;
        self.last_load = report;
        &self.last_load
    }

    pub async fn add_stocks(
        &mut self,
        client: &reqwest::Client,
        raw_input: &str,
    ) -> Vec<AddOutcome> {
        catalog::add(client, raw_input, &mut self.catalog, self.start_date).await
    }

    /// Full analysis rerun for the current selection: select → sample →
    /// presentation products. A selection whose joint table has fewer than
    /// two rows cannot produce returns and reports as no-data.
    pub fn analyze(
        &self,
        requested: &[String],
        trials: usize,
    ) -> Result<AnalysisReport, SelectError> {
        let selected = catalog::select(requested, &self.catalog)?;
        if selected.n_rows() < 2 {
            return Err(SelectError::NoData);
        }
        let table = crate::frontier::sample(&selected, trials).map_err(|_| SelectError::NoData)?;
        Ok(AnalysisReport::build(self, &selected, table, trials))
    }
}
