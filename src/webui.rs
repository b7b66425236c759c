use crate::catalog::{AddOutcome, LoadReport, SelectError};
use crate::report::AnalysisReport;
use crate::session::Session;
use crate::config;
use anyhow::Result;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

const INDEX_HTML: &str = include_str!("../web/index.html");
const APP_JS: &str = include_str!("../web/app.js");

#[derive(Clone)]
struct WebState {
    session: Arc<Mutex<Session>>,
    client: reqwest::Client,
}

#[derive(Clone, Debug, Serialize)]
struct ApiError {
    error: String,
}

#[derive(Debug, Deserialize)]
struct LoadRequest {
    start_date: Option<NaiveDate>,
    symbols: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AddRequest {
    input: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    symbols: Vec<String>,
    trials: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StateSnapshot {
    start_date: NaiveDate,
    assets: Vec<String>,
    last_load: LoadReport,
}

fn normalize_symbols(raw: &[String]) -> Vec<String> {
    let mut symbols: Vec<String> = raw
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    // Preserve request order; only collapse exact repeats.
    let mut seen = std::collections::HashSet::new();
    symbols.retain(|s| seen.insert(s.clone()));
    symbols
}

/// Serves the dashboard. The catalog is populated once from the default
/// universe before the listener binds, mirroring the load-on-start behavior
/// of the dashboard; `/api/load` reruns it with user-chosen inputs.
pub async fn run_server(port: u16, start_date: NaiveDate, universe: &[String]) -> Result<()> {
    let client = reqwest::Client::new();
    let mut session = Session::new(start_date);
    session.load(&client, universe).await;

    let state = WebState {
        session: Arc::new(Mutex::new(session)),
        client,
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/app.js", get(app_js))
        .route("/api/health", get(health))
        .route("/api/state", get(state_snapshot))
        .route("/api/load", post(load))
        .route("/api/stocks/add", post(add_stocks))
        .route("/api/analyze", post(analyze))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn app_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        APP_JS,
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn state_snapshot(State(state): State<WebState>) -> Json<StateSnapshot> {
    let session = state.session.lock().await;
    Json(StateSnapshot {
        start_date: session.start_date,
        assets: session.catalog.symbols(),
        last_load: session.last_load.clone(),
    })
}

async fn load(
    State(state): State<WebState>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<LoadReport>, (StatusCode, Json<ApiError>)> {
    let symbols = match req.symbols {
        Some(ref raw) => normalize_symbols(raw),
        None => config::DEFAULT_UNIVERSE
            .iter()
            .map(|s| s.to_string())
            .collect(),
    };
    if symbols.is_empty() {
        return Err(api_err(StatusCode::BAD_REQUEST, "symbols cannot be empty"));
    }

    let mut session = state.session.lock().await;
    if let Some(start_date) = req.start_date {
        session.start_date = start_date;
    }
    let report = session.load(&state.client, &symbols).await.clone();
    Ok(Json(report))
}

async fn add_stocks(
    State(state): State<WebState>,
    Json(req): Json<AddRequest>,
) -> Result<Json<Vec<AddOutcome>>, (StatusCode, Json<ApiError>)> {
    if req.input.trim().is_empty() {
        return Err(api_err(StatusCode::BAD_REQUEST, "input cannot be empty"));
    }

    let mut session = state.session.lock().await;
    let outcomes = session.add_stocks(&state.client, &req.input).await;
    Ok(Json(outcomes))
}

async fn analyze(
    State(state): State<WebState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisReport>, (StatusCode, Json<ApiError>)> {
    let symbols = normalize_symbols(&req.symbols);
    let trials = req.trials.unwrap_or(config::FRONTIER_TRIALS);
    if trials == 0 {
        return Err(api_err(StatusCode::BAD_REQUEST, "trials must be positive"));
    }

    let session = state.session.lock().await;
    match session.analyze(&symbols, trials) {
        Ok(report) => Ok(Json(report)),
        Err(err @ SelectError::OutsidePortfolio(_)) => {
            Err(api_err(StatusCode::BAD_REQUEST, &err.to_string()))
        }
        Err(err @ SelectError::NoData) => Err(api_err(StatusCode::NOT_FOUND, &err.to_string())),
    }
}

fn api_err(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_symbols_uppercases_and_deduplicates_in_order() {
        let raw = vec![
            " msft ".to_string(),
            "AAPL".to_string(),
            "aapl".to_string(),
            "".to_string(),
        ];
        assert_eq!(
            normalize_symbols(&raw),
            vec!["MSFT".to_string(), "AAPL".to_string()]
        );
    }
}
