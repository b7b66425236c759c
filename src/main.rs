mod catalog;
mod config;
mod data;
mod frontier;
mod report;
mod session;
mod webui;

use chrono::NaiveDate;
use clap::Parser;
use session::Session;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "frontier-dash: Monte Carlo Markowitz efficient-frontier dashboard",
    after_help = "EXAMPLES:
    # Serve the dashboard on the default port
    cargo run --release

    # One-shot analysis printed to the terminal
    cargo run --release -- --analyze AAPL,MSFT --start-date 2020-01-01

    # Serve with a custom universe and start date
    cargo run --release -- --universe AAPL,MSFT,SPY --start-date 2021-06-01 --port 9000"
)]
struct Args {
    /// One-shot mode: comma-separated symbols to analyze, printed to stdout
    #[arg(long)]
    analyze: Option<String>,

    /// Starting date for the price history (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Monte Carlo trials per frontier run
    #[arg(long, default_value_t = config::FRONTIER_TRIALS)]
    trials: usize,

    /// Comma-separated universe loaded at startup in serve mode
    #[arg(long)]
    universe: Option<String>,

    /// Dashboard server port
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("frontier_dash=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    let start_date = args.start_date.unwrap_or_else(config::default_start_date);

    if let Some(ref raw) = args.analyze {
        let symbols = catalog::parse_symbols(raw);
        if symbols.is_empty() {
            error!("No symbols to analyze. Example: --analyze AAPL,MSFT,SPY");
            return Ok(());
        }

        let client = reqwest::Client::new();
        let mut session = Session::new(start_date);
        let load_report = session.load(&client, &symbols).await;
        for (symbol, reason) in &load_report.failed {
            error!("{}: {}", symbol, reason);
        }

        match session.analyze(&[], args.trials) {
            Ok(analysis) => report::print_report(&analysis),
            Err(err) => error!("Analysis failed: {}", err),
        }
        return Ok(());
    }

    let universe: Vec<String> = match args.universe {
        Some(ref raw) => catalog::parse_symbols(raw),
        None => config::DEFAULT_UNIVERSE
            .iter()
            .map(|s| s.to_string())
            .collect(),
    };

    info!(
        "Loading {} symbols from {} and serving on port {}",
        universe.len(),
        start_date,
        args.port
    );
    webui::run_server(args.port, start_date, &universe).await
}
