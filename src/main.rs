use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stock_forecaster::analysis::{self, AnalysisRequest};
use stock_forecaster::config::{self, AppConfig, EngineConfig, GeneralConfig, InstrumentConfig};
use stock_forecaster::operations::{self, OPERATIONS, OperationInput};
use stock_forecaster::provider::HistoryProvider;
use stock_forecaster::provider::csv::CsvFileProvider;
use stock_forecaster::sink::ReportSink;
use stock_forecaster::sink::directory::DirectorySink;
use stock_forecaster::sink::terminal::TerminalSink;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("price history error")]
    Provider,
    #[display("analysis error")]
    Analysis,
    #[display("output error")]
    Output,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(
    name = "stock-forecaster",
    about = "Stock price forecasting and technical analysis"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze every instrument listed in the configuration file
    Run,
    /// Print the available operations and their inputs as JSON
    Operations,
    /// Run one operation against a CSV price history
    Invoke {
        /// Operation name, see `operations`
        operation: String,
        #[arg(long)]
        ticker: String,
        /// CSV file with a date,open,high,low,close,volume header
        #[arg(long)]
        history: PathBuf,
        /// Forecast horizon in days
        #[arg(long)]
        days: Option<u32>,
        /// Monte Carlo seed
        #[arg(long)]
        seed: Option<u64>,
        /// Keep only the trailing N bars
        #[arg(long)]
        lookback: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run => {
            let path = cli.config.unwrap_or_else(|| PathBuf::from("config.toml"));
            let config = config::load(&path).change_context(AppError::Config)?;
            init_tracing(&config.general);
            run_instruments(config).await
        }
        Command::Operations => {
            let document =
                serde_json::to_string_pretty(OPERATIONS).change_context(AppError::Output)?;
            println!("{document}");
            Ok(())
        }
        Command::Invoke {
            operation,
            ticker,
            history,
            days,
            seed,
            lookback,
        } => {
            let config = match cli.config.as_deref() {
                Some(path) => config::load(path).change_context(AppError::Config)?,
                None => AppConfig::default(),
            };
            init_tracing(&config.general);

            let provider = CsvFileProvider::new().with_file(&ticker, &history);
            let history = provider
                .fetch_history(&ticker, lookback)
                .await
                .change_context(AppError::Provider)?;

            let mut input = OperationInput::new(ticker, history);
            input.horizon_days = days;
            input.seed = seed;
            input.config = config.engine;

            let output = tokio::task::spawn_blocking(move || operations::invoke(&operation, &input))
                .await
                .change_context(AppError::Runtime)?
                .change_context(AppError::Analysis)?;
            let document = serde_json::to_string_pretty(&output).change_context(AppError::Output)?;
            println!("{document}");
            Ok(())
        }
    }
}

fn init_tracing(general: &GeneralConfig) {
    let filter = EnvFilter::new(&general.log_level);
    // stdout carries the JSON documents; logs go to stderr.
    match general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

async fn run_instruments(config: AppConfig) -> Result<(), Report<AppError>> {
    if config.instruments.is_empty() {
        tracing::warn!("no instruments configured; nothing to do");
        return Ok(());
    }

    let provider: Arc<dyn HistoryProvider> = Arc::new(build_provider(&config.instruments));
    let sink = build_sink(&config.general);
    let engine = Arc::new(config.engine);
    let total = config.instruments.len();

    // Each instrument owns its history and random source, so all of them can
    // run at once.
    let mut handles = Vec::with_capacity(total);
    for instrument in config.instruments {
        let ticker = instrument.ticker.clone();
        let provider = Arc::clone(&provider);
        let sink = Arc::clone(&sink);
        let engine = Arc::clone(&engine);
        let handle = tokio::spawn(async move {
            analyze_instrument(provider.as_ref(), sink.as_ref(), &engine, instrument).await
        });
        handles.push((ticker, handle));
    }

    let mut failed = 0;
    for (ticker, handle) in handles {
        if let Err(e) = handle.await.change_context(AppError::Runtime)? {
            tracing::error!(ticker = %ticker, error = ?e, "instrument analysis failed");
            failed += 1;
        }
    }

    info!(total, failed, "analysis run complete");
    if failed > 0 {
        return Err(Report::new(AppError::Analysis)
            .attach(format!("{failed} of {total} instruments failed")));
    }
    Ok(())
}

fn build_provider(instruments: &[InstrumentConfig]) -> CsvFileProvider {
    instruments
        .iter()
        .fold(CsvFileProvider::new(), |provider, instrument| {
            provider.with_file(&instrument.ticker, Path::new(&instrument.history))
        })
}

fn build_sink(general: &GeneralConfig) -> Arc<dyn ReportSink> {
    match &general.output_dir {
        Some(dir) => {
            let sink = DirectorySink::new(dir);
            info!(output_dir = %sink.dir().display(), "writing reports to directory");
            Arc::new(sink)
        }
        None => Arc::new(TerminalSink),
    }
}

async fn analyze_instrument(
    provider: &dyn HistoryProvider,
    sink: &dyn ReportSink,
    engine: &EngineConfig,
    instrument: InstrumentConfig,
) -> Result<(), Report<AppError>> {
    info!(
        ticker = %instrument.ticker,
        history = %instrument.history,
        lookback = ?instrument.lookback,
        "loading price history"
    );

    let history = provider
        .fetch_history(&instrument.ticker, instrument.lookback)
        .await
        .change_context(AppError::Provider)?;

    let request = AnalysisRequest::new(instrument.ticker)
        .with_config(engine.clone())
        .with_horizon(instrument.horizon_days.unwrap_or(engine.horizon_days));
    let seed = instrument.seed;

    // The simulation is CPU-bound; keep it off the async workers.
    let report = tokio::task::spawn_blocking(move || {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        analysis::analyze(&request, &history, &mut rng)
    })
    .await
    .change_context(AppError::Runtime)?
    .change_context(AppError::Analysis)?;

    sink.publish(&report).change_context(AppError::Output)
}
