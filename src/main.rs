use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use signal_engine::backtest::{export_report, load_bars_csv, Backtester, ReportFormat};
use signal_engine::feed::{FeedAdapter, MarketFeed, RestPoller, WsConnector};
use signal_engine::observer::{LogObserver, Observer};
use signal_engine::{shutdown, Error, FeedConfig, LogPublisher, Orchestrator};

#[derive(Parser, Debug)]
#[command(name = "signal-engine")]
#[command(about = "Streaming candle pattern scanner and backtester")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream live bars, scan them and publish signals
    Live {
        /// Symbols to subscribe to (comma-separated)
        #[arg(short, long, env = "SIGNAL_SYMBOLS", default_value = "EURUSD,GBPUSD")]
        symbols: String,

        /// Feed API key, overrides FINAGE_API_KEY
        #[arg(long)]
        api_key: Option<String>,

        /// Poll the REST endpoint instead of streaming
        #[arg(long)]
        rest: bool,
    },

    /// Replay historical bars from CSV and grade every signal
    Backtest {
        /// CSV with symbol,timestamp,open,high,low,close,volume rows
        #[arg(short, long)]
        input: PathBuf,

        /// Minutes between signal and entry
        #[arg(long, default_value = "3")]
        delay_minutes: u64,

        /// Minutes held after entry
        #[arg(long, default_value = "2")]
        expiry_minutes: u64,

        /// Write the report here (.json or .csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format, inferred from the output extension when omitted
        #[arg(long)]
        format: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = if args.verbose { "signal_engine=debug" } else { "signal_engine=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    match args.command {
        Commands::Live { symbols, api_key, rest } => run_live(symbols, api_key, rest).await,
        Commands::Backtest {
            input,
            delay_minutes,
            expiry_minutes,
            output,
            format,
        } => run_backtest(input, delay_minutes, expiry_minutes, output, format),
    }
}

async fn run_live(symbols: String, api_key: Option<String>, rest: bool) -> Result<()> {
    let mut config = FeedConfig::from_env().context("Failed to read feed configuration")?;
    if let Some(key) = api_key {
        config.api_key = key;
    }

    let symbols: Vec<String> = symbols
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    info!("Starting signal engine");
    info!("Symbols: {:?}", symbols);
    info!("Feed: {}", if rest { &config.rest_url } else { &config.ws_url });

    let observer: Arc<dyn Observer> = Arc::new(LogObserver);
    let feed: Arc<dyn MarketFeed> = if rest {
        Arc::new(
            RestPoller::new(config)
                .context("Failed to create REST poller")?
                .with_observer(observer.clone()),
        )
    } else {
        let connector = WsConnector::from_config(&config);
        Arc::new(FeedAdapter::new(config, connector).with_observer(observer.clone()))
    };

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        trigger.trigger();
    });

    let orchestrator = Orchestrator::new(feed, Arc::new(LogPublisher), observer);
    match orchestrator.run(&symbols, shutdown).await {
        Ok(()) => info!("Feed closed"),
        Err(Error::Cancelled) => info!("Signal engine stopped"),
        Err(e) => return Err(e).context("Signal engine failed"),
    }
    Ok(())
}

fn run_backtest(
    input: PathBuf,
    delay_minutes: u64,
    expiry_minutes: u64,
    output: Option<PathBuf>,
    format: Option<String>,
) -> Result<()> {
    let data = load_bars_csv(&input)
        .with_context(|| format!("Failed to load bars from {}", input.display()))?;

    let report = Backtester::default().run(
        &data,
        Duration::from_secs(delay_minutes * 60),
        Duration::from_secs(expiry_minutes * 60),
    );

    println!("\n=== Backtest Results ===");
    println!("Symbols:   {}", data.len());
    println!("Signals:   {}", report.total);
    println!("Wins:      {}", report.wins);
    println!("Losses:    {}", report.losses);
    println!("Neutral:   {}", report.neutrals);
    println!("Accuracy:  {:.1}%", report.accuracy * 100.0);

    if let Some(path) = output {
        let format = format
            .map(|f| f.parse::<ReportFormat>())
            .transpose()
            .context("Invalid report format")?;
        export_report(&report, &path, format)
            .with_context(|| format!("Failed to export report to {}", path.display()))?;
        println!("Report:    {}", path.display());
    }

    Ok(())
}
