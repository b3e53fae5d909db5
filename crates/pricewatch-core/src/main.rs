//! Pricewatch CLI
//!
//! Command-line interface for the Pricewatch threshold alert monitor.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pricewatch::alerting::Dispatcher;
use pricewatch::api::HttpServer;
use pricewatch::config::LoggingConfig;
use pricewatch::db::{Database, HistoryStore};
use pricewatch::models::normalize_symbol;
use pricewatch::monitor::{test_notification, Monitor};
use pricewatch::Config;

/// Pricewatch - threshold price alerts
#[derive(Parser)]
#[command(name = "pricewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "PRICEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll prices on the configured interval until Ctrl+C
    Run {
        /// Also serve the HTTP API
        #[arg(long)]
        serve: bool,
    },

    /// Run a single poll cycle and print the result
    Check,

    /// Show recorded prices and alerts
    History {
        /// Only this symbol
        #[arg(long)]
        symbol: Option<String>,

        /// Maximum rows per table
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Which history to show
        #[arg(long, value_enum, default_value = "all")]
        kind: HistoryKind,
    },

    /// Check channel connections and send a test notification
    TestNotify,

    /// Print the validated watchlist
    Watchlist,

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum HistoryKind {
    Prices,
    Alerts,
    All,
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_tracing(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Run { serve } => run_monitor(config, serve).await,
        Commands::Check => run_check(config, cli.format).await,
        Commands::History {
            symbol,
            limit,
            kind,
        } => run_history(config, symbol, limit, kind, cli.format).await,
        Commands::TestNotify => run_test_notify(config, cli.format).await,
        Commands::Watchlist => run_watchlist(&config, cli.format),
        Commands::Db { command } => run_db(config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs share stderr with the console channel; stdout carries command output.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn connect(config: &Config) -> anyhow::Result<Database> {
    Database::connect(&config.database)
        .await
        .with_context(|| format!("cannot open history database at {}", config.database.url))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_monitor(config: Config, serve: bool) -> anyhow::Result<()> {
    let db = connect(&config).await?;
    let history = db.history();
    let mut monitor = Monitor::from_config(&config, Arc::new(history.clone()))?;

    let shutdown = CancellationToken::new();

    let server = if serve || config.server.enabled {
        let addr = config.server.bind_addr();
        let http = HttpServer::new(monitor.watchlist(), history, monitor.price_source());
        let token = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = http.serve(&addr, token).await {
                error!("HTTP server error: {}", e);
            }
        }))
    } else {
        None
    };

    let signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal.cancel();
    });

    monitor.run(shutdown.clone()).await?;

    shutdown.cancel();
    if let Some(handle) = server {
        let _ = handle.await;
    }
    Ok(())
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C received, finishing current cycle..."),
        () = terminate => info!("SIGTERM received, finishing current cycle..."),
    }
}

async fn run_check(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let db = connect(&config).await?;
    let mut monitor = Monitor::from_config(&config, Arc::new(db.history()))?;

    let report = monitor.run_cycle().await;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => println!("{}", report.render()),
    }
    Ok(())
}

async fn run_history(
    config: Config,
    symbol: Option<String>,
    limit: u32,
    kind: HistoryKind,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let db = connect(&config).await?;
    let history = db.history();
    let symbol = symbol.as_deref().map(normalize_symbol).transpose()?;

    let prices = if kind == HistoryKind::Alerts {
        Vec::new()
    } else {
        history.recent_prices(symbol.as_deref(), limit).await?
    };
    let alerts = if kind == HistoryKind::Prices {
        Vec::new()
    } else {
        history.recent_alerts(symbol.as_deref(), limit).await?
    };

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "prices": prices, "alerts": alerts }));
    }

    if kind != HistoryKind::Alerts {
        println!("Recent prices");
        if prices.is_empty() {
            println!("  (none)");
        }
        for p in &prices {
            println!(
                "  {}  {:<8} ${:>10.2}",
                p.observed_at.format("%Y-%m-%d %H:%M:%S"),
                p.symbol,
                p.price
            );
        }
    }
    if kind != HistoryKind::Prices {
        println!("Recent alerts");
        if alerts.is_empty() {
            println!("  (none)");
        }
        for a in &alerts {
            println!(
                "  {}  {:<8} {:<5} ${:>10.2} (threshold ${:.2})",
                a.fired_at.format("%Y-%m-%d %H:%M:%S"),
                a.symbol,
                a.kind,
                a.price,
                a.threshold
            );
        }
    }
    Ok(())
}

async fn run_test_notify(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::from_config(&config.notifications)?;

    let checks = dispatcher.test_connections().await;
    let report = dispatcher.dispatch(&test_notification(Utc::now())).await;

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "connections": checks, "dispatch": report }));
    }

    for check in &checks {
        match &check.error {
            None => println!("✅ {} connection ok", check.channel_id),
            Some(e) => println!("❌ {} connection failed: {}", check.channel_id, e),
        }
    }
    println!(
        "Test notification delivered to {}/{} channels{}",
        report.succeeded,
        report.attempted,
        if report.console_fallback { " (+ console)" } else { "" }
    );

    if report.attempted > 0 && report.succeeded == 0 {
        anyhow::bail!("no notification channel accepted the test message");
    }
    Ok(())
}

fn run_watchlist(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let watchlist = config.watchlist()?;

    if format == OutputFormat::Json {
        return print_json(&watchlist);
    }

    if watchlist.is_empty() {
        println!("Watchlist is empty");
        return Ok(());
    }
    let bound = |b: Option<f64>| b.map_or_else(|| "-".to_string(), |v| format!("${v:.2}"));
    println!("{:<10} {:>12} {:>12}", "SYMBOL", "UPPER", "LOWER");
    for (symbol, t) in watchlist.iter() {
        println!("{:<10} {:>12} {:>12}", symbol, bound(t.upper), bound(t.lower));
    }
    Ok(())
}

async fn run_db(config: Config, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate => {
            // Connecting applies pending migrations.
            let db = connect(&config).await?;
            db.health_check().await?;
            println!("Migrations applied to {}", config.database.url);
        }
    }
    Ok(())
}
