//! cms-news-migrate CLI - Staged migration of legacy CMS news data.

use clap::{Parser, Subcommand};
use cms_news_migrate::{plan, Config, DataCategory, MigrateError, MigrationResult, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "cms-news-migrate")]
#[command(about = "Staged migration of legacy CMS news data")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to state file for resume capability
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new migration
    Run {
        /// Categories to migrate, comma separated (wire names or aliases)
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<String>>,

        /// Override the default page size
        #[arg(long)]
        page_size: Option<usize>,

        /// Dry run: validate and show plan with row counts without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Resume a previously interrupted migration
    Resume,

    /// Check that the source database is the expected product and version
    Validate,

    /// Print the processing queue without connecting to any database
    Plan {
        /// Categories to plan, comma separated (wire names or aliases)
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<String>>,
    },
}

fn main() -> ExitCode {
    // Every page is awaited before the next one; a single thread is enough.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::from(7);
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Plan { select } => {
            apply_selection(&mut config, select)?;
            let planned = plan(&config)?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&planned)?);
            } else {
                println!("Processing queue ({}):", config.source.profile.product_name());
                for (i, p) in planned.iter().enumerate() {
                    let deps = if p.depends_on.is_empty() {
                        String::new()
                    } else {
                        format!(" after {}", p.depends_on.join(", "))
                    };
                    println!(
                        "  {}. {} [{}] page size {}{}",
                        i + 1,
                        p.category,
                        p.alias,
                        p.page_size,
                        deps
                    );
                }
            }
        }

        Commands::Run {
            select,
            page_size,
            dry_run,
        } => {
            // Apply overrides
            apply_selection(&mut config, select)?;
            if let Some(size) = page_size {
                config.migration.page_size = Some(size);
            }
            config.validate()?;

            let cancel_token = setup_signal_handler();
            let mut orchestrator = Orchestrator::connect(config).await?;

            // Apply global state_file if provided
            if let Some(ref path) = cli.state_file {
                orchestrator = orchestrator.with_state_file(path.clone());
            }

            let result = orchestrator.run(cancel_token, dry_run).await?;
            let status_msg = if dry_run {
                "Dry run completed!"
            } else {
                "Migration completed!"
            };
            print_result(&result, status_msg, cli.output_json)?;
        }

        Commands::Resume => {
            // State file is required for resume
            let state_file = cli.state_file.ok_or_else(|| {
                MigrateError::Config("--state-file is required for resume".to_string())
            })?;

            // Verify state file exists
            if !state_file.exists() {
                return Err(MigrateError::Config(format!(
                    "State file not found: {:?}",
                    state_file
                )));
            }

            let cancel_token = setup_signal_handler();
            let mut orchestrator = Orchestrator::connect(config)
                .await?
                .with_state_file(state_file)
                .resume()?;

            info!("Resuming from previous state");

            let result = orchestrator.run(cancel_token, false).await?;
            print_result(&result, "Migration resumed and completed!", cli.output_json)?;
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::connect(config).await?;
            orchestrator.validate().await?;
            println!("Validation completed successfully");
        }
    }

    Ok(())
}

/// Replace the configured selection with one given on the command line.
fn apply_selection(config: &mut Config, select: Option<Vec<String>>) -> Result<(), MigrateError> {
    if let Some(names) = select {
        config.migration.select = names
            .iter()
            .filter(|n| !n.trim().is_empty())
            .map(|n| n.parse::<DataCategory>())
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(())
}

fn print_result(result: &MigrationResult, status_msg: &str, json: bool) -> Result<(), MigrateError> {
    if json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Categories: {}/{}",
        result.categories_completed, result.categories_total
    );
    for c in &result.categories {
        println!(
            "    {}: {} imported, {} skipped (of {})",
            c.category, c.rows_imported, c.rows_skipped, c.rows_total
        );
    }
    println!("  Rows imported: {}", result.rows_imported);
    if result.rows_skipped > 0 {
        println!("  Rows skipped: {}", result.rows_skipped);
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM. The orchestrator stops at the
/// next page boundary once the token is cancelled.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    // SIGINT handler (Ctrl-C)
    tokio::spawn(async move {
        match signal(SignalKind::interrupt()) {
            Ok(mut sigint) => {
                sigint.recv().await;
                eprintln!("\nReceived SIGINT. Stopping after the current page...");
                token_int.cancel();
            }
            Err(e) => eprintln!("Failed to setup SIGINT handler: {}", e),
        }
    });

    // SIGTERM handler
    tokio::spawn(async move {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                eprintln!("\nReceived SIGTERM. Stopping after the current page...");
                token_term.cancel();
            }
            Err(e) => eprintln!("Failed to setup SIGTERM handler: {}", e),
        }
    });

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current page...");
            token.cancel();
        }
    });

    cancel_token
}
