//! vramroute - cost-based dispatch between two LLM backends
//!
//! Runs a request sequence against a constrained and a high-capacity
//! Ollama backend and prints a tagged result for every request.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vramroute::config::{Config, KeySource, OnUnrecovered};
use vramroute::orchestrator::{sequence, Reporter, RequestReport};
use vramroute::router::{select_route, BackendDescriptor};
use vramroute::{storage, Orchestrator, Registry, Request};

#[derive(Parser)]
#[command(name = "vramroute")]
#[command(about = "Cost-based dispatch between a constrained and a high-capacity LLM backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a request sequence and print the report
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Prompts file (prompts separated by blank lines); overrides [[requests]]
        #[arg(short, long)]
        prompts: Option<PathBuf>,

        /// Stop the run on the first unrecovered failure
        #[arg(long)]
        abort_on_unrecovered: bool,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show both configured backends
    Backends {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show the estimated cost and route of a prompt without calling a backend
    Plan {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Prompt text
        prompt: String,
    },

    /// Show recent dispatches from the dispatch log
    History {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Number of rows to show
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vramroute={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load config with env expansion, then start logging at the configured level.
fn load_config(path: &str) -> anyhow::Result<(Config, Vec<(String, KeySource)>)> {
    let (config, key_sources) = Config::from_file_with_env(path)?;
    init_tracing(&config.logging.level);
    tracing::info!(config = %path, "Loaded configuration");
    Ok((config, key_sources))
}

fn print_backend(descriptor: &BackendDescriptor) {
    println!("{} ({})", descriptor.name, descriptor.role);
    println!("  url:                 {}", descriptor.url);
    println!("  model:               {}", descriptor.model);
    println!("  max_context_tokens:  {}", descriptor.max_context_tokens);
    if let Some(threshold) = descriptor.admission_threshold {
        println!("  admission_threshold: {}", threshold);
    }
    match descriptor.options.temperature {
        Some(t) => println!("  temperature:         {}", t),
        None => println!("  temperature:         (server default)"),
    }
    println!("  timeout:             {}s", descriptor.timeout.as_secs());
}

/// Prints each request as soon as it resolves.
struct PrintReporter;

impl Reporter for PrintReporter {
    fn run_started(&mut self, run_id: &str) {
        println!("=== run {} ===", run_id);
    }

    fn request_finished(&mut self, report: &RequestReport) {
        println!();
        print!("{}", report);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            prompts,
            abort_on_unrecovered,
        } => {
            let (config, key_sources) = load_config(&config)?;
            for (name, source) in &key_sources {
                tracing::debug!(backend = %name, key_source = %source, "Resolved API key");
            }

            let policy = if abort_on_unrecovered {
                OnUnrecovered::Abort
            } else {
                config.orchestration.on_unrecovered
            };
            let orchestrator = Orchestrator::from_config(&config, policy).await?;
            if !orchestrator.logs_dispatches() {
                tracing::debug!("Dispatch log disabled");
            }

            let requests = sequence::resolve_requests(&config, prompts.as_deref())?;

            match orchestrator.run_with(requests, &mut PrintReporter).await {
                Ok(report) => {
                    println!();
                    println!("=== {} ===", report.summary());
                    Ok(())
                }
                Err(aborted) => {
                    println!();
                    println!("=== {} ===", aborted.partial.summary());
                    Err(vramroute::Error::from(aborted).into())
                }
            }
        }

        Commands::Check { config } => {
            let (config, key_sources) = load_config(&config)?;
            let registry = Registry::from_config(&config)?;

            println!("Configuration OK");
            println!("  admission threshold: {}", registry.admission_threshold());
            for (name, source) in &key_sources {
                println!("  {} api key: {}", name, source);
            }
            println!("  on unrecovered failure: {:?}", config.orchestration.on_unrecovered);
            match &config.database {
                Some(db) => println!("  dispatch log: {}", db.path),
                None => println!("  dispatch log: disabled"),
            }
            Ok(())
        }

        Commands::Backends { config } => {
            let (config, _) = load_config(&config)?;
            let registry = Registry::from_config(&config)?;

            for descriptor in registry.descriptors() {
                print_backend(descriptor);
            }
            Ok(())
        }

        Commands::Plan { config, prompt } => {
            let (config, _) = load_config(&config)?;
            let registry = Registry::from_config(&config)?;

            let request = Request::new(prompt);
            let route = select_route(request.estimated_cost(), &registry);
            let target = registry.get(route.first_target());

            println!("cost:      {}", request.estimated_cost());
            println!("threshold: {}", registry.admission_threshold());
            println!("route:     {}", route);
            println!("backend:   {} ({})", target.name, target.model);
            Ok(())
        }

        Commands::History { config, limit } => {
            let (config, _) = load_config(&config)?;
            let Some(db) = &config.database else {
                println!("Dispatch log is not configured (no [database] section)");
                return Ok(());
            };
            let pool = storage::init_pool(&db.path).await?;

            let rows = storage::recent_dispatches(&pool, limit).await?;
            if rows.is_empty() {
                println!("No dispatches recorded in {}", db.path);
            }
            for row in rows {
                let result = match (&row.tier, &row.failure_stage) {
                    (Some(tier), _) => tier.clone(),
                    (None, Some(stage)) => format!("FAILED {}", stage),
                    (None, None) => "unknown".to_string(),
                };
                println!(
                    "{} run={} #{} cost={} route={} {} backend={} {}ms{}",
                    row.timestamp,
                    row.run_id,
                    row.request_index + 1,
                    row.cost,
                    row.route,
                    result,
                    row.backend.as_deref().unwrap_or("-"),
                    row.latency_ms,
                    row.attempts
                        .as_deref()
                        .map(|a| format!(" [{}]", a))
                        .unwrap_or_default(),
                );
            }
            Ok(())
        }
    }
}
