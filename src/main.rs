use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use perfscope::config::{LoggingConfig, PerfscopeConfig};
use perfscope::runner::WorkloadRunner;
use perfscope::workloads::WorkloadRegistry;
use perfscope::{report, scheduler};

#[derive(Parser)]
#[command(
    name = "perfscope",
    about = "Synthetic workload benchmarks with a rolling performance history",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// History database (overrides storage.db_path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered workloads
    List,

    /// Run one or more workloads and record them in history
    Run {
        /// Workload ids or display names
        ids: Vec<String>,

        /// Run every registered workload
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show recorded history
    History {
        /// Show the individual samples of one test
        #[arg(long)]
        test: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Evict samples older than the retention window now
    Evict,

    /// Drop recorded history
    Clear {
        /// Only drop this test's samples
        #[arg(long)]
        test: Option<String>,
    },

    /// Interactive session reading workload ids from stdin
    Session,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Accept either a workload id or a display name; anything else is taken literally.
fn resolve_test_name(registry: &WorkloadRegistry, name: &str) -> String {
    registry
        .get(name)
        .map(|w| w.display_name().to_string())
        .unwrap_or_else(|| name.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PerfscopeConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);

    let registry = WorkloadRegistry::with_defaults(&config.workloads);

    match cli.command {
        Commands::List => {
            print!("{}", report::render_workloads(&registry));
        }
        Commands::Run { ids, all, json } => {
            let selected = if all {
                registry.iter().cloned().collect::<Vec<_>>()
            } else {
                if ids.is_empty() {
                    bail!("no workloads given; pass one or more ids or --all");
                }
                let mut selected = Vec::with_capacity(ids.len());
                for id in &ids {
                    match registry.get(id) {
                        Some(w) => selected.push(w),
                        None => bail!(
                            "unknown workload '{}'; known ids: {}",
                            id,
                            registry.ids().join(", ")
                        ),
                    }
                }
                selected
            };

            let history = perfscope::open_history(&config, cli.db.as_deref())?;
            let runner = WorkloadRunner::new(history);

            let mut outcomes = Vec::with_capacity(selected.len());
            for workload in &selected {
                tracing::info!(workload = workload.id(), "Running workload");
                let outcome = runner.run_workload(workload.as_ref()).await;
                if !json {
                    print!("{}", report::render_outcome(&outcome));
                }
                outcomes.push(outcome);
            }

            let failed = outcomes.iter().filter(|o| !o.is_success()).count();
            let chart = runner.chart();
            if json {
                let body = serde_json::json!({ "outcomes": outcomes, "chart": chart });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print!("{}", report::render_chart(&chart));
            }

            if failed > 0 {
                bail!("{} of {} workloads failed", failed, outcomes.len());
            }
        }
        Commands::History { test, json } => {
            let history = perfscope::open_history(&config, cli.db.as_deref())?;
            match test {
                Some(name) => {
                    let name = resolve_test_name(&registry, &name);
                    let samples = history.samples_for(&name);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&samples)?);
                    } else {
                        print!("{}", report::render_samples(&name, &samples));
                    }
                }
                None => {
                    let summaries = history.summaries();
                    if json {
                        println!("{}", serde_json::to_string_pretty(&summaries)?);
                    } else {
                        print!("{}", report::render_summaries(&summaries));
                    }
                }
            }
        }
        Commands::Evict => {
            let history = perfscope::open_history(&config, cli.db.as_deref())?;
            let removed = scheduler::sweep_once(&history)?;
            println!(
                "Evicted {} expired samples ({} retained).",
                removed,
                history.len()
            );
        }
        Commands::Clear { test } => {
            let history = perfscope::open_history(&config, cli.db.as_deref())?;
            let test = test.map(|name| resolve_test_name(&registry, &name));
            let removed = history.clear(test.as_deref())?;
            match test {
                Some(name) => println!("Removed {} samples for {}.", removed, name),
                None => println!("Removed {} samples.", removed),
            }
        }
        Commands::Session => {
            let history = perfscope::open_history(&config, cli.db.as_deref())?;
            let runner = WorkloadRunner::new(history);
            perfscope::run_session(&config, &registry, &runner).await?;
        }
    }

    Ok(())
}
