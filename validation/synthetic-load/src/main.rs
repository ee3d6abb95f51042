//! Synthetic traffic CLI for the multi-instance demo API.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use synthetic_load::{LoadRunner, ResultsReport, TestConfig, TestResults, UserConfig};

#[derive(Parser)]
#[command(name = "synthetic-load")]
#[command(about = "Synthetic traffic generator for the multi-instance demo API", long_about = None)]
struct Cli {
    /// Log filter, e.g. "info" or "synthetic_load=debug"
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep every endpoint on the three local replicas
    Sweep {
        #[command(flatten)]
        overrides: Overrides,

        /// Pause after each iteration in milliseconds
        #[arg(long, default_value = "500")]
        pause_ms: u64,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Run a load test from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        #[command(flatten)]
        overrides: Overrides,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Print the URLs one iteration would request, without sending anything
    Plan {
        /// Scenario to plan; the default sweep when omitted
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

#[derive(Args)]
struct Overrides {
    /// Number of virtual users
    #[arg(long)]
    vus: Option<u32>,

    /// Run duration in seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Iterations per virtual user
    #[arg(short, long)]
    iterations: Option<u64>,
}

impl Overrides {
    fn apply(&self, config: &mut TestConfig) {
        if let Some(vus) = self.vus {
            config.virtual_users = vus;
        }
        if let Some(d) = self.duration {
            config.duration_secs = Some(d);
            // An explicit duration replaces a scenario's iteration count
            if self.iterations.is_none() {
                config.iterations = None;
            }
        }
        if let Some(i) = self.iterations {
            config.iterations = Some(i);
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sweep {
            overrides,
            pause_ms,
            output,
        } => {
            let mut config = TestConfig {
                pause_ms,
                ..TestConfig::default()
            };
            overrides.apply(&mut config);
            config.validate()?;

            let results = LoadRunner::new(config)?.run().await?;
            print_results(&results, output)
        }
        Commands::Run {
            scenario,
            overrides,
            output,
        } => {
            info!(scenario = %scenario.display(), "Loading scenario");

            let mut config = TestConfig::from_file(&scenario)?;
            overrides.apply(&mut config);
            config
                .validate()
                .with_context(|| format!("invalid scenario {}", scenario.display()))?;

            info!(
                name = %config.name,
                description = %config.description,
                servers = config.servers.len(),
                endpoints = config.endpoints.len(),
                "Configuration loaded"
            );

            let results = LoadRunner::new(config)?.run().await?;
            print_results(&results, output)
        }
        Commands::Plan { scenario } => {
            let config = match scenario {
                Some(path) => TestConfig::from_file(&path)?,
                None => TestConfig::default(),
            };
            config.validate()?;

            match &config.user {
                UserConfig::Sweep => {
                    for url in config.plan().urls() {
                        println!("{}", url);
                    }
                }
                UserConfig::Weighted {
                    tasks, base_server, ..
                } => {
                    let server = base_server
                        .as_deref()
                        .or_else(|| config.servers.first().map(String::as_str))
                        .unwrap_or_default();
                    for task in tasks {
                        println!("http://{}{}\tweight={}", server, task.endpoint, task.weight);
                    }
                }
            }
            Ok(())
        }
        Commands::List { dir } => {
            println!("Available scenarios in {}:", dir.display());
            println!();

            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("reading scenario directory {}", dir.display()))?;

            let mut scenarios = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if !matches!(
                    path.extension().and_then(|s| s.to_str()),
                    Some("yaml") | Some("yml")
                ) {
                    continue;
                }
                match TestConfig::from_file(&path) {
                    Ok(config) => scenarios.push((
                        entry.file_name().to_string_lossy().to_string(),
                        config.name,
                        config.description,
                    )),
                    Err(e) => warn!(error = %e, "Skipping unreadable scenario"),
                }
            }

            scenarios.sort_by(|a, b| a.0.cmp(&b.0));

            if scenarios.is_empty() {
                println!("No scenario files found");
            } else {
                for (filename, name, desc) in scenarios {
                    println!("  {} - {}", filename, name);
                    println!("    {}", desc);
                    println!();
                }
            }
            Ok(())
        }
    }
}

fn print_results(results: &TestResults, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", ResultsReport::format_json(results)?),
        OutputFormat::Csv => {
            println!("{}", ResultsReport::csv_header());
            println!("{}", ResultsReport::format_csv(results)?);
        }
        OutputFormat::Table => println!("{}", ResultsReport::format_table(results)),
    }
    Ok(())
}
