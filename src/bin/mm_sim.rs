use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use matchmaking_sim::experiment::with_parameter_override;
use matchmaking_sim::{Engine, MatchmakingConfig};

#[derive(Parser)]
#[command(name = "mm-sim")]
#[command(about = "Headless driver for the matchmaking simulation engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run N ticks over a fixed population and print the resulting statistics snapshot as JSON.
    Run {
        /// Population size to generate before running
        #[arg(long, default_value_t = 5000)]
        population: usize,

        /// Number of ticks to advance
        #[arg(long, default_value_t = 200)]
        ticks: u64,

        /// RNG seed
        #[arg(long, default_value_t = 0xC0D)]
        seed: u64,

        /// Optional JSON config file overriding the defaults
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print the output JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },

    /// Sweep one numeric config field across a list of values and print one
    /// statistics snapshot per value.
    Sweep {
        /// Top-level numeric field name on MatchmakingConfig, e.g. "gamma"
        #[arg(long)]
        parameter: String,

        /// Comma-separated list of values to sweep, e.g. "0.01,0.05,0.1"
        #[arg(long, value_delimiter = ',')]
        values: Vec<f64>,

        #[arg(long, default_value_t = 5000)]
        population: usize,

        #[arg(long, default_value_t = 200)]
        ticks: u64,

        #[arg(long, default_value_t = 0xC0D)]
        seed: u64,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
}

fn load_config(path: &Option<PathBuf>) -> Result<MatchmakingConfig> {
    match path {
        None => Ok(MatchmakingConfig::default()),
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
        }
    }
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let text = if pretty { serde_json::to_string_pretty(value)? } else { serde_json::to_string(value)? };
    println!("{text}");
    Ok(())
}

fn main() -> Result<()> {
    simplelog::TermLogger::init(
        log::LevelFilter::Warn,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
    .context("initializing logger")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { population, ticks, seed, config, pretty } => {
            let config = load_config(&config)?;
            let mut engine = Engine::new(seed, config).context("constructing engine")?;
            engine.generate_population(population);
            engine.run(ticks).context("running ticks")?;

            let snapshot = serde_json::json!({
                "stats": engine.get_stats(),
                "bucket_stats": engine.get_bucket_stats(),
            });
            print_json(&snapshot, pretty)?;
        }

        Commands::Sweep { parameter, values, population, ticks, seed, config, pretty } => {
            let base_config = load_config(&config)?;
            let mut results = Vec::with_capacity(values.len());

            for (i, value) in values.iter().copied().enumerate() {
                let swept = with_parameter_override(&base_config, &parameter, value)
                    .with_context(|| format!("overriding parameter {parameter}"))?;
                let mut engine = Engine::new(seed.wrapping_add(i as u64), swept).context("constructing engine")?;
                engine.generate_population(population);
                engine.run(ticks).context("running ticks")?;

                let stats = engine.get_stats();
                results.push(serde_json::json!({
                    "parameter_value": value,
                    "avg_search_time": stats.avg_search_time,
                    "search_time_p90": stats.search_time_p90,
                    "avg_delta_ping": stats.avg_delta_ping,
                    "delta_ping_p90": stats.delta_ping_p90,
                    "avg_skill_disparity": stats.avg_skill_disparity,
                    "blowout_rate": stats.blowout_rate,
                    "total_matches": stats.total_matches,
                }));
            }

            print_json(&serde_json::Value::Array(results), pretty)?;
        }
    }

    Ok(())
}
