//! F1 race prediction CLI
//!
//! Ranks a race's field with the sequence model, the win classifier, or a
//! fusion of both.

use clap::{Parser, Subcommand};
use f1::{Config, F1Error, PredictionMode, Result};

#[derive(Parser)]
#[command(name = "f1")]
#[command(about = "F1 race outcome prediction from sequence and win-probability models", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the finishing order of one race
    Predict {
        /// Season (year)
        #[arg(long)]
        season: i32,
        /// Circuit name as stored, e.g. "Monaco"
        #[arg(long)]
        circuit: String,
        /// sequence, probability or fused
        #[arg(long, default_value = "fused")]
        mode: PredictionMode,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// List seasons available for prediction
    Seasons {
        /// Restrict to seasons a mode can serve
        #[arg(long)]
        mode: Option<PredictionMode>,
    },
    /// List circuits raced in a season
    Circuits {
        season: i32,
    },
    /// Show database and model status
    Status,
    /// Initialize a new project with default config
    Init,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn exit_code(err: &F1Error) -> i32 {
    match err {
        F1Error::UnsupportedRequest(_) => 2,
        F1Error::CapabilityUnavailable(_) => 3,
        _ => 1,
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Predict {
            season,
            circuit,
            mode,
            format,
        } => commands::predict(&config, season, circuit, mode, format),
        Commands::Seasons { mode } => commands::seasons(&config, mode),
        Commands::Circuits { season } => commands::circuits(&config, season),
        Commands::Status => commands::status(&config),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

mod commands {
    use super::*;
    use f1::data::Database;
    use f1::predict::{format_response, ModelRegistry, Predictor};
    use f1::PredictionRequest;
    use std::sync::Arc;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("models")?;
        println!("Created data/ and models/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Place the race database at {}", config.data.database_path);
        println!("  3. Export trained models and artifacts into models/");
        println!("  4. Run 'f1 predict --season 2024 --circuit Monaco'");

        Ok(())
    }

    pub fn predict(
        config: &Config,
        season: i32,
        circuit: String,
        mode: PredictionMode,
        format: OutputFormat,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let models = Arc::new(ModelRegistry::load(config));
        let predictor = Predictor::new(db, models);

        let request = PredictionRequest::new(season, circuit, mode);
        let response = predictor.predict(&request)?;

        match format {
            OutputFormat::Table => print!("{}", format_response(&response)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
            OutputFormat::Csv => print!("{}", response.to_csv()),
        }

        if !response.success {
            std::process::exit(1);
        }
        Ok(())
    }

    pub fn seasons(config: &Config, mode: Option<PredictionMode>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let mut seasons = db.seasons()?;

        if mode == Some(PredictionMode::Probability) {
            seasons.retain(|&s| s >= config.probability.min_season);
        }

        if seasons.is_empty() {
            println!("No seasons available");
        }
        for season in seasons {
            println!("{}", season);
        }
        Ok(())
    }

    pub fn circuits(config: &Config, season: i32) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let circuits = db.circuits(season)?;

        if circuits.is_empty() {
            println!("No races stored for {}", season);
        }
        for circuit in circuits {
            println!("{}", circuit);
        }
        Ok(())
    }

    pub fn status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;
        let models = ModelRegistry::load(config);
        let loaded = |ok: bool| if ok { "loaded" } else { "unavailable" };

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.database_path);
        println!("  Entries:  {}", stats.entry_count);
        println!("  Races:    {}", stats.race_count);
        println!("  Drivers:  {}", stats.driver_count);
        if let (Some(first), Some(last)) = (stats.first_season, stats.last_season) {
            println!("  Seasons:  {} to {}", first, last);
        }

        let status = models.status();
        println!("\nModel Status");
        println!("───────────────────────────────");
        println!("  Sequence:    {}", loaded(status.sequence));
        println!("  Probability: {}", loaded(status.probability));
        println!("  Fused:       {}", loaded(status.fused));
        if let Some(scorer) = models.probability() {
            println!(
                "  Sessions:    {} rows, seasons {:?}",
                scorer.sessions().len(),
                scorer.sessions().seasons()
            );
        }

        Ok(())
    }
}
