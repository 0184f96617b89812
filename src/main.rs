use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use saju_core::solar_terms::{export_decade, EphemerisSource};
use saju_core::{
    BirthInfo, DivinationEngine, EngineConfig, Gender, SajuReport, SolarTermRepository,
};

#[derive(Parser)]
#[command(name = "saju")]
#[command(about = "Four pillars charts, luck cycles and lukim boards", version)]
struct Cli {
    /// TOML engine configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory of solar term JSON files, overriding the configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a full chart report for a solar birth instant
    Chart {
        /// Local birth time, e.g. 1990-05-14T08:30
        #[arg(value_parser = parse_instant)]
        birth: NaiveDateTime,

        /// male or female
        gender: Gender,

        /// Instant the fortune score is evaluated at (defaults to now)
        #[arg(long, value_parser = parse_instant)]
        as_of: Option<NaiveDateTime>,
    },
    /// Lay out the lukim divination board for a query instant
    Lukim {
        #[arg(value_parser = parse_instant)]
        query: NaiveDateTime,
    },
    /// Write computed solar term boundaries for one decade as JSON
    ExportTerms {
        /// First year of the decade, e.g. 2020
        decade: i32,

        /// Output directory
        dir: PathBuf,
    },
}

fn parse_instant(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .map_err(|e| format!("expected YYYY-MM-DDTHH:MM: {}", e))
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.solar_terms.data_dir = Some(dir);
    }

    match cli.command {
        Commands::Chart {
            birth,
            gender,
            as_of,
        } => {
            let repository = SolarTermRepository::from_config(&config.solar_terms);
            let as_of = as_of.unwrap_or_else(|| Local::now().naive_local());
            let report =
                SajuReport::calculate(&BirthInfo::solar(birth, gender), as_of, &repository, &config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Lukim { query } => {
            let repository = SolarTermRepository::from_config(&config.solar_terms);
            let board = DivinationEngine::new(&repository).board(query)?;
            println!("{}", serde_json::to_string_pretty(&board)?);
        }
        Commands::ExportTerms { decade, dir } => {
            let source = EphemerisSource::new(config.solar_terms.utc_offset_minutes);
            let path = export_decade(&source, decade, &dir)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
