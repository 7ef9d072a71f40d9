use clap::{Parser, Subcommand};
use chrono::{DateTime, Utc};
use neurotwin::{
    life_stage_for_age, parse_timestamp, Filters, NeuroTwinError, NewProfile, Neurotransmitters,
    ProfileStore, StoreConfig, VECTOR_DIMENSION,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "neurotwin - similarity store for neurochemical profile vectors",
    long_about = None
)]
struct Args {
    /// Directory holding profiles.index and metadata.json
    #[arg(short, long, default_value = neurotwin::config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// TOML store config; takes precedence over --data-dir
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a profile and print the committed record
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "neutral")]
        gender: String,
        /// Life stage label; derived from --age when omitted
        #[arg(long, required_unless_present = "age")]
        life_stage: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long, default_value = "unknown")]
        age_range: String,
        /// dopamine,serotonin,oxytocin,GABA,cortisol
        #[arg(long, value_parser = parse_vector)]
        vector: Levels,
        /// ISO-8601 creation time; defaults to now
        #[arg(long, value_parser = parse_timestamp)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Print the nearest stored profiles
    Search {
        /// dopamine,serotonin,oxytocin,GABA,cortisol
        #[arg(long, value_parser = parse_vector)]
        vector: Levels,
        #[arg(short, default_value_t = 5)]
        k: usize,
        /// key=value, repeatable
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Print store counts and paths
    Info,
    /// Print one record with its stored vector
    Get { vector_id: u64 },
    /// Print every stored record
    List,
}

#[derive(Debug, Clone, Copy)]
struct Levels([f64; VECTOR_DIMENSION]);

fn parse_vector(s: &str) -> Result<Levels, String> {
    let values = s
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|e| format!("'{}': {}", part, e)))
        .collect::<Result<Vec<f64>, String>>()?;
    let values: [f64; VECTOR_DIMENSION] = values.try_into().map_err(|v: Vec<f64>| {
        format!("expected {} comma-separated values, got {}", VECTOR_DIMENSION, v.len())
    })?;
    Ok(Levels(values))
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.trim().to_string(), value.to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading store config from {}", path.display());
            StoreConfig::from_toml_file(path)?
        }
        None => StoreConfig::in_dir(&args.data_dir),
    };

    let store = ProfileStore::open(config)?;

    match args.command {
        Command::Add {
            name,
            gender,
            life_stage,
            age,
            age_range,
            vector,
            timestamp,
        } => {
            let life_stage = match (life_stage, age) {
                (Some(stage), _) => stage,
                (None, Some(age)) => life_stage_for_age(age).to_string(),
                (None, None) => {
                    return Err(NeuroTwinError::InvalidArgument(
                        "either --life-stage or --age is required".to_string(),
                    )
                    .into())
                }
            };
            let levels = Neurotransmitters::from_vector(vector.0).clamped();
            let mut profile = NewProfile::new(name, gender, life_stage, age_range);
            if let Some(timestamp) = timestamp {
                profile = profile.with_timestamp(timestamp);
            }
            let record = store.add_profile(&levels.to_vector(), profile)?;
            info!("Stored profile {} as vector {}", record.user_id, record.vector_id);
            print_json(&record)?;
        }
        Command::Search { vector, k, filters } => {
            let filters: Filters = filters.into_iter().collect();
            let matches = store.find_similar(&vector.0, k, &filters)?;
            print_json(&matches)?;
        }
        Command::Info => print_json(&store.info()?)?,
        Command::Get { vector_id } => {
            let record = store.get(vector_id)?.ok_or_else(|| {
                NeuroTwinError::InvalidArgument(format!("no profile with vector_id {}", vector_id))
            })?;
            let vector = store.vector(vector_id)?;
            print_json(&serde_json::json!({ "record": record, "vector": vector }))?;
        }
        Command::List => print_json(&store.records()?)?,
    }

    store.close();
    Ok(())
}
