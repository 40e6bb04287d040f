use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use parcel_rank::output;
use parcel_rank::rescore::RescoreReport;
use parcel_rank::scoring::{redistribute, Criterion, Profile, WeightVector};
use parcel_rank::service::{ScoringService, UpdateError};
use parcel_rank::weights::WeightError;

const EXIT_SUCCESS: i32 = 0;
const EXIT_CONFIG: i32 = 4;
const EXIT_VALIDATION: i32 = 5;
const EXIT_STORAGE: i32 = 6;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Tsv,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List scored properties, best first (default if no subcommand)
    List {
        /// Profile to rank by
        #[arg(short, long, default_value = "combined")]
        profile: Profile,

        /// Hide properties scoring below this value
        #[arg(long)]
        min_score: Option<f64>,

        /// Show at most this many properties
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Score one property, or re-score all of them
    Score {
        /// Property id (omit to re-score everything)
        id: Option<u64>,
    },
    /// Show the score breakdown of a property
    Show {
        id: u64,
    },
    /// Import enriched property bundles (JSON files matching a glob) and score them
    Import {
        /// File pattern, e.g. "enriched/*.json"
        pattern: String,

        /// Store the properties without scoring them
        #[arg(long)]
        no_score: bool,
    },
    /// Inspect or change criterion weights
    Weights {
        #[command(subcommand)]
        command: WeightsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum WeightsCommand {
    /// Print the current weights
    Show {
        /// Only this profile
        profile: Option<Profile>,
    },
    /// Replace the weights of a profile and re-score everything
    Set {
        profile: Profile,

        /// Weights as criterion=value pairs; they are normalized to sum to 1
        #[arg(required = true)]
        weights: Vec<String>,
    },
    /// Move one weight and rebalance the others proportionally
    Adjust {
        profile: Profile,
        criterion: Criterion,
        /// Target weight in [0, 1]
        value: f64,

        /// Save the result and re-score (default is a preview)
        #[arg(long)]
        apply: bool,
    },
    /// Forget saved weights of a profile and go back to the defaults
    Reset {
        profile: Profile,
    },
}

#[derive(Parser, Debug)]
#[command(name = "parcel-rank")]
#[command(about = "Land listing ranking by weighted multi-criteria scoring", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/parcel-rank/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn exit_with(code: i32, message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(code);
}

/// Parse "criterion=value" arguments into a raw weight map
fn parse_weight_pairs(pairs: &[String]) -> Result<BTreeMap<String, f64>, Vec<String>> {
    let mut weights = BTreeMap::new();
    let mut errors = Vec::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            errors.push(format!("'{}': expected criterion=value", pair));
            continue;
        };
        match value.trim().parse::<f64>() {
            Ok(v) => {
                weights.insert(name.trim().to_string(), v);
            }
            Err(_) => errors.push(format!("'{}': '{}' is not a number", pair, value.trim())),
        }
    }
    if errors.is_empty() {
        Ok(weights)
    } else {
        Err(errors)
    }
}

fn to_raw(vector: &WeightVector) -> BTreeMap<String, f64> {
    vector.iter().map(|(c, w)| (c.name().to_string(), w)).collect()
}

fn exit_on_update_error(e: UpdateError) -> ! {
    match e {
        UpdateError::Validation(errors) | UpdateError::Weights(WeightError::Invalid(errors)) => {
            eprintln!("Invalid weights:");
            for error in errors {
                eprintln!("  - {}", error);
            }
            std::process::exit(EXIT_VALIDATION);
        }
        UpdateError::Weights(WeightError::Storage(e)) => {
            exit_with(EXIT_STORAGE, format!("Failed to save weights: {:#}", e))
        }
    }
}

/// Print the rescore summary; an unsaved batch is a storage failure
fn finish_rescore(report: &RescoreReport) {
    eprintln!("{}", output::format_report(report));
    if report.commit_error.is_some() {
        std::process::exit(EXIT_STORAGE);
    }
}

fn main() {
    let cli = Cli::parse();
    parcel_rank::logging::init_tracing(cli.verbose);
    let command = cli.command.unwrap_or(Commands::List {
        profile: Profile::Combined,
        min_score: None,
        limit: None,
        format: OutputFormat::Table,
    });
    let start_time = Instant::now();

    // Load config
    let config_path = cli.config.map(PathBuf::from);
    let config = match parcel_rank::config::load_config(config_path) {
        Ok(c) => c,
        Err(e) => exit_with(EXIT_CONFIG, format!("Config error: {:#}", e)),
    };
    if let Err(errors) = config.validate() {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    let service = match ScoringService::open(&config) {
        Ok(s) => s,
        Err(e) => exit_with(EXIT_STORAGE, format!("Storage error: {:#}", e)),
    };
    let use_colors = output::should_use_colors();

    match command {
        Commands::List {
            profile,
            min_score,
            limit,
            format,
        } => {
            let properties = service.properties();
            let mut ranked = parcel_rank::ranking::rank(&properties, profile, min_score);
            if let Some(limit) = limit {
                ranked.truncate(limit);
            }
            let text = match format {
                OutputFormat::Table => output::format_scored_table(&ranked, use_colors),
                OutputFormat::Tsv => output::format_tsv(&ranked),
            };
            if !text.is_empty() {
                println!("{}", text);
            }
            if cli.verbose {
                eprintln!(
                    "Total: {} of {} properties in {:?}",
                    ranked.len(),
                    properties.len(),
                    start_time.elapsed()
                );
            }
        }
        Commands::Score { id: Some(id) } => match service.calculate_score(id) {
            Ok(Ok(score)) => println!("#{}: {}", id, output::format_score(score)),
            Ok(Err(e)) => eprintln!("#{}: scoring failed ({}); recorded as 0", id, e),
            Err(e) if service.property(id).is_none() => exit_with(EXIT_VALIDATION, e),
            Err(e) => exit_with(EXIT_STORAGE, format!("Storage error: {:#}", e)),
        },
        Commands::Score { id: None } => {
            let report = service.rescore_all();
            finish_rescore(&report);
        }
        Commands::Show { id } => match service.property(id) {
            Some(property) => println!("{}", output::format_breakdown(&property, use_colors)),
            None => exit_with(EXIT_VALIDATION, format!("No property with id {}", id)),
        },
        Commands::Import { pattern, no_score } => {
            let bundles = match parcel_rank::property::read_bundles(&pattern) {
                Ok(b) => b,
                Err(e) => exit_with(EXIT_VALIDATION, format!("Import error: {:#}", e)),
            };
            let count = bundles.len();
            let added = match service.import(bundles) {
                Ok(added) => added,
                Err(e) => exit_with(EXIT_STORAGE, format!("Storage error: {:#}", e)),
            };
            eprintln!("Imported {} properties ({} new)", count, added);
            if !no_score {
                let report = service.rescore_all();
                finish_rescore(&report);
            }
        }
        Commands::Weights { command } => match command {
            WeightsCommand::Show { profile } => {
                let profiles = match profile {
                    Some(p) => vec![p],
                    None => Profile::ALL.to_vec(),
                };
                let sections: Vec<String> = profiles
                    .into_iter()
                    .map(|p| {
                        output::format_weights(
                            p,
                            &service.get_current_weights(p),
                            service.engine().weights().has_persisted(p),
                            use_colors,
                        )
                    })
                    .collect();
                println!("{}", sections.join("\n\n"));
            }
            WeightsCommand::Set { profile, weights } => {
                let raw = match parse_weight_pairs(&weights) {
                    Ok(raw) => raw,
                    Err(errors) => exit_on_update_error(UpdateError::Validation(errors)),
                };
                match service.update_weights(profile, &raw) {
                    Ok(report) => {
                        println!(
                            "{}",
                            output::format_weights(profile, &service.get_current_weights(profile), true, use_colors)
                        );
                        finish_rescore(&report);
                    }
                    Err(e) => exit_on_update_error(e),
                }
            }
            WeightsCommand::Adjust {
                profile,
                criterion,
                value,
                apply,
            } => {
                if !value.is_finite() {
                    exit_with(EXIT_VALIDATION, format!("Invalid weight {}", value));
                }
                let adjusted = redistribute(&service.get_current_weights(profile), criterion, value);
                println!("{}", output::format_weights(profile, &adjusted, apply, use_colors));
                if apply {
                    match service.update_weights(profile, &to_raw(&adjusted)) {
                        Ok(report) => finish_rescore(&report),
                        Err(e) => exit_on_update_error(e),
                    }
                } else {
                    eprintln!("Preview only; pass --apply to save and re-score.");
                }
            }
            WeightsCommand::Reset { profile } => match service.reset_weights(profile) {
                Ok(report) => {
                    eprintln!("{} weights reset to defaults", profile);
                    finish_rescore(&report);
                }
                Err(e) => exit_on_update_error(e),
            },
        },
    }

    std::process::exit(EXIT_SUCCESS);
}
