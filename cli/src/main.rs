//! SalesBrain CLI: inspect and update deals stored as JSON snapshots

mod render;
mod store;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use salesbrain::graph::{ActorId, EvidenceArtifact, NodeKind, SignOff, Status, StepId};
use salesbrain::{DealEngine, EngineConfig, TrackedEntity};
use std::path::PathBuf;
use std::sync::Arc;
use store::JsonDealStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "salesbrain", version, about = "SalesBrain buying-process engine CLI")]
struct Cli {
    /// Directory holding one JSON snapshot per deal
    #[arg(long, default_value = "./data/deals", global = true, env = "SALESBRAIN_DATA_DIR")]
    data_dir: PathBuf,

    /// Engine configuration (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored deals
    List,
    /// Create an empty deal
    Create {
        deal: String,
        /// Display name (defaults to the deal id)
        #[arg(long)]
        name: Option<String>,
    },
    /// Load a snapshot file as a new deal
    Import { deal: String, file: PathBuf },
    /// Text summary of the buying process
    Summary { deal: String },
    /// Forecast readiness across the 10 dimensions
    Scorecard { deal: String },
    /// Every actor assignment in the deal
    Actors { deal: String },
    /// What is holding up a step
    Blockers { deal: String, step: String },
    /// Mermaid flowchart of the steps
    Diagram { deal: String },
    /// Every rule violation in the deal
    Validate { deal: String },
    /// Mark a step or criterion (`step:<id>` or `criterion:<id>`)
    Status {
        deal: String,
        entity: TrackedEntity,
        status: Status,
    },
    /// Attach an evidence artifact to a step or criterion
    Evidence {
        deal: String,
        entity: TrackedEntity,
        artifact: String,
    },
    /// Record a signatory's decision
    SignOff {
        deal: String,
        actor: String,
        decision: SignOff,
    },
}

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn main() {
    let cli = Cli::parse();
    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config);

    if let Err(e) = run(cli, Arc::new(config)) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli, config: Arc<EngineConfig>) -> Result<()> {
    let store = JsonDealStore::new(&cli.data_dir);
    let json = matches!(cli.format, OutputFormat::Json);

    match cli.command {
        Commands::List => {
            let deals = store.list()?;
            if json {
                print_json(&deals)?;
            } else if deals.is_empty() {
                println!("(no deals)");
            } else {
                for deal in deals {
                    println!("{}", deal);
                }
            }
        }
        Commands::Create { deal, name } => {
            if store.exists(&deal)? {
                bail!("deal '{}' already exists", deal);
            }
            let name = name.unwrap_or_else(|| deal.clone());
            let engine = DealEngine::new(deal.as_str(), name, config)?;
            let path = store.save(&engine)?;
            println!("Created {} ({})", deal, path.display());
        }
        Commands::Import { deal, file } => {
            if store.exists(&deal)? {
                bail!("deal '{}' already exists", deal);
            }
            let engine = store::load_file(&file, config)?;
            if engine.id().as_str() != deal {
                bail!("snapshot holds deal '{}', not '{}'", engine.id(), deal);
            }
            let violations = engine.validate();
            let path = store.save(&engine)?;
            println!(
                "Imported {} ({}), {} rule violation(s)",
                deal,
                path.display(),
                violations.len()
            );
        }
        Commands::Summary { deal } => {
            let engine = store.load(&deal, config)?;
            if json {
                print_json(&*engine.snapshot())?;
            } else {
                println!("{}", render::summary(&engine));
            }
        }
        Commands::Scorecard { deal } => {
            let engine = store.load(&deal, config)?;
            let scorecard = engine.forecast_scorecard();
            if json {
                print_json(&scorecard)?;
            } else {
                println!("{}", render::scorecard_table(&scorecard));
                println!(
                    "{}/{} dimensions closed, forecast ready: {}",
                    scorecard.closed_count(),
                    scorecard.dimensions.len(),
                    if scorecard.forecast_ready { "yes" } else { "no" }
                );
            }
        }
        Commands::Actors { deal } => {
            let engine = store.load(&deal, config)?;
            if json {
                let mut groups = Vec::new();
                for step in engine
                    .store()
                    .ids_of_kind(NodeKind::Step)
                    .into_iter()
                    .filter_map(StepId::from_node)
                {
                    groups.push((step.clone(), engine.actors_by_role(&step)?));
                }
                print_json(&groups)?;
            } else {
                println!("{}", render::actors_table(&engine));
            }
        }
        Commands::Blockers { deal, step } => {
            let engine = store.load(&deal, config)?;
            let chain = engine.blocking_chain(&StepId::new(step))?;
            if json {
                print_json(&chain)?;
            } else if chain.is_empty() {
                println!("(nothing blocking)");
            } else {
                println!("{}", render::blockers_table(&chain));
            }
        }
        Commands::Diagram { deal } => {
            let engine = store.load(&deal, config)?;
            println!("{}", render::mermaid(&engine));
        }
        Commands::Validate { deal } => {
            let engine = store.load(&deal, config)?;
            let violations = engine.validate();
            if json {
                let messages: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                print_json(&messages)?;
            } else if violations.is_empty() {
                println!("No rule violations");
            } else {
                println!("{}", render::violations_table(&violations));
            }
        }
        Commands::Status {
            deal,
            entity,
            status,
        } => {
            let mut engine = store.load(&deal, config)?;
            engine.set_status(entity.clone(), status)?;
            store.save(&engine)?;
            println!("{} marked {}", entity, status);
        }
        Commands::Evidence {
            deal,
            entity,
            artifact,
        } => {
            let mut engine = store.load(&deal, config)?;
            let id = engine.attach_evidence(entity.clone(), EvidenceArtifact::new(artifact))?;
            store.save(&engine)?;
            println!("Evidence {} attached to {}", id, entity);
        }
        Commands::SignOff {
            deal,
            actor,
            decision,
        } => {
            let mut engine = store.load(&deal, config)?;
            engine.record_sign_off(&ActorId::new(actor.as_str()), decision)?;
            store.save(&engine)?;
            println!("{} sign-off: {}", actor, decision);
        }
    }

    Ok(())
}
