use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use supercat_core::{
    BatchClassifier, BatchOutcome, Classifier, DiagnosticKind, RuleEngine, Taxonomy,
};
use supercat_ingest::{Checkpoint, LedgerTable};
use supercat_llm::{HttpBackend, RemoteClassifier};

mod config;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "supercat",
    version,
    about = "Sort transactions into five spending super-categories"
)]
struct Cli {
    /// Config file (default: ~/.supercat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Local keyword rules (deterministic, offline)
    Rules,
    /// Hosted text-generation model
    Remote,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Label every row of a statement CSV and print the distribution
    Classify {
        #[arg(long)]
        csv: PathBuf,

        /// Output path (default: overwrite the input)
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Mode::Rules)]
        mode: Mode,

        /// Concurrent classifications (default: batch.workers from config)
        #[arg(long)]
        workers: Option<usize>,

        /// Taxonomy TOML replacing the built-in term lists (rules mode only)
        #[arg(long)]
        taxonomy: Option<PathBuf>,

        /// Resume file of already-resolved fingerprints, updated as the run goes
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Print the distribution of an already-labeled CSV
    Report {
        #[arg(long)]
        csv: PathBuf,
    },

    /// Show which rule tier labels a single transaction
    Explain {
        #[arg(long)]
        description: String,

        #[arg(long, default_value = "")]
        merchant_category: String,

        #[arg(long = "type", default_value = "")]
        transaction_type: String,

        #[arg(long)]
        taxonomy: Option<PathBuf>,
    },

    /// Keyword taxonomy commands
    Taxonomy {
        #[command(subcommand)]
        command: TaxonomyCommand,
    },

    /// Config file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TaxonomyCommand {
    /// Print the built-in taxonomy as TOML (a starting point for --taxonomy)
    Dump,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,
    /// Print the effective config
    Show,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg_path = cli.config.as_deref();

    match cli.command {
        Command::Classify {
            csv,
            out,
            mode,
            workers,
            taxonomy,
            checkpoint,
        } => {
            let cfg = config::load_config(cfg_path)?;
            let workers = workers.unwrap_or(cfg.batch.workers);
            let run = Run {
                csv: &csv,
                out: out.as_deref().unwrap_or(csv.as_path()),
                workers,
                checkpoint: checkpoint.as_deref(),
                checkpoint_every: cfg.batch.checkpoint_every,
                cfg: &cfg,
            };
            match mode {
                Mode::Rules => {
                    let tx = load_taxonomy(taxonomy.as_deref(), &cfg)?;
                    run.execute(&RuleEngine::new(&tx))?;
                }
                Mode::Remote => {
                    check_remote_taxonomy(taxonomy.as_deref(), &cfg)?;
                    let backend = HttpBackend::new(cfg.llm.clone())
                        .context("remote classifier setup")?;
                    info!(
                        provider = ?cfg.llm.provider,
                        model = cfg.llm.model(),
                        "using remote classifier"
                    );
                    run.execute(&RemoteClassifier::new(backend))?;
                }
            }
        }

        Command::Report { csv } => {
            let cfg = config::load_config(cfg_path)?;
            let table = LedgerTable::read_path(&csv, &cfg.columns)?;
            let labels = table
                .labels()
                .with_context(|| format!("reading labels from {}", csv.display()))?;
            let dist = supercat_core::Distribution::from_labels(&labels);
            println!("Super category distribution ({} transactions):", dist.total());
            print!("{dist}");
        }

        Command::Explain {
            description,
            merchant_category,
            transaction_type,
            taxonomy,
        } => {
            let cfg = config::load_config(cfg_path)?;
            let tx = load_taxonomy(taxonomy.as_deref(), &cfg)?;
            let engine = RuleEngine::new(&tx);
            let eval = engine.evaluate(&description, &merchant_category, &transaction_type);
            match eval.tier {
                Some(tier) => println!("{} (tier: {})", eval.label, tier.name),
                None => println!("{} (no tier matched)", eval.label),
            }
        }

        Command::Taxonomy { command } => match command {
            TaxonomyCommand::Dump => {
                print!("{}", Taxonomy::default().to_toml()?);
            }
        },

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(cfg_path)?,
            ConfigCommand::Show => {
                let cfg = config::load_config(cfg_path)?;
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SUPERCAT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// `--taxonomy` wins over the config's taxonomy path; otherwise the built-in lists.
fn load_taxonomy(flag: Option<&Path>, cfg: &Config) -> Result<Taxonomy> {
    match flag.or(cfg.taxonomy.path.as_deref()) {
        Some(p) => Taxonomy::load(p),
        None => Ok(Taxonomy::default()),
    }
}

/// The remote classifier has no keyword lists: an explicit `--taxonomy` is an
/// error, a configured `taxonomy.path` is only noted.
fn check_remote_taxonomy(flag: Option<&Path>, cfg: &Config) -> Result<()> {
    if let Some(p) = flag {
        bail!("--taxonomy {} only applies to --mode rules", p.display());
    }
    if let Some(p) = cfg.taxonomy.path.as_deref() {
        warn!(path = %p.display(), "taxonomy.path is ignored in remote mode");
    }
    Ok(())
}

struct Run<'a> {
    csv: &'a Path,
    out: &'a Path,
    workers: usize,
    checkpoint: Option<&'a Path>,
    checkpoint_every: usize,
    cfg: &'a Config,
}

impl Run<'_> {
    fn execute<C: Classifier>(&self, classifier: &C) -> Result<()> {
        let table = LedgerTable::read_path(self.csv, &self.cfg.columns)?;
        let records = table.records();
        println!("Loaded {} transactions from {}", records.len(), self.csv.display());

        let outcome = self.classify(classifier, &records)?;
        println!(
            "Classified {} unique transaction patterns ({} classifier calls)",
            outcome.unique_fingerprints, outcome.classifier_calls
        );

        table.write_labeled_path(self.out, &outcome.labels)?;
        println!("Saved labeled dataset to {}", self.out.display());

        println!("\nSuper category distribution:");
        print!("{}", outcome.distribution());

        print_defaulted(&outcome);
        Ok(())
    }

    fn classify<C: Classifier>(
        &self,
        classifier: &C,
        records: &[supercat_core::TransactionRecord],
    ) -> Result<BatchOutcome> {
        let Some(path) = self.checkpoint else {
            return Ok(BatchClassifier::new(classifier)
                .with_workers(self.workers)
                .classify(records));
        };

        let resume = Checkpoint::load(path)?;
        if !resume.is_empty() {
            println!("Resuming with {} resolved patterns from {}", resume.len(), path.display());
        }
        let mut batch = BatchClassifier::new(classifier)
            .with_workers(self.workers)
            .with_resolved(resume.into_resolved());
        let outcome = batch.classify_with_checkpoint(records, self.checkpoint_every, |cache| {
            Checkpoint::from_cache(cache).save(path)
        });
        Ok(outcome)
    }
}

fn print_defaulted(outcome: &BatchOutcome) {
    let defaulted = outcome.defaulted_count();
    if defaulted == 0 {
        return;
    }
    let invalid = outcome
        .diagnostics
        .iter()
        .flatten()
        .filter(|d| d.kind == DiagnosticKind::InvalidResponse)
        .count();
    println!(
        "\n{} records defaulted to Other ({} invalid responses, {} failed requests)",
        defaulted,
        invalid,
        defaulted - invalid
    );
}
