// comps - reconcile brokerage listing sheets with municipal appraisal rolls

mod exit_codes;
mod export;
mod recon;
mod text;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use comparables_recon::matcher::{AddressMatcher, DEFAULT_THRESHOLD};

use exit_codes::{EXIT_IO, EXIT_NO_MATCH, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "comps")]
#[command(about = "Fill a comparables sheet from listing sheets and appraisal rolls")]
#[command(version)]
struct Cli {
    /// More logging on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract listings and appraisals, match them, accumulate totals
    #[command(after_help = "\
Examples:
  comps run -l listings.pdf -a roll-1.pdf -a roll-2.pdf --out comparables.xlsx
  comps run -l a.pdf -l b.pdf -a rolls/*.pdf --config quebec.toml --json
  comps run -l listings.pdf -a roll.pdf --prior last-run.csv --out run.csv --strict")]
    Run {
        /// Listing document (.pdf or extracted .txt). Repeatable.
        #[arg(long = "listing", short = 'l', required = true)]
        listings: Vec<PathBuf>,

        /// Appraisal roll (.pdf or extracted .txt). Repeatable.
        #[arg(long = "appraisal", short = 'a')]
        appraisals: Vec<PathBuf>,

        /// TOML config (defaults apply when omitted)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// CSV of totals already stored per slot (slot,floor_area,building_area,assessed_value)
        #[arg(long)]
        prior: Option<PathBuf>,

        /// Write results; format from extension (.xlsx, .csv, .json)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Print the full result as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Exit 6 when any appraisal matched no listing
        #[arg(long)]
        strict: bool,

        /// No summary on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Extract listings only (JSON on stdout)
    Listings {
        /// Listing documents, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Extract appraisal values only (JSON on stdout)
    Appraisal {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Compare two addresses the way `run` does
    #[command(after_help = "\
Exit code 0 when the addresses match, 1 when they do not.

Examples:
  comps compare '123-125 rue Principale' '124 rue Principale'
  comps compare '10 av. des Pins' '10 avenue des Pins' --threshold 90 --json")]
    Compare {
        a: String,
        b: String,

        /// Minimum similarity score, 0-100
        #[arg(long, short = 't', default_value_t = DEFAULT_THRESHOLD)]
        threshold: u8,

        #[arg(long)]
        json: bool,
    },

    /// Check a config file without running
    Validate {
        config: Option<PathBuf>,
    },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { listings, appraisals, config, prior, out, json, strict, quiet } => {
            recon::cmd_run(recon::RunArgs {
                listings,
                appraisals,
                config,
                prior,
                out,
                json,
                strict,
                quiet,
            })
        }
        Commands::Listings { files, config } => recon::cmd_listings(files, config),
        Commands::Appraisal { files, config } => recon::cmd_appraisal(files, config),
        Commands::Compare { a, b, threshold, json } => cmd_compare(&a, &b, threshold, json),
        Commands::Validate { config } => cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// compare
// ============================================================================

fn cmd_compare(a: &str, b: &str, threshold: u8, json: bool) -> Result<(), CliError> {
    if threshold > 100 {
        return Err(CliError::args(format!("--threshold must be 0-100, got {threshold}")));
    }
    let verdict = AddressMatcher::new(threshold).compare(a, b);

    if json {
        let out = serde_json::to_string_pretty(&verdict)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        println!("score:          {:.2}", verdict.score);
        println!("civic conflict: {}", verdict.civic_conflict);
        println!("civic overlap:  {}", verdict.civic_overlap);
        println!("match:          {}", if verdict.accepted { "yes" } else { "no" });
    }

    if verdict.accepted {
        Ok(())
    } else {
        // Verdict already printed; exit code alone signals the outcome.
        Err(CliError { code: EXIT_NO_MATCH, message: String::new(), hint: None })
    }
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(config: Option<PathBuf>) -> Result<(), CliError> {
    let cfg = recon::load_config(config.as_deref())?;
    println!(
        "config ok: {} (threshold {}, {} appraisal rule(s), sheet '{}' from row {})",
        cfg.name,
        cfg.matching.threshold,
        cfg.appraisal.fields.len(),
        cfg.sheet.name,
        cfg.sheet.first_row,
    );
    Ok(())
}
