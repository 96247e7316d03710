use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use dossier_core::{InvestigateOptions, InvestigationReport, Investigator, ProgressReporter};
use dossier_prober::ProbeOutcome;
use dossier_registry::Registry;
use dossier_shared::{IdentitySeed, Mode, config_file_path, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Dossier: find where a person is present online, starting from a name.
#[derive(Parser)]
#[command(name = "dossier", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format.
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Investigate a name across the platform catalog.
    Investigate {
        /// Full name of the person (e.g. "John Smith").
        #[arg(long)]
        name: String,

        /// Free-form location hint, used for phone-area hints.
        #[arg(long)]
        location: Option<String>,

        /// Investigation depth: basic or advanced.
        #[arg(long)]
        mode: Option<Mode>,

        /// Write the full report as JSON to this path.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Override the global deadline, in seconds.
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Override the number of concurrent probes.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Skip checkpoint planning for this run.
        #[arg(long)]
        no_planner: bool,
    },

    /// List the platforms that would be probed.
    Platforms {
        /// Only show platforms used in this mode.
        #[arg(long)]
        mode: Option<Mode>,
    },

    /// Manage configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Create default config file at ~/.dossier/dossier.toml.
    Init,
    /// Show current configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

pub fn init_tracing(cli: &Cli) {
    let filter = match cli.verbose {
        0 => "dossier=info",
        1 => "dossier=debug",
        _ => "dossier=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Investigate {
            name,
            location,
            mode,
            output,
            deadline_secs,
            concurrency,
            no_planner,
        } => {
            let opts = InvestigateOptions {
                deadline: deadline_secs.map(Duration::from_secs),
                concurrency,
                planner: no_planner.then_some(false),
            };
            cmd_investigate(name, location, mode, output, opts).await
        }
        Command::Platforms { mode } => cmd_platforms(mode),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Progress reporter
// ---------------------------------------------------------------------------

struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("static progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn probes_started(&self, total: usize) {
        self.spinner.set_message(format!("Probing {total} platform/candidate pairs..."));
    }

    fn outcome(&self, outcome: &ProbeOutcome, completed: usize, total: usize) {
        self.spinner.set_message(format!(
            "[{completed}/{total}] {} {}",
            outcome.task.platform.name,
            outcome.task.candidate.value()
        ));
    }

    fn done(&self, report: &InvestigationReport) {
        self.spinner.finish_with_message(format!(
            "Done: {} finding(s) in {:.1}s",
            report.findings.len(),
            report.elapsed_ms as f64 / 1000.0
        ));
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_investigate(
    name: String,
    location: Option<String>,
    mode: Option<Mode>,
    output: Option<PathBuf>,
    opts: InvestigateOptions,
) -> Result<()> {
    let config = load_config().wrap_err("failed to load config")?;
    let mode = mode.unwrap_or(config.defaults.mode);
    let investigator = Investigator::new(config).wrap_err("failed to load platform catalog")?;

    let cancel = investigator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling investigation");
            cancel.cancel();
        }
    });

    let seed = IdentitySeed::new(name, location);
    let progress = CliProgress::new();
    let report = investigator
        .run(seed, mode, &opts, &progress)
        .await
        .wrap_err("investigation failed")?;

    print_report(&report);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .wrap_err_with(|| format!("failed to write report to {}", path.display()))?;
        println!();
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn print_report(report: &InvestigationReport) {
    println!();
    println!("Investigation complete!");
    println!("  Run:        {}", report.run_id);
    println!("  Name:       {}", report.seed.name);
    if let Some(location) = &report.seed.location {
        println!("  Location:   {location}");
    }
    println!("  Mode:       {}", report.mode);
    println!("  Confidence: {}%", report.confidence_percent());
    println!(
        "  Coverage:   {}/{} platforms answered, {} task(s), {} inconclusive, {} errored",
        report.coverage.platforms_resolved,
        report.coverage.platforms_probed,
        report.coverage.tasks_dispatched,
        report.coverage.tasks_inconclusive,
        report.coverage.tasks_errored,
    );

    println!();
    if report.findings.is_empty() {
        println!("No profiles found.");
    } else {
        println!("Profiles:");
        for finding in &report.findings {
            let url = finding.profile_url.as_deref().unwrap_or("-");
            println!(
                "  {:>3}%  {:<16} {:<24} {url}",
                (finding.confidence * 100.0).round() as u32,
                finding.platform_name,
                finding.identifier,
            );
            if !finding.corroborated_by.is_empty() {
                println!("        corroborated by {}", finding.corroborated_by.join(", "));
            }
        }
    }

    if !report.discovered_contacts.is_empty() {
        println!();
        println!("Contacts seen on profiles:");
        for contact in &report.discovered_contacts {
            println!("  {:<40} ({})", contact.value, contact.seen_on.join(", "));
        }
    }

    if !report.websites.is_empty() {
        println!();
        println!("Websites:");
        for website in &report.websites {
            println!("  {:<32} {}", website.domain, website.url);
        }
    }

    if !report.phone_patterns.is_empty() {
        println!();
        println!("Phone hints:");
        for hint in &report.phone_patterns {
            let region = hint.region.as_deref().unwrap_or("unknown region");
            println!("  {:<20} {region}", hint.pattern);
        }
    }

    if !report.notes.is_empty() {
        println!();
        println!("Notes:");
        for note in &report.notes {
            println!("  - {note}");
        }
    }

    if let Some(narrative) = &report.narrative {
        println!();
        println!("{narrative}");
    }
}

fn cmd_platforms(mode: Option<Mode>) -> Result<()> {
    let config = load_config().wrap_err("failed to load config")?;
    let registry = Registry::load(&config.platforms).wrap_err("failed to load platform catalog")?;

    let platforms = match mode {
        Some(mode) => registry.for_mode(mode),
        None => registry.all().to_vec(),
    };

    println!(
        "{:<16} {:<20} {:<8} {:<12} {:<6} ACCEPTS",
        "ID", "NAME", "TIER", "RATE CLASS", "BASIC"
    );
    for platform in &platforms {
        let accepts: Vec<&str> = platform.accepts.iter().map(|k| k.as_str()).collect();
        println!(
            "{:<16} {:<20} {:<8} {:<12} {:<6} {}",
            platform.id,
            platform.name,
            platform.tier.as_str(),
            platform.rate_class,
            if platform.basic { "yes" } else { "no" },
            accepts.join(","),
        );
    }
    println!();
    println!("{} platform(s)", platforms.len());

    for skipped in registry.skipped() {
        println!(
            "  skipped entry #{} ({}): {}",
            skipped.index,
            skipped.id.as_deref().unwrap_or("no id"),
            skipped.reason
        );
    }

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = config_file_path()?;
    if path.exists() {
        println!("Config file already exists at {}", path.display());
        return Ok(());
    }

    let path = init_config()?;
    println!("Created config file at {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
