//! uarch-analyze: tables, figures and reports from branch predictor
//! injection experiments.
//!
//!   uarch-analyze <experiment> [--data <dir>]   → one analyzer
//!   uarch-analyze all                           → every experiment with data
//!   uarch-analyze hosts | dump <experiment>     → inspect registry / results

mod analyzers;
mod logging;
mod plot;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use uarch_core::HostRegistry;

use analyzers::{end2end, leak_supervisor, Experiment};
use settings::Settings;

// ─── Help text ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = "\
LAYOUT:
    Each experiment reads <experiments-dir>/exp-<name>/out, with one
    directory per host holding metadata.json and run.out. Tables are
    written to --tables-dir as LaTeX tabular fragments, figures to
    --figures-dir as SVG, reports to stdout.

ENVIRONMENT:
    UARCH_EXPERIMENTS_DIR   Root of the experiment directories
    UARCH_TABLES_DIR        Output directory for .tex tables
    UARCH_FIGURES_DIR       Output directory for .svg figures
    UARCH_REGISTRY          Host registry TOML replacing the built-in one
    UARCH_STRICT            Fail on hosts or cores missing from the registry
    UARCH_LOG               Log level (trace, debug, info, warn, error, off)

EXAMPLES:
    uarch-analyze leak-supervisor
    uarch-analyze bhi-dis-s --data /mnt/results/bhi/out --tables-dir paper/tables
    uarch-analyze --strict all
    uarch-analyze dump leak-ibpb";

const REGISTRY_AFTER_HELP: &str = "\
REGISTRY FORMAT:
    [core_types.golden_cove]
    march = \"Golden Cove (ADL)\"
    type = \"P-Core\"

    [[hosts]]
    id = \"lab-01\"
    code_name = \"Alder Lake\"
    cores = [{ core = \"golden_cove\", count = 16 }]";

// ─── CLI definition ───────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "uarch-analyze",
    version,
    about = "Tables, figures and reports from branch predictor injection experiments",
    after_help = AFTER_HELP,
    disable_help_subcommand = true
)]
struct Cli {
    /// Root of the exp-* experiment directories
    #[arg(long, env = "UARCH_EXPERIMENTS_DIR", default_value = "experiments", global = true)]
    experiments_dir: PathBuf,
    /// Output directory for LaTeX tables
    #[arg(long, env = "UARCH_TABLES_DIR", default_value = "tables", global = true)]
    tables_dir: PathBuf,
    /// Output directory for figures
    #[arg(long, env = "UARCH_FIGURES_DIR", default_value = "figures", global = true)]
    figures_dir: PathBuf,
    /// Host registry TOML file (built-in registry if omitted)
    #[arg(long, env = "UARCH_REGISTRY", global = true)]
    registry: Option<PathBuf>,
    /// Fail on hosts or cores missing from the registry instead of skipping them
    #[arg(
        long,
        env = "UARCH_STRICT",
        global = true,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    strict: bool,
    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, env = "UARCH_LOG", default_value = "warn", global = true)]
    log_level: String,
    /// Log format (text, json)
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Input {
    /// Experiment output directory [default: <experiments-dir>/exp-<name>/out]
    #[arg(long, value_name = "DIR")]
    data: Option<PathBuf>,
}

impl Input {
    fn resolve(&self, settings: &Settings, experiment: Experiment) -> PathBuf {
        settings.data_dir(experiment.dir_name(), self.data.as_deref())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// eIBRS supervisor leak table (eibrs-leak.tex)
    LeakSupervisor {
        #[command(flatten)]
        input: Input,
        /// Host reported on stdout but left out of the table; repeat for
        /// several [default: ee-tik-cn128, ee-tik-cn140]
        #[arg(long = "exclude-host", value_name = "HOST")]
        exclude_hosts: Vec<String>,
    },

    /// BTB and IBP share of the supervisor leak
    LeakSupervisorDiscern {
        #[command(flatten)]
        input: Input,
    },

    /// Leak across IBPB
    LeakIbpb {
        #[command(flatten)]
        input: Input,
    },

    /// BTB and IBP insertion under random and matching history
    IbpInsertion {
        #[command(flatten)]
        input: Input,
    },

    /// Misprediction rates with and without BHI_DIS_S (bhi-dis-s.tex)
    BhiDisS {
        #[command(flatten)]
        input: Input,
    },

    /// UnixBench and LMbench overhead of IPRED_DIS_S and retpolines (mitigations.tex)
    BenchmarkMitigations {
        #[command(flatten)]
        input: Input,
    },

    /// End-to-end attack summary per host
    End2end {
        #[command(flatten)]
        input: Input,
        /// Size of the leaked secret in the bandwidth benchmark, in bytes
        #[arg(long, default_value_t = end2end::LEAK_SIZE)]
        leak_size: u64,
        /// Expected /etc/shadow entry [default: the victim machines' root entry]
        #[arg(long)]
        expected_secret: Option<String>,
    },

    /// Success rate by repetition (leak_rounds.svg)
    LeakRounds {
        #[command(flatten)]
        input: Input,
    },

    /// Kernel and user hit rate over the syscall delay (syscall_split.svg)
    SyscallSplit {
        #[command(flatten)]
        input: Input,
    },

    /// Mispredictions over the training distance (btb_delay.svg)
    BtbDelay {
        #[command(flatten)]
        input: Input,
    },

    /// Run every experiment whose output directory exists
    All,

    /// List the host registry in display order
    #[command(after_help = REGISTRY_AFTER_HELP)]
    Hosts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the ordered result sets of an experiment as JSON
    Dump {
        experiment: Experiment,
        #[command(flatten)]
        input: Input,
    },
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::new(
        cli.experiments_dir,
        cli.tables_dir,
        cli.figures_dir,
        cli.registry.as_deref(),
        cli.strict,
    )?;

    match cli.command {
        Commands::LeakSupervisor {
            input,
            exclude_hosts,
        } => {
            let mut options = leak_supervisor::Options::default();
            if !exclude_hosts.is_empty() {
                options.exclude_hosts = exclude_hosts;
            }
            let data_dir = input.resolve(&settings, Experiment::LeakSupervisor);
            leak_supervisor::run(&settings, &data_dir, &options)
        }
        Commands::LeakSupervisorDiscern { input } => {
            run_experiment(&settings, Experiment::LeakSupervisorDiscern, &input)
        }
        Commands::LeakIbpb { input } => run_experiment(&settings, Experiment::LeakIbpb, &input),
        Commands::IbpInsertion { input } => {
            run_experiment(&settings, Experiment::IbpInsertion, &input)
        }
        Commands::BhiDisS { input } => run_experiment(&settings, Experiment::BhiDisS, &input),
        Commands::BenchmarkMitigations { input } => {
            run_experiment(&settings, Experiment::BenchmarkMitigations, &input)
        }
        Commands::End2end {
            input,
            leak_size,
            expected_secret,
        } => {
            let options = end2end::Options {
                leak_size,
                expected_secret: expected_secret
                    .unwrap_or_else(|| end2end::ROOT_HASH.to_string()),
            };
            end2end::run(&input.resolve(&settings, Experiment::End2end), &options)
        }
        Commands::LeakRounds { input } => {
            run_experiment(&settings, Experiment::LeakRounds, &input)
        }
        Commands::SyscallSplit { input } => {
            run_experiment(&settings, Experiment::SyscallSplit, &input)
        }
        Commands::BtbDelay { input } => run_experiment(&settings, Experiment::BtbDelay, &input),
        Commands::All => run_all(&settings),
        Commands::Hosts { json } => print_hosts(&settings.registry, json),
        Commands::Dump { experiment, input } => dump(&settings, experiment, &input),
    }
}

fn run_experiment(settings: &Settings, experiment: Experiment, input: &Input) -> Result<()> {
    let data_dir = input.resolve(settings, experiment);
    experiment.run(settings, &data_dir)
}

// ─── All ──────────────────────────────────────────────────────────────────────

fn run_all(settings: &Settings) -> Result<()> {
    let mut ran = 0;
    for experiment in Experiment::ALL {
        let data_dir = settings.data_dir(experiment.dir_name(), None);
        if !data_dir.is_dir() {
            tracing::info!(%experiment, dir = %data_dir.display(), "no data, skipping");
            continue;
        }
        tracing::info!(%experiment, "running");
        experiment
            .run(settings, &data_dir)
            .with_context(|| format!("{experiment}"))?;
        ran += 1;
    }

    if ran == 0 {
        tracing::warn!(
            dir = %settings.experiments_dir.display(),
            "no experiment data found"
        );
    }
    Ok(())
}

// ─── Hosts / Dump ─────────────────────────────────────────────────────────────

fn print_hosts(registry: &HostRegistry, json: bool) -> Result<()> {
    if json {
        let hosts: Vec<serde_json::Value> = registry
            .hosts()
            .map(|host| {
                serde_json::json!({
                    "id": host.id,
                    "code_name": host.code_name,
                    "name": host.name,
                    "microcode": host.microcode,
                    "os": host.os,
                    "kernel_version": host.kernel_version,
                    "cores": host.cores.iter().map(|c| c.as_ref()).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&hosts)?);
        return Ok(());
    }

    for host in registry.hosts() {
        match &host.name {
            Some(name) => println!("{}  {} ({name})", host.id, host.code_name),
            None => println!("{}  {}", host.id, host.code_name),
        }
        let mut first = 0;
        for (count, core) in host.core_layout() {
            let last = first + count - 1;
            let kind = core
                .kind
                .as_deref()
                .map(|k| format!(" [{k}]"))
                .unwrap_or_default();
            if count == 1 {
                println!("    core {first}: {}{kind}", core.march);
            } else {
                println!("    cores {first}-{last}: {}{kind}", core.march);
            }
            first += count;
        }
    }
    Ok(())
}

fn dump(settings: &Settings, experiment: Experiment, input: &Input) -> Result<()> {
    if !experiment.has_results_blocks() {
        bail!("{experiment} keeps raw benchmark logs, there are no result sets to dump");
    }
    let data_dir = input.resolve(settings, experiment);
    let sets = settings.load_ordered(&data_dir)?;
    println!("{}", serde_json::to_string_pretty(&sets)?);
    Ok(())
}
