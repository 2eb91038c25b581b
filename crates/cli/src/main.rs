mod config;
mod error;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use coeffects::{CapabilitySet, Context, EnforcementLevel, Policy, Verdict};
use runtime::{Interpreter, Matrix, Program};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "coeffects.toml";

#[derive(Parser)]
#[command(name = "coeffects")]
#[command(about = "Coeffect call-enforcement checker", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./coeffects.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Call every function with every function and report each pair
    Matrix {
        /// Program file (defaults to the built-in fixture)
        #[arg(short, long)]
        program: Option<PathBuf>,
        /// Contexts of the driving function, comma separated
        #[arg(long, value_delimiter = ',')]
        entry: Option<Vec<String>>,
        /// Restrict to these functions, in this order
        #[arg(long, value_delimiter = ',')]
        only: Option<Vec<String>>,
        /// Enforcement level: off, warn, fatal
        #[arg(short, long)]
        level: Option<EnforcementLevel>,
        #[arg(short, long, value_enum, default_value_t)]
        format: Format,
    },
    /// Decide whether a caller context may call a callee context
    Check {
        /// Caller contexts, comma separated (empty for pure)
        #[arg(long, value_delimiter = ',', num_args = 0..)]
        caller: Vec<String>,
        /// Callee contexts, comma separated (empty for pure)
        #[arg(long, value_delimiter = ',', num_args = 0..)]
        callee: Vec<String>,
    },
    /// Run a program's entry function
    Run {
        program: PathBuf,
        #[arg(short, long)]
        level: Option<EnforcementLevel>,
    },
    /// Check every direct call site of a program without running it
    Analyze { program: PathBuf },
    /// Print the context vocabulary
    Lattice,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.log.filter);

    match cli.command {
        Some(Commands::Matrix {
            program,
            entry,
            only,
            level,
            format,
        }) => cmd_matrix(&config, program, entry, only, level, format),
        Some(Commands::Check { caller, callee }) => cmd_check(&caller, &callee),
        Some(Commands::Run { program, level }) => cmd_run(&config, &program, level),
        Some(Commands::Analyze { program }) => cmd_analyze(&config, &program),
        Some(Commands::Lattice) => {
            cmd_lattice();
            Ok(())
        }
        None => cmd_matrix(&config, None, None, None, None, Format::Text),
    }
}

fn cmd_matrix(
    config: &Config,
    program: Option<PathBuf>,
    entry: Option<Vec<String>>,
    only: Option<Vec<String>>,
    level: Option<EnforcementLevel>,
    format: Format,
) -> Result<()> {
    let program = match program {
        Some(path) => Program::load(path)?,
        None => Program::fixture()?,
    };
    let entry = match entry {
        Some(names) => CapabilitySet::parse(names.as_slice())?,
        None => config.entry()?,
    };
    let policy = policy_for(config, level);

    let mut interp =
        Interpreter::new(&program, policy).with_max_depth(config.runtime.max_depth);
    let matrix = match only {
        Some(names) => Matrix::select(&interp, names.as_slice(), entry)?,
        None => Matrix::new(program.functions().iter().collect(), entry),
    };
    let report = matrix.run(&mut interp)?;

    match format {
        Format::Text => print!("{report}"),
        Format::Json => {
            let doc = serde_json::json!({
                "report": &report,
                "trace": interp.trace(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }

    match report.aborted {
        Some(violation) => Err(Error::Aborted(violation)),
        None => Ok(()),
    }
}

fn cmd_check(caller: &[String], callee: &[String]) -> Result<()> {
    let provided = CapabilitySet::parse(caller)?;
    let required = CapabilitySet::parse(callee)?;

    match Policy::new(EnforcementLevel::Warn).check("caller", &provided, "callee", &required) {
        coeffects::Decision::Deny { violation } => {
            println!("{provided} -> {required}: {}", Verdict::Rejected);
            println!("  provided: {}", provided.provides());
            println!("  unmet: {:?}", violation.unmet);
            println!("  missing: {}", violation.missing);
            Err(Error::Rejected)
        }
        _ => {
            println!("{provided} -> {required}: {}", Verdict::Allowed);
            Ok(())
        }
    }
}

fn cmd_run(config: &Config, path: &Path, level: Option<EnforcementLevel>) -> Result<()> {
    let program = Program::load(path)?;
    if program.entry().is_none() {
        return Err(Error::NoEntry);
    }

    let mut interp = Interpreter::new(&program, policy_for(config, level))
        .with_max_depth(config.runtime.max_depth);
    let result = interp.run_entry();

    print!("{}", interp.output());
    if !interp.output().is_empty() && !interp.output().ends_with('\n') {
        println!();
    }
    for violation in interp.trace().violations() {
        eprintln!("violation: {violation}");
    }

    if let Err(e) = result {
        if let Some(v) = e.violation() {
            return Err(Error::Aborted(v.clone()));
        }
        return Err(e.into());
    }
    Ok(())
}

fn cmd_analyze(config: &Config, path: &Path) -> Result<()> {
    let program = Program::load(path)?;
    let policy = policy_for(config, Some(EnforcementLevel::Warn));
    let sites = runtime::direct_sites(&program)?;

    if sites.is_empty() {
        println!("No direct call sites.");
        return Ok(());
    }

    let mut rejected = 0;
    for site in &sites {
        let decision = site.check(&policy);
        match decision {
            coeffects::Decision::Deny { violation } => {
                rejected += 1;
                println!(
                    "{} -> {}: {} ({violation})",
                    site.caller.name(),
                    site.callee.name(),
                    Verdict::Rejected
                );
            }
            _ => println!(
                "{} -> {}: {}",
                site.caller.name(),
                site.callee.name(),
                Verdict::Allowed
            ),
        }
    }
    println!("{} sites, {rejected} rejected", sites.len());
    Ok(())
}

fn cmd_lattice() {
    println!("{:<20}  CAPABILITIES", "CONTEXT");
    println!("{}", "-".repeat(80));
    for ctx in Context::ALL {
        println!("{:<20}  {}", ctx.name(), ctx.capabilities());
    }
}

fn policy_for(config: &Config, level: Option<EnforcementLevel>) -> Policy {
    Policy::new(level.unwrap_or(config.enforcement.level))
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Ok(Config::load(path)?);
    }

    let default_path = PathBuf::from(CONFIG_FILE);
    if default_path.exists() {
        Ok(Config::load(&default_path)?)
    } else {
        Ok(Config::default())
    }
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
