mod check_cmd;
mod config;
mod generate_cmd;
mod load;
mod transfer_cmd;
mod watch_cmd;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;

use modplan_core::plan::SemesterKey;

use config::ModplanConfig;
use load::ProgrammeArgs;

#[derive(Parser)]
#[command(name = "modplan", about = "Degree plan scheduler and validator")]
struct Cli {
    /// Course catalog file (overrides MODPLAN_CATALOG env var)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Degree requirements file (overrides MODPLAN_REQUIREMENTS env var)
    #[arg(long, global = true)]
    requirements: Option<PathBuf>,

    /// Maximum credits per semester (overrides MODPLAN_MAX_CREDITS env var)
    #[arg(long, global = true)]
    max_credits: Option<Decimal>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a modplan config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate an initial plan for a programme
    Generate {
        /// Degree, e.g. "computing"
        #[arg(long)]
        degree: String,
        /// Major, e.g. "Computer Science"
        #[arg(long)]
        major: String,
        /// Focus area code or name
        #[arg(long)]
        focus: Option<String>,
        /// Exempted course (repeatable; replaces the configured exemptions)
        #[arg(long = "exempt", value_name = "CODE")]
        exempt: Vec<String>,
        /// Semester spent on exchange, e.g. y3s2
        #[arg(long)]
        exchange: Option<SemesterKey>,
        /// Pin a course to a semester (repeatable), e.g. CS2103T=y2s1
        #[arg(long = "fix", value_name = "CODE=SEMESTER")]
        fix: Vec<String>,
        /// Calendar year in which year 1 starts (default: current academic year)
        #[arg(long)]
        start_year: Option<u16>,
        /// Plan name
        #[arg(long, default_value = "Generated plan")]
        name: String,
        /// Maximum non-filler courses per semester
        #[arg(long)]
        max_core: Option<usize>,
        /// Maximum filler courses per semester (not applied in year 4)
        #[arg(long)]
        max_fluff: Option<usize>,
        /// Write the plan to this file as TOML
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print the schedule as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a plan and show progress and requirement coverage
    Check {
        /// Path to the plan TOML file
        plan: PathBuf,
        /// Current semester: y2s1, incoming, or today
        #[arg(long, default_value = "incoming")]
        current: String,
        #[command(flatten)]
        programme: ProgrammeFlags,
        /// Print the evaluation as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export a plan's placements as JSON records
    Export {
        /// Path to the plan TOML file
        plan: PathBuf,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import JSON placement records as a plan TOML file
    Import {
        /// Path to the JSON records file
        records: PathBuf,
        /// Calendar year in which year 1 starts
        #[arg(long)]
        start_year: u16,
        /// Plan name
        #[arg(long, default_value = "Imported plan")]
        name: String,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-validate a plan file every time it changes
    Watch {
        /// Path to the plan TOML file
        plan: PathBuf,
        /// Current semester: y2s1, incoming, or today
        #[arg(long, default_value = "incoming")]
        current: String,
        #[command(flatten)]
        programme: ProgrammeFlags,
        /// How often to poll the file, in milliseconds
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Programme selection; defaults to the plan file's `[plan]` metadata.
#[derive(clap::Args, Debug, Default)]
pub struct ProgrammeFlags {
    /// Degree (defaults to the plan's)
    #[arg(long)]
    degree: Option<String>,
    /// Major (defaults to the plan's)
    #[arg(long)]
    major: Option<String>,
    /// Focus area (defaults to the plan's)
    #[arg(long)]
    focus: Option<String>,
}

impl From<ProgrammeFlags> for ProgrammeArgs {
    fn from(f: ProgrammeFlags) -> Self {
        Self {
            degree: f.degree,
            major: f.major,
            focus: f.focus,
        }
    }
}

/// Execute the `modplan init` command: write config file.
fn cmd_init(
    catalog: Option<&Path>,
    requirements: Option<&Path>,
    max_credits: Option<Decimal>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut cfg = config::ConfigFile::default();
    cfg.data.catalog = catalog.map(absolute);
    cfg.data.requirements = requirements.map(absolute);
    if let Some(max) = max_credits {
        cfg.planning.max_credits = Some(max);
    }

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    if let Some(catalog) = &cfg.data.catalog {
        println!("  data.catalog = {}", catalog.display());
    }
    if let Some(requirements) = &cfg.data.requirements {
        println!("  data.requirements = {}", requirements.display());
    }
    if let Some(max) = cfg.planning.max_credits {
        println!("  planning.max_credits = {}", max.normalize());
    }

    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        catalog,
        requirements,
        max_credits,
        command,
    } = Cli::parse();
    let resolve =
        || ModplanConfig::resolve(catalog.as_deref(), requirements.as_deref(), max_credits);

    match command {
        Commands::Init { force } => {
            cmd_init(catalog.as_deref(), requirements.as_deref(), max_credits, force)?;
        }
        Commands::Generate {
            degree,
            major,
            focus,
            exempt,
            exchange,
            fix,
            start_year,
            name,
            max_core,
            max_fluff,
            output,
            json,
        } => {
            let resolved = resolve()?;
            let opts = generate_cmd::GenerateOptions {
                programme: ProgrammeArgs {
                    degree: Some(degree),
                    major: Some(major),
                    focus,
                },
                exempt,
                exchange,
                fix,
                start_year,
                name,
                max_core,
                max_fluff,
                output,
                json,
            };
            generate_cmd::run_generate(&resolved, opts)?;
        }
        Commands::Check {
            plan,
            current,
            programme,
            json,
        } => {
            let resolved = resolve()?;
            check_cmd::run_check(&resolved, &plan, &current, programme.into(), json)?;
        }
        Commands::Export { plan, output } => {
            transfer_cmd::run_export(&plan, output.as_deref())?;
        }
        Commands::Import {
            records,
            start_year,
            name,
            output,
        } => {
            transfer_cmd::run_import(&records, &name, start_year, output.as_deref())?;
        }
        Commands::Watch {
            plan,
            current,
            programme,
            poll_ms,
        } => {
            let resolved = resolve()?;
            watch_cmd::run_watch(
                &resolved,
                plan,
                current,
                programme.into(),
                Duration::from_millis(poll_ms),
            )
            .await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "modplan", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that mutate process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_collects_repeated_flags() {
        let cli = Cli::try_parse_from([
            "modplan",
            "generate",
            "--degree",
            "computing",
            "--major",
            "Computer Science",
            "--exempt",
            "MA1301",
            "--exempt",
            "ES1103",
            "--fix",
            "CS2103T=y2s1",
            "--exchange",
            "y3s2",
            "--max-credits",
            "18",
        ])
        .unwrap();
        assert_eq!(cli.max_credits, Some(Decimal::from(18)));
        let Commands::Generate {
            exempt,
            fix,
            exchange,
            ..
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(exempt, ["MA1301", "ES1103"]);
        assert_eq!(fix, ["CS2103T=y2s1"]);
        assert_eq!(exchange, Some("y3s2".parse().unwrap()));
    }

    #[test]
    fn generate_rejects_bad_exchange_key() {
        let result = Cli::try_parse_from([
            "modplan",
            "generate",
            "--degree",
            "computing",
            "--major",
            "CS",
            "--exchange",
            "semester two",
        ]);
        assert!(result.is_err());
    }
}
