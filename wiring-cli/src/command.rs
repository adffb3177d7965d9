//! Subcommands of the `wiring` binary.
//!
//! Each subcommand implements [`Command`] and is registered in a
//! [`CommandRegistry`], which builds the `clap` interface and dispatches
//! parsed arguments to the selected command.
//!
//! ```rust
//! use clap::{ArgMatches, Command as ClapCommand};
//! use std::process::ExitCode;
//! use std::sync::Arc;
//! use wiring_cli::{Command, CommandRegistry, Config};
//!
//! struct VersionCommand;
//!
//! impl Command for VersionCommand {
//!     fn command() -> ClapCommand {
//!         ClapCommand::new("version").about("Prints the version")
//!     }
//!
//!     async fn main(_config: Arc<Config>, _matches: ArgMatches) -> ExitCode {
//!         println!("{}", env!("CARGO_PKG_VERSION"));
//!         ExitCode::SUCCESS
//!     }
//! }
//!
//! let mut registry = CommandRegistry::default();
//! registry.add_command::<VersionCommand>();
//! assert!(registry.has_command::<VersionCommand>());
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Arg, ArgAction, ArgMatches};

use crate::{
    CheckReport, CliError, Config, ReportConfig, ReportFormat, analyze, parse_sources,
    read_sources, render_graph,
};

/// A subcommand of the command-line interface.
pub trait Command: Send + Sync {
    /// Describes the subcommand: name, help and arguments.
    fn command() -> clap::Command
    where
        Self: Sized;

    /// Runs the subcommand with the loaded config and its parsed arguments.
    fn main(
        config: Arc<Config>,
        matches: ArgMatches,
    ) -> impl std::future::Future<Output = ExitCode> + Send {
        let _ = (config, matches);
        async move { ExitCode::FAILURE }
    }
}

#[async_trait]
trait DynCommand: Send + Sync {
    fn command(&self) -> clap::Command;

    async fn main(&self, config: Arc<Config>, matches: ArgMatches) -> ExitCode;
}

struct CommandWrapper<T>(PhantomData<fn() -> T>);

#[async_trait]
impl<T> DynCommand for CommandWrapper<T>
where
    T: Command + 'static,
{
    fn command(&self) -> clap::Command {
        T::command()
    }

    async fn main(&self, config: Arc<Config>, matches: ArgMatches) -> ExitCode {
        T::main(config, matches).await
    }
}

/// Registered subcommands.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<TypeId, Box<dyn DynCommand>>,
}

impl CommandRegistry {
    /// Registry with the built-in `check` and `graph` commands.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.add_command::<CheckCommand>();
        registry.add_command::<GraphCommand>();
        registry
    }

    pub fn add_command<T>(&mut self)
    where
        T: Command + 'static,
    {
        self.commands
            .insert(TypeId::of::<T>(), Box::new(CommandWrapper::<T>(PhantomData)));
    }

    pub fn has_command<T>(&self) -> bool
    where
        T: Command + 'static,
    {
        self.commands.contains_key(&TypeId::of::<T>())
    }

    /// Builds the top-level interface with every registered subcommand.
    pub fn build_cli(&self) -> clap::Command {
        let mut cli = clap::Command::new("wiring")
            .about("Checks dependency injection containers")
            .subcommand_required(true)
            .arg(
                Arg::new("config")
                    .long("config")
                    .short('c')
                    .global(true)
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("config-override")
                    .long("config-override")
                    .short('o')
                    .global(true)
                    .action(ArgAction::Append)
                    .value_parser(clap::value_parser!(PathBuf)),
            );
        let mut subcommands: Vec<_> = self.commands.values().map(|v| v.command()).collect();
        subcommands.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        for subcommand in subcommands {
            cli = cli.subcommand(subcommand);
        }
        cli
    }

    /// Runs the subcommand selected in `matches`.
    pub async fn run_main(&self, config: Arc<Config>, mut matches: ArgMatches) -> ExitCode {
        let Some((name, matches)) = matches.remove_subcommand() else {
            eprintln!("no command given");
            return ExitCode::FAILURE;
        };
        let Some(command) = self
            .commands
            .values()
            .find(|v| v.command().get_name() == name)
        else {
            eprintln!("unknown command `{name}`");
            return ExitCode::FAILURE;
        };
        command.main(config, matches).await
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Loads the config named by `--config`, merged with every
/// `--config-override`. Without `--config` the defaults are used.
pub async fn load_config(matches: &ArgMatches) -> Result<Config, CliError> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::parse_file(path)
            .await
            .map_err(|err| CliError::Config(format!("{}: {err}", path.display())))?,
        None => Config::new(),
    };
    let overrides = matches
        .get_many::<PathBuf>("config-override")
        .unwrap_or_default();
    for path in overrides {
        let config_override = Config::parse_file(path)
            .await
            .map_err(|err| CliError::Config(format!("{}: {err}", path.display())))?;
        config
            .merge_from(config_override)
            .map_err(|err| CliError::Config(err.to_string()))?;
    }
    Ok(config)
}

fn files_arg() -> Arg {
    Arg::new("files")
        .help("Rust source files to scan")
        .required(true)
        .num_args(1..)
        .value_parser(clap::value_parser!(PathBuf))
}

fn format_arg() -> Arg {
    Arg::new("format")
        .long("format")
        .help("Output format, overrides the `report.format` config")
        .value_parser(["text", "json"])
}

fn report_settings(config: &Config, matches: &ArgMatches) -> Result<ReportConfig, CliError> {
    let mut report = config
        .section::<ReportConfig>()
        .map_err(|err| CliError::Config(err.to_string()))?;
    if let Some(format) = matches.get_one::<String>("format") {
        report.format = format.parse::<ReportFormat>()?;
    }
    Ok(report)
}

fn file_paths(matches: &ArgMatches) -> Vec<PathBuf> {
    matches
        .get_many::<PathBuf>("files")
        .map(|v| v.cloned().collect())
        .unwrap_or_default()
}

/// `wiring check <files>..`: validates every container and the project graph.
pub struct CheckCommand;

impl CheckCommand {
    pub async fn run(config: &Config, matches: &ArgMatches) -> Result<CheckReport, CliError> {
        let settings = report_settings(config, matches)?;
        let texts = read_sources(&file_paths(matches)).await?;
        let analysis = analyze(&parse_sources(&texts)?);
        Ok(CheckReport::new(&analysis, &settings))
    }
}

impl Command for CheckCommand {
    fn command() -> clap::Command {
        clap::Command::new("check")
            .about("Validates the containers declared in the given files")
            .arg(files_arg())
            .arg(format_arg())
    }

    async fn main(config: Arc<Config>, matches: ArgMatches) -> ExitCode {
        let report = match Self::run(&config, &matches).await {
            Ok(v) => v,
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        };
        let format = match report_settings(&config, &matches) {
            Ok(v) => v.format,
            Err(_) => ReportFormat::Text,
        };
        match report.render(format) {
            Ok(text) => print!("{text}"),
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        }
        if report.passed {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// `wiring graph <files>..`: prints the project graph of containers.
pub struct GraphCommand;

impl GraphCommand {
    pub async fn run(config: &Config, matches: &ArgMatches) -> Result<String, CliError> {
        let settings = report_settings(config, matches)?;
        let texts = read_sources(&file_paths(matches)).await?;
        let analysis = analyze(&parse_sources(&texts)?);
        render_graph(&analysis.graph, settings.format)
    }
}

impl Command for GraphCommand {
    fn command() -> clap::Command {
        clap::Command::new("graph")
            .about("Prints the container graph of the given files")
            .arg(files_arg())
            .arg(format_arg())
    }

    async fn main(config: Arc<Config>, matches: ArgMatches) -> ExitCode {
        match Self::run(&config, &matches).await {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        }
    }
}
