//! # wiring-cli
//!
//! Project-level checks for `wiring` containers.
//!
//! The `wiring` binary scans Rust source files for `#[container]` structs
//! and offers two subcommands:
//!
//! - `check <files>..` validates every container the way the attribute
//!   macro would, then links all containers into a project graph and reports
//!   cross-container dependency cycles and ambiguous references;
//! - `graph <files>..` prints the normalized project graph as text or JSON.
//!
//! ## Configuration
//!
//! An optional JSON config is passed with `--config` and may be layered with
//! `--config-override` files. Known sections:
//!
//! - `tracing`: `level` and `directives` of the stderr log output;
//! - `report`: `format` (`"text"` or `"json"`) and `fail_on_ambiguous`.

mod analysis;
mod command;
mod config;
mod error;
mod report;
mod tracing;

use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;

pub use analysis::*;
pub use command::*;
pub use config::*;
pub use error::*;
pub use report::*;
pub use self::tracing::{TracingConfig, init_tracing};

pub type StdError = Box<dyn std::error::Error + Send + Sync>;

/// Parses `args`, loads the config, sets up tracing and runs the selected
/// subcommand.
pub async fn run_main<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let registry = CommandRegistry::with_defaults();
    let matches = match registry.build_cli().try_get_matches_from(args) {
        Ok(v) => v,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let config = match load_config(&matches).await {
        Ok(v) => v,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let tracing_config = match config.section::<TracingConfig>() {
        Ok(v) => v,
        Err(err) => {
            eprintln!("invalid tracing config: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_tracing(&tracing_config) {
        eprintln!("cannot set up tracing: {err}");
    }
    registry.run_main(Arc::new(config), matches).await
}
