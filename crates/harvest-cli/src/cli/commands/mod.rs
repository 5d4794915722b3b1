//! CLI command handlers. Each command is in its own file.

mod config;
mod plan;
mod run;

pub use config::run_config;
pub use plan::run_plan;
pub use run::run_manifest_cmd;
