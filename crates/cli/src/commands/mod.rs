//! Command handlers. Each returns the process exit code.

pub mod check;
pub mod list;
pub mod run;

use crate::cli::{Cli, Commands};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<i32> {
	let format = cli.format;
	match cli.command {
		Commands::Run(args) => run::execute(&args, cli.config.as_deref(), format).await,
		Commands::List => list::execute(format),
		Commands::Check(args) => check::execute(&args, format),
	}
}
