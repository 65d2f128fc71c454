#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use veri_runtime::Browser;

use crate::output::OutputFormat;
use crate::styles::cli_styles;

/// Root CLI of the veri harness.
#[derive(Parser, Debug)]
#[command(name = "veri")]
#[command(about = "Scenario-driven UI verification for the Crypto3 web app")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: toon (default), json, ndjson, or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "toon")]
	pub format: OutputFormat,

	/// Project file to use instead of searching for veri.toml
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run scenarios against the application.
	Run(RunArgs),
	/// List the built-in scenarios.
	List,
	/// Validate scenario files without starting a browser.
	Check(CheckArgs),
}

impl Commands {
	/// Name used in the output envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Run(_) => "run",
			Commands::List => "list",
			Commands::Check(_) => "check",
		}
	}
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
	/// Scenario files or directories (YAML or JSON).
	#[arg(value_name = "FILES")]
	pub files: Vec<PathBuf>,

	/// Run a built-in scenario by name (repeatable).
	#[arg(long = "builtin", value_name = "NAME")]
	pub builtins: Vec<String>,

	/// Run the whole built-in catalogue.
	#[arg(long, conflicts_with = "builtins")]
	pub all_builtins: bool,

	/// Only run scenarios carrying this tag.
	#[arg(long, value_name = "TAG")]
	pub tag: Option<String>,

	/// Application base URL.
	#[arg(long, value_name = "URL")]
	pub base_url: Option<String>,

	/// Connect to this WebDriver server instead of spawning one.
	#[arg(long, value_name = "URL")]
	pub webdriver_url: Option<String>,

	/// Browser to drive: chromium or firefox.
	#[arg(long, value_name = "BROWSER")]
	pub browser: Option<Browser>,

	/// Show the browser window.
	#[arg(long)]
	pub headed: bool,

	/// Directory for the summary and failure artifacts.
	#[arg(short, long, value_name = "DIR")]
	pub output: Option<PathBuf>,

	/// Scenarios to run at once.
	#[arg(short, long, value_name = "N")]
	pub jobs: Option<usize>,

	/// Overall budget of each scenario, in milliseconds.
	#[arg(long, value_name = "MS")]
	pub scenario_timeout: Option<u64>,

	/// Default budget of each wait, in milliseconds.
	#[arg(long, value_name = "MS")]
	pub wait_timeout: Option<u64>,

	/// Interval between condition checks, in milliseconds.
	#[arg(long, value_name = "MS")]
	pub poll: Option<u64>,

	/// Use the mobile viewport (375x667) for scenarios without one.
	#[arg(long)]
	pub mobile: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
	/// Scenario files or directories (YAML or JSON).
	#[arg(value_name = "FILES", required = true)]
	pub files: Vec<PathBuf>,
}
