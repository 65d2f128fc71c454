//! Help output and summary colors.

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use colored::{ColoredString, Colorize};
use veri_protocol::ScenarioStatus;

/// Clap styles matching cargo's help output.
pub fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}

/// Status word padded to `width`, then colored.
pub fn status_label(status: ScenarioStatus, width: usize) -> ColoredString {
	let padded = format!("{:<width$}", status.to_string().to_uppercase());
	match status {
		ScenarioStatus::Passed => padded.green().bold(),
		ScenarioStatus::Failed => padded.red().bold(),
		ScenarioStatus::Aborted => padded.yellow().bold(),
	}
}
