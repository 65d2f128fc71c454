//! Human-readable run summary.

use std::fmt::Write;

use colored::Colorize;
use veri_protocol::{RunSummary, StepOutcome};

use crate::styles::status_label;

const STATUS_WIDTH: usize = 8;

/// Renders the summary table, failure details and artifact manifest.
pub fn render_summary(summary: &RunSummary) -> String {
	let mut out = String::new();
	let name_width = summary
		.scenarios
		.iter()
		.map(|s| s.name.chars().count())
		.max()
		.unwrap_or(0)
		.max("SCENARIO".len());

	let _ = writeln!(
		out,
		"{}",
		format!("{:<STATUS_WIDTH$} {:<name_width$} {:>6} {:>9}", "STATUS", "SCENARIO", "STEPS", "TIME").bold()
	);
	for scenario in &summary.scenarios {
		let done = scenario.steps.iter().filter(|s| s.outcome.is_success()).count();
		let _ = writeln!(
			out,
			"{} {:<name_width$} {:>6} {:>9}",
			status_label(scenario.status, STATUS_WIDTH),
			scenario.name,
			format!("{done}/{}", scenario.steps.len()),
			format_ms(scenario.duration_ms),
		);
	}

	for scenario in summary.scenarios.iter().filter(|s| !s.passed()) {
		let _ = writeln!(out);
		let _ = writeln!(out, "{} {}", "--".dimmed(), scenario.name.bold());
		if let Some(step) = scenario.failed_step() {
			if let StepOutcome::Failure { reason, error_code, .. } = &step.outcome {
				let label = step.label.as_deref().map(|l| format!(" \"{l}\"")).unwrap_or_default();
				let _ = writeln!(out, "   step {} {}{label}: [{error_code}] {reason}", step.index, step.action);
			}
		} else if let Some(reason) = &scenario.reason {
			let _ = writeln!(out, "   {reason}");
		}
		for artifact in scenario.steps.iter().flat_map(|s| s.outcome.artifacts()) {
			let _ = writeln!(out, "   {} {}", "artifact".dimmed(), artifact.path.display());
		}
	}

	let _ = writeln!(out);
	let totals = format!(
		"{} passed, {} failed, {} aborted ({} total) in {}",
		summary.passed,
		summary.failed,
		summary.aborted,
		summary.total,
		format_ms(summary.duration_ms)
	);
	let _ = if summary.all_passed() {
		writeln!(out, "{}", totals.green())
	} else {
		writeln!(out, "{}", totals.red())
	};
	if let Some(fatal) = &summary.fatal {
		let _ = writeln!(out, "{} {fatal}", "run aborted:".red().bold());
	}
	out
}

fn format_ms(ms: u64) -> String {
	if ms < 1000 {
		format!("{ms}ms")
	} else {
		format!("{:.1}s", ms as f64 / 1000.0)
	}
}
