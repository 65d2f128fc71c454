use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use veri::{AppProfile, RunReport, Runner, Scenario, app, load};
use veri_runtime::{DriverEngine, WebDriverEngine};

use crate::cli::RunArgs;
use crate::config::{Project, Settings};
use crate::error::{Result, VeriError};
use crate::output::{self, DiagnosticLevel, OutputFormat, ResultBuilder, render_summary};

pub async fn execute(args: &RunArgs, config: Option<&Path>, format: OutputFormat) -> Result<i32> {
	let project = Project::detect(config)?;
	let settings = Settings::resolve(&project, args);
	let scenarios = select_scenarios(&project, args, &settings.run.profile)?;

	info!(
		target = "veri",
		scenarios = scenarios.len(),
		browser = %settings.engine.browser,
		base_url = %settings.run.base_url,
		jobs = settings.run.jobs,
		"starting run"
	);

	let engine = Arc::new(WebDriverEngine::new(settings.engine.clone()));
	let report = Runner::new(engine.clone(), settings.run.clone()).run(scenarios).await;

	let mut shutdown_error = None;
	if let Err(err) = engine.shutdown().await {
		warn!(target = "veri", error = %err, "driver shutdown failed");
		shutdown_error = Some(format!("driver shutdown failed: {err}"));
	}

	let summary_path = report.write_summary(&settings.run.output_dir).await?;
	info!(target = "veri", path = %summary_path.display(), "summary written");

	emit(&report, &settings, &summary_path, shutdown_error, format);
	Ok(report.exit_code())
}

fn emit(report: &RunReport, settings: &Settings, summary_path: &Path, shutdown_error: Option<String>, format: OutputFormat) {
	if format == OutputFormat::Text {
		print!("{}", render_summary(report.summary()));
		if let Some(message) = &shutdown_error {
			eprintln!("warning: {message}");
		}
		println!("Summary: {}", summary_path.display());
		return;
	}

	let mut builder = ResultBuilder::new("run")
		.data(report.summary().clone())
		.ok(report.summary().all_passed())
		.artifacts(report.manifest())
		.artifacts([summary_path.to_path_buf()])
		.config(settings.effective());
	if let Some(message) = shutdown_error {
		builder = builder.diagnostic(DiagnosticLevel::Warning, message);
	}
	if let Some(fatal) = &report.summary().fatal {
		builder = builder.diagnostic(DiagnosticLevel::Error, format!("run aborted: {fatal}"));
	}
	output::print_result(&builder.build(), format);
}

/// Scenario files from the command line (or the config file when none are
/// given and no built-ins were asked for), then built-ins, then the tag filter.
pub fn select_scenarios(project: &Project, args: &RunArgs, profile: &AppProfile) -> Result<Vec<Scenario>> {
	let wants_builtins = args.all_builtins || !args.builtins.is_empty();
	let files = if !args.files.is_empty() {
		args.files.clone()
	} else if wants_builtins {
		Vec::new()
	} else {
		project.scenario_paths()
	};

	let mut scenarios = load::load_all(&files)?;

	if args.all_builtins {
		scenarios.extend(app::catalogue(profile));
	}
	for name in &args.builtins {
		let scenario = app::builtin(profile, name).ok_or_else(|| VeriError::UnknownScenario(name.clone()))?;
		scenarios.push(scenario);
	}

	if let Some(tag) = &args.tag {
		scenarios.retain(|s| s.tags.iter().any(|t| t == tag));
	}

	load::ensure_unique(&scenarios)?;

	if scenarios.is_empty() {
		return Err(VeriError::NoScenarios);
	}
	Ok(scenarios)
}

#[cfg(test)]
mod tests {
	use std::fs;
	use std::path::PathBuf;

	use tempfile::TempDir;

	use super::*;

	const SCENARIO: &str = r#"
name: open-settings
tags: [smoke]
steps:
  - action: navigate
    url: /
"#;

	fn project_in(dir: &Path) -> Project {
		Project::detect_from(dir).unwrap()
	}

	#[test]
	fn named_builtins_keep_their_order() {
		let temp = TempDir::new().unwrap();
		let args = RunArgs {
			builtins: vec!["panic-gating".into(), "settings-dialog".into()],
			..RunArgs::default()
		};
		let scenarios = select_scenarios(&project_in(temp.path()), &args, &AppProfile::crypto3()).unwrap();
		let names: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(names, ["panic-gating", "settings-dialog"]);
	}

	#[test]
	fn unknown_builtin_is_rejected() {
		let temp = TempDir::new().unwrap();
		let args = RunArgs {
			builtins: vec!["settings".into()],
			..RunArgs::default()
		};
		let err = select_scenarios(&project_in(temp.path()), &args, &AppProfile::crypto3()).unwrap_err();
		assert!(matches!(err, VeriError::UnknownScenario(name) if name == "settings"));
	}

	#[test]
	fn nothing_selected_is_an_error() {
		let temp = TempDir::new().unwrap();
		let err = select_scenarios(&project_in(temp.path()), &RunArgs::default(), &AppProfile::crypto3()).unwrap_err();
		assert!(matches!(err, VeriError::NoScenarios));
	}

	#[test]
	fn config_scenarios_are_the_fallback() {
		let temp = TempDir::new().unwrap();
		fs::create_dir(temp.path().join("scenarios")).unwrap();
		fs::write(temp.path().join("scenarios/settings.yaml"), SCENARIO).unwrap();
		fs::write(temp.path().join("veri.toml"), "scenarios = [\"scenarios\"]").unwrap();

		let scenarios = select_scenarios(&project_in(temp.path()), &RunArgs::default(), &AppProfile::crypto3()).unwrap();
		assert_eq!(scenarios.len(), 1);
		assert_eq!(scenarios[0].name, "open-settings");
	}

	#[test]
	fn tag_filter_applies_to_files_and_builtins() {
		let temp = TempDir::new().unwrap();
		let file = temp.path().join("settings.yaml");
		fs::write(&file, SCENARIO).unwrap();

		let args = RunArgs {
			files: vec![PathBuf::from(&file)],
			all_builtins: true,
			tag: Some("smoke".into()),
			..RunArgs::default()
		};
		let scenarios = select_scenarios(&project_in(temp.path()), &args, &AppProfile::crypto3()).unwrap();
		let names: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(names, ["open-settings"]);
	}

	#[test]
	fn duplicate_names_are_rejected() {
		let temp = TempDir::new().unwrap();
		let file = temp.path().join("dup.yaml");
		fs::write(&file, "name: panic-gating\nsteps:\n  - action: navigate\n    url: /\n").unwrap();

		let args = RunArgs {
			files: vec![file],
			builtins: vec!["panic-gating".into()],
			..RunArgs::default()
		};
		let err = select_scenarios(&project_in(temp.path()), &args, &AppProfile::crypto3()).unwrap_err();
		assert!(matches!(err, VeriError::Harness(_)));
	}
}
