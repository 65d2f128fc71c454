//! Loading scenario files.
//!
//! A file holds either one scenario or a list of them, as YAML (`.yaml`,
//! `.yml`) or JSON (`.json`). Directories are walked recursively. Every
//! scenario is validated before it is returned, so a bad file fails the run
//! before any browser starts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use veri_protocol::Scenario;
use walkdir::WalkDir;

use crate::error::{HarnessError, Result};
use crate::runner::artifact_dir_name;

const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
	Many(Vec<Scenario>),
	One(Box<Scenario>),
}

impl OneOrMany {
	fn into_vec(self) -> Vec<Scenario> {
		match self {
			OneOrMany::Many(scenarios) => scenarios,
			OneOrMany::One(scenario) => vec![*scenario],
		}
	}
}

/// Parses YAML holding one scenario or a list.
pub fn from_yaml(source: &str) -> Result<Vec<Scenario>> {
	let parsed: OneOrMany = serde_yaml::from_str(source).map_err(|e| HarnessError::InvalidScenario(e.to_string()))?;
	validated(parsed.into_vec())
}

/// Parses JSON holding one scenario or a list.
pub fn from_json(source: &str) -> Result<Vec<Scenario>> {
	let parsed: OneOrMany = serde_json::from_str(source).map_err(|e| HarnessError::InvalidScenario(e.to_string()))?;
	validated(parsed.into_vec())
}

fn validated(scenarios: Vec<Scenario>) -> Result<Vec<Scenario>> {
	for scenario in &scenarios {
		scenario.validate()?;
	}
	Ok(scenarios)
}

/// Loads a scenario file, or every scenario file under a directory.
pub fn load_path(path: &Path) -> Result<Vec<Scenario>> {
	if path.is_dir() {
		let mut scenarios = Vec::new();
		for file in scenario_files(path)? {
			scenarios.extend(load_file(&file)?);
		}
		return Ok(scenarios);
	}
	load_file(path)
}

/// Loads every path and rejects duplicate scenario names.
pub fn load_all(paths: &[PathBuf]) -> Result<Vec<Scenario>> {
	let mut scenarios = Vec::new();
	for path in paths {
		scenarios.extend(load_path(path)?);
	}
	ensure_unique(&scenarios)?;
	Ok(scenarios)
}

/// Scenario names double as artifact directories: two names that sanitize
/// to the same directory are duplicates.
pub fn ensure_unique(scenarios: &[Scenario]) -> Result<()> {
	let mut seen: HashMap<String, &str> = HashMap::new();
	for scenario in scenarios {
		let dir = artifact_dir_name(&scenario.name);
		if let Some(first) = seen.get(&dir) {
			let message = if *first == scenario.name {
				format!("duplicate scenario name '{}'", scenario.name)
			} else {
				format!(
					"scenarios '{first}' and '{}' share the artifact directory '{dir}'",
					scenario.name
				)
			};
			return Err(HarnessError::InvalidScenario(message));
		}
		seen.insert(dir, scenario.name.as_str());
	}
	Ok(())
}

fn load_file(path: &Path) -> Result<Vec<Scenario>> {
	let source = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
	let parsed = match extension(path) {
		Some("json") => from_json(&source),
		_ => from_yaml(&source),
	};
	let scenarios = parsed.map_err(|err| match err {
		HarnessError::InvalidScenario(message) => HarnessError::InvalidScenario(format!("{}: {message}", path.display())),
		other => other,
	})?;
	debug!(target = "veri", path = %path.display(), count = scenarios.len(), "loaded scenarios");
	Ok(scenarios)
}

fn scenario_files(dir: &Path) -> Result<Vec<PathBuf>> {
	let mut files = Vec::new();
	for entry in WalkDir::new(dir).sort_by_file_name() {
		let entry = entry.map_err(|e| {
			let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
			HarnessError::io(path, e.into())
		})?;
		if entry.file_type().is_file() && extension(entry.path()).is_some_and(|ext| EXTENSIONS.contains(&ext)) {
			files.push(entry.into_path());
		}
	}
	Ok(files)
}

fn extension(path: &Path) -> Option<&str> {
	path.extension().and_then(|ext| ext.to_str())
}

#[cfg(test)]
mod tests {
	use veri_protocol::Step;

	use super::*;

	const SETTINGS: &str = r#"
name: settings-dialog
description: open and cancel the wipe confirmation
steps:
  - action: navigate
    url: /
  - action: click
    bestEffort: true
    locator:
      strategies:
        - by: attribute
          name: title
          value: Skip Intro
  - action: assert_visible
    visible: true
    timeoutMs: 3000
    locator:
      strategies:
        - by: text
          text: System Configuration
"#;

	#[test]
	fn single_yaml_scenario() {
		let scenarios = from_yaml(SETTINGS).unwrap();
		assert_eq!(scenarios.len(), 1);
		assert_eq!(scenarios[0].name, "settings-dialog");
		assert!(scenarios[0].steps[1].best_effort);
	}

	#[test]
	fn json_list() {
		let json = r#"[
			{"name": "a", "steps": [{"action": "navigate", "url": "/"}]},
			{"name": "b", "steps": [{"action": "reload"}]}
		]"#;
		let scenarios = from_json(json).unwrap();
		assert_eq!(scenarios.len(), 2);
		assert_eq!(scenarios[1].steps[0].step, Step::Reload {});
	}

	#[test]
	fn invalid_scenarios_are_rejected() {
		let err = from_json(r#"{"name": "empty", "steps": []}"#).unwrap_err();
		assert!(matches!(err, HarnessError::InvalidScenario(_)));
		assert!(err.to_string().contains("has no steps"));

		let err = from_yaml("name: broken\nsteps:\n  - action: teleport\n").unwrap_err();
		assert!(matches!(err, HarnessError::InvalidScenario(_)));
	}

	#[test]
	fn directories_are_walked_in_order() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir(dir.path().join("nested")).unwrap();
		std::fs::write(dir.path().join("b.yaml"), SETTINGS.replace("settings-dialog", "second")).unwrap();
		std::fs::write(dir.path().join("a.json"), r#"{"name": "first", "steps": [{"action": "reload"}]}"#).unwrap();
		std::fs::write(dir.path().join("nested/c.yml"), SETTINGS.replace("settings-dialog", "third")).unwrap();
		std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

		let names: Vec<_> = load_path(dir.path()).unwrap().into_iter().map(|s| s.name).collect();
		assert_eq!(names, ["first", "second", "third"]);
	}

	#[test]
	fn names_sharing_an_artifact_directory_are_duplicates() {
		let json = r#"[
			{"name": "smoke test", "steps": [{"action": "reload"}]},
			{"name": "smoke-test", "steps": [{"action": "reload"}]}
		]"#;
		let scenarios = from_json(json).unwrap();
		let err = ensure_unique(&scenarios).unwrap_err();
		assert!(matches!(err, HarnessError::InvalidScenario(_)));
		assert!(err.to_string().contains("'smoke-test'"), "{err}");

		let err = ensure_unique(&[scenarios[0].clone(), scenarios[0].clone()]).unwrap_err();
		assert!(err.to_string().contains("duplicate scenario name 'smoke test'"));

		let distinct = from_json(r#"[{"name": "smoke", "steps": [{"action": "reload"}]}]"#).unwrap();
		assert!(ensure_unique(&[scenarios[0].clone(), distinct[0].clone()]).is_ok());
	}

	#[test]
	fn file_errors_name_the_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("bad.json");
		std::fs::write(&path, "{").unwrap();
		let err = load_path(&path).unwrap_err();
		assert!(err.to_string().contains("bad.json"));

		let missing = load_path(&dir.path().join("missing.yaml")).unwrap_err();
		assert!(matches!(missing, HarnessError::Io { .. }));
	}

	#[test]
	fn duplicate_names_are_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("s.yaml");
		std::fs::write(&path, SETTINGS).unwrap();
		let err = load_all(&[path.clone(), path]).unwrap_err();
		assert!(err.to_string().contains("duplicate scenario name 'settings-dialog'"));
	}
}
