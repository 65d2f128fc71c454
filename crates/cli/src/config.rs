//! Project configuration (`veri.toml`).
//!
//! The file is found by walking up from the working directory, the way a
//! project root is usually detected. Relative paths inside it resolve
//! against the directory holding the file. Command-line flags override file
//! values; built-in defaults fill the rest.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;
use veri::wait::{DEFAULT_POLL, DEFAULT_TIMEOUT};
use veri::{AppProfile, RunConfig, Viewport, WaitOptions};
use veri_runtime::{Browser, EngineConfig};

use crate::cli::RunArgs;
use crate::error::{Result, VeriError};
use crate::output::EffectiveConfig;

/// Name of the project file.
pub const CONFIG_FILE: &str = "veri.toml";

/// Default artifact directory, relative to the project root.
pub const DEFAULT_OUTPUT_DIR: &str = "veri-output";

/// Contents of `veri.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VeriConfig {
	pub base_url: Option<String>,
	pub webdriver_url: Option<String>,
	pub browser: Option<Browser>,
	pub headless: Option<bool>,
	/// Start chromedriver/geckodriver locally (default) or only connect.
	pub spawn_driver: Option<bool>,
	pub viewport: Option<Viewport>,
	pub output_dir: Option<PathBuf>,
	pub scenario_timeout_ms: Option<u64>,
	pub jobs: Option<usize>,
	/// Scenario files or directories run when none are given on the command line.
	#[serde(default)]
	pub scenarios: Vec<PathBuf>,
	#[serde(default)]
	pub wait: WaitConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WaitConfig {
	pub timeout_ms: Option<u64>,
	pub poll_ms: Option<u64>,
}

impl VeriConfig {
	pub fn parse(source: &str, path: &Path) -> Result<Self> {
		toml::from_str(source).map_err(|e| VeriError::Config {
			path: path.to_path_buf(),
			message: e.message().to_string(),
		})
	}
}

/// Where the harness runs from: a project root and its optional config file.
#[derive(Debug, Clone)]
pub struct Project {
	pub root: PathBuf,
	pub config_file: Option<PathBuf>,
	pub config: VeriConfig,
}

impl Project {
	/// Uses `explicit` when given, otherwise searches upward from the working directory.
	pub fn detect(explicit: Option<&Path>) -> Result<Self> {
		if let Some(path) = explicit {
			return Self::load(path);
		}
		let cwd = env::current_dir().context("cannot determine the working directory")?;
		Self::detect_from(&cwd)
	}

	/// Searches upward from `start`; without a config file `start` is the root.
	pub fn detect_from(start: &Path) -> Result<Self> {
		match find_config(start) {
			Some(path) => Self::load(&path),
			None => Ok(Self {
				root: start.to_path_buf(),
				config_file: None,
				config: VeriConfig::default(),
			}),
		}
	}

	pub fn load(path: &Path) -> Result<Self> {
		let source = fs::read_to_string(path).map_err(|e| VeriError::Config {
			path: path.to_path_buf(),
			message: e.to_string(),
		})?;
		let config = VeriConfig::parse(&source, path)?;
		let root = path
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.map(Path::to_path_buf)
			.unwrap_or_else(|| PathBuf::from("."));
		debug!(target = "veri", config = %path.display(), root = %root.display(), "loaded project config");
		Ok(Self {
			root,
			config_file: Some(path.to_path_buf()),
			config,
		})
	}

	/// Resolves a path from the config file against the project root.
	pub fn resolve(&self, path: &Path) -> PathBuf {
		if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) }
	}

	/// Scenario paths listed in the config file, resolved.
	pub fn scenario_paths(&self) -> Vec<PathBuf> {
		self.config.scenarios.iter().map(|p| self.resolve(p)).collect()
	}
}

/// Finds `veri.toml` in `start` or any of its ancestors.
pub fn find_config(start: &Path) -> Option<PathBuf> {
	let mut current = start;
	loop {
		debug!(target = "veri", path = %current.display(), "checking for veri.toml");
		let candidate = current.join(CONFIG_FILE);
		if candidate.is_file() {
			return Some(candidate);
		}
		match current.parent() {
			Some(parent) if parent != current => current = parent,
			_ => return None,
		}
	}
}

/// Fully merged settings of one `veri run`.
#[derive(Debug, Clone)]
pub struct Settings {
	pub run: RunConfig,
	pub engine: EngineConfig,
	pub config_file: Option<PathBuf>,
}

impl Settings {
	/// Flags first, then the config file, then defaults.
	pub fn resolve(project: &Project, args: &RunArgs) -> Self {
		let file = &project.config;

		let viewport = if args.mobile { Some(Viewport::MOBILE) } else { file.viewport };
		let wait = WaitOptions::new(
			args.wait_timeout
				.or(file.wait.timeout_ms)
				.map(Duration::from_millis)
				.unwrap_or(DEFAULT_TIMEOUT),
			args.poll
				.or(file.wait.poll_ms)
				.map(|ms| Duration::from_millis(ms.max(1)))
				.unwrap_or(DEFAULT_POLL),
		);
		let output_dir = match &args.output {
			Some(dir) => dir.clone(),
			None => project.resolve(file.output_dir.as_deref().unwrap_or(Path::new(DEFAULT_OUTPUT_DIR))),
		};
		let defaults = RunConfig::default();

		let run = RunConfig {
			base_url: args
				.base_url
				.clone()
				.or_else(|| file.base_url.clone())
				.unwrap_or(defaults.base_url),
			output_dir,
			wait,
			scenario_timeout: args
				.scenario_timeout
				.or(file.scenario_timeout_ms)
				.map(Duration::from_millis)
				.unwrap_or(defaults.scenario_timeout),
			jobs: args.jobs.or(file.jobs).unwrap_or(defaults.jobs).max(1),
			profile: Arc::new(AppProfile::crypto3()),
			viewport,
		};

		let webdriver_url = args.webdriver_url.clone().or_else(|| file.webdriver_url.clone());
		let engine = EngineConfig {
			browser: args.browser.or(file.browser).unwrap_or_default(),
			headless: !args.headed && file.headless.unwrap_or(true),
			spawn_driver: if args.webdriver_url.is_some() {
				false
			} else {
				file.spawn_driver.unwrap_or(webdriver_url.is_none())
			},
			webdriver_url,
			viewport: viewport.unwrap_or_default(),
		};

		Self {
			run,
			engine,
			config_file: project.config_file.clone(),
		}
	}

	pub fn effective(&self) -> EffectiveConfig {
		EffectiveConfig {
			config_file: self.config_file.clone(),
			base_url: self.run.base_url.clone(),
			browser: self.engine.browser.to_string(),
			headless: self.engine.headless,
			output_dir: self.run.output_dir.clone(),
			jobs: self.run.jobs,
		}
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	const FULL: &str = r#"
baseUrl = "http://localhost:3000"
webdriverUrl = "http://127.0.0.1:4444"
browser = "firefox"
headless = false
outputDir = "artifacts"
scenarioTimeoutMs = 30000
jobs = 4
scenarios = ["scenarios"]

[viewport]
width = 1440
height = 900

[wait]
timeoutMs = 8000
pollMs = 250
"#;

	#[test]
	fn parses_every_field() {
		let config = VeriConfig::parse(FULL, Path::new("veri.toml")).unwrap();
		assert_eq!(config.base_url.as_deref(), Some("http://localhost:3000"));
		assert_eq!(config.browser, Some(Browser::Firefox));
		assert_eq!(config.headless, Some(false));
		assert_eq!(config.viewport, Some(Viewport { width: 1440, height: 900 }));
		assert_eq!(config.wait.poll_ms, Some(250));
		assert_eq!(config.scenarios, vec![PathBuf::from("scenarios")]);
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = VeriConfig::parse("basUrl = \"x\"", Path::new("veri.toml")).unwrap_err();
		assert!(matches!(err, VeriError::Config { .. }));
		assert!(err.to_string().contains("basUrl"));
	}

	#[test]
	fn found_in_ancestor_directory() {
		let temp = TempDir::new().unwrap();
		let nested = temp.path().join("app/src/components");
		fs::create_dir_all(&nested).unwrap();
		fs::write(temp.path().join("app/veri.toml"), "jobs = 2").unwrap();

		let project = Project::detect_from(&nested).unwrap();
		assert_eq!(project.root, temp.path().join("app"));
		assert_eq!(project.config.jobs, Some(2));
	}

	#[test]
	fn no_config_means_defaults() {
		let temp = TempDir::new().unwrap();
		let project = Project::detect_from(temp.path()).unwrap();
		assert!(project.config_file.is_none());

		let settings = Settings::resolve(&project, &RunArgs::default());
		assert_eq!(settings.run.base_url, "http://localhost:5173");
		assert_eq!(settings.run.output_dir, temp.path().join("veri-output"));
		assert_eq!(settings.run.jobs, 1);
		assert_eq!(settings.run.wait, WaitOptions::default());
		assert_eq!(settings.run.viewport, None);
		assert!(settings.engine.headless);
		assert!(settings.engine.spawn_driver);
		assert_eq!(settings.engine.browser, Browser::Chromium);
	}

	#[test]
	fn file_values_apply_and_flags_win() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("veri.toml");
		fs::write(&path, FULL).unwrap();
		let project = Project::load(&path).unwrap();
		assert_eq!(
			project.scenario_paths(),
			vec![temp.path().join("scenarios")]
		);

		let from_file = Settings::resolve(&project, &RunArgs::default());
		assert_eq!(from_file.run.base_url, "http://localhost:3000");
		assert_eq!(from_file.run.output_dir, temp.path().join("artifacts"));
		assert_eq!(from_file.run.jobs, 4);
		assert_eq!(from_file.run.scenario_timeout, Duration::from_secs(30));
		assert_eq!(
			from_file.run.wait,
			WaitOptions::new(Duration::from_millis(8000), Duration::from_millis(250))
		);
		assert!(!from_file.engine.headless);
		assert!(!from_file.engine.spawn_driver);
		assert_eq!(from_file.engine.webdriver_url.as_deref(), Some("http://127.0.0.1:4444"));
		assert_eq!(from_file.engine.viewport, Viewport { width: 1440, height: 900 });

		let args = RunArgs {
			base_url: Some("http://staging:8080".into()),
			output: Some(PathBuf::from("/tmp/out")),
			jobs: Some(0),
			mobile: true,
			browser: Some(Browser::Chromium),
			..RunArgs::default()
		};
		let overridden = Settings::resolve(&project, &args);
		assert_eq!(overridden.run.base_url, "http://staging:8080");
		assert_eq!(overridden.run.output_dir, PathBuf::from("/tmp/out"));
		assert_eq!(overridden.run.jobs, 1);
		assert_eq!(overridden.run.viewport, Some(Viewport::MOBILE));
		assert_eq!(overridden.engine.browser, Browser::Chromium);
		assert_eq!(overridden.effective().browser, "chromium");
	}

	#[test]
	fn missing_explicit_config_is_an_error() {
		let temp = TempDir::new().unwrap();
		let err = Project::detect(Some(&temp.path().join("nope.toml"))).unwrap_err();
		assert!(matches!(err, VeriError::Config { .. }));
	}
}
