//! Per-scenario execution context.
//!
//! A [`Session`] bundles the browser session with everything a step needs:
//! the application profile, wait defaults, the artifact directory and the
//! step currently executing. It is passed explicitly to every step and is
//! closed on every exit path by the runner.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};
use veri_protocol::Artifact;
use veri_runtime::{Driver, DriverEngine, SessionOptions};

use crate::artifacts::ArtifactCollector;
use crate::error::Result;
use crate::state::AppProfile;
use crate::wait::WaitOptions;

/// Default application address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173";

/// Settings a session is opened with.
#[derive(Debug, Clone)]
pub struct SessionContext {
	pub scenario: String,
	pub base_url: String,
	pub profile: Arc<AppProfile>,
	pub wait: WaitOptions,
	/// Artifact directory of this scenario.
	pub artifact_dir: PathBuf,
}

impl SessionContext {
	pub fn new(scenario: impl Into<String>, artifact_dir: impl Into<PathBuf>) -> Self {
		Self {
			scenario: scenario.into(),
			base_url: DEFAULT_BASE_URL.into(),
			profile: Arc::new(AppProfile::default()),
			wait: WaitOptions::default(),
			artifact_dir: artifact_dir.into(),
		}
	}

	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = url.into();
		self
	}

	pub fn profile(mut self, profile: Arc<AppProfile>) -> Self {
		self.profile = profile;
		self
	}

	pub fn wait(mut self, wait: WaitOptions) -> Self {
		self.wait = wait;
		self
	}
}

/// One scenario's browser session and context.
pub struct Session {
	driver: Box<dyn Driver>,
	context: SessionContext,
	artifacts: ArtifactCollector,
	step: usize,
	action: &'static str,
}

impl Session {
	pub fn new(driver: Box<dyn Driver>, context: SessionContext) -> Self {
		let artifacts = ArtifactCollector::new(context.artifact_dir.clone());
		Self {
			driver,
			context,
			artifacts,
			step: 0,
			action: "setup",
		}
	}

	/// Opens a fresh, isolated browser session through `engine`.
	pub async fn open(engine: &dyn DriverEngine, options: &SessionOptions, context: SessionContext) -> Result<Self> {
		let driver = engine.open_session(options).await?;
		debug!(target = "veri", scenario = %context.scenario, "session opened");
		Ok(Self::new(driver, context))
	}

	pub fn driver(&self) -> &dyn Driver {
		self.driver.as_ref()
	}

	pub fn profile(&self) -> &AppProfile {
		&self.context.profile
	}

	pub fn wait_options(&self) -> WaitOptions {
		self.context.wait
	}

	pub fn artifacts(&self) -> &ArtifactCollector {
		&self.artifacts
	}

	pub fn scenario_name(&self) -> &str {
		&self.context.scenario
	}

	/// Index and action of the step being executed.
	pub fn current_step(&self) -> (usize, &'static str) {
		(self.step, self.action)
	}

	/// Resolves `target` against the base URL unless it is absolute.
	pub fn url(&self, target: &str) -> String {
		if target.contains("://") || target.starts_with("about:") || target.starts_with("data:") {
			return target.to_string();
		}
		format!(
			"{}/{}",
			self.context.base_url.trim_end_matches('/'),
			target.trim_start_matches('/')
		)
	}

	/// Marks the start of a step. Element handles never outlive a step.
	pub fn begin_step(&mut self, index: usize, action: &'static str) {
		self.step = index;
		self.action = action;
		self.driver.release_handles();
	}

	/// Best-effort diagnostic snapshot for the current step.
	pub async fn capture_failure(&self) -> Vec<Artifact> {
		self.artifacts
			.capture_failure(self.driver.as_ref(), self.step, self.action)
			.await
	}

	/// Ends the browser session. Failures are logged, not returned.
	pub async fn close(&self) {
		match self.driver.close().await {
			Ok(()) => debug!(target = "veri", scenario = %self.context.scenario, "session closed"),
			Err(e) => warn!(target = "veri", scenario = %self.context.scenario, error = %e, "session close failed"),
		}
	}
}
