//! Run orchestration.
//!
//! Each scenario gets its own fresh session from the shared engine. Up to
//! `jobs` scenarios run at once; results are reported in input order no
//! matter when they finish. The first run-fatal error stops every scenario
//! that has not finished yet.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};
use veri_protocol::{Scenario, ScenarioResult, ScenarioStatus, StepOutcome, StepResult, Viewport};
use veri_runtime::{DriverEngine, SessionOptions};

use crate::error::HarnessError;
use crate::report::RunReport;
use crate::scenario::{self, ScenarioEngine, Verdict};
use crate::session::{DEFAULT_BASE_URL, Session, SessionContext};
use crate::state::AppProfile;
use crate::wait::WaitOptions;

/// Default overall budget of one scenario.
pub const DEFAULT_SCENARIO_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest a timed-out scenario may spend capturing its failure artifacts.
const CAPTURE_GRACE: Duration = Duration::from_secs(5);

/// Settings shared by every scenario of a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
	pub base_url: String,
	/// Root of the artifact tree; each scenario writes into a subdirectory.
	pub output_dir: PathBuf,
	pub wait: WaitOptions,
	pub scenario_timeout: Duration,
	/// Scenarios running at once.
	pub jobs: usize,
	pub profile: Arc<AppProfile>,
	/// Viewport for scenarios that do not pick one.
	pub viewport: Option<Viewport>,
}

impl Default for RunConfig {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.into(),
			output_dir: PathBuf::from("veri-output"),
			wait: WaitOptions::default(),
			scenario_timeout: DEFAULT_SCENARIO_TIMEOUT,
			jobs: 1,
			profile: Arc::new(AppProfile::default()),
			viewport: None,
		}
	}
}

/// Runs scenarios against a [`DriverEngine`].
pub struct Runner {
	engine: Arc<dyn DriverEngine>,
	config: Arc<RunConfig>,
}

type FatalSignal = Arc<watch::Sender<Option<String>>>;

impl Runner {
	pub fn new(engine: Arc<dyn DriverEngine>, config: RunConfig) -> Self {
		Self {
			engine,
			config: Arc::new(config),
		}
	}

	pub fn config(&self) -> &RunConfig {
		&self.config
	}

	/// Runs every scenario and aggregates the results.
	///
	/// The engine is left running; shutting it down is up to the caller.
	pub async fn run(&self, scenarios: Vec<Scenario>) -> RunReport {
		let started = Instant::now();
		let total = scenarios.len();
		let names: Vec<String> = scenarios.iter().map(|s| s.name.clone()).collect();
		let permits = Arc::new(Semaphore::new(self.config.jobs.max(1)));
		let (fatal_tx, _) = watch::channel(None);
		let fatal: FatalSignal = Arc::new(fatal_tx);

		info!(target = "veri", scenarios = total, jobs = self.config.jobs.max(1), "run started");

		let mut tasks = JoinSet::new();
		for (order, scenario) in scenarios.into_iter().enumerate() {
			let engine = Arc::clone(&self.engine);
			let config = Arc::clone(&self.config);
			let permits = Arc::clone(&permits);
			let fatal = Arc::clone(&fatal);
			tasks.spawn(async move {
				let Ok(_permit) = permits.acquire_owned().await else {
					return (order, ScenarioResult::aborted(&scenario.name, "run shut down"));
				};
				(order, run_scenario(engine.as_ref(), &config, &scenario, &fatal).await)
			});
		}

		let mut slots: Vec<Option<ScenarioResult>> = vec![None; total];
		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((order, result)) => slots[order] = Some(result),
				Err(e) => error!(target = "veri", error = %e, "scenario task failed"),
			}
		}

		let results: Vec<ScenarioResult> = slots
			.into_iter()
			.zip(names)
			.map(|(slot, name)| slot.unwrap_or_else(|| ScenarioResult::aborted(name, "internal error: scenario task failed")))
			.collect();

		let fatal = fatal.borrow().clone();
		let report = RunReport::new(results, fatal, started.elapsed().as_millis() as u64);
		let summary = report.summary();
		info!(
			target = "veri",
			passed = summary.passed,
			failed = summary.failed,
			aborted = summary.aborted,
			elapsed_ms = summary.duration_ms,
			"run finished"
		);
		report
	}
}

/// Why a scenario stopped before its steps finished.
enum Cut {
	Timeout(Duration),
	Fatal(String),
}

async fn run_scenario(engine: &dyn DriverEngine, config: &RunConfig, scenario: &Scenario, fatal: &FatalSignal) -> ScenarioResult {
	if let Some(reason) = fatal.borrow().clone() {
		return ScenarioResult::aborted(&scenario.name, format!("run aborted: {reason}"));
	}

	let context = SessionContext::new(&scenario.name, config.output_dir.join(artifact_dir_name(&scenario.name)))
		.base_url(&config.base_url)
		.profile(Arc::clone(&config.profile))
		.wait(config.wait);
	let options = SessionOptions {
		viewport: scenario.viewport.or(config.viewport),
	};

	let mut session = match Session::open(engine, &options, context).await {
		Ok(session) => session,
		Err(err) => {
			error!(target = "veri", scenario = %scenario.name, error = %err, "could not open session");
			if err.is_fatal() {
				raise(fatal, &err);
			}
			return ScenarioResult::aborted(&scenario.name, err.to_string());
		}
	};

	info!(target = "veri", scenario = %scenario.name, steps = scenario.steps.len(), "scenario started");
	let started = Instant::now();
	let budget = scenario
		.timeout_ms
		.map(Duration::from_millis)
		.unwrap_or(config.scenario_timeout);
	let mut steps = Vec::new();

	let outcome = {
		let mut watcher = fatal.subscribe();
		let mut engine = ScenarioEngine::new(&mut session);
		tokio::select! {
			ran = tokio::time::timeout(budget, engine.run_into(scenario, &mut steps)) => ran.map_err(|_| Cut::Timeout(budget)),
			reason = fatal_raised(&mut watcher) => Err(Cut::Fatal(reason)),
		}
	};

	let result = match outcome {
		Ok(Verdict::Passed) => scenario::finish(scenario, ScenarioStatus::Passed, steps, None, started),
		Ok(Verdict::Failed { reason }) => scenario::finish(scenario, ScenarioStatus::Failed, steps, Some(reason), started),
		Ok(Verdict::Fatal(err)) => {
			raise(fatal, &err);
			scenario::finish(scenario, ScenarioStatus::Aborted, steps, Some(err.to_string()), started)
		}
		Err(Cut::Timeout(budget)) => {
			let err = HarnessError::ScenarioTimeout {
				ms: budget.as_millis() as u64,
			};
			warn!(target = "veri", scenario = %scenario.name, elapsed_ms = budget.as_millis() as u64, "scenario timed out");
			let in_flight = steps.len();
			if let Some(entry) = scenario.steps.get(in_flight) {
				let artifacts = tokio::time::timeout(CAPTURE_GRACE, session.capture_failure())
					.await
					.unwrap_or_default();
				steps.push(StepResult {
					index: in_flight,
					action: entry.step.action().to_string(),
					label: entry.label.clone(),
					locator_used: None,
					outcome: StepOutcome::Failure {
						reason: err.to_string(),
						error_code: err.code(),
						artifacts,
					},
					duration_ms: 0,
					produced: Vec::new(),
				});
			}
			scenario::skip_remaining(scenario, in_flight + 1, "scenario timed out", &mut steps);
			scenario::finish(scenario, ScenarioStatus::Aborted, steps, Some(err.to_string()), started)
		}
		Err(Cut::Fatal(reason)) => {
			let reason = format!("run aborted: {reason}");
			let from = steps.len();
			scenario::skip_remaining(scenario, from, &reason, &mut steps);
			scenario::finish(scenario, ScenarioStatus::Aborted, steps, Some(reason), started)
		}
	};

	session.close().await;
	info!(
		target = "veri",
		scenario = %scenario.name,
		status = %result.status,
		elapsed_ms = result.duration_ms,
		"scenario finished"
	);
	result
}

/// Publishes the first run-fatal error; later ones are only logged.
fn raise(fatal: &FatalSignal, err: &HarnessError) {
	let message = err.to_string();
	let first = fatal.send_if_modified(|current| {
		if current.is_some() {
			return false;
		}
		*current = Some(message.clone());
		true
	});
	if first {
		error!(target = "veri", error = %message, "run-fatal error, aborting remaining scenarios");
	}
}

/// Resolves once a run-fatal error has been published.
async fn fatal_raised(watcher: &mut watch::Receiver<Option<String>>) -> String {
	loop {
		if let Some(reason) = watcher.borrow_and_update().clone() {
			return reason;
		}
		if watcher.changed().await.is_err() {
			return std::future::pending().await;
		}
	}
}

/// Directory name for a scenario's artifacts.
pub fn artifact_dir_name(name: &str) -> String {
	let cleaned: String = name
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
		.collect();
	let trimmed = cleaned.trim_matches('-');
	if trimmed.is_empty() { "scenario".into() } else { trimmed.to_string() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn artifact_dirs_are_filesystem_safe() {
		assert_eq!(artifact_dir_name("settings-dialog"), "settings-dialog");
		assert_eq!(artifact_dir_name("Mobile nav / labels"), "Mobile-nav---labels");
		assert_eq!(artifact_dir_name("../.."), "scenario");
		assert_eq!(artifact_dir_name("pin_round_trip"), "pin_round_trip");
	}

	#[test]
	fn defaults() {
		let config = RunConfig::default();
		assert_eq!(config.jobs, 1);
		assert_eq!(config.scenario_timeout, Duration::from_secs(60));
		assert_eq!(config.base_url, "http://localhost:5173");
	}
}
