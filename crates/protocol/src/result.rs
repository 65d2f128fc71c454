//! Step, scenario and run results.
//!
//! [`RunSummary`] is the only output contract with external consumers; its
//! shape is versioned by [`SCHEMA_VERSION`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Current schema version of the run summary.
///
/// Increment this when making breaking changes to the output structure.
pub const SCHEMA_VERSION: u32 = 1;

/// Standardized error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Locator chain matched no element
	SelectorNotFound,
	/// Locator chain matched several elements and none uniquely
	SelectorAmbiguous,
	/// Condition not satisfied before the deadline
	Timeout,
	/// Observed value differs from the expected one
	AssertionFailed,
	/// Automation driver failed or disconnected
	DriverError,
	/// Scenario definition rejected at load time
	InvalidScenario,
	/// File I/O error
	IoError,
	/// Scenario exceeded its overall budget
	ScenarioTimeout,
	/// Unknown/internal error
	InternalError,
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let code = match self {
			ErrorCode::SelectorNotFound => "SELECTOR_NOT_FOUND",
			ErrorCode::SelectorAmbiguous => "SELECTOR_AMBIGUOUS",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::AssertionFailed => "ASSERTION_FAILED",
			ErrorCode::DriverError => "DRIVER_ERROR",
			ErrorCode::InvalidScenario => "INVALID_SCENARIO",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::ScenarioTimeout => "SCENARIO_TIMEOUT",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(code)
	}
}

/// Types of artifacts a run can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
	Screenshot,
	/// Truncated rendered-text excerpt of the page
	Text,
}

/// File written during a run. Never read back by the harness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
	#[serde(rename = "type")]
	pub kind: ArtifactKind,
	pub path: PathBuf,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub size_bytes: Option<u64>,
}

impl Artifact {
	pub fn new(kind: ArtifactKind, path: impl Into<PathBuf>, size_bytes: Option<u64>) -> Self {
		Self {
			kind,
			path: path.into(),
			size_bytes,
		}
	}
}

/// Outcome of a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
	Success,
	#[serde(rename_all = "camelCase")]
	Failure {
		reason: String,
		error_code: ErrorCode,
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		artifacts: Vec<Artifact>,
	},
	Skipped {
		reason: String,
	},
}

impl StepOutcome {
	pub fn is_success(&self) -> bool {
		matches!(self, StepOutcome::Success)
	}

	pub fn is_failure(&self) -> bool {
		matches!(self, StepOutcome::Failure { .. })
	}

	pub fn artifacts(&self) -> &[Artifact] {
		match self {
			StepOutcome::Failure { artifacts, .. } => artifacts,
			_ => &[],
		}
	}
}

/// Recorded execution of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
	pub index: usize,
	pub action: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	/// The strategy that resolved the step's locator.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub locator_used: Option<String>,
	#[serde(flatten)]
	pub outcome: StepOutcome,
	pub duration_ms: u64,
	/// Artifacts written by a successful step (explicit screenshots).
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub produced: Vec<Artifact>,
}

impl StepResult {
	pub fn skipped(index: usize, action: &str, reason: impl Into<String>) -> Self {
		Self {
			index,
			action: action.to_string(),
			label: None,
			locator_used: None,
			outcome: StepOutcome::Skipped { reason: reason.into() },
			duration_ms: 0,
			produced: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
	Passed,
	/// A step failed with a scenario-local error.
	Failed,
	/// The scenario was cut short by its timeout or a run-fatal error.
	Aborted,
}

impl fmt::Display for ScenarioStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ScenarioStatus::Passed => f.write_str("passed"),
			ScenarioStatus::Failed => f.write_str("failed"),
			ScenarioStatus::Aborted => f.write_str("aborted"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
	pub name: String,
	pub status: ScenarioStatus,
	pub steps: Vec<StepResult>,
	/// Why the scenario did not pass, if it did not.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	pub duration_ms: u64,
}

impl ScenarioResult {
	/// Result for a scenario that never got to run its steps.
	pub fn aborted(name: impl Into<String>, reason: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			status: ScenarioStatus::Aborted,
			steps: Vec::new(),
			reason: Some(reason.into()),
			duration_ms: 0,
		}
	}

	pub fn passed(&self) -> bool {
		self.status == ScenarioStatus::Passed
	}

	/// Every artifact written for this scenario, in step order.
	pub fn artifacts(&self) -> Vec<PathBuf> {
		self.steps
			.iter()
			.flat_map(|step| step.produced.iter().chain(step.outcome.artifacts()))
			.map(|artifact| artifact.path.clone())
			.collect()
	}

	/// The first failed step, if any.
	pub fn failed_step(&self) -> Option<&StepResult> {
		self.steps.iter().find(|step| step.outcome.is_failure())
	}
}

/// Artifacts of one scenario, keyed by name in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactIndexEntry {
	pub scenario: String,
	pub paths: Vec<PathBuf>,
}

/// Aggregate of every scenario in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
	pub schema_version: u32,
	pub total: usize,
	pub passed: usize,
	pub failed: usize,
	pub aborted: usize,
	/// Run-fatal error message, if the run was cut short.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub fatal: Option<String>,
	pub duration_ms: u64,
	pub scenarios: Vec<ScenarioResult>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub artifact_index: Vec<ArtifactIndexEntry>,
}

impl RunSummary {
	pub fn from_results(scenarios: Vec<ScenarioResult>, fatal: Option<String>, duration_ms: u64) -> Self {
		let count = |status| scenarios.iter().filter(|s| s.status == status).count();
		let passed = count(ScenarioStatus::Passed);
		let failed = count(ScenarioStatus::Failed);
		let aborted = count(ScenarioStatus::Aborted);
		let artifact_index = scenarios
			.iter()
			.map(|s| ArtifactIndexEntry {
				scenario: s.name.clone(),
				paths: s.artifacts(),
			})
			.filter(|entry| !entry.paths.is_empty())
			.collect();

		Self {
			schema_version: SCHEMA_VERSION,
			total: scenarios.len(),
			passed,
			failed,
			aborted,
			fatal,
			duration_ms,
			scenarios,
			artifact_index,
		}
	}

	/// True when every scenario passed and nothing was fatal.
	pub fn all_passed(&self) -> bool {
		self.fatal.is_none() && self.passed == self.total
	}
}
