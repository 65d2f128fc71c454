//! Error taxonomy of the harness.

use std::path::PathBuf;

use thiserror::Error;
use veri_protocol::{Artifact, ErrorCode, ValidationError};

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors raised while executing scenarios.
///
/// Scenario-local errors abort the current scenario only; driver errors abort
/// the whole run. See [`HarnessError::is_fatal`].
#[derive(Debug, Error)]
pub enum HarnessError {
	/// No strategy of the locator matched any element.
	#[error("No element matches {locator}")]
	NotFound { locator: String },

	/// Some strategy matched several elements and none matched uniquely.
	#[error("{locator} matched {count} elements and none uniquely")]
	Ambiguous { locator: String, count: usize },

	/// A condition was not satisfied before its deadline.
	#[error("Timed out after {ms}ms waiting for {condition}{}", last_error.as_ref().map(|e| format!(" (last error: {e})")).unwrap_or_default())]
	Timeout {
		ms: u64,
		condition: String,
		last_error: Option<String>,
		artifacts: Vec<Artifact>,
	},

	/// An observed value differed from the expected one.
	#[error("Assertion failed: expected {expected}, got {actual}")]
	AssertionFailed {
		expected: String,
		actual: String,
		artifacts: Vec<Artifact>,
	},

	/// The automation driver failed.
	#[error(transparent)]
	Driver(#[from] veri_runtime::Error),

	/// The scenario definition is unusable.
	#[error("Invalid scenario: {0}")]
	InvalidScenario(String),

	/// The scenario exceeded its overall budget.
	#[error("Scenario timed out after {ms}ms")]
	ScenarioTimeout { ms: u64 },

	/// I/O error while reading scenarios or writing artifacts.
	#[error("I/O error at {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

impl HarnessError {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		HarnessError::Io {
			path: path.into(),
			source,
		}
	}

	/// Stable code for the run summary.
	pub fn code(&self) -> ErrorCode {
		match self {
			HarnessError::NotFound { .. } => ErrorCode::SelectorNotFound,
			HarnessError::Ambiguous { .. } => ErrorCode::SelectorAmbiguous,
			HarnessError::Timeout { .. } => ErrorCode::Timeout,
			HarnessError::AssertionFailed { .. } => ErrorCode::AssertionFailed,
			HarnessError::Driver(_) => ErrorCode::DriverError,
			HarnessError::InvalidScenario(_) => ErrorCode::InvalidScenario,
			HarnessError::ScenarioTimeout { .. } => ErrorCode::ScenarioTimeout,
			HarnessError::Io { .. } => ErrorCode::IoError,
		}
	}

	/// Errors that end the current scenario but leave the run intact.
	///
	/// Driver errors the page caused (covered or detached elements, script
	/// exceptions) are scenario-local too.
	pub fn is_scenario_local(&self) -> bool {
		match self {
			HarnessError::Driver(err) => err.is_page_error(),
			_ => true,
		}
	}

	/// Errors that end the whole run: the browser connection failed.
	pub fn is_fatal(&self) -> bool {
		!self.is_scenario_local()
	}

	/// Artifacts captured when the error was raised.
	pub fn artifacts(&self) -> &[Artifact] {
		match self {
			HarnessError::Timeout { artifacts, .. } | HarnessError::AssertionFailed { artifacts, .. } => artifacts,
			_ => &[],
		}
	}

	/// True for locator resolution failures, which polling treats as "not yet".
	pub fn is_locator_error(&self) -> bool {
		matches!(self, HarnessError::NotFound { .. } | HarnessError::Ambiguous { .. })
	}

	/// Failures a later poll may not see again: locator misses and elements
	/// detached or covered between query and use.
	pub fn is_transient(&self) -> bool {
		match self {
			HarnessError::Driver(err) => err.is_transient(),
			other => other.is_locator_error(),
		}
	}
}

impl From<ValidationError> for HarnessError {
	fn from(err: ValidationError) -> Self {
		HarnessError::InvalidScenario(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timeout_message_includes_last_error() {
		let err = HarnessError::Timeout {
			ms: 5000,
			condition: "visible(settings heading)".into(),
			last_error: Some("No element matches settings heading".into()),
			artifacts: Vec::new(),
		};
		assert_eq!(
			err.to_string(),
			"Timed out after 5000ms waiting for visible(settings heading) (last error: No element matches settings heading)"
		);
	}

	#[test]
	fn driver_errors_are_fatal() {
		let err = HarnessError::from(veri_runtime::Error::SessionClosed);
		assert!(err.is_fatal());
		assert!(!err.is_scenario_local());
		assert_eq!(err.code(), ErrorCode::DriverError);
	}

	#[test]
	fn locator_errors_are_scenario_local() {
		let err = HarnessError::Ambiguous {
			locator: "text=Execute".into(),
			count: 2,
		};
		assert!(err.is_scenario_local());
		assert!(err.is_locator_error());
		assert_eq!(err.code(), ErrorCode::SelectorAmbiguous);
	}

	#[test]
	fn detached_elements_do_not_end_the_run() {
		let err = HarnessError::from(veri_runtime::Error::StaleHandle(4));
		assert!(err.is_transient());
		assert!(!err.is_fatal());
		assert_eq!(err.code(), ErrorCode::DriverError);
	}

	#[test]
	fn page_refusals_fail_only_the_scenario() {
		let intercepted = HarnessError::from(veri_runtime::Error::from_webdriver(
			"click",
			"element click intercepted",
			"<div class=\"modal-backdrop\"> would receive the click",
		));
		assert!(!intercepted.is_fatal());
		assert!(intercepted.is_transient());

		let thrown = HarnessError::from(veri_runtime::Error::Script("TypeError: x is undefined".into()));
		assert!(thrown.is_scenario_local());
		assert!(!thrown.is_transient());

		let lost = HarnessError::from(veri_runtime::Error::Command {
			command: "click",
			message: "invalid session id".into(),
		});
		assert!(lost.is_fatal());
	}
}
