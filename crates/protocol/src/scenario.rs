//! Scenario definitions.
//!
//! Scenarios are static: they are loaded once per run (from YAML/JSON files or
//! a built-in catalogue) and never modified while executing.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::Condition;
use crate::locator::Locator;
use crate::state::StateMatcher;

/// Expected text for [`Step::AssertText`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
	/// Whitespace-normalised equality.
	Exact(String),
	/// Case-insensitive substring.
	Contains(String),
	/// Regular expression searched in the text.
	Pattern(String),
}

impl fmt::Display for TextMatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TextMatch::Exact(text) => write!(f, "\"{text}\""),
			TextMatch::Contains(text) => write!(f, "contains \"{text}\""),
			TextMatch::Pattern(pattern) => write!(f, "matches /{pattern}/"),
		}
	}
}

/// One atomic harness action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
	Navigate {
		url: String,
	},
	WaitFor {
		condition: Condition,
		#[serde(default, rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
		timeout_ms: Option<u64>,
		#[serde(default, rename = "pollMs", skip_serializing_if = "Option::is_none")]
		poll_ms: Option<u64>,
	},
	Click {
		locator: Locator,
		/// How long the element gets to become actionable.
		#[serde(default, rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
		timeout_ms: Option<u64>,
	},
	Fill {
		locator: Locator,
		value: String,
		#[serde(default, rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
		timeout_ms: Option<u64>,
	},
	AssertVisible {
		locator: Locator,
		visible: bool,
		#[serde(default, rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
		timeout_ms: Option<u64>,
	},
	AssertText {
		locator: Locator,
		expected: TextMatch,
		#[serde(default, rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
		timeout_ms: Option<u64>,
	},
	AssertAttribute {
		locator: Locator,
		name: String,
		expected: Option<String>,
		#[serde(default, rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
		timeout_ms: Option<u64>,
	},
	/// Assert on the sampled application state.
	AssertState {
		expect: StateMatcher,
		#[serde(default, rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
		timeout_ms: Option<u64>,
	},
	/// Screenshot written relative to the scenario's artifact directory.
	Screenshot {
		path: String,
	},
	Evaluate {
		script: String,
		/// Environment setup (e.g. seeding persisted preferences).
		#[serde(default, skip_serializing_if = "std::ops::Not::not")]
		setup: bool,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		expected: Option<serde_json::Value>,
	},
	Reload {},
}

impl Step {
	/// Short action name used in traces and artifact file names.
	pub fn action(&self) -> &'static str {
		match self {
			Step::Navigate { .. } => "navigate",
			Step::WaitFor { .. } => "wait_for",
			Step::Click { .. } => "click",
			Step::Fill { .. } => "fill",
			Step::AssertVisible { .. } => "assert_visible",
			Step::AssertText { .. } => "assert_text",
			Step::AssertAttribute { .. } => "assert_attribute",
			Step::AssertState { .. } => "assert_state",
			Step::Screenshot { .. } => "screenshot",
			Step::Evaluate { .. } => "evaluate",
			Step::Reload {} => "reload",
		}
	}

	/// Steps allowed in the leading setup prefix of a scenario.
	pub fn is_setup(&self) -> bool {
		matches!(
			self,
			Step::Navigate { .. } | Step::Reload {} | Step::Evaluate { setup: true, .. }
		)
	}

	/// Steps that change application state; replay is not idempotent after these.
	pub fn is_mutating(&self) -> bool {
		matches!(self, Step::Click { .. } | Step::Fill { .. })
	}

	/// The locator this step acts on, if any.
	pub fn locator(&self) -> Option<&Locator> {
		match self {
			Step::Click { locator, .. }
			| Step::Fill { locator, .. }
			| Step::AssertVisible { locator, .. }
			| Step::AssertText { locator, .. }
			| Step::AssertAttribute { locator, .. } => Some(locator),
			_ => None,
		}
	}
}

impl fmt::Display for Step {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Step::Navigate { url } => write!(f, "navigate {url}"),
			Step::WaitFor { condition, .. } => write!(f, "wait for {condition}"),
			Step::Click { locator, .. } => write!(f, "click {locator}"),
			Step::Fill { locator, value, .. } => write!(f, "fill {locator} with \"{value}\""),
			Step::AssertVisible { locator, visible: true, .. } => write!(f, "expect {locator} visible"),
			Step::AssertVisible { locator, visible: false, .. } => write!(f, "expect {locator} not visible"),
			Step::AssertText { locator, expected, .. } => write!(f, "expect {locator} text {expected}"),
			Step::AssertAttribute { locator, name, expected, .. } => match expected {
				Some(value) => write!(f, "expect {locator} [{name}] == \"{value}\""),
				None => write!(f, "expect {locator} without [{name}]"),
			},
			Step::AssertState { expect, .. } => write!(f, "expect state {expect}"),
			Step::Screenshot { path } => write!(f, "screenshot {path}"),
			Step::Evaluate { script, .. } => write!(f, "evaluate {}", truncate(script, 60)),
			Step::Reload {} => f.write_str("reload"),
		}
	}
}

fn truncate(text: &str, max: usize) -> String {
	if text.chars().count() <= max {
		return text.to_string();
	}
	let head: String = text.chars().take(max).collect();
	format!("{head}...")
}

/// A step plus its execution policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEntry {
	#[serde(flatten)]
	pub step: Step,
	/// Failure is recorded as skipped and the scenario continues.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub best_effort: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
}

impl From<Step> for StepEntry {
	fn from(step: Step) -> Self {
		Self {
			step,
			best_effort: false,
			label: None,
		}
	}
}

/// Browser viewport size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
	pub width: u32,
	pub height: u32,
}

impl Viewport {
	pub const DESKTOP: Viewport = Viewport { width: 1280, height: 800 };
	pub const MOBILE: Viewport = Viewport { width: 375, height: 667 };
}

impl Default for Viewport {
	fn default() -> Self {
		Self::DESKTOP
	}
}

/// A named, ordered sequence of steps exercising one user-visible flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
	pub name: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub description: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub tags: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub viewport: Option<Viewport>,
	/// Overall budget; the session is torn down when it expires.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout_ms: Option<u64>,
	pub steps: Vec<StepEntry>,
}

/// Why a scenario definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("scenario has no name")]
	MissingName,

	#[error("scenario '{scenario}' has no steps")]
	NoSteps { scenario: String },

	#[error("scenario '{scenario}': setup step {index} ({action}) follows interaction step {first_interaction}")]
	SetupAfterInteraction {
		scenario: String,
		index: usize,
		action: &'static str,
		first_interaction: usize,
	},

	#[error("scenario '{scenario}': step {index} uses a locator with no strategies")]
	EmptyLocator { scenario: String, index: usize },
}

impl Scenario {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			description: String::new(),
			tags: Vec::new(),
			viewport: None,
			timeout_ms: None,
			steps: Vec::new(),
		}
	}

	pub fn describe(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn tag(mut self, tag: impl Into<String>) -> Self {
		self.tags.push(tag.into());
		self
	}

	pub fn viewport(mut self, viewport: Viewport) -> Self {
		self.viewport = Some(viewport);
		self
	}

	pub fn timeout_ms(mut self, ms: u64) -> Self {
		self.timeout_ms = Some(ms);
		self
	}

	pub fn step(mut self, step: Step) -> Self {
		self.steps.push(step.into());
		self
	}

	pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
		self.steps.extend(steps.into_iter().map(StepEntry::from));
		self
	}

	/// Appends a step whose failure is tolerated.
	pub fn best_effort(mut self, step: Step) -> Self {
		self.steps.push(StepEntry {
			step,
			best_effort: true,
			label: None,
		});
		self
	}

	pub fn entries(mut self, entries: impl IntoIterator<Item = StepEntry>) -> Self {
		self.steps.extend(entries);
		self
	}

	/// Checks the structural rules that do not need a browser.
	///
	/// Setup steps (navigate, reload, setup evaluate) may only form the
	/// leading prefix; a setup evaluate after the first interaction would race
	/// the rendered UI instead of preparing it.
	pub fn validate(&self) -> Result<(), ValidationError> {
		if self.name.trim().is_empty() {
			return Err(ValidationError::MissingName);
		}
		if self.steps.is_empty() {
			return Err(ValidationError::NoSteps {
				scenario: self.name.clone(),
			});
		}

		let mut first_interaction = None;
		for (index, entry) in self.steps.iter().enumerate() {
			if entry.step.locator().is_some_and(|l| l.strategies.is_empty()) {
				return Err(ValidationError::EmptyLocator {
					scenario: self.name.clone(),
					index,
				});
			}

			let guarded_setup = matches!(entry.step, Step::Evaluate { setup: true, .. });
			match first_interaction {
				None if !entry.step.is_setup() => first_interaction = Some(index),
				Some(first) if guarded_setup => {
					return Err(ValidationError::SetupAfterInteraction {
						scenario: self.name.clone(),
						index,
						action: entry.step.action(),
						first_interaction: first,
					});
				}
				_ => {}
			}
		}
		Ok(())
	}

	pub fn has_tag(&self, tag: &str) -> bool {
		self.tags.iter().any(|t| t == tag)
	}
}
