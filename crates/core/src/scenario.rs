//! Scenario execution.
//!
//! Steps run strictly in order against one [`Session`]. The first failing
//! step ends the scenario: it is recorded with its artifacts and every later
//! step is recorded as skipped. Nothing is retried or rolled back.

use tokio::time::Instant;
use tracing::{info, warn};
use veri_protocol::{Scenario, ScenarioResult, ScenarioStatus, Step, StepEntry, StepOutcome, StepResult};

use crate::assert;
use crate::error::{HarnessError, Result};
use crate::session::Session;
use crate::wait;

/// How a scenario's steps ended.
#[derive(Debug)]
pub enum Verdict {
	Passed,
	/// A step failed with a scenario-local error.
	Failed { reason: String },
	/// A driver error; the run cannot continue.
	Fatal(HarnessError),
}

/// What a successful step reports.
#[derive(Debug, Default)]
struct Done {
	locator_used: Option<String>,
	produced: Vec<veri_protocol::Artifact>,
}

/// Runs scenarios step by step on a session.
pub struct ScenarioEngine<'s> {
	session: &'s mut Session,
}

impl<'s> ScenarioEngine<'s> {
	pub fn new(session: &'s mut Session) -> Self {
		Self { session }
	}

	/// Runs `scenario` to completion.
	///
	/// # Errors
	///
	/// The driver error that made the run unusable. Scenario-local failures
	/// are part of the returned result instead.
	pub async fn run(&mut self, scenario: &Scenario) -> Result<ScenarioResult> {
		let started = Instant::now();
		let mut steps = Vec::new();
		match self.run_into(scenario, &mut steps).await {
			Verdict::Passed => Ok(finish(scenario, ScenarioStatus::Passed, steps, None, started)),
			Verdict::Failed { reason } => Ok(finish(scenario, ScenarioStatus::Failed, steps, Some(reason), started)),
			Verdict::Fatal(err) => Err(err),
		}
	}

	/// Runs `scenario`, appending each step's result to `results` as it ends.
	///
	/// Results already recorded stay valid if the returned future is dropped
	/// part way, which is how scenario timeouts cut execution short.
	pub async fn run_into(&mut self, scenario: &Scenario, results: &mut Vec<StepResult>) -> Verdict {
		for (index, entry) in scenario.steps.iter().enumerate() {
			let action = entry.step.action();
			self.session.begin_step(index, action);
			let started = Instant::now();

			let outcome = self.execute(&entry.step).await;
			let duration_ms = started.elapsed().as_millis() as u64;

			match outcome {
				Ok(done) => {
					info!(
						target = "veri",
						scenario = %scenario.name,
						step = index,
						action,
						locator = done.locator_used.as_deref().unwrap_or("-"),
						elapsed_ms = duration_ms,
						"step passed"
					);
					results.push(StepResult {
						index,
						action: action.to_string(),
						label: entry.label.clone(),
						locator_used: done.locator_used,
						outcome: StepOutcome::Success,
						duration_ms,
						produced: done.produced,
					});
				}
				Err(err) if entry.best_effort && err.is_scenario_local() => {
					info!(
						target = "veri",
						scenario = %scenario.name,
						step = index,
						action,
						reason = %err,
						"best-effort step skipped"
					);
					results.push(StepResult {
						label: entry.label.clone(),
						duration_ms,
						..StepResult::skipped(index, action, err.to_string())
					});
				}
				Err(err) => {
					let fatal = err.is_fatal();
					let artifacts = if !fatal && err.artifacts().is_empty() {
						self.session.capture_failure().await
					} else {
						err.artifacts().to_vec()
					};
					warn!(
						target = "veri",
						scenario = %scenario.name,
						step = index,
						action,
						code = %err.code(),
						elapsed_ms = duration_ms,
						"step failed: {err}"
					);
					results.push(failure(index, entry, &err, artifacts, duration_ms));

					let reason = if fatal { "run aborted" } else { "previous step failed" };
					skip_remaining(scenario, index + 1, reason, results);

					return if fatal {
						Verdict::Fatal(err)
					} else {
						Verdict::Failed {
							reason: format!("step {index} ({action}): {err}"),
						}
					};
				}
			}
		}
		Verdict::Passed
	}

	async fn execute(&self, step: &Step) -> Result<Done> {
		let session = &*self.session;
		let driver = session.driver();
		let defaults = session.wait_options();

		match step {
			Step::Navigate { url } => {
				driver.navigate(&session.url(url)).await?;
				Ok(Done::default())
			}
			Step::WaitFor {
				condition,
				timeout_ms,
				poll_ms,
			} => {
				wait::await_condition(session, condition, defaults.timeout_ms(*timeout_ms).poll_ms(*poll_ms)).await?;
				Ok(Done::default())
			}
			Step::Click { locator, timeout_ms } => {
				let resolved = wait::until_actionable(session, locator, defaults.timeout_ms(*timeout_ms)).await?;
				driver.click(resolved.handle).await?;
				Ok(used(resolved.describe()))
			}
			Step::Fill {
				locator,
				value,
				timeout_ms,
			} => {
				let resolved = wait::until_actionable(session, locator, defaults.timeout_ms(*timeout_ms)).await?;
				driver.fill(resolved.handle, value).await?;
				Ok(used(resolved.describe()))
			}
			Step::AssertVisible {
				locator,
				visible,
				timeout_ms,
			} => {
				let locator_used = assert::assert_visible(session, locator, *visible, defaults.timeout_ms(*timeout_ms)).await?;
				Ok(Done {
					locator_used,
					..Done::default()
				})
			}
			Step::AssertText {
				locator,
				expected,
				timeout_ms,
			} => {
				let locator_used = assert::assert_text(session, locator, expected, defaults.timeout_ms(*timeout_ms)).await?;
				Ok(Done {
					locator_used,
					..Done::default()
				})
			}
			Step::AssertAttribute {
				locator,
				name,
				expected,
				timeout_ms,
			} => {
				let options = defaults.timeout_ms(*timeout_ms);
				let locator_used = assert::assert_attribute(session, locator, name, expected.as_deref(), options).await?;
				Ok(Done {
					locator_used,
					..Done::default()
				})
			}
			Step::AssertState { expect, timeout_ms } => {
				assert::assert_state(session, expect, defaults.timeout_ms(*timeout_ms)).await?;
				Ok(Done::default())
			}
			Step::Screenshot { path } => {
				let artifact = session.artifacts().save_screenshot(driver, path).await?;
				Ok(Done {
					produced: vec![artifact],
					..Done::default()
				})
			}
			Step::Evaluate { script, expected, .. } => {
				match expected {
					Some(expected) => assert::assert_evaluates(session, script, expected, defaults).await?,
					None => {
						driver.evaluate(script).await?;
					}
				}
				Ok(Done::default())
			}
			Step::Reload {} => {
				driver.reload().await?;
				Ok(Done::default())
			}
		}
	}
}

fn used(locator: String) -> Done {
	Done {
		locator_used: Some(locator),
		..Done::default()
	}
}

fn failure(index: usize, entry: &StepEntry, err: &HarnessError, artifacts: Vec<veri_protocol::Artifact>, duration_ms: u64) -> StepResult {
	StepResult {
		index,
		action: entry.step.action().to_string(),
		label: entry.label.clone(),
		locator_used: None,
		outcome: StepOutcome::Failure {
			reason: err.to_string(),
			error_code: err.code(),
			artifacts,
		},
		duration_ms,
		produced: Vec::new(),
	}
}

/// Records every step from `from` on as skipped.
pub fn skip_remaining(scenario: &Scenario, from: usize, reason: &str, results: &mut Vec<StepResult>) {
	for (index, entry) in scenario.steps.iter().enumerate().skip(from) {
		results.push(StepResult {
			label: entry.label.clone(),
			..StepResult::skipped(index, entry.step.action(), reason)
		});
	}
}

/// Assembles a scenario result from its step results.
pub fn finish(
	scenario: &Scenario,
	status: ScenarioStatus,
	steps: Vec<StepResult>,
	reason: Option<String>,
	started: Instant,
) -> ScenarioResult {
	ScenarioResult {
		name: scenario.name.clone(),
		status,
		steps,
		reason,
		duration_ms: started.elapsed().as_millis() as u64,
	}
}

#[cfg(test)]
mod tests {
	use veri_protocol::{Condition, ErrorCode, Locator, Strategy};

	use super::*;
	use crate::testing::{FakeDriver, FakeNode, test_session};

	fn page() -> FakeDriver {
		FakeDriver::with_nodes(vec![
			FakeNode::new("h2").text("System Configuration"),
			FakeNode::new("button").text("Execute"),
		])
	}

	fn scenario() -> Scenario {
		Scenario::new("unit")
			.step(Step::Navigate { url: "/".into() })
			.best_effort(Step::Click {
				locator: Locator::text("Skip Intro"),
				timeout_ms: Some(200),
			})
			.step(Step::Click {
				locator: Locator::role("button", "Execute"),
				timeout_ms: None,
			})
			.step(Step::AssertVisible {
				locator: Locator::text("Security Clearance"),
				visible: true,
				timeout_ms: Some(300),
			})
			.step(Step::Reload {})
	}

	#[tokio::test(start_paused = true)]
	async fn failure_skips_the_rest() {
		let (mut session, _dir) = test_session(page());
		let result = ScenarioEngine::new(&mut session).run(&scenario()).await.unwrap();

		assert_eq!(result.status, ScenarioStatus::Failed);
		let statuses: Vec<_> = result
			.steps
			.iter()
			.map(|s| match &s.outcome {
				StepOutcome::Success => "ok",
				StepOutcome::Failure { .. } => "fail",
				StepOutcome::Skipped { .. } => "skip",
			})
			.collect();
		assert_eq!(statuses, ["ok", "skip", "ok", "fail", "skip"]);
		assert_eq!(result.steps[2].locator_used.as_deref(), Some("role=button[name=\"Execute\"i]"));

		let failed = result.failed_step().unwrap();
		match &failed.outcome {
			StepOutcome::Failure {
				error_code, artifacts, ..
			} => {
				assert_eq!(*error_code, ErrorCode::AssertionFailed);
				assert_eq!(artifacts.len(), 2);
				assert!(artifacts[0].path.ends_with("step-03-assert_visible-failure.png"));
			}
			other => panic!("unexpected outcome {other:?}"),
		}
		assert!(result.reason.unwrap().starts_with("step 3 (assert_visible)"));
	}

	#[tokio::test(start_paused = true)]
	async fn locator_failures_get_artifacts_too() {
		let (mut session, _dir) = test_session(page());
		let scenario = Scenario::new("missing").step(Step::Click {
			locator: Locator::new(Strategy::attribute("aria-label", "Config")),
			timeout_ms: Some(100),
		});
		let result = ScenarioEngine::new(&mut session).run(&scenario).await.unwrap();
		let failed = result.failed_step().unwrap();
		assert!(matches!(
			&failed.outcome,
			StepOutcome::Failure { error_code: ErrorCode::SelectorNotFound, artifacts, .. } if artifacts.len() == 2
		));
	}

	#[tokio::test(start_paused = true)]
	async fn driver_errors_are_fatal() {
		let driver = page();
		driver.fail_on("click");
		let (mut session, _dir) = test_session(driver);
		let err = ScenarioEngine::new(&mut session).run(&scenario()).await.unwrap_err();
		assert!(err.is_fatal());
	}

	#[tokio::test(start_paused = true)]
	async fn screenshots_are_produced() {
		let (mut session, dir) = test_session(page());
		let scenario = Scenario::new("shots")
			.step(Step::WaitFor {
				condition: Condition::elapsed(50),
				timeout_ms: None,
				poll_ms: Some(10),
			})
			.step(Step::Screenshot {
				path: "final.png".into(),
			});
		let result = ScenarioEngine::new(&mut session).run(&scenario).await.unwrap();
		assert!(result.passed());
		assert_eq!(result.artifacts(), vec![dir.path().join("test").join("final.png")]);
	}

	#[tokio::test(start_paused = true)]
	async fn partial_results_survive_cancellation() {
		let (mut session, _dir) = test_session(page());
		let scenario = Scenario::new("slow")
			.step(Step::Navigate { url: "/".into() })
			.step(Step::WaitFor {
				condition: Condition::elapsed(10_000),
				timeout_ms: Some(20_000),
				poll_ms: None,
			});
		let mut results = Vec::new();
		let cut = tokio::time::timeout(
			std::time::Duration::from_millis(500),
			ScenarioEngine::new(&mut session).run_into(&scenario, &mut results),
		)
		.await;
		assert!(cut.is_err());
		assert_eq!(results.len(), 1);
	}
}
