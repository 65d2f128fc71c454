//! Bounded polling of conditions.
//!
//! Every wait evaluates its condition immediately, then once per poll interval,
//! and a final time at the deadline. Sleeping uses the tokio timer so waits
//! never block the executor and run under a paused clock in tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use veri_protocol::{Condition, ConditionKind, Locator, text_matches};

use crate::error::{HarnessError, Result};
use crate::locate::{self, Resolved};
use crate::session::Session;
use crate::state;

/// Default budget of a single wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default interval between two evaluations.
pub const DEFAULT_POLL: Duration = Duration::from_millis(100);

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Timeout and poll interval of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
	pub timeout: Duration,
	pub poll: Duration,
}

impl Default for WaitOptions {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_TIMEOUT,
			poll: DEFAULT_POLL,
		}
	}
}

impl WaitOptions {
	pub fn new(timeout: Duration, poll: Duration) -> Self {
		Self { timeout, poll }
	}

	/// Overrides the timeout when a step carries its own.
	pub fn timeout_ms(mut self, ms: Option<u64>) -> Self {
		if let Some(ms) = ms {
			self.timeout = Duration::from_millis(ms);
		}
		self
	}

	/// Overrides the poll interval when a step carries its own.
	pub fn poll_ms(mut self, ms: Option<u64>) -> Self {
		if let Some(ms) = ms {
			self.poll = Duration::from_millis(ms.max(1));
		}
		self
	}
}

/// How a satisfied wait went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitReport {
	pub elapsed: Duration,
	/// Number of evaluations, including the first.
	pub ticks: u32,
}

/// Clock of one polling loop.
#[derive(Debug)]
pub struct Poller {
	started: Instant,
	deadline: Instant,
	poll: Duration,
	ticks: u32,
}

impl Poller {
	pub fn start(options: WaitOptions) -> Self {
		let started = Instant::now();
		Self {
			started,
			deadline: started + options.timeout,
			poll: options.poll,
			ticks: 1,
		}
	}

	pub fn started(&self) -> Instant {
		self.started
	}

	pub fn elapsed(&self) -> Duration {
		self.started.elapsed()
	}

	pub fn ticks(&self) -> u32 {
		self.ticks
	}

	/// Sleeps until the next evaluation.
	///
	/// Returns `false` once the evaluation at the deadline has happened.
	pub async fn next_tick(&mut self) -> bool {
		let now = Instant::now();
		if now >= self.deadline {
			return false;
		}
		tokio::time::sleep_until((now + self.poll).min(self.deadline)).await;
		self.ticks += 1;
		true
	}

	pub fn report(&self) -> WaitReport {
		WaitReport {
			elapsed: self.elapsed(),
			ticks: self.ticks,
		}
	}
}

/// Polls `condition` until it holds or `options.timeout` passes.
///
/// Locator failures while polling count as "not yet" and are remembered for
/// the timeout message. Driver failures abort immediately.
///
/// # Errors
///
/// [`HarnessError::Timeout`] carrying a diagnostic snapshot when the deadline
/// passes, or the driver error that interrupted polling.
pub async fn await_condition(session: &Session, condition: &Condition, options: WaitOptions) -> Result<WaitReport> {
	let mut poller = Poller::start(options);
	let mut last_error = None;

	loop {
		if evaluate(session, condition, poller.started(), &mut last_error).await? {
			let report = poller.report();
			debug!(
				target = "veri",
				condition = %condition,
				elapsed_ms = report.elapsed.as_millis() as u64,
				ticks = report.ticks,
				"condition satisfied"
			);
			return Ok(report);
		}
		// Handles from a failed evaluation are never used again.
		session.driver().release_handles();
		if !poller.next_tick().await {
			break;
		}
	}

	debug!(target = "veri", condition = %condition, ticks = poller.ticks(), "condition timed out");
	let artifacts = session.capture_failure().await;
	Err(HarnessError::Timeout {
		ms: options.timeout.as_millis() as u64,
		condition: condition.to_string(),
		last_error,
		artifacts,
	})
}

/// Waits until `locator` resolves uniquely to a visible element.
///
/// When the deadline passes while the locator still fails to resolve, the
/// resolution error itself is returned.
pub async fn until_actionable(session: &Session, locator: &Locator, options: WaitOptions) -> Result<Resolved> {
	let driver = session.driver();
	let mut poller = Poller::start(options);
	let mut last_error: Option<HarnessError> = None;

	loop {
		match locate::resolve(driver, locator).await {
			Ok(resolved) => match driver.is_visible(resolved.handle).await {
				Ok(true) => return Ok(resolved),
				Ok(false) => last_error = None,
				Err(e) => {
					let err = HarnessError::from(e);
					if !err.is_transient() {
						return Err(err);
					}
					last_error = Some(err);
				}
			},
			Err(err) if err.is_transient() => last_error = Some(err),
			Err(err) => return Err(err),
		}
		driver.release_handles();
		if !poller.next_tick().await {
			break;
		}
	}

	match last_error {
		Some(err) if err.is_locator_error() => Err(err),
		other => Err(HarnessError::Timeout {
			ms: options.timeout.as_millis() as u64,
			condition: format!("{locator} to be visible"),
			last_error: other.map(|e| e.to_string()),
			artifacts: session.capture_failure().await,
		}),
	}
}

fn evaluate<'a>(
	session: &'a Session,
	condition: &'a Condition,
	started: Instant,
	last_error: &'a mut Option<String>,
) -> BoxFuture<'a, Result<bool>> {
	Box::pin(async move {
		let driver = session.driver();
		let observed: Result<bool> = match &condition.kind {
			ConditionKind::ElementVisible { locator } => locate::any_visible(driver, locator).await,
			ConditionKind::ElementAbsent { locator } => locate::any_visible(driver, locator).await.map(|v| !v),
			ConditionKind::AttributeEquals { locator, name, value } => {
				match locate::resolve(driver, locator).await {
					Ok(resolved) => driver
						.attribute(resolved.handle, name)
						.await
						.map(|actual| actual == *value)
						.map_err(HarnessError::from),
					Err(err) => Err(err),
				}
			}
			ConditionKind::TextPresent { text } => driver
				.page_text()
				.await
				.map(|page| text_matches(&page, text, false))
				.map_err(HarnessError::from),
			ConditionKind::Elapsed { ms } => Ok(started.elapsed() >= Duration::from_millis(*ms)),
			ConditionKind::InState { expect } => state::sample(driver, session.profile())
				.await
				.map(|sampled| expect.matches(&sampled)),
			ConditionKind::AnyOf { conditions } => {
				let mut any = false;
				for inner in conditions {
					if evaluate(session, inner, started, last_error).await? {
						any = true;
						break;
					}
				}
				Ok(any)
			}
			ConditionKind::AllOf { conditions } => {
				let mut all = true;
				for inner in conditions {
					if !evaluate(session, inner, started, last_error).await? {
						all = false;
						break;
					}
				}
				Ok(all)
			}
		};

		let holds = match observed {
			Ok(holds) => holds,
			Err(err) if err.is_transient() => {
				*last_error = Some(err.to_string());
				// A vanished element satisfies absence.
				matches!(condition.kind, ConditionKind::ElementAbsent { .. })
			}
			Err(err) => return Err(err),
		};
		Ok(holds != condition.negate)
	})
}

#[cfg(test)]
mod tests {
	use veri_protocol::{Phase, StateMatcher};

	use std::sync::Arc;

	use super::*;
	use crate::testing::{EngineStats, FakeDriver, FakeNode, test_session};

	fn opts(timeout_ms: u64) -> WaitOptions {
		WaitOptions::new(Duration::from_millis(timeout_ms), DEFAULT_POLL)
	}

	#[tokio::test(start_paused = true)]
	async fn elapsed_is_measured_from_wait_start() {
		let (session, _dir) = test_session(FakeDriver::with_nodes(Vec::new()));
		let report = await_condition(&session, &Condition::elapsed(250), opts(1000)).await.unwrap();
		assert!(report.elapsed >= Duration::from_millis(250));
		assert!(report.elapsed < Duration::from_millis(400));
	}

	#[tokio::test(start_paused = true)]
	async fn immediate_success_takes_one_tick() {
		let (session, _dir) = test_session(FakeDriver::with_nodes(vec![FakeNode::new("h2").text("System Configuration")]));
		let report = await_condition(&session, &Condition::visible(Locator::text("System Configuration")), opts(1000))
			.await
			.unwrap();
		assert_eq!(report.ticks, 1);
		assert_eq!(report.elapsed, Duration::ZERO);
	}

	#[tokio::test(start_paused = true)]
	async fn timeout_evaluates_at_deadline_and_captures_artifacts() {
		let (session, _dir) = test_session(FakeDriver::with_nodes(Vec::new()));
		let started = Instant::now();
		let err = await_condition(&session, &Condition::visible(Locator::text("Security Clearance")), opts(500))
			.await
			.unwrap_err();

		assert_eq!(started.elapsed(), Duration::from_millis(500));
		match err {
			HarnessError::Timeout { ms, artifacts, .. } => {
				assert_eq!(ms, 500);
				assert_eq!(artifacts.len(), 2);
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn locator_errors_are_remembered() {
		let (session, _dir) = test_session(FakeDriver::with_nodes(Vec::new()));
		let condition = Condition::attribute_equals(Locator::css("html"), "data-theme", Some("cyberpunk".into()));
		let err = await_condition(&session, &condition, opts(200)).await.unwrap_err();
		assert!(err.to_string().contains("last error: No element matches css=html"));
	}

	#[tokio::test(start_paused = true)]
	async fn polling_releases_handles_between_ticks() {
		let stats = Arc::new(EngineStats::default());
		let driver = FakeDriver::with_nodes(vec![
			FakeNode::new("p").text("Generating Keys..."),
			FakeNode::new("button").text("Download Card").hidden(),
		])
		.with_stats(Arc::clone(&stats));
		let (session, _dir) = test_session(driver);

		let pending = Condition::absent(Locator::text("Generating Keys..."));
		let err = await_condition(&session, &pending, opts(5000)).await.unwrap_err();
		assert!(matches!(err, HarnessError::Timeout { .. }));

		let err = until_actionable(&session, &Locator::text("Download Card"), opts(5000)).await.unwrap_err();
		assert!(matches!(err, HarnessError::Timeout { .. }));
		assert!(stats.peak_handles() <= 2, "{} handles held at once", stats.peak_handles());
	}

	#[tokio::test(start_paused = true)]
	async fn negation_and_combinators() {
		let (session, _dir) = test_session(FakeDriver::with_nodes(vec![FakeNode::new("span").text("CRYPTO3")]));
		let gone = Condition::visible(Locator::text("System Initialization...")).negated();
		await_condition(&session, &gone, opts(100)).await.unwrap();

		let either = Condition::any_of(vec![
			Condition::text_present("Welcome to Crypto3!"),
			Condition::in_state(StateMatcher::phase(Phase::MainApp)),
		]);
		await_condition(&session, &either, opts(100)).await.unwrap();

		let both = Condition::all_of(vec![Condition::text_present("crypto3"), Condition::elapsed(5000)]);
		assert!(await_condition(&session, &both, opts(100)).await.is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn driver_errors_abort_immediately() {
		let driver = FakeDriver::with_nodes(Vec::new());
		driver.fail_on("query");
		let (session, _dir) = test_session(driver);
		let started = Instant::now();
		let err = await_condition(&session, &Condition::visible(Locator::text("x")), opts(5000))
			.await
			.unwrap_err();
		assert!(err.is_fatal());
		assert_eq!(started.elapsed(), Duration::ZERO);
	}

	#[tokio::test(start_paused = true)]
	async fn actionable_reports_resolution_error() {
		let (session, _dir) = test_session(FakeDriver::with_nodes(vec![
			FakeNode::new("button").text("Execute"),
			FakeNode::new("button").text("Execute"),
			FakeNode::new("button").text("Hidden").hidden(),
		]));
		let err = until_actionable(&session, &Locator::text("Execute"), opts(300)).await.unwrap_err();
		assert!(matches!(err, HarnessError::Ambiguous { count: 2, .. }));

		let err = until_actionable(&session, &Locator::text("Hidden"), opts(300)).await.unwrap_err();
		assert!(matches!(err, HarnessError::Timeout { .. }));
	}

	#[test]
	fn options_overrides() {
		let options = WaitOptions::default().timeout_ms(Some(3000)).poll_ms(Some(0));
		assert_eq!(options.timeout, Duration::from_millis(3000));
		assert_eq!(options.poll, Duration::from_millis(1));
		assert_eq!(WaitOptions::default().timeout_ms(None).timeout, DEFAULT_TIMEOUT);
	}
}
