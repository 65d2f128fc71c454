//! Assertions.
//!
//! Every assertion re-samples until it holds or its timeout passes, so
//! animated transitions get to settle. Only the final observation counts: on
//! expiry the failure carries the last value seen and a diagnostic snapshot.

use regex::Regex;
use serde_json::Value;
use tracing::debug;
use veri_protocol::{Locator, StateMatcher, TextMatch, text_matches};

use crate::error::{HarnessError, Result};
use crate::locate;
use crate::session::Session;
use crate::state;
use crate::wait::{Poller, WaitOptions};

/// Compiled form of a [`TextMatch`].
#[derive(Debug, Clone)]
pub enum TextMatcher {
	Exact(String),
	Contains(String),
	Pattern(Regex),
}

impl TextMatcher {
	/// # Errors
	///
	/// [`HarnessError::InvalidScenario`] for a malformed pattern.
	pub fn compile(expected: &TextMatch) -> Result<Self> {
		Ok(match expected {
			TextMatch::Exact(text) => TextMatcher::Exact(text.clone()),
			TextMatch::Contains(text) => TextMatcher::Contains(text.clone()),
			TextMatch::Pattern(pattern) => TextMatcher::Pattern(
				Regex::new(pattern).map_err(|e| HarnessError::InvalidScenario(format!("bad text pattern: {e}")))?,
			),
		})
	}

	pub fn matches(&self, actual: &str) -> bool {
		match self {
			TextMatcher::Exact(text) => text_matches(actual, text, true),
			TextMatcher::Contains(text) => text_matches(actual, text, false),
			TextMatcher::Pattern(regex) => regex.is_match(actual),
		}
	}
}

/// Last observation of a polling assertion.
#[derive(Default)]
struct Observation {
	actual: Option<String>,
	error: Option<HarnessError>,
}

impl Observation {
	fn saw(&mut self, actual: String) {
		self.actual = Some(actual);
		self.error = None;
	}

	/// Records a transient error, or hands a fatal one back.
	fn failed(&mut self, err: HarnessError) -> Result<()> {
		if !err.is_transient() {
			return Err(err);
		}
		self.actual = None;
		self.error = Some(err);
		Ok(())
	}

	async fn conclude(self, session: &Session, expected: String) -> HarnessError {
		match (self.actual, self.error) {
			(None, Some(err)) if err.is_locator_error() => err,
			(actual, error) => HarnessError::AssertionFailed {
				expected,
				actual: actual
					.or_else(|| error.map(|e| e.to_string()))
					.unwrap_or_else(|| "nothing".into()),
				artifacts: session.capture_failure().await,
			},
		}
	}
}

/// Asserts that some element of `locator` is (or is not) visible.
///
/// Visibility is non-strict: several matches are fine. Returns the strategy
/// that matched, if any did.
pub async fn assert_visible(session: &Session, locator: &Locator, visible: bool, options: WaitOptions) -> Result<Option<String>> {
	let driver = session.driver();
	let mut poller = Poller::start(options);
	let mut seen = Observation::default();
	let mut used = None;

	loop {
		let observed = match locate::first_match(driver, locator).await {
			Ok(Some((strategy, handles))) => {
				used = Some(strategy.to_string());
				locate::visible_among(driver, &handles).await
			}
			Ok(None) => Ok(false),
			Err(err) => Err(err),
		};
		match observed {
			Ok(actual) if actual == visible => {
				debug!(target = "veri", locator = %locator, visible, ticks = poller.ticks(), "visibility confirmed");
				return Ok(used);
			}
			Ok(actual) => seen.saw(visibility(actual).into()),
			Err(err) => seen.failed(err)?,
		}
		driver.release_handles();
		if !poller.next_tick().await {
			break;
		}
	}

	let expected = format!("{locator} {}", visibility(visible));
	Err(seen.conclude(session, expected).await)
}

fn visibility(visible: bool) -> &'static str {
	if visible { "visible" } else { "not visible" }
}

/// Asserts on the rendered text of the element `locator` resolves to.
pub async fn assert_text(session: &Session, locator: &Locator, expected: &TextMatch, options: WaitOptions) -> Result<Option<String>> {
	let matcher = TextMatcher::compile(expected)?;
	let driver = session.driver();
	let mut poller = Poller::start(options);
	let mut seen = Observation::default();

	loop {
		match locate::resolve(driver, locator).await {
			Ok(resolved) => match driver.text(resolved.handle).await {
				Ok(text) if matcher.matches(&text) => return Ok(Some(resolved.describe())),
				Ok(text) => seen.saw(format!("\"{text}\"")),
				Err(e) => seen.failed(e.into())?,
			},
			Err(err) => seen.failed(err)?,
		}
		driver.release_handles();
		if !poller.next_tick().await {
			break;
		}
	}

	Err(seen.conclude(session, format!("{locator} text {expected}")).await)
}

/// Asserts that an attribute equals `expected`; `None` asserts it is missing.
pub async fn assert_attribute(
	session: &Session,
	locator: &Locator,
	name: &str,
	expected: Option<&str>,
	options: WaitOptions,
) -> Result<Option<String>> {
	let driver = session.driver();
	let mut poller = Poller::start(options);
	let mut seen = Observation::default();

	loop {
		match locate::resolve(driver, locator).await {
			Ok(resolved) => match driver.attribute(resolved.handle, name).await {
				Ok(value) if value.as_deref() == expected => return Ok(Some(resolved.describe())),
				Ok(value) => seen.saw(describe_attribute(value.as_deref())),
				Err(e) => seen.failed(e.into())?,
			},
			Err(err) => seen.failed(err)?,
		}
		driver.release_handles();
		if !poller.next_tick().await {
			break;
		}
	}

	let expected = format!("{locator} [{name}] {}", describe_attribute(expected));
	Err(seen.conclude(session, expected).await)
}

fn describe_attribute(value: Option<&str>) -> String {
	match value {
		Some(value) => format!("= \"{value}\""),
		None => "missing".into(),
	}
}

/// Asserts on the sampled application state.
pub async fn assert_state(session: &Session, expect: &StateMatcher, options: WaitOptions) -> Result<()> {
	let mut poller = Poller::start(options);
	let mut seen = Observation::default();

	loop {
		match state::sample(session.driver(), session.profile()).await {
			Ok(sampled) if expect.matches(&sampled) => return Ok(()),
			Ok(sampled) => seen.saw(sampled.to_string()),
			Err(err) => seen.failed(err)?,
		}
		session.driver().release_handles();
		if !poller.next_tick().await {
			break;
		}
	}

	Err(seen.conclude(session, format!("state {expect}")).await)
}

/// Evaluates `script` until it yields `expected`.
pub async fn assert_evaluates(session: &Session, script: &str, expected: &Value, options: WaitOptions) -> Result<()> {
	let mut poller = Poller::start(options);
	let mut seen = Observation::default();

	loop {
		let value = session.driver().evaluate(script).await?;
		if value == *expected {
			return Ok(());
		}
		seen.saw(value.to_string());
		if !poller.next_tick().await {
			break;
		}
	}

	Err(seen.conclude(session, format!("script to return {expected}")).await)
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::time::Duration;

	use veri_protocol::{Strategy, Tab};

	use super::*;
	use crate::testing::{EngineStats, FakeDriver, FakeNode, test_session};
	use crate::wait::DEFAULT_POLL;

	fn opts(ms: u64) -> WaitOptions {
		WaitOptions::new(Duration::from_millis(ms), DEFAULT_POLL)
	}

	fn settings_page() -> FakeDriver {
		FakeDriver::with_nodes(vec![
			FakeNode::new("h2").text("  System\n Configuration "),
			FakeNode::new("button").text("Execute").within(".glass-panel", "Danger Zone"),
			FakeNode::new("p").text("Are you sure you want to wipe all data?").hidden(),
		])
	}

	#[tokio::test(start_paused = true)]
	async fn failing_assertions_hold_no_stale_handles() {
		let stats = Arc::new(EngineStats::default());
		let (session, _dir) = test_session(settings_page().with_stats(Arc::clone(&stats)));
		let dialog = Locator::text("wipe all data");

		assert!(assert_visible(&session, &dialog, true, opts(3000)).await.is_err());
		let err = assert_text(&session, &dialog, &TextMatch::Exact("Cancelled".into()), opts(3000))
			.await
			.unwrap_err();
		assert!(matches!(err, HarnessError::AssertionFailed { .. }));
		assert!(stats.peak_handles() <= 2, "{} handles held at once", stats.peak_handles());
	}

	#[tokio::test(start_paused = true)]
	async fn visible_and_hidden() {
		let (session, _dir) = test_session(settings_page());
		let heading = Locator::text("System Configuration");
		let used = assert_visible(&session, &heading, true, opts(100)).await.unwrap();
		assert_eq!(used.as_deref(), Some("text=System Configuration"));

		let dialog = Locator::text("wipe all data");
		assert_visible(&session, &dialog, false, opts(100)).await.unwrap();

		let err = assert_visible(&session, &dialog, true, opts(300)).await.unwrap_err();
		match err {
			HarnessError::AssertionFailed { actual, artifacts, .. } => {
				assert_eq!(actual, "not visible");
				assert_eq!(artifacts.len(), 2);
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn missing_element_is_not_visible() {
		let (session, _dir) = test_session(settings_page());
		assert_visible(&session, &Locator::text("Security Clearance"), false, opts(100))
			.await
			.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn text_matching_modes() {
		let (session, _dir) = test_session(settings_page());
		let heading = Locator::new(Strategy::role("heading", "Configuration"));
		assert_text(&session, &heading, &TextMatch::Exact("System Configuration".into()), opts(100))
			.await
			.unwrap();
		assert_text(&session, &heading, &TextMatch::Contains("system".into()), opts(100))
			.await
			.unwrap();
		assert_text(&session, &heading, &TextMatch::Pattern(r"^\s*System\s+Conf".into()), opts(100))
			.await
			.unwrap();

		let err = assert_text(&session, &heading, &TextMatch::Exact("Digital Identity".into()), opts(200))
			.await
			.unwrap_err();
		assert!(err.to_string().contains("got \"  System\n Configuration \""));
	}

	#[tokio::test(start_paused = true)]
	async fn unresolved_locator_surfaces_as_locator_error() {
		let (session, _dir) = test_session(settings_page());
		let err = assert_text(&session, &Locator::text("Rhine Lab"), &TextMatch::Contains("x".into()), opts(200))
			.await
			.unwrap_err();
		assert!(matches!(err, HarnessError::NotFound { .. }));
	}

	#[tokio::test(start_paused = true)]
	async fn bad_pattern_is_invalid_scenario() {
		let (session, _dir) = test_session(settings_page());
		let err = assert_text(&session, &Locator::text("System"), &TextMatch::Pattern("(".into()), opts(100))
			.await
			.unwrap_err();
		assert!(matches!(err, HarnessError::InvalidScenario(_)));
	}

	#[tokio::test(start_paused = true)]
	async fn attribute_and_state() {
		let driver = settings_page();
		driver.set_root_attribute("data-theme", "cyberpunk");
		let (session, _dir) = test_session(driver);

		let execute = Locator::role("button", "Execute");
		assert_attribute(&session, &execute, "disabled", None, opts(100)).await.unwrap();
		let err = assert_attribute(&session, &execute, "disabled", Some("true"), opts(100))
			.await
			.unwrap_err();
		assert!(err.to_string().contains("got missing"));

		assert_state(&session, &StateMatcher::tab(Tab::Settings), opts(100)).await.unwrap();
		let err = assert_state(&session, &StateMatcher::tab(Tab::Vault), opts(100)).await.unwrap_err();
		assert!(err.to_string().contains("tab=settings"));
	}

	#[tokio::test(start_paused = true)]
	async fn evaluate_expectation() {
		let (session, _dir) = test_session(FakeDriver::with_nodes(Vec::new()));
		assert_evaluates(&session, "document.title", &Value::Null, opts(100)).await.unwrap();
		let err = assert_evaluates(&session, "document.title", &Value::String("Crypto3".into()), opts(100))
			.await
			.unwrap_err();
		assert!(matches!(err, HarnessError::AssertionFailed { .. }));
	}
}
