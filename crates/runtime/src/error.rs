//! Error types for the driver runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the automation driver or its engine.
///
/// [`Error::is_page_error`] separates refusals by the page under test from
/// failures of the browser connection. Only the latter end a run.
#[derive(Debug, Error)]
pub enum Error {
	/// WebDriver server binary was not found.
	#[error("{binary} not found. Install it, put it on PATH, or set {env_var}")]
	DriverNotFound {
		binary: &'static str,
		env_var: &'static str,
	},

	/// Failed to launch the WebDriver server process.
	#[error("Failed to launch WebDriver server: {0}")]
	LaunchFailed(String),

	/// Failed to open a browser session.
	#[error("Failed to open browser session at {url}: {message}")]
	SessionFailed { url: String, message: String },

	/// A WebDriver command failed.
	#[error("WebDriver command '{command}' failed: {message}")]
	Command {
		command: &'static str,
		message: String,
	},

	/// The page refused an element command: the element was detached,
	/// covered by another element, or not interactable.
	#[error("{command} failed: {message}")]
	Element {
		command: &'static str,
		message: String,
	},

	/// A script run in the page threw.
	#[error("Script error: {0}")]
	Script(String),

	/// An element handle outlived the step that produced it.
	#[error("Stale element handle #{0}")]
	StaleHandle(u64),

	/// Operation attempted on a closed session.
	#[error("Session is closed")]
	SessionClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Timeout waiting for the driver.
	#[error("Timeout: {0}")]
	Timeout(String),
}

/// WebDriver error codes describing the state of the page.
const ELEMENT_CODES: [&str; 6] = [
	"element click intercepted",
	"element not interactable",
	"stale element reference",
	"no such element",
	"invalid element state",
	"move target out of bounds",
];

impl Error {
	pub(crate) fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
		Error::Command {
			command,
			message: err.to_string(),
		}
	}

	/// Classifies a WebDriver error by its W3C error code.
	pub fn from_webdriver(command: &'static str, code: &str, message: impl std::fmt::Display) -> Self {
		if code == "javascript error" {
			return Error::Script(message.to_string());
		}
		let message = format!("{code}: {message}");
		if ELEMENT_CODES.contains(&code) {
			Error::Element { command, message }
		} else {
			Error::Command { command, message }
		}
	}

	/// Failures caused by the page under test rather than the browser.
	pub fn is_page_error(&self) -> bool {
		matches!(self, Error::Element { .. } | Error::Script(_) | Error::StaleHandle(_))
	}

	/// Page failures a later attempt may not see again.
	pub fn is_transient(&self) -> bool {
		matches!(self, Error::Element { .. } | Error::StaleHandle(_))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn intercepted_clicks_are_page_errors() {
		let err = Error::from_webdriver("click", "element click intercepted", "<div class=\"overlay\"> would receive the click");
		assert!(matches!(err, Error::Element { command: "click", .. }));
		assert!(err.is_page_error());
		assert!(err.is_transient());
		assert_eq!(
			err.to_string(),
			"click failed: element click intercepted: <div class=\"overlay\"> would receive the click"
		);
	}

	#[test]
	fn detached_and_missing_elements_are_page_errors() {
		for code in ["element not interactable", "stale element reference", "no such element"] {
			assert!(Error::from_webdriver("text", code, "gone").is_page_error(), "{code}");
		}
	}

	#[test]
	fn script_exceptions_are_page_errors_but_not_transient() {
		let err = Error::from_webdriver("execute", "javascript error", "ReferenceError: foo is not defined");
		assert!(matches!(&err, Error::Script(message) if message.contains("ReferenceError")));
		assert!(err.is_page_error());
		assert!(!err.is_transient());
	}

	#[test]
	fn connection_failures_stay_fatal() {
		let err = Error::from_webdriver("goto", "invalid session id", "session deleted");
		assert!(matches!(err, Error::Command { command: "goto", .. }));
		assert!(!err.is_page_error());
		assert!(!Error::SessionClosed.is_page_error());
	}
}
