use std::path::PathBuf;

use thiserror::Error;
use veri::HarnessError;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, VeriError>;

#[derive(Debug, Error)]
pub enum VeriError {
	#[error("config error in {}: {message}", path.display())]
	Config { path: PathBuf, message: String },

	#[error("unknown built-in scenario '{0}' (see `veri list`)")]
	UnknownScenario(String),

	#[error("no scenarios to run: pass scenario files, --builtin NAME or --all-builtins")]
	NoScenarios,

	#[error(transparent)]
	Harness(#[from] HarnessError),

	#[error(transparent)]
	Driver(#[from] veri_runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl VeriError {
	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let (code, details) = match self {
			VeriError::Config { path, .. } => (ErrorCode::ConfigError, Some(serde_json::json!({ "path": path }))),
			VeriError::UnknownScenario(name) => (ErrorCode::InvalidInput, Some(serde_json::json!({ "name": name }))),
			VeriError::NoScenarios => (ErrorCode::InvalidInput, None),
			VeriError::Harness(err) => (err.code().into(), None),
			VeriError::Driver(_) => (ErrorCode::DriverError, None),
			VeriError::Io(_) => (ErrorCode::IoError, None),
			VeriError::Anyhow(_) => (ErrorCode::InternalError, None),
		};

		CommandError {
			code,
			message: self.to_string(),
			details,
		}
	}
}
