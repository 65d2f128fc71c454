//! WebDriver server management
//!
//! Locates and launches a local `chromedriver`/`geckodriver` process when the
//! harness is asked to spawn one instead of connecting to a running server.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::engine::Browser;
use crate::error::{Error, Result};

/// How long a freshly spawned server gets to start accepting connections.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const STARTUP_POLL: Duration = Duration::from_millis(100);

/// Get the path to the WebDriver server executable for `browser`
///
/// Search order:
/// 1. The browser's env override (`VERI_CHROMEDRIVER` / `VERI_GECKODRIVER`)
/// 2. The binary name on `PATH`
///
/// # Errors
///
/// Returns [`Error::DriverNotFound`] if neither location yields an executable.
pub fn get_driver_executable(browser: Browser) -> Result<PathBuf> {
	if let Some(path) = try_env_override(browser.driver_env_var()) {
		return Ok(path);
	}

	match which::which(browser.driver_binary()) {
		Ok(path) => Ok(path),
		Err(err) => {
			debug!(target = "veri", binary = browser.driver_binary(), error = %err, "driver not on PATH");
			Err(Error::DriverNotFound {
				binary: browser.driver_binary(),
				env_var: browser.driver_env_var(),
			})
		}
	}
}

fn try_env_override(var: &str) -> Option<PathBuf> {
	let value = std::env::var_os(var)?;
	let path = PathBuf::from(value);
	if is_file(&path) {
		return Some(path);
	}
	warn!(
		target = "veri",
		env = var,
		path = %path.display(),
		"driver override does not point at a file; falling back to PATH"
	);
	None
}

fn is_file(path: &Path) -> bool {
	path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

/// A running WebDriver server process owned by the harness.
#[derive(Debug)]
pub struct DriverServer {
	process: Child,
	port: u16,
}

impl DriverServer {
	/// Launch the WebDriver server for `browser` on `port`
	///
	/// Waits until the port accepts TCP connections before returning.
	///
	/// # Errors
	///
	/// Returns [`Error::DriverNotFound`] if the binary cannot be located, and
	/// [`Error::LaunchFailed`] if the process exits early or never listens.
	pub async fn launch(browser: Browser, port: u16) -> Result<Self> {
		let executable = get_driver_executable(browser)?;
		debug!(target = "veri", executable = %executable.display(), port, "launching WebDriver server");

		let mut child = Command::new(&executable)
			.arg(format!("--port={port}"))
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| Error::LaunchFailed(format!("Failed to spawn {}: {e}", executable.display())))?;

		let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
		loop {
			match child.try_wait() {
				Ok(Some(status)) => {
					return Err(Error::LaunchFailed(format!(
						"{} exited immediately with status: {status}",
						executable.display()
					)));
				}
				Ok(None) => {}
				Err(e) => {
					return Err(Error::LaunchFailed(format!("Failed to check process status: {e}")));
				}
			}

			if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
				break;
			}
			if tokio::time::Instant::now() >= deadline {
				let _ = child.start_kill();
				return Err(Error::LaunchFailed(format!(
					"{} did not listen on port {port} within {}s",
					executable.display(),
					STARTUP_TIMEOUT.as_secs()
				)));
			}
			tokio::time::sleep(STARTUP_POLL).await;
		}

		Ok(Self { process: child, port })
	}

	/// Endpoint sessions connect to.
	pub fn url(&self) -> String {
		format!("http://127.0.0.1:{}", self.port)
	}

	/// Shut down the server
	pub async fn shutdown(mut self) -> Result<()> {
		self.process
			.kill()
			.await
			.map_err(|e| Error::LaunchFailed(format!("Failed to kill process: {e}")))?;

		let _ = tokio::time::timeout(Duration::from_millis(500), self.process.wait()).await;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::*;

	#[test]
	fn env_override_must_point_at_a_file() {
		let temp = TempDir::new().unwrap();
		assert!(!is_file(temp.path()));

		let binary = temp.path().join("chromedriver");
		fs::write(&binary, "").unwrap();
		assert!(is_file(&binary));
		assert!(!is_file(&temp.path().join("missing")));
	}

	#[test]
	fn lookup_reports_binary_and_env_var() {
		let result = get_driver_executable(Browser::Firefox);
		match result {
			Ok(path) => {
				println!("Found geckodriver at: {path:?}");
			}
			Err(Error::DriverNotFound { binary, env_var }) => {
				assert_eq!(binary, "geckodriver");
				assert_eq!(env_var, "VERI_GECKODRIVER");
			}
			Err(e) => panic!("Unexpected error: {e:?}"),
		}
	}
}
