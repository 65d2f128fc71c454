//! Diagnostic artifacts.
//!
//! Failure captures are best-effort: a screenshot or excerpt that cannot be
//! taken is logged and skipped so the original error stays the one reported.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use veri_protocol::{Artifact, ArtifactKind};
use veri_runtime::Driver;

use crate::error::{HarnessError, Result};

/// Longest DOM text excerpt written on failure, in characters.
pub const EXCERPT_LIMIT: usize = 2000;

/// Writes artifacts under one scenario's directory.
#[derive(Debug, Clone)]
pub struct ArtifactCollector {
	dir: PathBuf,
}

impl ArtifactCollector {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Captures `step-NN-<action>-failure.png` and `.txt`.
	pub async fn capture_failure(&self, driver: &dyn Driver, step: usize, action: &str) -> Vec<Artifact> {
		let mut collected = Vec::new();

		if let Err(e) = fs::create_dir_all(&self.dir).await {
			warn!(target = "veri", dir = %self.dir.display(), error = %e, "cannot create artifact directory");
			return collected;
		}

		let stem = format!("step-{step:02}-{action}-failure");

		match driver.screenshot().await {
			Ok(bytes) => {
				let path = self.dir.join(format!("{stem}.png"));
				match write(&path, &bytes, ArtifactKind::Screenshot).await {
					Ok(artifact) => collected.push(artifact),
					Err(e) => warn!(target = "veri", error = %e, "failed to save failure screenshot"),
				}
			}
			Err(e) => warn!(target = "veri", error = %e, "failed to capture failure screenshot"),
		}

		match driver.page_text().await {
			Ok(text) => {
				let path = self.dir.join(format!("{stem}.txt"));
				match write(&path, excerpt(&text, EXCERPT_LIMIT).as_bytes(), ArtifactKind::Text).await {
					Ok(artifact) => collected.push(artifact),
					Err(e) => warn!(target = "veri", error = %e, "failed to save DOM excerpt"),
				}
			}
			Err(e) => warn!(target = "veri", error = %e, "failed to read page text"),
		}

		debug!(
			target = "veri",
			count = collected.len(),
			dir = %self.dir.display(),
			"collected failure artifacts"
		);
		collected
	}

	/// Saves an explicit screenshot at `relative` inside the scenario directory.
	///
	/// # Errors
	///
	/// [`HarnessError::InvalidScenario`] when `relative` escapes the directory.
	pub async fn save_screenshot(&self, driver: &dyn Driver, relative: &str) -> Result<Artifact> {
		let relative = Path::new(relative);
		let escapes = relative
			.components()
			.any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
		if escapes || relative.as_os_str().is_empty() {
			return Err(HarnessError::InvalidScenario(format!(
				"screenshot path must stay inside the artifact directory: {}",
				relative.display()
			)));
		}

		let path = self.dir.join(relative);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await.map_err(|e| HarnessError::io(parent, e))?;
		}
		let bytes = driver.screenshot().await?;
		write(&path, &bytes, ArtifactKind::Screenshot).await
	}
}

async fn write(path: &Path, bytes: &[u8], kind: ArtifactKind) -> Result<Artifact> {
	fs::write(path, bytes).await.map_err(|e| HarnessError::io(path, e))?;
	Ok(Artifact::new(kind, path, Some(bytes.len() as u64)))
}

/// First `limit` characters of `text`, marked when cut.
pub fn excerpt(text: &str, limit: usize) -> String {
	match text.char_indices().nth(limit) {
		Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
		None => text.to_string(),
	}
}
