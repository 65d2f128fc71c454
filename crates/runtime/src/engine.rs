//! Process-wide driver engine.
//!
//! The engine owns whatever is shared between sessions (a spawned WebDriver
//! server, connection settings) and hands out fully isolated [`Driver`]s.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use fantoccini::ClientBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};
use veri_protocol::Viewport;

use crate::driver::{Driver, SessionOptions};
use crate::error::{Error, Result};
use crate::server::DriverServer;
use crate::webdriver::WebDriverSession;

/// Browser family driven through WebDriver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
	#[default]
	Chromium,
	Firefox,
}

impl Browser {
	pub fn driver_binary(self) -> &'static str {
		match self {
			Browser::Chromium => "chromedriver",
			Browser::Firefox => "geckodriver",
		}
	}

	pub fn driver_env_var(self) -> &'static str {
		match self {
			Browser::Chromium => "VERI_CHROMEDRIVER",
			Browser::Firefox => "VERI_GECKODRIVER",
		}
	}

	/// Port the driver binary listens on by default.
	pub fn default_port(self) -> u16 {
		match self {
			Browser::Chromium => 9515,
			Browser::Firefox => 4444,
		}
	}
}

impl fmt::Display for Browser {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Browser::Chromium => write!(f, "chromium"),
			Browser::Firefox => write!(f, "firefox"),
		}
	}
}

impl FromStr for Browser {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"chromium" | "chrome" => Ok(Browser::Chromium),
			"firefox" | "gecko" => Ok(Browser::Firefox),
			_ => Err(format!("unknown browser: {s}")),
		}
	}
}

/// Shared lifecycle of every browser session in a run.
#[async_trait]
pub trait DriverEngine: Send + Sync {
	/// Opens a fresh session with its own profile and storage.
	async fn open_session(&self, options: &SessionOptions) -> Result<Box<dyn Driver>>;

	/// Stops anything the engine started. Sessions must be closed first.
	async fn shutdown(&self) -> Result<()>;
}

/// Connection settings for [`WebDriverEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
	pub browser: Browser,
	pub headless: bool,
	/// Endpoint of a running WebDriver server. Ignored when `spawn_driver` is set.
	pub webdriver_url: Option<String>,
	/// Start a local driver binary instead of connecting to `webdriver_url`.
	pub spawn_driver: bool,
	pub viewport: Viewport,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			browser: Browser::default(),
			headless: true,
			webdriver_url: None,
			spawn_driver: true,
			viewport: Viewport::DESKTOP,
		}
	}
}

/// Engine backed by a WebDriver server, one fantoccini client per session.
pub struct WebDriverEngine {
	config: EngineConfig,
	server: Mutex<Option<DriverServer>>,
}

impl WebDriverEngine {
	pub fn new(config: EngineConfig) -> Self {
		Self {
			config,
			server: Mutex::new(None),
		}
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Endpoint for new sessions, spawning the server on first use.
	async fn endpoint(&self) -> Result<String> {
		if !self.config.spawn_driver {
			return Ok(self
				.config
				.webdriver_url
				.clone()
				.unwrap_or_else(|| format!("http://127.0.0.1:{}", self.config.browser.default_port())));
		}

		let mut server = self.server.lock().await;
		if let Some(running) = server.as_ref() {
			return Ok(running.url());
		}

		let port = self
			.config
			.webdriver_url
			.as_deref()
			.and_then(port_of)
			.unwrap_or_else(|| self.config.browser.default_port());
		let launched = DriverServer::launch(self.config.browser, port).await?;
		let url = launched.url();
		info!(target = "veri", browser = %self.config.browser, url = %url, "WebDriver server started");
		*server = Some(launched);
		Ok(url)
	}
}

#[async_trait]
impl DriverEngine for WebDriverEngine {
	async fn open_session(&self, options: &SessionOptions) -> Result<Box<dyn Driver>> {
		let url = self.endpoint().await?;
		let viewport = options.viewport.unwrap_or(self.config.viewport);
		let caps = capabilities(self.config.browser, self.config.headless, viewport);

		debug!(target = "veri", url = %url, width = viewport.width, height = viewport.height, "opening session");
		let client = ClientBuilder::rustls()
			.capabilities(caps)
			.connect(&url)
			.await
			.map_err(|e| Error::SessionFailed {
				url: url.clone(),
				message: e.to_string(),
			})?;

		if let Err(e) = client.set_window_size(viewport.width, viewport.height).await {
			debug!(target = "veri", error = %e, "could not set window size");
		}

		Ok(Box::new(WebDriverSession::new(client)))
	}

	async fn shutdown(&self) -> Result<()> {
		if let Some(server) = self.server.lock().await.take() {
			server.shutdown().await?;
			info!(target = "veri", "WebDriver server stopped");
		}
		Ok(())
	}
}

/// Capabilities requesting a fresh, optionally headless browser.
fn capabilities(browser: Browser, headless: bool, viewport: Viewport) -> serde_json::Map<String, serde_json::Value> {
	let mut caps = serde_json::Map::new();
	match browser {
		Browser::Chromium => {
			let mut args = vec![
				"--no-sandbox".to_string(),
				format!("--window-size={},{}", viewport.width, viewport.height),
			];
			if headless {
				args.push("--headless=new".to_string());
				args.push("--disable-gpu".to_string());
				args.push("--disable-dev-shm-usage".to_string());
			}
			caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
		}
		Browser::Firefox => {
			let mut args = vec![format!("--width={}", viewport.width), format!("--height={}", viewport.height)];
			if headless {
				args.push("--headless".to_string());
			}
			caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
		}
	}
	caps
}

/// Port of an `http://host:port[/path]` endpoint.
fn port_of(url: &str) -> Option<u16> {
	let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
	let authority = rest.split('/').next()?;
	authority.rsplit_once(':')?.1.parse().ok()
}
