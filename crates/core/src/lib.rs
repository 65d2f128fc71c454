//! Scenario-driven UI verification for the Crypto3 web application.
//!
//! A [`Scenario`] is an ordered list of steps (navigate, wait, click, fill,
//! assert, screenshot) executed against one isolated browser [`Session`].
//! Elements are found through declared fallback [`Locator`] chains, waits poll
//! conditions instead of sleeping, and the application's coarse state (phase,
//! active tab, overlay, lock) is derived from what is rendered.
//!
//! ```ignore
//! use std::sync::Arc;
//! use veri::{RunConfig, Runner, app};
//! use veri_runtime::{EngineConfig, WebDriverEngine};
//!
//! let engine = Arc::new(WebDriverEngine::new(EngineConfig::default()));
//! let config = RunConfig::default();
//! let scenarios = app::catalogue(&config.profile);
//! let report = Runner::new(engine.clone(), config).run(scenarios).await;
//! engine.shutdown().await?;
//! std::process::exit(report.exit_code());
//! ```

pub mod app;
pub mod artifacts;
pub mod assert;
pub mod error;
pub mod load;
pub mod locate;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod state;
pub mod testing;
pub mod wait;

pub use error::{HarnessError, Result};
pub use locate::{Resolved, resolve};
pub use report::RunReport;
pub use runner::{RunConfig, Runner};
pub use scenario::{ScenarioEngine, Verdict};
pub use session::{Session, SessionContext};
pub use state::{AppProfile, sample};
pub use veri_protocol::{
	AppState, Condition, Locator, RunSummary, Scenario, ScenarioResult, ScenarioStatus, StateMatcher, Step, StepEntry,
	Strategy, Tab, Viewport,
};
pub use wait::{WaitOptions, await_condition};
