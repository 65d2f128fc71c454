//! Data model shared by the veri harness crates.
//!
//! Everything here is plain data: scenarios and their steps, locator chains,
//! wait conditions, the sampled application state, and run results. The
//! types serialize to the JSON/YAML shapes used by scenario files and the
//! run summary.

pub mod condition;
pub mod locator;
pub mod result;
pub mod scenario;
pub mod state;

pub use condition::{Condition, ConditionKind};
pub use locator::{Locator, Scope, Strategy, normalize_whitespace, text_matches};
pub use result::{
	Artifact, ArtifactIndexEntry, ArtifactKind, ErrorCode, RunSummary, SCHEMA_VERSION, ScenarioResult,
	ScenarioStatus, StepOutcome, StepResult,
};
pub use scenario::{Scenario, Step, StepEntry, TextMatch, ValidationError, Viewport};
pub use state::{AppState, Lock, Overlay, Phase, StateMatcher, Tab};
