//! Observable application state.
//!
//! These values are never held as authoritative harness state. They are
//! produced by sampling the page and are only as fresh as the last sample.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level phase of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
	/// Timed splash screen, the single entry point.
	Splash,
	/// First-run tutorial modal.
	Tutorial,
	MainApp,
}

/// Top-level panel of the main application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
	Vault,
	Mimic,
	Identity,
	Settings,
	Panic,
}

impl Tab {
	/// Every tab, in navigation order.
	pub const ALL: [Tab; 5] = [Tab::Vault, Tab::Mimic, Tab::Identity, Tab::Settings, Tab::Panic];

	/// Tabs that render a panel heading inside the main layout.
	pub const PANELS: [Tab; 4] = [Tab::Vault, Tab::Mimic, Tab::Identity, Tab::Settings];
}

impl fmt::Display for Tab {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Tab::Vault => "vault",
			Tab::Mimic => "mimic",
			Tab::Identity => "identity",
			Tab::Settings => "settings",
			Tab::Panic => "panic",
		};
		f.write_str(name)
	}
}

impl std::str::FromStr for Tab {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"vault" | "crypt" => Ok(Tab::Vault),
			"mimic" | "stego" => Ok(Tab::Mimic),
			"identity" | "id" => Ok(Tab::Identity),
			"settings" | "config" => Ok(Tab::Settings),
			"panic" => Ok(Tab::Panic),
			_ => Err(format!("unknown tab: {s}")),
		}
	}
}

/// Modal region layered above the active panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overlay {
	#[default]
	None,
	ConfirmDialog,
	PinConfigOpen,
}

/// Panic-mode lock screen state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lock {
	/// Camouflage entry screen is showing.
	Locked,
	/// The entry screen asks for the configured PIN.
	PinPrompt,
	/// The camouflage screen is gone.
	#[default]
	Unlocked,
}

/// One sample of the application's observable regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
	pub phase: Phase,
	/// Set only when exactly one panel is showing.
	pub active_tab: Option<Tab>,
	pub overlay: Overlay,
	pub lock: Lock,
	/// Value of the theme attribute on the document root.
	pub theme: Option<String>,
	/// Every panel whose heading was visible in this sample.
	pub visible_tabs: Vec<Tab>,
}

impl AppState {
	/// The state before anything has rendered.
	pub fn initial() -> Self {
		Self {
			phase: Phase::Splash,
			active_tab: None,
			overlay: Overlay::None,
			lock: Lock::Unlocked,
			theme: None,
			visible_tabs: Vec::new(),
		}
	}

	/// True when no two panel headings were visible at once.
	pub fn is_tab_exclusive(&self) -> bool {
		self.visible_tabs.len() <= 1
	}
}

impl fmt::Display for AppState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "phase={:?}", self.phase)?;
		match self.active_tab {
			Some(tab) => write!(f, " tab={tab}")?,
			None => write!(f, " tab=-")?,
		}
		write!(f, " overlay={:?} lock={:?}", self.overlay, self.lock)?;
		if let Some(theme) = &self.theme {
			write!(f, " theme={theme}")?;
		}
		Ok(())
	}
}

/// Partial expectation over an [`AppState`].
///
/// Absent fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMatcher {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phase: Option<Phase>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub active_tab: Option<Tab>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub overlay: Option<Overlay>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lock: Option<Lock>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub theme: Option<String>,
}

impl StateMatcher {
	pub fn phase(phase: Phase) -> Self {
		Self {
			phase: Some(phase),
			..Default::default()
		}
	}

	/// Main application showing `tab`.
	pub fn tab(tab: Tab) -> Self {
		Self {
			phase: Some(Phase::MainApp),
			active_tab: Some(tab),
			..Default::default()
		}
	}

	pub fn overlay(overlay: Overlay) -> Self {
		Self {
			phase: Some(Phase::MainApp),
			overlay: Some(overlay),
			..Default::default()
		}
	}

	pub fn lock(lock: Lock) -> Self {
		Self {
			lock: Some(lock),
			..Default::default()
		}
	}

	pub fn matches(&self, state: &AppState) -> bool {
		self.phase.is_none_or(|p| p == state.phase)
			&& self.active_tab.is_none_or(|t| state.active_tab == Some(t))
			&& self.overlay.is_none_or(|o| o == state.overlay)
			&& self.lock.is_none_or(|l| l == state.lock)
			&& self.theme.as_ref().is_none_or(|t| state.theme.as_ref() == Some(t))
	}
}

impl fmt::Display for StateMatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut parts = Vec::new();
		if let Some(phase) = self.phase {
			parts.push(format!("phase={phase:?}"));
		}
		if let Some(tab) = self.active_tab {
			parts.push(format!("tab={tab}"));
		}
		if let Some(overlay) = self.overlay {
			parts.push(format!("overlay={overlay:?}"));
		}
		if let Some(lock) = self.lock {
			parts.push(format!("lock={lock:?}"));
		}
		if let Some(theme) = &self.theme {
			parts.push(format!("theme={theme}"));
		}
		if parts.is_empty() {
			return f.write_str("any state");
		}
		f.write_str(&parts.join(" "))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn settings_state() -> AppState {
		AppState {
			phase: Phase::MainApp,
			active_tab: Some(Tab::Settings),
			overlay: Overlay::None,
			lock: Lock::Unlocked,
			theme: Some("sakura".into()),
			visible_tabs: vec![Tab::Settings],
		}
	}

	#[test]
	fn empty_matcher_matches_anything() {
		assert!(StateMatcher::default().matches(&AppState::initial()));
		assert!(StateMatcher::default().matches(&settings_state()));
	}

	#[test]
	fn tab_matcher_requires_main_app() {
		let matcher = StateMatcher::tab(Tab::Settings);
		assert!(matcher.matches(&settings_state()));

		let mut splash = settings_state();
		splash.phase = Phase::Splash;
		assert!(!matcher.matches(&splash));
	}

	#[test]
	fn theme_matcher_compares_value() {
		let matcher = StateMatcher {
			theme: Some("cyberpunk".into()),
			..Default::default()
		};
		assert!(!matcher.matches(&settings_state()));
	}

	#[test]
	fn tab_parses_short_nav_labels() {
		assert_eq!("Config".parse::<Tab>().unwrap(), Tab::Settings);
		assert_eq!("stego".parse::<Tab>().unwrap(), Tab::Mimic);
		assert!("bogus".parse::<Tab>().is_err());
	}

	#[test]
	fn exclusivity_flags_two_headings() {
		let mut state = settings_state();
		assert!(state.is_tab_exclusive());
		state.visible_tabs.push(Tab::Vault);
		assert!(!state.is_tab_exclusive());
	}
}
