//! Transitions of the application state machine, as scenario steps.
//!
//! Every builder pairs the physical action with a confirming `wait_for`, so a
//! transition is never assumed complete just because a click went through.
//! The built-in scenario catalogue is assembled from these builders.

use veri_protocol::{
	Condition, Lock, Locator, Phase, Scenario, StateMatcher, Step, StepEntry, Tab, TextMatch, Viewport,
};

use crate::state::{AppProfile, DESKTOP_NAV};

/// How long onboarding may take to show either the tutorial or the app.
pub const ONBOARDING_TIMEOUT_MS: u64 = 5000;

/// Budget for the optional "Skip Intro" click.
pub const SKIP_INTRO_TIMEOUT_MS: u64 = 1000;

/// Key generation runs in the page and may take a while.
pub const IDENTITY_TIMEOUT_MS: u64 = 15_000;

/// Script yielding whether the document links a favicon.
pub const FAVICON_PRESENT: &str = "document.querySelector(\"link[rel='icon']\") !== null";

/// Script yielding the favicon link's `href`.
pub const FAVICON_HREF: &str = "document.querySelector(\"link[rel='icon']\")?.getAttribute(\"href\")";

fn wait(condition: Condition) -> StepEntry {
	Step::WaitFor {
		condition,
		timeout_ms: None,
		poll_ms: None,
	}
	.into()
}

fn wait_within(condition: Condition, timeout_ms: u64) -> StepEntry {
	Step::WaitFor {
		condition,
		timeout_ms: Some(timeout_ms),
		poll_ms: None,
	}
	.into()
}

fn click(locator: &Locator) -> StepEntry {
	Step::Click {
		locator: locator.clone(),
		timeout_ms: None,
	}
	.into()
}

fn labeled(mut entry: StepEntry, label: &str) -> StepEntry {
	entry.label = Some(label.to_string());
	entry
}

/// The main layout is up: no splash, no tutorial, header rendered.
pub fn main_app_ready(profile: &AppProfile) -> Condition {
	Condition::all_of(vec![
		Condition::in_state(StateMatcher::phase(Phase::MainApp)),
		Condition::visible(profile.app_marker.clone()),
	])
}

/// Splash → (Tutorial →) MainApp.
pub fn dismiss_onboarding(profile: &AppProfile) -> Vec<StepEntry> {
	let skip = StepEntry {
		step: Step::Click {
			locator: profile.skip_intro.clone(),
			timeout_ms: Some(SKIP_INTRO_TIMEOUT_MS),
		},
		best_effort: true,
		label: Some("skip intro if shown".into()),
	};
	vec![
		labeled(
			wait_within(
				Condition::any_of(vec![Condition::visible(profile.tutorial.clone()), main_app_ready(profile)]),
				ONBOARDING_TIMEOUT_MS,
			),
			"splash finished",
		),
		skip,
		labeled(wait(main_app_ready(profile)), "main app ready"),
	]
}

/// Clicks a tab's navigation and waits until its panel is the only one showing.
pub fn select_tab(profile: &AppProfile, tab: Tab) -> Vec<StepEntry> {
	let Some(binding) = profile.tab(tab) else {
		return Vec::new();
	};
	let confirm = if tab == Tab::Panic {
		StateMatcher {
			active_tab: Some(Tab::Panic),
			lock: Some(Lock::Locked),
			..Default::default()
		}
	} else {
		StateMatcher::tab(tab)
	};
	vec![click(&binding.nav), wait(Condition::in_state(confirm))]
}

pub fn open_confirm_dialog(profile: &AppProfile) -> Vec<StepEntry> {
	vec![click(&profile.danger_execute), wait(Condition::visible(profile.confirm_text.clone()))]
}

/// Cancels the dialog and waits until its text is gone, not merely clicked.
pub fn cancel_confirm_dialog(profile: &AppProfile) -> Vec<StepEntry> {
	vec![click(&profile.confirm_cancel), wait(Condition::absent(profile.confirm_text.clone()))]
}

/// Configure → fill → Confirm, ending with the input gone and Configure back.
pub fn configure_pin(profile: &AppProfile, pin: &str) -> Vec<StepEntry> {
	vec![
		click(&profile.pin_configure),
		wait(Condition::visible(profile.pin_input.clone())),
		Step::Fill {
			locator: profile.pin_input.clone(),
			value: pin.to_string(),
			timeout_ms: None,
		}
		.into(),
		click(&profile.pin_confirm),
		wait(Condition::all_of(vec![
			Condition::absent(profile.pin_input.clone()),
			Condition::visible(profile.pin_configure.clone()),
		])),
	]
}

pub fn enter_panic(profile: &AppProfile) -> Vec<StepEntry> {
	select_tab(profile, Tab::Panic)
}

/// Leaves the camouflage screen directly, or reaches the PIN prompt.
pub fn access_terminal(profile: &AppProfile) -> Vec<StepEntry> {
	vec![
		click(&profile.access_terminal),
		wait(Condition::any_of(vec![
			Condition::in_state(StateMatcher::lock(Lock::PinPrompt)),
			Condition::in_state(StateMatcher {
				phase: Some(Phase::MainApp),
				lock: Some(Lock::Unlocked),
				..Default::default()
			}),
		])),
	]
}

/// Submits a PIN and waits until the screen either unlocks or rejects it.
pub fn submit_panic_pin(profile: &AppProfile, pin: &str) -> Vec<StepEntry> {
	vec![
		Step::Fill {
			locator: profile.panic_pin_input.clone(),
			value: pin.to_string(),
			timeout_ms: None,
		}
		.into(),
		click(&profile.panic_pin_submit),
		wait(Condition::any_of(vec![
			Condition::in_state(StateMatcher::lock(Lock::Unlocked)),
			Condition::visible(profile.pin_denied.clone()),
		])),
	]
}

pub fn set_theme(profile: &AppProfile, theme: &str) -> Vec<StepEntry> {
	vec![
		click(&profile.theme_button(theme)),
		wait(Condition::attribute_equals(
			profile.root(),
			profile.theme_attribute.clone(),
			Some(theme.to_string()),
		)),
	]
}

/// Generates an identity and waits for its card to become downloadable.
pub fn generate_identity(profile: &AppProfile) -> Vec<StepEntry> {
	vec![
		click(&profile.generate_identity),
		labeled(
			wait_within(Condition::visible(profile.download_card.clone()), IDENTITY_TIMEOUT_MS),
			"identity card ready",
		),
	]
}

/// Writes one persisted preference. Only valid in the setup prefix.
pub fn seed_storage(key: &str, value: &str) -> StepEntry {
	let quote = |s: &str| serde_json::Value::String(s.to_string()).to_string();
	Step::Evaluate {
		script: format!("localStorage.setItem({}, {})", quote(key), quote(value)),
		setup: true,
		expected: None,
	}
	.into()
}

/// Script reading one persisted preference.
pub fn read_storage(key: &str) -> String {
	format!("localStorage.getItem({})", serde_json::Value::String(key.to_string()))
}

fn navigate_root() -> Step {
	Step::Navigate { url: "/".into() }
}

fn expect_visible(locator: &Locator, visible: bool, timeout_ms: Option<u64>) -> Step {
	Step::AssertVisible {
		locator: locator.clone(),
		visible,
		timeout_ms,
	}
}

/// Names of the built-in scenarios, in catalogue order.
pub const BUILTIN_NAMES: [&str; 9] = [
	"settings-dialog",
	"pin-round-trip",
	"panel-headers",
	"theme-persistence",
	"panic-gating",
	"mobile-nav-labels",
	"onboarding-bypass",
	"identity-generation",
	"page-metadata",
];

/// Every built-in scenario.
pub fn catalogue(profile: &AppProfile) -> Vec<Scenario> {
	BUILTIN_NAMES
		.iter()
		.filter_map(|name| builtin(profile, name))
		.collect()
}

/// One built-in scenario by name.
pub fn builtin(profile: &AppProfile, name: &str) -> Option<Scenario> {
	let scenario = match name {
		"settings-dialog" => settings_dialog(profile),
		"pin-round-trip" => pin_round_trip(profile),
		"panel-headers" => panel_headers(profile),
		"theme-persistence" => theme_persistence(profile),
		"panic-gating" => panic_gating(profile),
		"mobile-nav-labels" => mobile_nav_labels(profile),
		"onboarding-bypass" => onboarding_bypass(profile),
		"identity-generation" => identity_generation(profile),
		"page-metadata" => page_metadata(profile),
		_ => return None,
	};
	Some(scenario.tag("builtin"))
}

fn settings_dialog(profile: &AppProfile) -> Scenario {
	let settings = profile.tab(Tab::Settings).and_then(|binding| binding.heading.clone());
	let mut scenario = Scenario::new("settings-dialog")
		.describe("Open and cancel the wipe confirmation in the Danger Zone")
		.step(navigate_root())
		.entries(dismiss_onboarding(profile))
		.entries(select_tab(profile, Tab::Settings));
	if let Some(heading) = settings {
		scenario = scenario.step(expect_visible(&heading, true, Some(3000)));
	}
	scenario
		.entries(open_confirm_dialog(profile))
		.step(expect_visible(&profile.confirm_text, true, None))
		.entries(cancel_confirm_dialog(profile))
		.step(expect_visible(&profile.confirm_text, false, None))
		.step(Step::AssertState {
			expect: StateMatcher::overlay(veri_protocol::Overlay::None),
			timeout_ms: None,
		})
}

fn pin_round_trip(profile: &AppProfile) -> Scenario {
	Scenario::new("pin-round-trip")
		.describe("Configure a panic PIN and return to the idle PIN panel")
		.step(navigate_root())
		.entries(dismiss_onboarding(profile))
		.entries(select_tab(profile, Tab::Settings))
		.entries(configure_pin(profile, "1234"))
		.step(expect_visible(&profile.pin_configure, true, None))
		.step(expect_visible(&profile.pin_input, false, None))
		.step(Step::Evaluate {
			script: read_storage(&profile.storage.panic_pin),
			setup: false,
			expected: Some("1234".into()),
		})
}

fn panel_headers(profile: &AppProfile) -> Scenario {
	let mut scenario = Scenario::new("panel-headers")
		.describe("Every panel shows its own heading and tagline, one at a time")
		.step(navigate_root())
		.entries(dismiss_onboarding(profile));
	for tab in Tab::PANELS {
		let Some(binding) = profile.tab(tab) else {
			continue;
		};
		scenario = scenario.entries(select_tab(profile, tab));
		if let (Some(heading), Some(text)) = (&binding.heading, &binding.heading_text) {
			scenario = scenario.step(Step::AssertText {
				locator: heading.clone(),
				expected: TextMatch::Exact(text.clone()),
				timeout_ms: None,
			});
		}
		if let Some(tagline) = &binding.tagline {
			scenario = scenario.step(expect_visible(&Locator::text(tagline), true, None));
		}
		scenario = scenario.step(Step::Screenshot {
			path: format!("panels/{tab}.png"),
		});
	}
	scenario
}

fn theme_persistence(profile: &AppProfile) -> Scenario {
	let theme = "cyberpunk";
	Scenario::new("theme-persistence")
		.describe("A selected theme survives a reload")
		.step(navigate_root())
		.entries(dismiss_onboarding(profile))
		.entries(select_tab(profile, Tab::Settings))
		.entries(set_theme(profile, theme))
		.step(Step::Reload {})
		.entries(dismiss_onboarding(profile))
		.step(Step::AssertAttribute {
			locator: profile.root(),
			name: profile.theme_attribute.clone(),
			expected: Some(theme.into()),
			timeout_ms: None,
		})
		.step(Step::Evaluate {
			script: read_storage(&profile.storage.theme),
			setup: false,
			expected: Some(theme.into()),
		})
}

fn panic_gating(profile: &AppProfile) -> Scenario {
	Scenario::new("panic-gating")
		.describe("With a PIN configured, Access Terminal asks for it instead of unlocking")
		.step(navigate_root())
		.entries([
			seed_storage(&profile.storage.panic_pin, "1234"),
			seed_storage(&profile.storage.tutorial_seen, "true"),
		])
		.step(Step::Reload {})
		.entries(dismiss_onboarding(profile))
		.entries(enter_panic(profile))
		.entries(access_terminal(profile))
		.step(Step::AssertState {
			expect: StateMatcher::lock(Lock::PinPrompt),
			timeout_ms: None,
		})
		.step(expect_visible(&profile.panic_pin_input, true, None))
		.entries(submit_panic_pin(profile, "0000"))
		.step(Step::AssertState {
			expect: StateMatcher::lock(Lock::PinPrompt),
			timeout_ms: None,
		})
}

fn mobile_nav_labels(profile: &AppProfile) -> Scenario {
	let mut scenario = Scenario::new("mobile-nav-labels")
		.describe("The bottom navigation carries accessible labels on small screens")
		.viewport(Viewport::MOBILE)
		.step(navigate_root())
		.entries(dismiss_onboarding(profile));
	for (position, binding) in profile.tabs.iter().enumerate() {
		scenario = scenario.step(Step::AssertAttribute {
			locator: Locator::css(&profile.mobile_nav)
				.nth(position)
				.labeled(format!("mobile nav button {position}")),
			name: "aria-label".into(),
			expected: Some(binding.mobile_label.clone()),
			timeout_ms: None,
		});
	}
	scenario.step(expect_visible(&Locator::css(DESKTOP_NAV).labeled("desktop nav"), false, None))
}

fn onboarding_bypass(profile: &AppProfile) -> Scenario {
	Scenario::new("onboarding-bypass")
		.describe("A stored tutorial flag skips the tutorial after reload")
		.step(navigate_root())
		.entries([seed_storage(&profile.storage.tutorial_seen, "true")])
		.step(Step::Reload {})
		.step(Step::WaitFor {
			condition: main_app_ready(profile),
			timeout_ms: Some(ONBOARDING_TIMEOUT_MS),
			poll_ms: None,
		})
		.step(expect_visible(&profile.tutorial, false, None))
		.step(Step::AssertState {
			expect: StateMatcher::tab(Tab::Vault),
			timeout_ms: None,
		})
}

fn identity_generation(profile: &AppProfile) -> Scenario {
	Scenario::new("identity-generation")
		.describe("Generating an identity produces a downloadable card")
		.step(navigate_root())
		.entries(dismiss_onboarding(profile))
		.entries(select_tab(profile, Tab::Identity))
		.step(expect_visible(&profile.download_card, false, None))
		.entries(generate_identity(profile))
		.step(Step::Screenshot {
			path: "identity/generated.png".into(),
		})
}

/// Document title and favicon. A favicon pointing elsewhere is tolerated.
fn page_metadata(profile: &AppProfile) -> Scenario {
	let href_matches = StepEntry {
		step: Step::Evaluate {
			script: FAVICON_HREF.into(),
			setup: false,
			expected: Some(profile.favicon_href.clone().into()),
		},
		best_effort: true,
		label: Some("favicon href".into()),
	};
	Scenario::new("page-metadata")
		.describe("The document is titled for the app and links its favicon")
		.step(navigate_root())
		.step(Step::Evaluate {
			script: "document.title".into(),
			setup: false,
			expected: Some(profile.title.clone().into()),
		})
		.step(Step::Evaluate {
			script: FAVICON_PRESENT.into(),
			setup: false,
			expected: Some(true.into()),
		})
		.entries([href_matches])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_builtin_validates() {
		let profile = AppProfile::crypto3();
		let scenarios = catalogue(&profile);
		assert_eq!(scenarios.len(), BUILTIN_NAMES.len());
		for scenario in &scenarios {
			scenario.validate().unwrap_or_else(|e| panic!("{}: {e}", scenario.name));
			assert!(scenario.has_tag("builtin"));
		}
		assert!(builtin(&profile, "nope").is_none());
	}

	#[test]
	fn seeding_quotes_values() {
		let entry = seed_storage("panicPin", "12\"34");
		match entry.step {
			Step::Evaluate { script, setup, .. } => {
				assert!(setup);
				assert_eq!(script, r#"localStorage.setItem("panicPin", "12\"34")"#);
			}
			other => panic!("unexpected step {other}"),
		}
	}

	#[test]
	fn onboarding_skip_is_best_effort_and_short() {
		let steps = dismiss_onboarding(&AppProfile::crypto3());
		assert_eq!(steps.len(), 3);
		assert!(steps[1].best_effort);
		assert!(matches!(
			steps[1].step,
			Step::Click {
				timeout_ms: Some(SKIP_INTRO_TIMEOUT_MS),
				..
			}
		));
	}

	#[test]
	fn panic_selection_waits_for_lock_screen() {
		let steps = enter_panic(&AppProfile::crypto3());
		match &steps[1].step {
			Step::WaitFor { condition, .. } => assert_eq!(condition.to_string(), "state(tab=panic lock=Locked)"),
			other => panic!("unexpected step {other}"),
		}
	}

	#[test]
	fn identity_card_gets_the_keygen_budget() {
		let steps = generate_identity(&AppProfile::crypto3());
		assert!(matches!(
			steps[1].step,
			Step::WaitFor {
				timeout_ms: Some(IDENTITY_TIMEOUT_MS),
				..
			}
		));
	}

	#[test]
	fn favicon_href_mismatch_is_tolerated() {
		let scenario = builtin(&AppProfile::crypto3(), "page-metadata").unwrap();
		let last = scenario.steps.last().unwrap();
		assert!(last.best_effort);
		assert!(scenario.steps[..scenario.steps.len() - 1].iter().all(|entry| !entry.best_effort));
	}

	#[test]
	fn mobile_scenario_uses_mobile_viewport() {
		let scenario = builtin(&AppProfile::crypto3(), "mobile-nav-labels").unwrap();
		assert_eq!(scenario.viewport, Some(Viewport::MOBILE));
	}
}
