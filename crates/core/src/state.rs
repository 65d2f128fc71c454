//! Application state model.
//!
//! [`AppProfile`] binds every observable region of the application to a
//! locator chain. [`sample`] derives an [`AppState`] from those regions; it
//! reads only and never drives the page.

use veri_protocol::{AppState, Lock, Locator, Overlay, Phase, Scope, Strategy, Tab};
use veri_runtime::Driver;

use crate::error::Result;
use crate::locate::any_visible;

/// CSS path of the desktop side navigation buttons.
pub const DESKTOP_NAV: &str = "nav.hidden.md\\:flex button";

/// CSS path of the mobile bottom navigation buttons.
pub const MOBILE_NAV: &str = "nav.md\\:hidden button";

/// Locators for one top-level tab.
#[derive(Debug, Clone, PartialEq)]
pub struct TabBinding {
	pub tab: Tab,
	/// Navigation control selecting the tab.
	pub nav: Locator,
	/// Panel heading; absent for tabs without a panel.
	pub heading: Option<Locator>,
	pub heading_text: Option<String>,
	/// Subtitle rendered under the heading.
	pub tagline: Option<String>,
	/// `aria-label` of the tab's mobile navigation button.
	pub mobile_label: String,
}

/// Persisted preference keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
	pub tutorial_seen: String,
	pub theme: String,
	pub panic_pin: String,
}

/// Every locator the state model and the transition builders rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct AppProfile {
	pub splash: Locator,
	/// How long the splash screen stays up on its own.
	pub splash_ms: u64,
	pub tutorial: Locator,
	pub skip_intro: Locator,
	/// Text that is only rendered once the main layout is up.
	pub app_marker: Locator,
	pub tabs: Vec<TabBinding>,
	pub mobile_nav: String,
	pub panic_screen: Locator,
	pub panic_flavor: Locator,
	pub access_terminal: Locator,
	pub pin_prompt: Locator,
	pub panic_pin_input: Locator,
	pub panic_pin_submit: Locator,
	/// Shown briefly after a rejected PIN.
	pub pin_denied: Locator,
	pub danger_execute: Locator,
	pub confirm_text: Locator,
	pub confirm_cancel: Locator,
	pub pin_configure: Locator,
	pub pin_input: Locator,
	pub pin_confirm: Locator,
	pub generate_identity: Locator,
	/// Only rendered once a generated identity card is ready.
	pub download_card: Locator,
	pub title: String,
	/// Expected `href` of the `link[rel='icon']` element.
	pub favicon_href: String,
	/// Root element attribute carrying the active theme.
	pub theme_attribute: String,
	pub themes: Vec<String>,
	pub default_theme: String,
	pub storage: StorageKeys,
}

impl Default for AppProfile {
	fn default() -> Self {
		Self::crypto3()
	}
}

impl AppProfile {
	/// Bindings for the Crypto3 client.
	pub fn crypto3() -> Self {
		let tabs = vec![
			panel_tab(Tab::Vault, 0, &["Crypt", "Vault"], "Crypt", "Cryptographic Vault", "Securely encrypt and decrypt messages using AES-256-GCM or ECC-X25519."),
			panel_tab(Tab::Mimic, 1, &["Mimic", "Stego"], "Stego", "LSB Steganography Lab", "Hide encrypted payloads inside innocuous images."),
			panel_tab(Tab::Identity, 2, &["ID", "Identity"], "ID", "Digital Identity", "Manage your cryptographic identity and verified contacts."),
			panel_tab(Tab::Settings, 3, &["Config", "Settings"], "Config", "System Configuration", "Customize your interface, manage data, and view achievements."),
			TabBinding {
				tab: Tab::Panic,
				nav: Locator::new(Strategy::attribute("data-testid", "nav-panic"))
					.or(Strategy::attribute("aria-label", "Panic Mode"))
					.or(Strategy::attribute("aria-label", "Panic"))
					.labeled("panic tab"),
				heading: None,
				heading_text: None,
				tagline: None,
				mobile_label: "Panic".into(),
			},
		];

		Self {
			splash: Locator::text("System Initialization...").labeled("splash screen"),
			splash_ms: 2500,
			tutorial: Locator::text("Welcome to Crypto3!").labeled("tutorial"),
			skip_intro: Locator::new(Strategy::attribute("title", "Skip Intro"))
				.or(Strategy::role("button", "Skip Intro"))
				.labeled("Skip Intro"),
			app_marker: Locator::new(Strategy::text_exact("CRYPTO3")).nth(0).labeled("app header"),
			tabs,
			mobile_nav: MOBILE_NAV.into(),
			panic_screen: Locator::text("Rhine Lab").labeled("panic screen"),
			panic_flavor: Locator::text("359号基地"),
			access_terminal: Locator::new(Strategy::text_exact("ACCESS TERMINAL"))
				.or(Strategy::role("button", "Access Terminal"))
				.labeled("ACCESS TERMINAL"),
			pin_prompt: Locator::text("Security Clearance").labeled("PIN prompt"),
			panic_pin_input: Locator::new(Strategy::placeholder("Enter PIN"))
				.or(Strategy::css("input[type='password']"))
				.labeled("panic PIN input"),
			panic_pin_submit: Locator::new(Strategy::role("button", "Unlock"))
				.or(Strategy::css("form button[type='submit']"))
				.labeled("unlock button"),
			pin_denied: Locator::text("Access Denied").labeled("access denied notice"),
			danger_execute: Locator::role("button", "Execute")
				.within(Scope::new(".glass-panel").has_text("Danger Zone"))
				.labeled("Danger Zone Execute"),
			confirm_text: Locator::text("Are you sure you want to wipe all data?").labeled("wipe confirmation"),
			confirm_cancel: Locator::new(Strategy::role_exact("button", "Cancel")).labeled("Cancel"),
			pin_configure: Locator::role("button", "Configure").labeled("Configure"),
			pin_input: Locator::new(Strategy::placeholder("Enter PIN...")).labeled("PIN input"),
			pin_confirm: Locator::new(Strategy::attribute("aria-label", "Confirm"))
				.or(Strategy::role_exact("button", "Confirm"))
				.labeled("Confirm"),
			generate_identity: Locator::role("button", "Generate Identity")
				.or(Strategy::text("Generate Identity"))
				.labeled("Generate Identity"),
			download_card: Locator::role("button", "Download Card")
				.or(Strategy::text("Download Card"))
				.labeled("Download Card"),
			title: "Crypto3".into(),
			favicon_href: "/src/assets/electron.svg".into(),
			theme_attribute: "data-theme".into(),
			themes: ["cyberpunk", "light", "midnight", "sakura"].map(String::from).to_vec(),
			default_theme: "sakura".into(),
			storage: StorageKeys {
				tutorial_seen: "hasSeenTutorial".into(),
				theme: "theme".into(),
				panic_pin: "panicPin".into(),
			},
		}
	}

	pub fn tab(&self, tab: Tab) -> Option<&TabBinding> {
		self.tabs.iter().find(|binding| binding.tab == tab)
	}

	/// Theme selection button, found by its display name.
	pub fn theme_button(&self, theme: &str) -> Locator {
		let display = title_case(theme);
		Locator::role("button", &display)
			.or(Strategy::text(display.clone()))
			.labeled(format!("{display} theme button"))
	}

	/// The document root, carrier of the theme attribute.
	pub fn root(&self) -> Locator {
		Locator::css("html").labeled("document root")
	}
}

fn panel_tab(tab: Tab, position: usize, labels: &[&str], mobile_label: &str, heading: &str, tagline: &str) -> TabBinding {
	let mut nav = Locator::new(Strategy::attribute("data-testid", format!("nav-{tab}")));
	for label in labels {
		nav = nav.or(Strategy::attribute("aria-label", *label));
	}
	nav = nav.or(Strategy::nth(DESKTOP_NAV, position)).labeled(format!("{tab} tab"));

	TabBinding {
		tab,
		nav,
		heading: Some(
			Locator::new(Strategy::role_exact("heading", heading))
				.or(Strategy::text_exact(heading))
				.labeled(format!("{heading} heading")),
		),
		heading_text: Some(heading.into()),
		tagline: Some(tagline.into()),
		mobile_label: mobile_label.into(),
	}
}

fn title_case(word: &str) -> String {
	let mut chars = word.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// Samples the application's observable regions.
///
/// The result is only as fresh as the queries that produced it and is never
/// kept as harness state.
pub async fn sample(driver: &dyn Driver, profile: &AppProfile) -> Result<AppState> {
	let phase = if any_visible(driver, &profile.splash).await? {
		Phase::Splash
	} else if any_visible(driver, &profile.tutorial).await? {
		Phase::Tutorial
	} else {
		Phase::MainApp
	};

	let mut visible_tabs = Vec::new();
	let (active_tab, lock) = if phase == Phase::MainApp && any_visible(driver, &profile.panic_screen).await? {
		let lock = if any_visible(driver, &profile.pin_prompt).await? {
			Lock::PinPrompt
		} else {
			Lock::Locked
		};
		(Some(Tab::Panic), lock)
	} else {
		if phase == Phase::MainApp {
			for binding in &profile.tabs {
				if let Some(heading) = &binding.heading {
					if any_visible(driver, heading).await? {
						visible_tabs.push(binding.tab);
					}
				}
			}
		}
		let active = match visible_tabs.as_slice() {
			[only] => Some(*only),
			_ => None,
		};
		(active, Lock::Unlocked)
	};

	let overlay = if phase != Phase::MainApp {
		Overlay::None
	} else if any_visible(driver, &profile.confirm_text).await? {
		Overlay::ConfirmDialog
	} else if any_visible(driver, &profile.pin_input).await? {
		Overlay::PinConfigOpen
	} else {
		Overlay::None
	};

	let theme = driver.root_attribute(&profile.theme_attribute).await?;

	Ok(AppState {
		phase,
		active_tab,
		overlay,
		lock,
		theme,
		visible_tabs,
	})
}
