//! In-memory doubles for the driver layer.
//!
//! [`FakeDriver`] implements [`Driver`] over a [`FakePage`]: either a fixed
//! list of [`FakeNode`]s or a [`SimulatedApp`], a small model of the Crypto3
//! client with the same timings, storage keys and accessible bindings the
//! harness relies on. [`FakeEngine`] opens one isolated simulated app per
//! session, so whole runs can be exercised without a browser.
//!
//! # Example
//!
//! ```ignore
//! use veri::testing::{FakeDriver, FakeNode};
//!
//! let driver = FakeDriver::with_nodes(vec![
//!     FakeNode::new("h2").text("System Configuration"),
//!     FakeNode::new("button").text("Execute").within(".glass-panel", "Danger Zone"),
//! ]);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use veri_protocol::{Scope, Strategy, Tab, Viewport, text_matches};
use veri_runtime::{Driver, DriverEngine, ElementHandle, Error, Result, SessionOptions};

use crate::state::{DESKTOP_NAV, MOBILE_NAV};

/// First bytes of every fake screenshot.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nveri-fake";

/// One rendered element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeNode {
	/// Identity that survives re-renders.
	pub key: String,
	pub tag: String,
	pub text: String,
	pub attrs: BTreeMap<String, String>,
	/// CSS selectors this node satisfies besides its tag name.
	pub selectors: Vec<String>,
	pub visible: bool,
	/// Enclosing containers as `(selector, container text)`.
	pub containers: Vec<(String, String)>,
}

impl FakeNode {
	pub fn new(tag: &str) -> Self {
		Self {
			key: String::new(),
			tag: tag.to_string(),
			text: String::new(),
			attrs: BTreeMap::new(),
			selectors: Vec::new(),
			visible: true,
			containers: Vec::new(),
		}
	}

	pub fn key(mut self, key: &str) -> Self {
		self.key = key.to_string();
		self
	}

	pub fn text(mut self, text: &str) -> Self {
		self.text = text.to_string();
		self
	}

	pub fn attr(mut self, name: &str, value: &str) -> Self {
		self.attrs.insert(name.to_string(), value.to_string());
		self
	}

	pub fn css(mut self, selector: &str) -> Self {
		self.selectors.push(selector.to_string());
		self
	}

	pub fn hidden(self) -> Self {
		self.shown(false)
	}

	pub fn shown(mut self, visible: bool) -> Self {
		self.visible = visible;
		self
	}

	pub fn within(mut self, selector: &str, container_text: &str) -> Self {
		self.containers.push((selector.to_string(), container_text.to_string()));
		self
	}

	fn role(&self) -> Option<&str> {
		if let Some(role) = self.attrs.get("role") {
			return Some(role);
		}
		match self.tag.as_str() {
			"button" => Some("button"),
			"h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("heading"),
			"a" => Some("link"),
			"textarea" => Some("textbox"),
			"dialog" => Some("dialog"),
			"nav" => Some("navigation"),
			"input" => match self.attrs.get("type").map(String::as_str) {
				Some("button" | "submit") => Some("button"),
				Some("checkbox") => Some("checkbox"),
				_ => Some("textbox"),
			},
			_ => None,
		}
	}

	fn accessible_name_matches(&self, name: &str, exact: bool) -> bool {
		text_matches(&self.text, name, exact)
			|| ["aria-label", "title"]
				.iter()
				.any(|attr| self.attrs.get(*attr).is_some_and(|value| text_matches(value, name, exact)))
	}

	fn satisfies(&self, selector: &str) -> bool {
		self.tag == selector || self.selectors.iter().any(|s| s == selector)
	}

	fn in_scope(&self, scope: Option<&Scope>) -> bool {
		let Some(scope) = scope else {
			return true;
		};
		self.containers.iter().any(|(selector, text)| {
			*selector == scope.selector && scope.has_text.as_ref().is_none_or(|wanted| text_matches(text, wanted, false))
		})
	}
}

fn select<'a>(nodes: &'a [FakeNode], strategy: &Strategy, scope: Option<&Scope>) -> Vec<&'a FakeNode> {
	let candidates = nodes.iter().filter(|node| node.in_scope(scope));
	match strategy {
		Strategy::Role { role, name, exact } => candidates
			.filter(|node| node.role() == Some(role.as_str()) && node.accessible_name_matches(name, *exact))
			.collect(),
		Strategy::Text { text, exact } => candidates
			.filter(|node| !node.text.is_empty() && text_matches(&node.text, text, *exact))
			.collect(),
		Strategy::Attribute { name, value } => candidates.filter(|node| node.attrs.get(name) == Some(value)).collect(),
		Strategy::Css { selector } => candidates.filter(|node| node.satisfies(selector)).collect(),
		Strategy::Nth { selector, index } => candidates
			.filter(|node| node.satisfies(selector))
			.nth(*index)
			.into_iter()
			.collect(),
	}
}

/// Page behind a [`FakeDriver`].
pub trait FakePage: Send {
	/// Current DOM, re-derived on every call.
	fn render(&mut self) -> Vec<FakeNode>;

	fn click(&mut self, key: &str);

	fn fill(&mut self, key: &str, value: &str);

	fn evaluate(&mut self, _script: &str) -> Value {
		Value::Null
	}

	fn navigate(&mut self, _url: &str) {}

	fn reload(&mut self) {}
}

/// Fixed DOM that ignores interaction.
#[derive(Debug, Clone, Default)]
pub struct StaticPage {
	nodes: Vec<FakeNode>,
}

impl StaticPage {
	pub fn new(nodes: Vec<FakeNode>) -> Self {
		let nodes = nodes
			.into_iter()
			.enumerate()
			.map(|(i, node)| {
				if node.key.is_empty() {
					node.key(&format!("node-{i}"))
				} else {
					node
				}
			})
			.collect();
		Self { nodes }
	}
}

impl FakePage for StaticPage {
	fn render(&mut self) -> Vec<FakeNode> {
		self.nodes.clone()
	}

	fn click(&mut self, _key: &str) {}

	fn fill(&mut self, key: &str, value: &str) {
		if let Some(node) = self.nodes.iter_mut().find(|node| node.key == key) {
			node.attrs.insert("value".into(), value.into());
		}
	}
}

/// Session counters shared between a [`FakeEngine`] and its drivers.
#[derive(Debug, Default)]
pub struct EngineStats {
	opened: AtomicUsize,
	closed: AtomicUsize,
	peak_handles: AtomicUsize,
}

impl EngineStats {
	pub fn opened(&self) -> usize {
		self.opened.load(Ordering::SeqCst)
	}

	pub fn closed(&self) -> usize {
		self.closed.load(Ordering::SeqCst)
	}

	/// Most element handles any one driver held at once.
	pub fn peak_handles(&self) -> usize {
		self.peak_handles.load(Ordering::SeqCst)
	}
}

/// In-memory [`Driver`].
pub struct FakeDriver {
	page: Mutex<Box<dyn FakePage>>,
	handles: Mutex<HashMap<u64, String>>,
	next_handle: AtomicU64,
	failing: Mutex<HashSet<&'static str>>,
	intercepted: Mutex<HashSet<&'static str>>,
	root_overrides: Mutex<BTreeMap<String, String>>,
	log: Mutex<Vec<String>>,
	closed: AtomicBool,
	stats: Option<Arc<EngineStats>>,
}

impl FakeDriver {
	pub fn new(page: impl FakePage + 'static) -> Self {
		Self {
			page: Mutex::new(Box::new(page)),
			handles: Mutex::new(HashMap::new()),
			next_handle: AtomicU64::new(1),
			failing: Mutex::new(HashSet::new()),
			intercepted: Mutex::new(HashSet::new()),
			root_overrides: Mutex::new(BTreeMap::new()),
			log: Mutex::new(Vec::new()),
			closed: AtomicBool::new(false),
			stats: None,
		}
	}

	pub fn with_nodes(nodes: Vec<FakeNode>) -> Self {
		Self::new(StaticPage::new(nodes))
	}

	pub fn simulated(app: SimulatedApp) -> Self {
		Self::new(app)
	}

	/// Reports into `stats`, as drivers handed out by a [`FakeEngine`] do.
	pub fn with_stats(mut self, stats: Arc<EngineStats>) -> Self {
		self.stats = Some(stats);
		self
	}

	/// Makes every later call of `command` fail with a driver error.
	pub fn fail_on(&self, command: &'static str) {
		self.failing.lock().insert(command);
	}

	/// Makes every later element `command` (click, fill) fail the way a
	/// browser reports an element covered by an overlay.
	pub fn intercept(&self, command: &'static str) {
		self.intercepted.lock().insert(command);
	}

	/// Sets an attribute on the document root, overriding the page.
	pub fn set_root_attribute(&self, name: &str, value: &str) {
		self.root_overrides.lock().insert(name.into(), value.into());
	}

	/// Every command received so far, in order.
	pub fn commands(&self) -> Vec<String> {
		self.log.lock().clone()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	fn check(&self, command: &'static str) -> Result<()> {
		self.log.lock().push(command.to_string());
		if self.is_closed() {
			return Err(Error::SessionClosed);
		}
		if self.failing.lock().contains(command) {
			return Err(Error::Command {
				command,
				message: "injected failure".into(),
			});
		}
		Ok(())
	}

	fn node(&self, handle: ElementHandle) -> Result<FakeNode> {
		let key = self
			.handles
			.lock()
			.get(&handle.0)
			.cloned()
			.ok_or(Error::StaleHandle(handle.0))?;
		self.page
			.lock()
			.render()
			.into_iter()
			.find(|node| node.key == key)
			.ok_or(Error::StaleHandle(handle.0))
	}

	fn interactable(&self, command: &'static str, handle: ElementHandle) -> Result<FakeNode> {
		let node = self.node(handle)?;
		if !node.visible {
			return Err(Error::Element {
				command,
				message: format!("element not interactable: {}", node.key),
			});
		}
		if self.intercepted.lock().contains(command) {
			return Err(Error::Element {
				command,
				message: format!("element click intercepted: {} is covered", node.key),
			});
		}
		Ok(node)
	}
}

#[async_trait]
impl Driver for FakeDriver {
	async fn navigate(&self, url: &str) -> Result<()> {
		self.check("navigate")?;
		self.release_handles();
		self.page.lock().navigate(url);
		Ok(())
	}

	async fn query(&self, strategy: &Strategy, scope: Option<&Scope>) -> Result<Vec<ElementHandle>> {
		self.check("query")?;
		let nodes = self.page.lock().render();
		let mut handles = self.handles.lock();
		let found: Vec<ElementHandle> = select(&nodes, strategy, scope)
			.into_iter()
			.map(|node| {
				let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
				handles.insert(id, node.key.clone());
				ElementHandle(id)
			})
			.collect();
		if let Some(stats) = &self.stats {
			stats.peak_handles.fetch_max(handles.len(), Ordering::SeqCst);
		}
		Ok(found)
	}

	async fn click(&self, handle: ElementHandle) -> Result<()> {
		self.check("click")?;
		let node = self.interactable("click", handle)?;
		self.page.lock().click(&node.key);
		Ok(())
	}

	async fn fill(&self, handle: ElementHandle, text: &str) -> Result<()> {
		self.check("fill")?;
		let node = self.interactable("fill", handle)?;
		self.page.lock().fill(&node.key, text);
		Ok(())
	}

	async fn attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<String>> {
		self.check("attribute")?;
		Ok(self.node(handle)?.attrs.get(name).cloned())
	}

	async fn text(&self, handle: ElementHandle) -> Result<String> {
		self.check("text")?;
		Ok(self.node(handle)?.text)
	}

	async fn is_visible(&self, handle: ElementHandle) -> Result<bool> {
		self.check("is_visible")?;
		Ok(self.node(handle)?.visible)
	}

	async fn root_attribute(&self, name: &str) -> Result<Option<String>> {
		self.check("root_attribute")?;
		if let Some(value) = self.root_overrides.lock().get(name) {
			return Ok(Some(value.clone()));
		}
		Ok(self
			.page
			.lock()
			.render()
			.into_iter()
			.find(|node| node.tag == "html")
			.and_then(|root| root.attrs.get(name).cloned()))
	}

	async fn page_text(&self) -> Result<String> {
		self.check("page_text")?;
		let texts: Vec<String> = self
			.page
			.lock()
			.render()
			.into_iter()
			.filter(|node| node.visible && !node.text.is_empty())
			.map(|node| node.text)
			.collect();
		Ok(texts.join("\n"))
	}

	async fn screenshot(&self) -> Result<Vec<u8>> {
		self.check("screenshot")?;
		Ok(FAKE_PNG.to_vec())
	}

	async fn evaluate(&self, script: &str) -> Result<Value> {
		self.check("evaluate")?;
		if let Some(thrown) = script.trim().strip_prefix("throw ") {
			return Err(Error::Script(format!("Uncaught {}", thrown.trim_end_matches(';'))));
		}
		Ok(self.page.lock().evaluate(script))
	}

	async fn reload(&self) -> Result<()> {
		self.check("reload")?;
		self.release_handles();
		self.page.lock().reload();
		Ok(())
	}

	fn release_handles(&self) {
		self.handles.lock().clear();
	}

	async fn close(&self) -> Result<()> {
		self.log.lock().push("close".into());
		if self.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		self.release_handles();
		if let Some(stats) = &self.stats {
			stats.closed.fetch_add(1, Ordering::SeqCst);
		}
		Ok(())
	}
}

const SPLASH: Duration = Duration::from_millis(2500);
const DIALOG_EXIT: Duration = Duration::from_millis(200);
const DENIED_NOTICE: Duration = Duration::from_millis(1000);
const KEYGEN: Duration = Duration::from_millis(1500);
const MOBILE_BREAKPOINT: u32 = 768;

const KEY_TUTORIAL: &str = "hasSeenTutorial";
const KEY_THEME: &str = "theme";
const KEY_PIN: &str = "panicPin";
const DEFAULT_THEME: &str = "sakura";
const FAVICON: &str = "/src/assets/electron.svg";
const FAVICON_QUERY: &str = "document.querySelector(\"link[rel='icon']\")";

const DESKTOP_LABELS: [&str; 5] = ["Crypt", "Mimic", "ID", "Config", "Panic Mode"];
const MOBILE_LABELS: [&str; 5] = ["Crypt", "Stego", "ID", "Config", "Panic"];

const PANELS: [(Tab, &str, &str); 4] = [
	(Tab::Vault, "Cryptographic Vault", "Securely encrypt and decrypt messages using AES-256-GCM or ECC-X25519."),
	(Tab::Mimic, "LSB Steganography Lab", "Hide encrypted payloads inside innocuous images."),
	(Tab::Identity, "Digital Identity", "Manage your cryptographic identity and verified contacts."),
	(Tab::Settings, "System Configuration", "Customize your interface, manage data, and view achievements."),
];

const THEMES: [(&str, &str); 4] = [
	("cyberpunk", "Cyberpunk (Default)"),
	("light", "Light"),
	("midnight", "Midnight"),
	("sakura", "Sakura"),
];

const APPEARANCE_PANEL: &str = "Appearance Cyberpunk (Default) Light Midnight Sakura";
const PIN_PANEL: &str = "Panic Mode Pin Require PIN to exit camouflage mode";
const DANGER_PANEL: &str = "Danger Zone Emergency Wipe Destroy all local keys and cache immediately Execute";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialog {
	Closed,
	Open,
	/// Exit animation; still rendered until the instant passes.
	Closing(Instant),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Identity {
	Empty,
	/// Key generation finishes at the instant.
	Generating(Instant),
	Ready,
}

#[derive(Debug, Clone, Default)]
struct PanicScreen {
	prompt: bool,
	entry: String,
	denied_until: Option<Instant>,
}

/// Behavioural model of the Crypto3 client.
///
/// Splash for 2.5 s after every load, a first-run tutorial until
/// `hasSeenTutorial` is stored, one panel at a time, a confirmation dialog
/// with an exit animation, PIN configuration, the panic screen with its PIN
/// gate, identity generation that takes 1.5 s, and a theme persisted in
/// storage.
#[derive(Debug, Clone)]
pub struct SimulatedApp {
	storage: BTreeMap<String, String>,
	viewport: Viewport,
	loaded_at: Option<Instant>,
	tutorial_open: bool,
	tab: Tab,
	previous_tab: Tab,
	panic: PanicScreen,
	dialog: Dialog,
	pin_draft: Option<String>,
	identity: Identity,
	theme: String,
}

impl Default for SimulatedApp {
	fn default() -> Self {
		Self::new(Viewport::DESKTOP)
	}
}

impl SimulatedApp {
	pub fn new(viewport: Viewport) -> Self {
		Self {
			storage: BTreeMap::new(),
			viewport,
			loaded_at: None,
			tutorial_open: false,
			tab: Tab::Vault,
			previous_tab: Tab::Vault,
			panic: PanicScreen::default(),
			dialog: Dialog::Closed,
			pin_draft: None,
			identity: Identity::Empty,
			theme: DEFAULT_THEME.into(),
		}
	}

	/// Pre-populates persisted storage.
	pub fn with_storage(mut self, key: &str, value: &str) -> Self {
		self.storage.insert(key.into(), value.into());
		self
	}

	fn load(&mut self) {
		self.loaded_at = Some(Instant::now());
		self.tutorial_open = self.storage.get(KEY_TUTORIAL).map(String::as_str) != Some("true");
		if self.tutorial_open {
			self.storage.insert(KEY_TUTORIAL.into(), "true".into());
		}
		self.tab = Tab::Vault;
		self.previous_tab = Tab::Vault;
		self.panic = PanicScreen::default();
		self.dialog = Dialog::Closed;
		self.pin_draft = None;
		self.identity = Identity::Empty;
		self.theme = self
			.storage
			.get(KEY_THEME)
			.cloned()
			.unwrap_or_else(|| DEFAULT_THEME.into());
		self.storage.insert(KEY_THEME.into(), self.theme.clone());
	}

	fn select(&mut self, tab: Tab) {
		if tab == self.tab {
			return;
		}
		if tab == Tab::Panic {
			self.previous_tab = self.tab;
			self.panic = PanicScreen::default();
		}
		self.tab = tab;
		self.dialog = Dialog::Closed;
		self.pin_draft = None;
	}

	fn exit_panic(&mut self) {
		self.tab = self.previous_tab;
		self.panic = PanicScreen::default();
	}

	fn settle(&mut self, now: Instant) {
		if let Dialog::Closing(until) = self.dialog {
			if now >= until {
				self.dialog = Dialog::Closed;
			}
		}
		if let Identity::Generating(until) = self.identity {
			if now >= until {
				self.identity = Identity::Ready;
			}
		}
		if self.panic.denied_until.is_some_and(|until| now >= until) {
			self.panic.denied_until = None;
		}
	}

	fn main_layout(&self, nodes: &mut Vec<FakeNode>) {
		nodes.push(FakeNode::new("span").key("brand").text("CRYPTO3"));

		let mobile = self.viewport.width < MOBILE_BREAKPOINT;
		for (i, label) in DESKTOP_LABELS.iter().enumerate() {
			nodes.push(
				FakeNode::new("button")
					.key(&format!("nav-desktop-{i}"))
					.attr("aria-label", label)
					.css(DESKTOP_NAV)
					.shown(!mobile),
			);
		}
		for (i, label) in MOBILE_LABELS.iter().enumerate() {
			nodes.push(
				FakeNode::new("button")
					.key(&format!("nav-mobile-{i}"))
					.attr("aria-label", label)
					.css(MOBILE_NAV)
					.shown(mobile),
			);
		}

		if let Some((tab, heading, tagline)) = PANELS.iter().find(|(tab, ..)| *tab == self.tab) {
			nodes.push(FakeNode::new("h2").key(&format!("heading-{tab}")).text(heading));
			nodes.push(FakeNode::new("p").key(&format!("tagline-{tab}")).text(tagline));
		}
		match self.tab {
			Tab::Settings => self.settings_panel(nodes),
			Tab::Identity => self.identity_panel(nodes),
			_ => {}
		}
	}

	fn identity_panel(&self, nodes: &mut Vec<FakeNode>) {
		let button = match self.identity {
			Identity::Empty => FakeNode::new("button").key("generate-identity").text("Generate Identity"),
			Identity::Generating(_) => FakeNode::new("button").key("generating").text("Generating Keys..."),
			Identity::Ready => FakeNode::new("button").key("download-card").text("Download Card"),
		};
		nodes.push(button);
	}

	fn settings_panel(&self, nodes: &mut Vec<FakeNode>) {
		for (theme, label) in THEMES {
			nodes.push(
				FakeNode::new("button")
					.key(&format!("theme-{theme}"))
					.text(label)
					.within(".glass-panel", APPEARANCE_PANEL),
			);
		}

		match &self.pin_draft {
			None => nodes.push(
				FakeNode::new("button")
					.key("pin-configure")
					.text("Configure")
					.within(".glass-panel", PIN_PANEL),
			),
			Some(draft) => {
				nodes.push(
					FakeNode::new("input")
						.key("pin-input")
						.attr("type", "password")
						.attr("placeholder", "Enter PIN...")
						.attr("value", draft)
						.within(".glass-panel", PIN_PANEL),
				);
				nodes.push(
					FakeNode::new("button")
						.key("pin-confirm")
						.attr("aria-label", "Confirm")
						.within(".glass-panel", PIN_PANEL),
				);
			}
		}

		nodes.push(
			FakeNode::new("div")
				.key("danger-title")
				.text("Danger Zone")
				.within(".glass-panel", DANGER_PANEL),
		);
		nodes.push(
			FakeNode::new("button")
				.key("danger-execute")
				.text("Execute")
				.within(".glass-panel", DANGER_PANEL),
		);

		if self.dialog != Dialog::Closed {
			nodes.push(
				FakeNode::new("p")
					.key("confirm-text")
					.text("Are you sure you want to wipe all data?")
					.within("[role='dialog']", "Are you sure you want to wipe all data?"),
			);
			nodes.push(FakeNode::new("button").key("confirm-cancel").text("Cancel"));
			nodes.push(FakeNode::new("button").key("confirm-wipe").text("Wipe Data"));
		}
	}

	fn panic_screen(&self, nodes: &mut Vec<FakeNode>) {
		nodes.push(FakeNode::new("h1").key("panic-title").text("Rhine Lab"));
		nodes.push(FakeNode::new("p").key("panic-flavor").text("359号基地"));
		nodes.push(
			FakeNode::new("button")
				.key("access-terminal")
				.text("ACCESS TERMINAL")
				.shown(!self.panic.prompt),
		);
		if !self.panic.prompt {
			return;
		}
		nodes.push(FakeNode::new("h3").key("pin-prompt").text("Security Clearance"));
		nodes.push(
			FakeNode::new("input")
				.key("panic-pin")
				.attr("type", "password")
				.attr("placeholder", "Enter PIN")
				.attr("value", &self.panic.entry),
		);
		nodes.push(
			FakeNode::new("button")
				.key("unlock")
				.text("Unlock")
				.attr("type", "submit")
				.css("form button[type='submit']"),
		);
		if self.panic.denied_until.is_some() {
			nodes.push(FakeNode::new("p").key("denied").text("Access Denied"));
		}
	}

	fn statement(&mut self, statement: &str) -> Value {
		if let Some(args) = call(statement, "localStorage.setItem").and_then(string_args) {
			if let [key, value] = args.as_slice() {
				self.storage.insert(key.clone(), value.clone());
			}
			return Value::Null;
		}
		if let Some(args) = call(statement, "localStorage.getItem").and_then(string_args) {
			return match args.first().and_then(|key| self.storage.get(key)) {
				Some(value) => Value::String(value.clone()),
				None => Value::Null,
			};
		}
		if let Some(args) = call(statement, "localStorage.removeItem").and_then(string_args) {
			if let Some(key) = args.first() {
				self.storage.remove(key);
			}
			return Value::Null;
		}
		if let Some(args) = call(statement, "document.documentElement.getAttribute").and_then(string_args) {
			return match args.first().map(String::as_str) {
				Some("data-theme") if self.loaded_at.is_some() => Value::String(self.theme.clone()),
				_ => Value::Null,
			};
		}
		if let Some(rest) = statement.strip_prefix(FAVICON_QUERY) {
			return match rest.trim() {
				"!== null" | "!= null" => Value::Bool(true),
				"?.getAttribute(\"href\")" | "?.getAttribute('href')" | ".getAttribute(\"href\")" => {
					Value::String(FAVICON.into())
				}
				_ => Value::Null,
			};
		}
		match statement {
			"localStorage.clear()" => {
				self.storage.clear();
				Value::Null
			}
			"document.title" => Value::String("Crypto3".into()),
			"location.reload()" | "window.location.reload()" => {
				self.reload();
				Value::Null
			}
			_ => Value::Null,
		}
	}
}

impl FakePage for SimulatedApp {
	fn render(&mut self) -> Vec<FakeNode> {
		let Some(loaded_at) = self.loaded_at else {
			return Vec::new();
		};
		let now = Instant::now();
		self.settle(now);

		let mut nodes = vec![FakeNode::new("html").key("root").attr("data-theme", &self.theme)];
		if now.duration_since(loaded_at) < SPLASH {
			nodes.push(FakeNode::new("p").key("splash").text("System Initialization..."));
			return nodes;
		}
		if self.tab == Tab::Panic {
			self.panic_screen(&mut nodes);
			return nodes;
		}

		let start = nodes.len();
		self.main_layout(&mut nodes);
		if self.tutorial_open {
			for node in &mut nodes[start..] {
				node.visible = false;
			}
			nodes.push(FakeNode::new("h2").key("tutorial").text("Welcome to Crypto3!"));
			nodes.push(
				FakeNode::new("button")
					.key("skip-intro")
					.text("Skip Intro")
					.attr("title", "Skip Intro"),
			);
		}
		nodes
	}

	fn click(&mut self, key: &str) {
		let now = Instant::now();
		match key {
			"skip-intro" => self.tutorial_open = false,
			"pin-configure" => self.pin_draft = Some(String::new()),
			"generate-identity" if self.identity == Identity::Empty => {
				self.identity = Identity::Generating(now + KEYGEN);
			}
			"pin-confirm" => {
				if let Some(draft) = self.pin_draft.take().filter(|draft| !draft.is_empty()) {
					self.storage.insert(KEY_PIN.into(), draft);
				}
			}
			"danger-execute" if self.dialog == Dialog::Closed => self.dialog = Dialog::Open,
			"confirm-cancel" if self.dialog == Dialog::Open => self.dialog = Dialog::Closing(now + DIALOG_EXIT),
			"confirm-wipe" => {
				self.storage.clear();
				self.load();
			}
			"access-terminal" => {
				if self.storage.contains_key(KEY_PIN) {
					self.panic.prompt = true;
				} else {
					self.exit_panic();
				}
			}
			"unlock" => {
				if self.storage.get(KEY_PIN) == Some(&self.panic.entry) {
					self.exit_panic();
				} else {
					self.panic.entry.clear();
					self.panic.denied_until = Some(now + DENIED_NOTICE);
				}
			}
			_ => {
				if let Some(theme) = key.strip_prefix("theme-") {
					self.theme = theme.to_string();
					self.storage.insert(KEY_THEME.into(), theme.to_string());
				} else if let Some(index) = key
					.strip_prefix("nav-desktop-")
					.or_else(|| key.strip_prefix("nav-mobile-"))
					.and_then(|i| i.parse::<usize>().ok())
				{
					if let Some(tab) = Tab::ALL.get(index) {
						self.select(*tab);
					}
				}
			}
		}
	}

	fn fill(&mut self, key: &str, value: &str) {
		match key {
			"pin-input" => self.pin_draft = Some(value.to_string()),
			"panic-pin" => self.panic.entry = value.to_string(),
			_ => {}
		}
	}

	/// Understands the storage, title, favicon and theme expressions scenarios use;
	/// anything else evaluates to `null`.
	fn evaluate(&mut self, script: &str) -> Value {
		let mut last = Value::Null;
		for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
			let statement = statement.strip_prefix("return ").unwrap_or(statement).trim();
			last = self.statement(statement);
		}
		last
	}

	fn navigate(&mut self, _url: &str) {
		self.load();
	}

	fn reload(&mut self) {
		if self.loaded_at.is_some() {
			self.load();
		}
	}
}

/// Argument list of `name(...)`.
fn call<'a>(statement: &'a str, name: &str) -> Option<&'a str> {
	statement
		.strip_prefix(name)?
		.trim_start()
		.strip_prefix('(')?
		.strip_suffix(')')
}

fn string_args(args: &str) -> Option<Vec<String>> {
	let mut values = Vec::new();
	let mut rest = args.trim();
	while !rest.is_empty() {
		let (value, tail) = string_literal(rest)?;
		values.push(value);
		let tail = tail.trim_start();
		rest = match tail.strip_prefix(',') {
			Some(next) => next.trim_start(),
			None if tail.is_empty() => tail,
			None => return None,
		};
	}
	Some(values)
}

/// Parses a leading JS string literal, returning it and the remaining input.
fn string_literal(input: &str) -> Option<(String, &str)> {
	let quote = input.chars().next().filter(|c| *c == '"' || *c == '\'')?;
	let body = &input[1..];
	let mut value = String::new();
	let mut escaped = false;
	for (i, c) in body.char_indices() {
		if escaped {
			value.push(match c {
				'n' => '\n',
				't' => '\t',
				other => other,
			});
			escaped = false;
		} else if c == '\\' {
			escaped = true;
		} else if c == quote {
			return Some((value, &body[i + 1..]));
		} else {
			value.push(c);
		}
	}
	None
}

/// [`DriverEngine`] handing out isolated [`SimulatedApp`] sessions.
#[derive(Default)]
pub struct FakeEngine {
	storage: BTreeMap<String, String>,
	failing: Vec<&'static str>,
	intercepted: Vec<&'static str>,
	stats: Arc<EngineStats>,
	shut_down: AtomicBool,
}

impl FakeEngine {
	pub fn new() -> Self {
		Self::default()
	}

	/// Storage every new session starts with.
	pub fn with_storage(mut self, key: &str, value: &str) -> Self {
		self.storage.insert(key.into(), value.into());
		self
	}

	/// Every session's driver fails on `command`.
	pub fn failing_on(mut self, command: &'static str) -> Self {
		self.failing.push(command);
		self
	}

	/// Every session's driver reports `command` as intercepted by the page.
	pub fn intercepting(mut self, command: &'static str) -> Self {
		self.intercepted.push(command);
		self
	}

	pub fn stats(&self) -> Arc<EngineStats> {
		Arc::clone(&self.stats)
	}

	pub fn is_shut_down(&self) -> bool {
		self.shut_down.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl DriverEngine for FakeEngine {
	async fn open_session(&self, options: &SessionOptions) -> Result<Box<dyn Driver>> {
		if self.is_shut_down() {
			return Err(Error::SessionClosed);
		}
		self.stats.opened.fetch_add(1, Ordering::SeqCst);

		let mut app = SimulatedApp::new(options.viewport.unwrap_or_default());
		for (key, value) in &self.storage {
			app = app.with_storage(key, value);
		}
		let driver = FakeDriver::simulated(app).with_stats(self.stats());
		for command in &self.failing {
			driver.fail_on(*command);
		}
		for command in &self.intercepted {
			driver.intercept(*command);
		}
		Ok(Box::new(driver))
	}

	async fn shutdown(&self) -> Result<()> {
		self.shut_down.store(true, Ordering::SeqCst);
		Ok(())
	}
}

/// Session over `driver` writing artifacts into a fresh temporary directory.
#[cfg(test)]
pub(crate) fn test_session(driver: FakeDriver) -> (crate::session::Session, tempfile::TempDir) {
	let dir = tempfile::tempdir().unwrap();
	let context = crate::session::SessionContext::new("test", dir.path().join("test"));
	(crate::session::Session::new(Box::new(driver), context), dir)
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn visible_texts(driver: &FakeDriver) -> String {
		driver.page_text().await.unwrap()
	}

	async fn click_text(driver: &FakeDriver, strategy: Strategy) {
		let handles = driver.query(&strategy, None).await.unwrap();
		assert_eq!(handles.len(), 1, "{strategy} should match once");
		driver.click(handles[0]).await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn splash_then_tutorial_then_main() {
		let driver = FakeDriver::simulated(SimulatedApp::default());
		driver.navigate("http://localhost:5173/").await.unwrap();
		assert_eq!(visible_texts(&driver).await, "System Initialization...");

		tokio::time::advance(SPLASH).await;
		let text = visible_texts(&driver).await;
		assert!(text.contains("Welcome to Crypto3!"));
		assert!(!text.contains("Cryptographic Vault"));

		click_text(&driver, Strategy::attribute("title", "Skip Intro")).await;
		assert!(visible_texts(&driver).await.contains("Cryptographic Vault"));

		driver.reload().await.unwrap();
		tokio::time::advance(SPLASH).await;
		assert!(!visible_texts(&driver).await.contains("Welcome to Crypto3!"));
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_keeps_dialog_during_exit_animation() {
		let app = SimulatedApp::default().with_storage(KEY_TUTORIAL, "true");
		let driver = FakeDriver::simulated(app);
		driver.navigate("/").await.unwrap();
		tokio::time::advance(SPLASH).await;

		let settings = driver.query(&Strategy::nth(DESKTOP_NAV, 3), None).await.unwrap();
		driver.click(settings[0]).await.unwrap();
		click_text(&driver, Strategy::text_exact("Execute")).await;
		click_text(&driver, Strategy::text_exact("Cancel")).await;

		assert!(visible_texts(&driver).await.contains("wipe all data"));
		tokio::time::advance(DIALOG_EXIT).await;
		assert!(!visible_texts(&driver).await.contains("wipe all data"));
	}

	#[tokio::test(start_paused = true)]
	async fn identity_card_appears_after_key_generation() {
		let app = SimulatedApp::default().with_storage(KEY_TUTORIAL, "true");
		let driver = FakeDriver::simulated(app);
		driver.navigate("/").await.unwrap();
		tokio::time::advance(SPLASH).await;

		let identity = driver.query(&Strategy::nth(DESKTOP_NAV, 2), None).await.unwrap();
		driver.click(identity[0]).await.unwrap();
		assert!(visible_texts(&driver).await.contains("Digital Identity"));
		click_text(&driver, Strategy::text_exact("Generate Identity")).await;
		assert!(!visible_texts(&driver).await.contains("Download Card"));

		tokio::time::advance(KEYGEN).await;
		let text = visible_texts(&driver).await;
		assert!(text.contains("Download Card"));
		assert!(!text.contains("Generate Identity"));
	}

	#[tokio::test]
	async fn storage_scripts() {
		let driver = FakeDriver::simulated(SimulatedApp::default());
		let value = driver
			.evaluate("localStorage.setItem(\"panicPin\", \"1234\"); localStorage.getItem('panicPin')")
			.await
			.unwrap();
		assert_eq!(value, Value::String("1234".into()));
		assert_eq!(driver.evaluate("document.title").await.unwrap(), Value::String("Crypto3".into()));
		assert_eq!(driver.evaluate("navigator.userAgent").await.unwrap(), Value::Null);
		assert_eq!(
			driver.evaluate(crate::app::FAVICON_HREF).await.unwrap(),
			Value::String(FAVICON.into())
		);
		assert_eq!(driver.evaluate(crate::app::FAVICON_PRESENT).await.unwrap(), Value::Bool(true));
		assert!(matches!(
			driver.evaluate("throw new Error('boom')").await,
			Err(Error::Script(message)) if message == "Uncaught new Error('boom')"
		));
	}

	#[tokio::test]
	async fn hidden_nodes_are_not_interactable_and_released_handles_are_stale() {
		let driver = FakeDriver::with_nodes(vec![FakeNode::new("button").text("Unlock").hidden()]);
		let handles = driver.query(&Strategy::role("button", "Unlock"), None).await.unwrap();
		assert!(matches!(driver.click(handles[0]).await, Err(Error::Element { command: "click", .. })));

		driver.release_handles();
		assert!(matches!(driver.text(handles[0]).await, Err(Error::StaleHandle(_))));
	}

	#[tokio::test]
	async fn injected_failures_and_close() {
		let driver = FakeDriver::with_nodes(Vec::new());
		driver.fail_on("screenshot");
		assert!(driver.screenshot().await.is_err());
		driver.close().await.unwrap();
		driver.close().await.unwrap();
		assert!(matches!(driver.page_text().await, Err(Error::SessionClosed)));
		assert_eq!(driver.commands(), vec!["screenshot", "close", "close", "page_text"]);
	}

	#[test]
	fn literal_parsing() {
		assert_eq!(
			string_args("'theme' , \"say \\\"hi\\\"\"").unwrap(),
			vec!["theme".to_string(), "say \"hi\"".to_string()]
		);
		assert_eq!(string_args("theme"), None);
		assert_eq!(call("localStorage.clear()", "localStorage.clear"), Some(""));
	}

	#[tokio::test]
	async fn engine_sessions_are_isolated() {
		let engine = FakeEngine::new().with_storage(KEY_TUTORIAL, "true");
		let first = engine.open_session(&SessionOptions::default()).await.unwrap();
		let second = engine.open_session(&SessionOptions::default()).await.unwrap();
		first.evaluate("localStorage.setItem('theme', 'midnight')").await.unwrap();

		let theme = second.evaluate("localStorage.getItem('theme')").await.unwrap();
		assert_eq!(theme, Value::Null);
		assert_eq!(engine.stats().opened(), 2);

		first.close().await.unwrap();
		assert_eq!(engine.stats().closed(), 1);
	}
}
