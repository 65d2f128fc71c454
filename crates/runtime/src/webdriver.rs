//! [`Driver`] implementation over a fantoccini WebDriver client.
//!
//! Strategies are translated to CSS or XPath queries. Role strategies query by
//! role first and filter on the accessible name client-side, since XPath 1.0
//! has no notion of accessible names.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, Locator};
use tracing::{debug, trace};
use veri_protocol::{Scope, Strategy, text_matches};

use crate::driver::{Driver, ElementHandle};
use crate::error::{Error, Result};

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// One WebDriver session.
pub struct WebDriverSession {
	client: Client,
	handles: DashMap<u64, Element>,
	next_handle: AtomicU64,
	closed: AtomicBool,
}

impl WebDriverSession {
	pub fn new(client: Client) -> Self {
		Self {
			client,
			handles: DashMap::new(),
			next_handle: AtomicU64::new(1),
			closed: AtomicBool::new(false),
		}
	}

	fn register(&self, element: Element) -> ElementHandle {
		let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
		self.handles.insert(id, element);
		ElementHandle(id)
	}

	fn element(&self, handle: ElementHandle) -> Result<Element> {
		if self.closed.load(Ordering::Acquire) {
			return Err(Error::SessionClosed);
		}
		self.handles
			.get(&handle.0)
			.map(|entry| entry.value().clone())
			.ok_or(Error::StaleHandle(handle.0))
	}

	/// Containers matching `scope`, or `None` for the whole document.
	async fn roots(&self, scope: Option<&Scope>) -> Result<Vec<Option<Element>>> {
		let Some(scope) = scope else {
			return Ok(vec![None]);
		};

		let containers = self
			.client
			.find_all(Locator::Css(&scope.selector))
			.await
			.map_err(|e| cmd_error("find_all", e))?;

		let mut roots = Vec::new();
		for container in containers {
			if let Some(wanted) = &scope.has_text {
				let text = container.text().await.map_err(|e| cmd_error("text", e))?;
				if !text_matches(&text, wanted, false) {
					continue;
				}
			}
			roots.push(Some(container));
		}
		Ok(roots)
	}

	async fn find_in(&self, root: Option<&Element>, query: &Query) -> Result<Vec<Element>> {
		let locator = match query {
			Query::Css(selector) => Locator::Css(selector),
			Query::XPath(path) => Locator::XPath(path),
		};
		let found = match root {
			Some(root) => root.find_all(locator).await,
			None => self.client.find_all(locator).await,
		};
		found.map_err(|e| cmd_error("find_all", e))
	}

	async fn accessible_name_matches(&self, element: &Element, name: &str, exact: bool) -> Result<bool> {
		let text = element.text().await.map_err(|e| cmd_error("text", e))?;
		if text_matches(&text, name, exact) {
			return Ok(true);
		}
		for attr in ["aria-label", "title"] {
			let value = element.attr(attr).await.map_err(|e| cmd_error("attr", e))?;
			if value.is_some_and(|v| text_matches(&v, name, exact)) {
				return Ok(true);
			}
		}
		Ok(false)
	}
}

#[async_trait]
impl Driver for WebDriverSession {
	async fn navigate(&self, url: &str) -> Result<()> {
		debug!(target = "veri", url, "goto");
		self.client.goto(url).await.map_err(|e| cmd_error("goto", e))
	}

	async fn query(&self, strategy: &Strategy, scope: Option<&Scope>) -> Result<Vec<ElementHandle>> {
		if self.closed.load(Ordering::Acquire) {
			return Err(Error::SessionClosed);
		}

		let query = translate(strategy);
		let mut matches = Vec::new();
		for root in self.roots(scope).await? {
			let found = self.find_in(root.as_ref(), &query).await?;
			match strategy {
				Strategy::Role { name, exact, .. } => {
					for element in found {
						if self.accessible_name_matches(&element, name, *exact).await? {
							matches.push(element);
						}
					}
				}
				Strategy::Nth { index, .. } => matches.extend(found.into_iter().nth(*index)),
				_ => matches.extend(found),
			}
		}

		trace!(target = "veri", strategy = %strategy, count = matches.len(), "query");
		Ok(matches.into_iter().map(|element| self.register(element)).collect())
	}

	async fn click(&self, handle: ElementHandle) -> Result<()> {
		self.element(handle)?
			.click()
			.await
			.map_err(|e| cmd_error("click", e))
	}

	async fn fill(&self, handle: ElementHandle, text: &str) -> Result<()> {
		let element = self.element(handle)?;
		element.clear().await.map_err(|e| cmd_error("clear", e))?;
		element
			.send_keys(text)
			.await
			.map_err(|e| cmd_error("send_keys", e))
	}

	async fn attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<String>> {
		self.element(handle)?
			.attr(name)
			.await
			.map_err(|e| cmd_error("attr", e))
	}

	async fn text(&self, handle: ElementHandle) -> Result<String> {
		self.element(handle)?
			.text()
			.await
			.map_err(|e| cmd_error("text", e))
	}

	async fn is_visible(&self, handle: ElementHandle) -> Result<bool> {
		self.element(handle)?
			.is_displayed()
			.await
			.map_err(|e| cmd_error("is_displayed", e))
	}

	async fn root_attribute(&self, name: &str) -> Result<Option<String>> {
		let root = self
			.client
			.find(Locator::Css("html"))
			.await
			.map_err(|e| cmd_error("find", e))?;
		root.attr(name).await.map_err(|e| cmd_error("attr", e))
	}

	async fn page_text(&self) -> Result<String> {
		let body = self
			.client
			.find(Locator::Css("body"))
			.await
			.map_err(|e| cmd_error("find", e))?;
		body.text().await.map_err(|e| cmd_error("text", e))
	}

	async fn screenshot(&self) -> Result<Vec<u8>> {
		self.client
			.screenshot()
			.await
			.map_err(|e| cmd_error("screenshot", e))
	}

	async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
		self.client
			.execute(&wrap_script(script), Vec::new())
			.await
			.map_err(|e| cmd_error("execute", e))
	}

	async fn reload(&self) -> Result<()> {
		self.release_handles();
		self.client
			.refresh()
			.await
			.map_err(|e| cmd_error("refresh", e))
	}

	fn release_handles(&self) {
		self.handles.clear();
	}

	async fn close(&self) -> Result<()> {
		if self.closed.swap(true, Ordering::AcqRel) {
			return Ok(());
		}
		self.handles.clear();
		self.client
			.clone()
			.close()
			.await
			.map_err(|e| cmd_error("close", e))
	}
}

/// Maps WebDriver errors onto page refusals where the error code allows it.
fn cmd_error(command: &'static str, err: CmdError) -> Error {
	match &err {
		CmdError::Standard(e) | CmdError::NoSuchElement(e) => Error::from_webdriver(command, e.error(), &e.message),
		_ => Error::command(command, err),
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Query {
	Css(String),
	XPath(String),
}

fn translate(strategy: &Strategy) -> Query {
	match strategy {
		Strategy::Role { role, .. } => Query::Css(role_selector(role)),
		Strategy::Text { text, exact } => Query::XPath(text_xpath(text, *exact)),
		Strategy::Attribute { name, value } => Query::Css(attribute_selector(name, value)),
		Strategy::Css { selector } | Strategy::Nth { selector, .. } => Query::Css(selector.clone()),
	}
}

/// CSS selector for elements with an implicit or explicit ARIA role.
fn role_selector(role: &str) -> String {
	let implicit = match role {
		"button" => "button, input[type='button'], input[type='submit']",
		"heading" => "h1, h2, h3, h4, h5, h6",
		"link" => "a[href]",
		"textbox" => "input:not([type]), input[type='text'], input[type='password'], textarea",
		"dialog" => "dialog",
		"navigation" => "nav",
		"checkbox" => "input[type='checkbox']",
		_ => "",
	};
	let explicit = attribute_selector("role", role);
	if implicit.is_empty() {
		explicit
	} else {
		format!("{implicit}, {explicit}")
	}
}

fn attribute_selector(name: &str, value: &str) -> String {
	let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
	format!("[{name}=\"{escaped}\"]")
}

/// Innermost elements whose rendered text matches.
fn text_xpath(text: &str, exact: bool) -> String {
	let skip = "not(self::script or self::style or self::head or self::title)";
	let wanted = veri_protocol::normalize_whitespace(text);
	if exact {
		let lit = xpath_literal(&wanted);
		format!(".//*[{skip}][normalize-space(.)={lit}][not(*[normalize-space(.)={lit}])]")
	} else {
		let lit = xpath_literal(&wanted.to_lowercase());
		let folded = format!("translate(normalize-space(.), '{UPPER}', '{LOWER}')");
		format!(".//*[{skip}][contains({folded}, {lit})][not(*[contains({folded}, {lit})])]")
	}
}

/// Quotes `s` as an XPath 1.0 string literal.
fn xpath_literal(s: &str) -> String {
	if !s.contains('\'') {
		return format!("'{s}'");
	}
	if !s.contains('"') {
		return format!("\"{s}\"");
	}
	let parts = s
		.split('\'')
		.map(|part| format!("'{part}'"))
		.collect::<Vec<_>>()
		.join(", \"'\", ");
	format!("concat({parts})")
}

/// WebDriver scripts need an explicit `return` to yield a value.
fn wrap_script(script: &str) -> String {
	let trimmed = script.trim().trim_end_matches(';');
	if trimmed.starts_with("return ") || trimmed.contains(';') {
		script.to_string()
	} else {
		format!("return ({trimmed});")
	}
}
