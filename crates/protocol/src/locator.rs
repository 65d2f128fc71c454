//! Locator chains.
//!
//! A [`Locator`] is an ordered list of [`Strategy`] values. The harness tries
//! them one after another until one of them identifies exactly one element,
//! which replaces per-call-site guessing ("try the aria-label, then the text,
//! then the nth button") with a declared, testable chain.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One way of finding elements on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Strategy {
	/// Accessible role plus accessible name.
	///
	/// The accessible name is the element's text content, `aria-label` or
	/// `title`, checked in that order.
	Role {
		role: String,
		name: String,
		#[serde(default)]
		exact: bool,
	},
	/// Smallest element whose visible text matches.
	Text {
		text: String,
		#[serde(default)]
		exact: bool,
	},
	/// Element carrying `name="value"`.
	Attribute { name: String, value: String },
	/// Structural path as a CSS selector.
	Css { selector: String },
	/// Positional index among the matches of a CSS selector.
	Nth { selector: String, index: usize },
}

impl Strategy {
	pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
		Self::Role {
			role: role.into(),
			name: name.into(),
			exact: false,
		}
	}

	pub fn role_exact(role: impl Into<String>, name: impl Into<String>) -> Self {
		Self::Role {
			role: role.into(),
			name: name.into(),
			exact: true,
		}
	}

	pub fn text(text: impl Into<String>) -> Self {
		Self::Text {
			text: text.into(),
			exact: false,
		}
	}

	pub fn text_exact(text: impl Into<String>) -> Self {
		Self::Text {
			text: text.into(),
			exact: true,
		}
	}

	pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self::Attribute {
			name: name.into(),
			value: value.into(),
		}
	}

	/// Shorthand for `attribute("placeholder", value)`.
	pub fn placeholder(value: impl Into<String>) -> Self {
		Self::attribute("placeholder", value)
	}

	pub fn css(selector: impl Into<String>) -> Self {
		Self::Css {
			selector: selector.into(),
		}
	}

	pub fn nth(selector: impl Into<String>, index: usize) -> Self {
		Self::Nth {
			selector: selector.into(),
			index,
		}
	}
}

impl fmt::Display for Strategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Strategy::Role { role, name, exact } => {
				let suffix = if *exact { "s" } else { "i" };
				write!(f, "role={role}[name=\"{name}\"{suffix}]")
			}
			Strategy::Text { text, exact: true } => write!(f, "text=\"{text}\""),
			Strategy::Text { text, exact: false } => write!(f, "text={text}"),
			Strategy::Attribute { name, value } => write!(f, "[{name}=\"{value}\"]"),
			Strategy::Css { selector } => write!(f, "css={selector}"),
			Strategy::Nth { selector, index } => write!(f, "css={selector} >> nth={index}"),
		}
	}
}

/// Container an element must live inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
	/// CSS selector of the container.
	pub selector: String,
	/// Only containers whose text contains this string qualify.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub has_text: Option<String>,
}

impl Scope {
	pub fn new(selector: impl Into<String>) -> Self {
		Self {
			selector: selector.into(),
			has_text: None,
		}
	}

	pub fn has_text(mut self, text: impl Into<String>) -> Self {
		self.has_text = Some(text.into());
		self
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.has_text {
			Some(text) => write!(f, "{}:has-text(\"{text}\")", self.selector),
			None => f.write_str(&self.selector),
		}
	}
}

/// Ordered fallback chain of strategies resolving to a unique element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
	pub strategies: Vec<Strategy>,
	/// Picks one match when a strategy yields several.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub index: Option<usize>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<Scope>,
	/// Human name used in traces instead of the raw chain.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
}

impl Locator {
	pub fn new(first: Strategy) -> Self {
		Self {
			strategies: vec![first],
			index: None,
			scope: None,
			label: None,
		}
	}

	/// Appends a fallback strategy tried when the previous ones fail.
	pub fn or(mut self, next: Strategy) -> Self {
		self.strategies.push(next);
		self
	}

	pub fn nth(mut self, index: usize) -> Self {
		self.index = Some(index);
		self
	}

	pub fn within(mut self, scope: Scope) -> Self {
		self.scope = Some(scope);
		self
	}

	pub fn labeled(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	pub fn role(role: &str, name: &str) -> Self {
		Self::new(Strategy::role(role, name))
	}

	pub fn text(text: &str) -> Self {
		Self::new(Strategy::text(text))
	}

	pub fn css(selector: &str) -> Self {
		Self::new(Strategy::css(selector))
	}

	/// The full chain, ignoring any label.
	pub fn chain(&self) -> String {
		let mut out = self
			.strategies
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join(" || ");
		if let Some(scope) = &self.scope {
			out = format!("{scope} >> {out}");
		}
		if let Some(index) = self.index {
			out.push_str(&format!(" >> nth={index}"));
		}
		out
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.label {
			Some(label) => f.write_str(label),
			None => f.write_str(&self.chain()),
		}
	}
}

/// Collapses runs of whitespace and trims, the way rendered text is compared.
pub fn normalize_whitespace(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compares rendered text against a wanted value.
///
/// Exact matching compares whitespace-normalised strings; otherwise the match
/// is a case-insensitive substring search.
pub fn text_matches(candidate: &str, wanted: &str, exact: bool) -> bool {
	let candidate = normalize_whitespace(candidate);
	let wanted = normalize_whitespace(wanted);
	if exact {
		candidate == wanted
	} else {
		candidate.to_lowercase().contains(&wanted.to_lowercase())
	}
}
