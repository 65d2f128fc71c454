//! Re-evaluable predicates used to gate waits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::locator::Locator;
use crate::state::StateMatcher;

/// Predicate over sampled UI state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
	#[serde(flatten)]
	pub kind: ConditionKind,
	/// Inverts the predicate.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub negate: bool,
}

/// The predicate itself, without negation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum ConditionKind {
	/// The locator resolves to one visible element.
	ElementVisible { locator: Locator },
	/// No strategy of the locator yields a visible element.
	ElementAbsent { locator: Locator },
	/// The resolved element's attribute equals `value` (`None` = attribute missing).
	AttributeEquals {
		locator: Locator,
		name: String,
		value: Option<String>,
	},
	/// The page's rendered text contains `text`.
	TextPresent { text: String },
	/// At least `ms` milliseconds have passed since the wait started.
	///
	/// Only for transitions with no observable completion signal.
	Elapsed { ms: u64 },
	/// The sampled application state matches.
	InState { expect: StateMatcher },
	AnyOf { conditions: Vec<Condition> },
	AllOf { conditions: Vec<Condition> },
}

impl Condition {
	pub fn new(kind: ConditionKind) -> Self {
		Self { kind, negate: false }
	}

	pub fn visible(locator: Locator) -> Self {
		Self::new(ConditionKind::ElementVisible { locator })
	}

	pub fn absent(locator: Locator) -> Self {
		Self::new(ConditionKind::ElementAbsent { locator })
	}

	pub fn attribute_equals(locator: Locator, name: impl Into<String>, value: Option<String>) -> Self {
		Self::new(ConditionKind::AttributeEquals {
			locator,
			name: name.into(),
			value,
		})
	}

	pub fn text_present(text: impl Into<String>) -> Self {
		Self::new(ConditionKind::TextPresent { text: text.into() })
	}

	pub fn elapsed(ms: u64) -> Self {
		Self::new(ConditionKind::Elapsed { ms })
	}

	pub fn in_state(expect: StateMatcher) -> Self {
		Self::new(ConditionKind::InState { expect })
	}

	pub fn any_of(conditions: Vec<Condition>) -> Self {
		Self::new(ConditionKind::AnyOf { conditions })
	}

	pub fn all_of(conditions: Vec<Condition>) -> Self {
		Self::new(ConditionKind::AllOf { conditions })
	}

	pub fn negated(mut self) -> Self {
		self.negate = !self.negate;
		self
	}

	/// True when the condition can only be satisfied by the clock.
	pub fn is_time_only(&self) -> bool {
		match &self.kind {
			ConditionKind::Elapsed { .. } => true,
			ConditionKind::AnyOf { conditions } | ConditionKind::AllOf { conditions } => {
				!conditions.is_empty() && conditions.iter().all(Condition::is_time_only)
			}
			_ => false,
		}
	}
}

impl fmt::Display for Condition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.negate {
			f.write_str("not ")?;
		}
		match &self.kind {
			ConditionKind::ElementVisible { locator } => write!(f, "visible({locator})"),
			ConditionKind::ElementAbsent { locator } => write!(f, "absent({locator})"),
			ConditionKind::AttributeEquals { locator, name, value } => match value {
				Some(value) => write!(f, "attribute({locator}, {name}) == \"{value}\""),
				None => write!(f, "attribute({locator}, {name}) is missing"),
			},
			ConditionKind::TextPresent { text } => write!(f, "text present \"{text}\""),
			ConditionKind::Elapsed { ms } => write!(f, "elapsed({ms}ms)"),
			ConditionKind::InState { expect } => write!(f, "state({expect})"),
			ConditionKind::AnyOf { conditions } => write_list(f, "any_of", conditions),
			ConditionKind::AllOf { conditions } => write_list(f, "all_of", conditions),
		}
	}
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, conditions: &[Condition]) -> fmt::Result {
	write!(f, "{name}(")?;
	for (i, condition) in conditions.iter().enumerate() {
		if i > 0 {
			f.write_str(", ")?;
		}
		write!(f, "{condition}")?;
	}
	f.write_str(")")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::state::{Phase, StateMatcher};

	#[test]
	fn negated_condition_roundtrips_through_json() {
		let condition = Condition::visible(Locator::text("Are you sure you want to wipe all data?")).negated();
		let json = serde_json::to_value(&condition).unwrap();
		assert_eq!(json["when"], "element_visible");
		assert_eq!(json["negate"], true);

		let back: Condition = serde_json::from_value(json).unwrap();
		assert_eq!(back, condition);
	}

	#[test]
	fn negate_is_omitted_by_default() {
		let json = serde_json::to_value(Condition::elapsed(2500)).unwrap();
		assert!(json.get("negate").is_none());
	}

	#[test]
	fn display_nests_combinators() {
		let condition = Condition::any_of(vec![
			Condition::in_state(StateMatcher::phase(Phase::MainApp)),
			Condition::elapsed(2500),
		]);
		assert_eq!(condition.to_string(), "any_of(state(phase=MainApp), elapsed(2500ms))");
	}

	#[test]
	fn time_only_detection() {
		assert!(Condition::elapsed(10).is_time_only());
		assert!(Condition::all_of(vec![Condition::elapsed(10)]).is_time_only());
		assert!(!Condition::any_of(vec![Condition::elapsed(10), Condition::text_present("x")]).is_time_only());
		assert!(!Condition::any_of(vec![]).is_time_only());
	}
}
