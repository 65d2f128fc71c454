//! Locator resolution.
//!
//! Strategies are tried in declared order and never merged. A strategy that
//! yields exactly one element wins; several elements are only accepted when
//! the locator carries an index.

use tracing::trace;
use veri_protocol::{Locator, Strategy};
use veri_runtime::{Driver, ElementHandle};

use crate::error::{HarnessError, Result};

/// A uniquely resolved element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
	pub handle: ElementHandle,
	/// Position of the winning strategy in the chain.
	pub strategy_index: usize,
	pub strategy: Strategy,
	/// How many elements the winning strategy matched.
	pub match_count: usize,
}

impl Resolved {
	/// Human description of what resolved, for step traces.
	pub fn describe(&self) -> String {
		if self.match_count > 1 {
			format!("{} ({} of {})", self.strategy, self.handle, self.match_count)
		} else {
			self.strategy.to_string()
		}
	}
}

/// Resolves `locator` to exactly one element.
///
/// # Errors
///
/// [`HarnessError::NotFound`] when every strategy matched nothing, and
/// [`HarnessError::Ambiguous`] when some strategy matched several elements
/// and none matched uniquely. Driver failures propagate unchanged.
pub async fn resolve(driver: &dyn Driver, locator: &Locator) -> Result<Resolved> {
	let mut ambiguous = None;

	for (strategy_index, strategy) in locator.strategies.iter().enumerate() {
		let matches = driver.query(strategy, locator.scope.as_ref()).await?;
		trace!(target = "veri", locator = %locator, strategy = %strategy, count = matches.len(), "strategy tried");

		match matches.len() {
			0 => continue,
			1 => {
				return Ok(Resolved {
					handle: matches[0],
					strategy_index,
					strategy: strategy.clone(),
					match_count: 1,
				});
			}
			count => match locator.index {
				Some(index) if index < count => {
					return Ok(Resolved {
						handle: matches[index],
						strategy_index,
						strategy: strategy.clone(),
						match_count: count,
					});
				}
				// Out-of-range index counts as no match.
				Some(_) => continue,
				None => ambiguous = Some(count),
			},
		}
	}

	match ambiguous {
		Some(count) => Err(HarnessError::Ambiguous {
			locator: locator.to_string(),
			count,
		}),
		None => Err(HarnessError::NotFound {
			locator: locator.to_string(),
		}),
	}
}

/// Every match of the first strategy that matches anything.
///
/// Non-strict counterpart of [`resolve`], used for visibility checks. The
/// locator's index still narrows a multi-element match to one element.
pub async fn resolve_any(driver: &dyn Driver, locator: &Locator) -> Result<Vec<ElementHandle>> {
	Ok(first_match(driver, locator)
		.await?
		.map(|(_, handles)| handles)
		.unwrap_or_default())
}

/// Like [`resolve_any`], also naming the strategy that matched.
pub async fn first_match(driver: &dyn Driver, locator: &Locator) -> Result<Option<(Strategy, Vec<ElementHandle>)>> {
	for strategy in &locator.strategies {
		let matches = driver.query(strategy, locator.scope.as_ref()).await?;
		if matches.is_empty() {
			continue;
		}
		match locator.index {
			Some(index) if matches.len() > 1 => match matches.get(index) {
				Some(handle) => return Ok(Some((strategy.clone(), vec![*handle]))),
				None => continue,
			},
			_ => return Ok(Some((strategy.clone(), matches))),
		}
	}
	Ok(None)
}

/// True when some element of the first matching strategy is visible.
pub async fn any_visible(driver: &dyn Driver, locator: &Locator) -> Result<bool> {
	visible_among(driver, &resolve_any(driver, locator).await?).await
}

/// True when one of `handles` is visible. Detached elements count as hidden.
pub async fn visible_among(driver: &dyn Driver, handles: &[ElementHandle]) -> Result<bool> {
	for &handle in handles {
		match driver.is_visible(handle).await {
			Ok(true) => return Ok(true),
			Ok(false) => {}
			Err(e) if e.is_transient() => {}
			Err(e) => return Err(e.into()),
		}
	}
	Ok(false)
}

#[cfg(test)]
mod tests {
	use veri_protocol::Scope;

	use super::*;
	use crate::testing::{FakeDriver, FakeNode};

	fn page() -> FakeDriver {
		FakeDriver::with_nodes(vec![
			FakeNode::new("button").text("Config").attr("aria-label", "Config"),
			FakeNode::new("button").text("Config").attr("aria-label", "Config").hidden(),
			FakeNode::new("button").text("Execute").within(".glass-panel", "Danger Zone Execute"),
			FakeNode::new("button").text("Execute").within(".glass-panel", "Backup Execute"),
			FakeNode::new("input").attr("placeholder", "Enter PIN..."),
		])
	}

	#[tokio::test]
	async fn first_unique_strategy_wins() {
		let driver = page();
		let locator = Locator::new(Strategy::attribute("data-testid", "pin"))
			.or(Strategy::placeholder("Enter PIN..."))
			.or(Strategy::css("input"));

		let resolved = resolve(&driver, &locator).await.unwrap();
		assert_eq!(resolved.strategy_index, 1);
		assert_eq!(resolved.match_count, 1);
	}

	#[tokio::test]
	async fn ambiguity_falls_through_to_next_strategy() {
		let driver = page();
		let locator = Locator::new(Strategy::attribute("aria-label", "Config")).or(Strategy::placeholder("Enter PIN..."));

		let resolved = resolve(&driver, &locator).await.unwrap();
		assert_eq!(resolved.strategy_index, 1);
	}

	#[tokio::test]
	async fn unresolved_ambiguity_is_reported() {
		let driver = page();
		let locator = Locator::new(Strategy::text("Execute")).or(Strategy::text("missing"));

		let err = resolve(&driver, &locator).await.unwrap_err();
		assert!(matches!(err, HarnessError::Ambiguous { count: 2, .. }));
	}

	#[tokio::test]
	async fn zero_matches_everywhere_is_not_found() {
		let driver = page();
		let err = resolve(&driver, &Locator::text("Security Clearance")).await.unwrap_err();
		assert!(matches!(err, HarnessError::NotFound { .. }));
	}

	#[tokio::test]
	async fn index_disambiguates_and_out_of_range_is_no_match() {
		let driver = page();
		let second = Locator::new(Strategy::attribute("aria-label", "Config")).nth(1);
		let resolved = resolve(&driver, &second).await.unwrap();
		assert_eq!(resolved.match_count, 2);
		assert!(!driver.is_visible(resolved.handle).await.unwrap());

		let out_of_range = Locator::new(Strategy::attribute("aria-label", "Config")).nth(5);
		let err = resolve(&driver, &out_of_range).await.unwrap_err();
		assert!(matches!(err, HarnessError::NotFound { .. }));
	}

	#[tokio::test]
	async fn scope_narrows_to_matching_container() {
		let driver = page();
		let locator = Locator::role("button", "Execute").within(Scope::new(".glass-panel").has_text("Danger Zone"));
		let resolved = resolve(&driver, &locator).await.unwrap();
		assert_eq!(resolved.match_count, 1);
	}

	#[tokio::test]
	async fn resolve_any_is_non_strict() {
		let driver = page();
		let config = Locator::new(Strategy::attribute("aria-label", "Config"));
		assert_eq!(resolve_any(&driver, &config).await.unwrap().len(), 2);
		assert!(any_visible(&driver, &config).await.unwrap());
		assert!(!any_visible(&driver, &config.clone().nth(1)).await.unwrap());
		assert!(resolve_any(&driver, &Locator::text("nothing")).await.unwrap().is_empty());
	}
}
