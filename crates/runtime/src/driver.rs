//! The automation driver contract.
//!
//! A [`Driver`] is one isolated browser session. The harness never talks to a
//! browser any other way, so swapping WebDriver for an in-memory fake is a
//! matter of implementing this trait.

use std::fmt;

use async_trait::async_trait;
use veri_protocol::{Scope, Strategy, Viewport};

use crate::error::Result;

/// Opaque reference to an element returned by [`Driver::query`].
///
/// Handles are only valid until the driver's next [`Driver::release_handles`]
/// call; the harness releases them at every step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Per-session options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
	pub viewport: Option<Viewport>,
}

impl SessionOptions {
	pub fn with_viewport(viewport: Viewport) -> Self {
		Self {
			viewport: Some(viewport),
		}
	}
}

/// One browser session.
///
/// Methods that take an [`ElementHandle`] fail with
/// [`Error::StaleHandle`](crate::Error::StaleHandle) when the handle was
/// released.
#[async_trait]
pub trait Driver: Send + Sync {
	async fn navigate(&self, url: &str) -> Result<()>;

	/// Every element matching `strategy`, in document order.
	///
	/// When `scope` is given only elements inside a matching container count.
	async fn query(&self, strategy: &Strategy, scope: Option<&Scope>) -> Result<Vec<ElementHandle>>;

	async fn click(&self, handle: ElementHandle) -> Result<()>;

	/// Replaces the element's value with `text`.
	async fn fill(&self, handle: ElementHandle, text: &str) -> Result<()>;

	async fn attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<String>>;

	/// Rendered text of the element.
	async fn text(&self, handle: ElementHandle) -> Result<String>;

	async fn is_visible(&self, handle: ElementHandle) -> Result<bool>;

	/// Attribute of the document root element (`<html>`).
	async fn root_attribute(&self, name: &str) -> Result<Option<String>>;

	/// Rendered text of the whole page.
	async fn page_text(&self) -> Result<String>;

	/// PNG bytes of the current viewport.
	async fn screenshot(&self) -> Result<Vec<u8>>;

	async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

	async fn reload(&self) -> Result<()>;

	/// Forgets every handle handed out so far.
	fn release_handles(&self) {}

	/// Ends the session. Calling it twice is not an error.
	async fn close(&self) -> Result<()>;
}
