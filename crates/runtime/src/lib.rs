//! Driver contract and WebDriver engine for the veri harness.
//!
//! * [`Driver`]: one isolated browser session, the only channel to a browser.
//! * [`DriverEngine`]: process-wide session factory with start/stop lifecycle.
//! * [`WebDriverEngine`]: the real engine, optionally spawning a local
//!   `chromedriver`/`geckodriver`.

pub mod driver;
pub mod engine;
pub mod error;
pub mod server;
pub mod webdriver;

pub use driver::{Driver, ElementHandle, SessionOptions};
pub use engine::{Browser, DriverEngine, EngineConfig, WebDriverEngine};
pub use error::{Error, Result};
pub use server::{DriverServer, get_driver_executable};
pub use webdriver::WebDriverSession;
