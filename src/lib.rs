//! # Boreas - Dutch weather feed driver
//!
//! A Rust driver that polls Dutch weather services and publishes their
//! readings as key/value device state for a home-automation host:
//!
//! - **Weerlive**: current weather conditions, copied field-for-field
//! - **Buienradar**: precipitation expected over the next two hours
//! - **OpenUV**: current UV index plus tomorrow's hourly forecast
//! - **Moon phase**: computed locally, no network involved
//!
//! A one-minute poll loop drives everything; each fetcher keeps its own
//! next-run schedule so the feeds poll at independent rates.
//!
//! ## Architecture
//!
//! - `config`: YAML configuration management and validation
//! - `logging`: structured logging and tracing
//! - `driver`: the poll loop and per-kind dispatch
//! - `schedule`: next-run bookkeeping per device kind
//! - `store`: device/state store contract plus an in-memory implementation
//! - `weather`, `precipitation`, `uv`, `moon`: the fetch routines
//! - `plot`: CSV hand-off to a companion plotting tool

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod moon;
pub mod plot;
pub mod precipitation;
pub mod schedule;
pub mod store;
pub mod uv;
pub mod weather;

// Re-export commonly used types
pub use config::Config;
pub use driver::PollDriver;
pub use error::{BoreasError, Result};
