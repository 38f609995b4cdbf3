//! # credgate-common
//!
//! Shared infrastructure for the credgate crates:
//!
//! - `errors`: the persistence gateway error type and error context helpers
//! - `logging`: `tracing-subscriber` setup
//! - `config`: layered settings loading and hot-reloadable snapshots
//! - `time`: the injectable clock used by every time-based rule
//! - `ids`: random identifiers and short codes

pub mod config;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod time;

pub use config::{load_settings, Reloadable};
pub use errors::{ErrorContext, StoreError, StoreResult};
pub use time::{Clock, ManualClock, SharedClock, SystemClock};
