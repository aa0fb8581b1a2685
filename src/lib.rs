mod availability;
mod client;
mod config;
mod diff;
mod error;
mod logger;
mod protocol;
mod proxy;
pub mod rules;
mod snapshot;
mod store;
mod types;

pub use availability::Availability;
pub use client::{JnapClient, JnapClientBuilder, RetryPolicy};
pub use config::Config;
pub use diff::changed_zones;
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use proxy::{Clock, StateProxy, StateProxyBuilder, SystemClock};
pub use snapshot::Snapshot;
pub use store::{FileSetpointStore, MemorySetpointStore, SavedSetpoints, SetpointStore};
pub use types::*;
