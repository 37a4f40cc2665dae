//! Read-through cache for randomised spotlight content.
//!
//! [`Spotlight`] answers "one random item per category" queries from a
//! [`SpotlightCache`](tally_core::spotlight::SpotlightCache), falling back to
//! the store on a miss. [`MemorySpotlightCache`] keeps entries in process
//! memory; [`spawn_sweeper`] bounds its size independent of read traffic.

mod cache;
mod service;
mod sweeper;

use std::time::Duration;

pub use cache::MemorySpotlightCache;
pub use service::{Spotlight, SpotlightPick};
pub use sweeper::spawn_sweeper;

/// How long a spotlight selection is served before it is re-rolled.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// How often the sweeper evicts expired selections.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
