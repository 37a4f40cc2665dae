//! Core types and trait definitions for the Tally engagement service.
//!
//! Content items, viewer identities, engagement outcomes, and the two seams
//! the rest of the workspace plugs into: [`store::EngagementStore`] and
//! [`spotlight::SpotlightCache`]. No HTTP or database code lives here.

pub mod content;
pub mod engagement;
pub mod error;
pub mod identity;
pub mod spotlight;
pub mod store;

pub use error::{Classify, Error, ErrorKind, Result};
