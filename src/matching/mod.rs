//! Matching engine: pairing, queue position and stale-entry cleanup
//!
//! All coordination between concurrent pollers happens through the stores;
//! none of these components keep state across attempts.

pub mod cleaner;
pub mod matcher;
pub mod position;

pub use cleaner::Cleaner;
pub use matcher::Matcher;
pub use position::PositionTracker;
