//! Parlor Duel - head-to-head matchmaking microservice
//!
//! This crate pairs waiting players into two-party matches by skill proximity
//! and time in queue. Concurrent pollers never produce duplicate matches: a
//! deterministic tie-break picks the writer and a conditional pair update
//! commits the match. State changes are pushed to clients over per-player
//! notification sessions.

pub mod config;
pub mod error;
pub mod http;
pub mod matching;
pub mod metrics;
pub mod notify;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use matching::{Cleaner, Matcher, PositionTracker};
pub use notify::{NotificationChannel, NotificationSession, SessionHandle, SessionState};
pub use service::MatchmakingService;
pub use store::{InMemoryStore, MatchStore, QueueStore, ShardedStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
