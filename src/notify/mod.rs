//! Server-to-client push of matchmaking state changes

pub mod channel;
pub mod registry;

pub use channel::{
    NotificationChannel, NotificationSession, SessionHandle, SessionState, NOT_FOUND_MESSAGE,
    SERVER_ERROR_MESSAGE,
};
pub use registry::SessionRegistry;
