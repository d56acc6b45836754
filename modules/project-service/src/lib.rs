//! Project service: owns project lifecycle and roster events, consumes
//! user removals.

pub mod config;
pub mod handlers;
pub mod publisher;
pub mod roster;

pub use config::Config;
pub use publisher::ProjectEventPublisher;
pub use roster::ProjectRosterStore;
