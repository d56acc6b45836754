//! User service: owns user lifecycle events, consumes task and project
//! activity into per-user stats.

pub mod config;
pub mod handlers;
pub mod publisher;
pub mod stats;

pub use config::Config;
pub use publisher::UserEventPublisher;
pub use stats::{UserStats, UserStatsStore};
