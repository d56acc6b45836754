use std::env;
use std::time::Duration;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub bus_type: String,
    pub nats_url: String,
    pub consumer_group: String,
    pub partitions: usize,
    pub handler_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let bus_type = env::var("BUS_TYPE").unwrap_or_else(|_| "inmemory".to_string());

        let nats_url =
            env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let consumer_group =
            env::var("CONSUMER_GROUP").unwrap_or_else(|_| "user-service".to_string());

        let partitions: usize = env::var("CONSUMER_PARTITIONS")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .map_err(|_| "CONSUMER_PARTITIONS must be a positive integer".to_string())?;

        let handler_timeout_secs: u64 = env::var("HANDLER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| "HANDLER_TIMEOUT_SECS must be a positive integer".to_string())?;

        Ok(Config {
            bus_type,
            nats_url,
            consumer_group,
            partitions,
            handler_timeout: Duration::from_secs(handler_timeout_secs),
        })
    }
}
