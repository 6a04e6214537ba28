pub mod config;

pub use config::{Config, ConfigError, GoogleConfig, RoomConfig};
