//! Configuration Module
//!
//! Configuration loading for the event stream service.

mod settings;

pub use settings::{
    BusSettings, ConfigError, Environment, ServerSettings, SessionSettings, StreamConfig,
};
