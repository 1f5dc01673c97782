//! Configuration for the outbox daemon.

mod settings;

pub use settings::Config;
