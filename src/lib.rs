//! Outbox - Upload staging daemon
//!
//! Watches directory trees for files being written in, waits until each
//! file's size has held steady long enough to call its input complete, then
//! forwards it through a rate-limited uploader and optionally removes it.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod forwarder;
pub mod limiter;
pub mod observability;
pub mod registry;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
