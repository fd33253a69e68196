//! Command-line driver for the `hass` client library.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
