//! Core domain + orchestration logic for the torrent Telegram bot.
//!
//! This crate is intentionally framework-agnostic. Telegram / qBittorrent /
//! Seafile / the search backend live behind ports (traits) implemented in
//! adapter crates.

pub mod actions;
pub mod callback;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod security;
pub mod staging;

pub use errors::{Error, Result};
