//! Study task tracker library
//!
//! This module exports the core components for testing and integration.

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod notify;
pub mod sweeper;
pub mod types;
