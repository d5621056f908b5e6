//! # CO2 Monitor Library
//!
//! Continuously sample indoor CO2 and serve the readings on a small
//! web dashboard.
//!
//! This library provides the core functionality for the monitor: the
//! acquisition loop, time-based log rotation, CSV log storage, the
//! shared observation state, the external PM2.5 fetch, and the HTTP
//! responder that exposes all of it.

pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod fetch;
pub mod monitor;
pub mod rotation;
pub mod sensor;
pub mod server;
pub mod state;
pub mod storage;
