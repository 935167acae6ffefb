//! netverify - Network Device Verification Library
//!
//! Runs a catalog of verification checks against a device inventory with
//! bounded concurrency, caching device command outputs per device.

pub mod cache;
pub mod catalog;
pub mod checks;
pub mod config;
pub mod constants;
pub mod device;
pub mod document;
pub mod logging;
pub mod models;
pub mod output;
pub mod registry;
pub mod runner;
