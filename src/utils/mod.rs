//! Utility Module
//!
//! - [`time`]: frame timer used by shadow refresh policies

pub mod time;

pub use time::Timer;
