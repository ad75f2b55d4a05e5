//! Primary store health monitoring

pub mod health_monitor;

pub use health_monitor::*;
