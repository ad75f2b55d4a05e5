//! Configuration management for the persistence layer

pub mod settings;

pub use settings::*;
