//! Core data types and structures

pub mod value;
pub mod trade;
pub mod market;
pub mod health;
pub mod statistics;

pub use value::*;
pub use trade::*;
pub use market::*;
pub use health::*;
pub use statistics::*;
