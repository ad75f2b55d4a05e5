//! Trade persistence across the primary and secondary stores

pub mod csv_store;
pub mod router;
pub mod statistics;

pub use csv_store::*;
pub use router::*;
pub use statistics::*;
