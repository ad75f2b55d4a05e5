//! Error handling and recovery classification

pub mod store_error;
pub mod recovery;

pub use store_error::*;
pub use recovery::*;
