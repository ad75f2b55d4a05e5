//! Primary store access

pub mod backend;
pub mod handle;
pub mod mysql;
pub mod queries;
pub mod repository;
pub mod retry;

pub use backend::*;
pub use handle::*;
pub use mysql::*;
pub use retry::*;
